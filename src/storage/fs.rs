//! One pretty-printed JSON document per conversation under a single
//! directory: `{root}/{id}.json`. The document is the same one produced by
//! the `json` export, so a record can be imported anywhere.

#[cfg(test)]
#[path = "fs_test.rs"]
mod tests;

use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{
    export::{ExportError, json},
    models::{Conversation, ConversationSummary, SearchHit, StoreStatistics},
};

use super::{Storage, StorageError, validate_id};

const RECORD_EXTENSION: &str = ".json";
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        Ok(self.root.join(format!("{id}{RECORD_EXTENSION}")))
    }

    async fn read_record(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.record_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Ids of every complete record. In-flight temp files and foreign files
    /// are ignored.
    async fn record_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut ids = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(RECORD_EXTENSION))
            else {
                continue;
            };
            if validate_id(id).is_ok() && entry.file_type().await?.is_file() {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Loads every readable record, newest first. Corrupt records are
    /// skipped with a warning.
    async fn load_all(&self) -> Result<Vec<Conversation>, StorageError> {
        let mut conversations = vec![];
        for id in self.record_ids().await? {
            match self.load(&id).await {
                Ok(conversation) => conversations.push(conversation),
                Err(StorageError::Corrupt { id, source }) => {
                    log::warn!("skipping corrupt conversation {}: {}", id, source);
                }
                // Deleted between listing and reading.
                Err(StorageError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        conversations.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(conversations)
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let path = self.record_path(conversation.id())?;
        let bytes =
            json::to_json(conversation, Utc::now()).map_err(|source| StorageError::Corrupt {
                id: conversation.id().to_string(),
                source,
            })?;

        fs::create_dir_all(&self.root).await?;
        let tmp = self.root.join(format!(
            "{}{}.tmp-{}",
            conversation.id(),
            RECORD_EXTENSION,
            Uuid::new_v4().simple()
        ));

        let written: io::Result<()> = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                log::debug!("removing temp file {}: {}", tmp.display(), cleanup);
            }
            return Err(err.into());
        }

        log::debug!(
            "saved conversation {} ({} messages)",
            conversation.id(),
            conversation.len()
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Conversation, StorageError> {
        let bytes = self.read_record(id).await?;
        let conversation = json::from_json(&bytes).map_err(|source| StorageError::Corrupt {
            id: id.to_string(),
            source,
        })?;
        if conversation.id() != id {
            return Err(StorageError::Corrupt {
                id: id.to_string(),
                source: ExportError::InvalidDocument(format!(
                    "record holds conversation {}",
                    conversation.id()
                )),
            });
        }
        Ok(conversation)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError> {
        let mut summaries = vec![];
        for id in self.record_ids().await? {
            let bytes = match self.read_record(&id).await {
                Ok(bytes) => bytes,
                Err(StorageError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            match json::read_summary(&bytes) {
                Ok(summary) if summary.id == id => summaries.push(summary),
                Ok(summary) => log::warn!(
                    "skipping conversation {}: record holds conversation {}",
                    id,
                    summary.id
                ),
                Err(err) => log::warn!("skipping unreadable conversation {}: {}", id, err),
            }
        }
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("deleted conversation {}", id);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StorageError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }

        let mut hits = vec![];
        for conversation in self.load_all().await? {
            let Some(msg) = conversation
                .messages()
                .iter()
                .find(|m| m.content().to_lowercase().contains(&needle))
            else {
                continue;
            };
            hits.push(SearchHit {
                summary: ConversationSummary::from(&conversation),
                preview: preview(msg.content()),
            });
            if limit > 0 && hits.len() == limit {
                break;
            }
        }
        Ok(hits)
    }

    async fn statistics(&self) -> Result<StoreStatistics, StorageError> {
        let conversations = self.load_all().await?;
        if conversations.is_empty() {
            return Ok(StoreStatistics::default());
        }

        let total_messages: usize = conversations.iter().map(|c| c.len()).sum();
        let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut model_usage: BTreeMap<String, usize> = BTreeMap::new();
        for conversation in &conversations {
            *days.entry(conversation.created_at().date_naive()).or_default() += 1;
            if let Some(model) = conversation.model() {
                *model_usage.entry(model.to_string()).or_default() += 1;
            }
        }

        // Earliest day wins a tie.
        let most_active_day = days
            .into_iter()
            .fold(None, |best: Option<(NaiveDate, usize)>, (day, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((day, count)),
            });

        let avg = total_messages as f64 / conversations.len() as f64;
        Ok(StoreStatistics {
            total_conversations: conversations.len(),
            total_messages,
            avg_messages_per_conversation: (avg * 100.0).round() / 100.0,
            most_active_day,
            model_usage,
        })
    }

    async fn cleanup_older_than(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut deleted = 0;
        for summary in self.list().await? {
            if summary.created_at >= cutoff {
                continue;
            }
            match self.delete(&summary.id).await {
                Ok(()) => deleted += 1,
                Err(StorageError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        log::info!("cleaned up {} conversations older than {} days", deleted, days);
        Ok(deleted)
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let mut preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push_str("...");
    }
    preview
}
