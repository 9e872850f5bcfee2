pub mod fs;

pub use fs::FileStore;

#[cfg(test)]
use mockall::automock;

use std::{io, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use thiserror::Error;

use crate::{
    config::{StorageConfig, resolve_path},
    export::ExportError,
    models::{Conversation, ConversationSummary, SearchHit, StoreStatistics},
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("conversation {0} not found")]
    NotFound(String),

    #[error("invalid conversation id: {0:?}")]
    InvalidId(String),

    #[error("conversation {id} is corrupt: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: ExportError,
    },

    #[error("storage i/o: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub(crate) fn timed_out(op: &str) -> Self {
        StorageError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("storage {op} timed out"),
        ))
    }
}

/// Durable conversation records keyed by id.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Storage {
    /// Writes the whole conversation, replacing any record with the same id.
    async fn save(&self, conversation: &Conversation) -> Result<(), StorageError>;
    async fn load(&self, id: &str) -> Result<Conversation, StorageError>;
    /// Most recently updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StorageError>;
    async fn statistics(&self) -> Result<StoreStatistics, StorageError>;
    /// Returns the number of deleted records.
    async fn cleanup_older_than(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError>;
}

pub type ArcStorage = Arc<dyn Storage + Send + Sync>;

pub fn new_storage(config: &StorageConfig) -> Result<ArcStorage> {
    let path = resolve_path(&config.path).wrap_err("resolving storage path")?;
    log::debug!("using conversation store at {}", path);
    Ok(Arc::new(FileStore::new(path)))
}

/// Ids end up as file names, so only a conservative alphabet is accepted.
pub fn validate_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}
