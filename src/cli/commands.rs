//! One-shot subcommands over the conversation store.

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{Local, Utc};
use eyre::{Context, Result, eyre};

use crate::{
    export::{self, Artifact, ExportFormat},
    session::SessionError,
    storage::Storage,
};

pub type StorageRef<'a> = &'a (dyn Storage + Send + Sync);

/// Translates a component error into the text shown to the user.
pub(crate) fn user_error(err: impl Into<SessionError>) -> eyre::Report {
    eyre!(err.into().user_message())
}

/// Writes the artifact as `{dir}/{filename}` and returns the path.
pub async fn write_artifact(artifact: &Artifact, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .wrap_err(format!("creating directory {}", dir.display()))?;
    let path = dir.join(artifact.filename());
    tokio::fs::write(&path, artifact.bytes())
        .await
        .wrap_err(format!("writing {}", path.display()))?;
    Ok(path)
}

fn local_time(ts: chrono::DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub async fn list(storage: StorageRef<'_>, limit: usize, out: &mut impl Write) -> Result<()> {
    let summaries = storage.list().await.map_err(user_error)?;
    if summaries.is_empty() {
        writeln!(out, "No conversations yet.")?;
        return Ok(());
    }

    let total = summaries.len();
    let shown = if limit == 0 { total } else { limit.min(total) };
    for summary in summaries.into_iter().take(shown) {
        writeln!(
            out,
            "{}  {}  {:>4} msgs  {}",
            summary.id,
            local_time(summary.updated_at),
            summary.message_count,
            summary.title
        )?;
    }
    if shown < total {
        writeln!(out, "... {} more", total - shown)?;
    }
    Ok(())
}

pub async fn show(storage: StorageRef<'_>, id: &str, out: &mut impl Write) -> Result<()> {
    let conversation = storage.load(id).await.map_err(user_error)?;
    writeln!(out, "# {}", conversation.title())?;
    writeln!(
        out,
        "id: {}  created: {}  updated: {}",
        conversation.id(),
        local_time(conversation.created_at()),
        local_time(conversation.updated_at())
    )?;
    if let Some(model) = conversation.model() {
        writeln!(out, "model: {model}")?;
    }
    writeln!(out)?;
    let artifact =
        export::export(&conversation, ExportFormat::Text, Utc::now()).map_err(user_error)?;
    out.write_all(artifact.bytes())?;
    Ok(())
}

pub async fn export(
    storage: StorageRef<'_>,
    id: &str,
    format: &str,
    dir: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let format: ExportFormat = format.parse().map_err(user_error)?;
    let conversation = storage.load(id).await.map_err(user_error)?;
    let artifact = export::export(&conversation, format, Utc::now()).map_err(user_error)?;
    let path = write_artifact(&artifact, dir).await?;
    writeln!(
        out,
        "Exported {} ({}, {} bytes) to {}",
        id,
        artifact.mime_type(),
        artifact.bytes().len(),
        path.display()
    )?;
    Ok(())
}

pub async fn delete(storage: StorageRef<'_>, id: &str, out: &mut impl Write) -> Result<()> {
    storage.delete(id).await.map_err(user_error)?;
    writeln!(out, "Deleted {id}")?;
    Ok(())
}

pub async fn search(
    storage: StorageRef<'_>,
    query: &str,
    limit: usize,
    out: &mut impl Write,
) -> Result<()> {
    let hits = storage.search(query, limit).await.map_err(user_error)?;
    if hits.is_empty() {
        writeln!(out, "No conversations match {query:?}.")?;
        return Ok(());
    }
    for hit in hits {
        writeln!(out, "{}  {}", hit.summary.id, hit.summary.title)?;
        writeln!(out, "    {}", hit.preview.replace('\n', " "))?;
    }
    Ok(())
}

pub async fn stats(storage: StorageRef<'_>, out: &mut impl Write) -> Result<()> {
    let stats = storage.statistics().await.map_err(user_error)?;
    writeln!(out, "Conversations: {}", stats.total_conversations)?;
    writeln!(out, "Messages: {}", stats.total_messages)?;
    writeln!(
        out,
        "Average messages per conversation: {:.2}",
        stats.avg_messages_per_conversation
    )?;
    if let Some((day, count)) = stats.most_active_day {
        writeln!(out, "Most active day: {day} ({count} conversations)")?;
    }
    if !stats.model_usage.is_empty() {
        writeln!(out, "Models:")?;
        for (model, count) in &stats.model_usage {
            writeln!(out, "    {model}: {count}")?;
        }
    }
    Ok(())
}

pub async fn cleanup(storage: StorageRef<'_>, days: u32, out: &mut impl Write) -> Result<()> {
    let deleted = storage
        .cleanup_older_than(days, Utc::now())
        .await
        .map_err(user_error)?;
    writeln!(out, "Deleted {deleted} conversations older than {days} days")?;
    Ok(())
}
