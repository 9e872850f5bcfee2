//! Conversation export.
//!
//! Every renderer is a pure function of the conversation snapshot and the
//! injected export time; nothing here touches the filesystem.

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;

pub mod csv;
pub mod html;
pub mod json;
pub mod pdf;
pub mod text;

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::models::{Conversation, Role};

pub use json::{from_json as import, to_json};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("json document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("writing csv: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("invalid conversation document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
    Html,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Text,
        ExportFormat::Json,
        ExportFormat::Csv,
        ExportFormat::Html,
        ExportFormat::Pdf,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Html => "text/html",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" | "htm" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A rendered conversation ready to be handed to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: &'static str,
    filename: String,
}

impl Artifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// `{conversation_id}.{extension}`
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

pub fn export(
    conversation: &Conversation,
    format: ExportFormat,
    exported_at: DateTime<Utc>,
) -> Result<Artifact, ExportError> {
    let bytes = match format {
        ExportFormat::Text => text::render(conversation),
        ExportFormat::Json => json::to_json(conversation, exported_at)?,
        ExportFormat::Csv => csv::render(conversation)?,
        ExportFormat::Html => html::render(conversation, exported_at),
        ExportFormat::Pdf => pdf::render(conversation, exported_at),
    };

    log::debug!(
        "exported conversation {} as {} ({} bytes)",
        conversation.id(),
        format,
        bytes.len()
    );

    Ok(Artifact {
        bytes,
        mime_type: format.mime_type(),
        filename: format!("{}.{}", conversation.id(), format.extension()),
    })
}

/// Like [`export`] but takes the format by name, failing with
/// `UnsupportedFormat` for anything unknown.
pub fn export_as(
    conversation: &Conversation,
    format: &str,
    exported_at: DateTime<Utc>,
) -> Result<Artifact, ExportError> {
    export(conversation, format.parse()?, exported_at)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub system_messages: usize,
    pub total_words: usize,
    pub total_characters: usize,
    pub avg_words_per_message: f64,
    pub duration: Option<chrono::Duration>,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
}

pub fn summary(conversation: &Conversation) -> ConversationStats {
    let messages = conversation.messages();
    let total_words: usize = messages.iter().map(|m| m.word_count()).sum();
    let total_characters: usize = messages.iter().map(|m| m.content().chars().count()).sum();
    let first = messages.first().map(|m| m.timestamp());
    let last = messages.last().map(|m| m.timestamp());

    ConversationStats {
        total_messages: messages.len(),
        user_messages: conversation.count_role(Role::User),
        assistant_messages: conversation.count_role(Role::Assistant),
        system_messages: conversation.count_role(Role::System),
        total_words,
        total_characters,
        avg_words_per_message: if messages.is_empty() {
            0.0
        } else {
            total_words as f64 / messages.len() as f64
        },
        duration: match (first, last) {
            (Some(first), Some(last)) if messages.len() > 1 => Some(last - first),
            _ => None,
        },
        first_message_at: first,
        last_message_at: last,
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn format_duration(duration: Option<chrono::Duration>) -> String {
    let Some(duration) = duration else {
        return "N/A".to_string();
    };
    let minutes = duration.num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
