//! The JSON conversation document. It is both the `json` export format and
//! the on-disk record written by the store, so anything exported as JSON
//! can be imported back without loss.

#[cfg(test)]
#[path = "json_test.rs"]
mod tests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Conversation, ConversationSummary, Message, Metadata, Scalar};

use super::ExportError;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    id: &'a str,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    generated_at: DateTime<Utc>,
    message_count: usize,
    metadata: &'a Metadata,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct Document {
    #[serde(default = "default_version")]
    version: u32,
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    messages: Vec<Message>,
}

/// Everything a listing needs. `messages` is counted while it is parsed so
/// that message bodies are never materialized.
#[derive(Deserialize)]
struct DocumentHeader {
    id: String,
    #[serde(default)]
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, rename = "messages", deserialize_with = "count_entries")]
    message_count: usize,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

pub fn to_json(
    conversation: &Conversation,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    // serde_json writes NaN and infinities as null, which cannot be read back
    for (key, value) in conversation.metadata() {
        if let Scalar::Float(v) = value
            && !v.is_finite()
        {
            return Err(ExportError::InvalidDocument(format!(
                "metadata {key} is not a finite number: {v}"
            )));
        }
    }

    let doc = DocumentRef {
        version: DOCUMENT_VERSION,
        id: conversation.id(),
        title: conversation.title(),
        created_at: conversation.created_at(),
        updated_at: conversation.updated_at(),
        generated_at,
        message_count: conversation.len(),
        metadata: conversation.metadata(),
        messages: conversation.messages(),
    };
    let mut bytes = serde_json::to_vec_pretty(&doc)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn from_json(bytes: &[u8]) -> Result<Conversation, ExportError> {
    let doc: Document = serde_json::from_slice(bytes)?;
    if doc.version > DOCUMENT_VERSION {
        return Err(ExportError::InvalidDocument(format!(
            "document version {} is newer than supported version {}",
            doc.version, DOCUMENT_VERSION
        )));
    }
    if doc.id.is_empty() {
        return Err(ExportError::InvalidDocument("empty conversation id".into()));
    }
    if doc.messages.windows(2).any(|w| w[1].timestamp() < w[0].timestamp()) {
        return Err(ExportError::InvalidDocument(
            "message timestamps are not in order".into(),
        ));
    }

    Ok(Conversation::new(doc.id)
        .with_created_at(doc.created_at)
        .with_updated_at(doc.updated_at)
        .with_metadata(doc.metadata)
        .with_messages(doc.messages))
}

pub(crate) fn read_summary(bytes: &[u8]) -> Result<ConversationSummary, serde_json::Error> {
    let header: DocumentHeader = serde_json::from_slice(bytes)?;
    let title = header
        .title
        .unwrap_or_else(|| format!("Chat {}", header.created_at.format("%Y-%m-%d %H:%M")));
    Ok(ConversationSummary {
        id: header.id,
        title,
        created_at: header.created_at,
        updated_at: header.updated_at,
        message_count: header.message_count,
    })
}

fn count_entries<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of messages")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<usize, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut count = 0;
            while seq.next_element::<IgnoredAny>()?.is_some() {
                count += 1;
            }
            Ok(count)
        }
    }

    deserializer.deserialize_seq(CountVisitor)
}
