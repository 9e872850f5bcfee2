#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, Role};

pub const MODEL_KEY: &str = "model";

const TITLE_MAX_CHARS: usize = 50;

/// Scalar metadata value. Untagged so the JSON record stays readable:
/// `{"model": "gemma2-9b-it", "pinned": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

pub type Metadata = BTreeMap<String, Scalar>;

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Integer(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    metadata: Metadata,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
            messages: vec![],
        }
    }

    /// Generates an id of the form `chat_20240115_093012_1a2b`.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("chat_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..4])
    }

    pub fn with_created_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.created_at = timestamp;
        if self.updated_at < timestamp {
            self.updated_at = timestamp;
        }
        self
    }

    pub fn with_updated_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.updated_at = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.set_model(model);
        self
    }

    /// Replaces the message list. The stable sort keeps the given order for
    /// messages sharing a timestamp.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self.messages.sort_by_key(|m| m.timestamp());
        self
    }

    /// Appends a message and refreshes `updated_at`. A timestamp earlier
    /// than the last stored message is raised to it so the list never goes
    /// backwards in time.
    pub fn append_message(&mut self, mut message: Message) -> &Message {
        if let Some(last) = self.messages.last() {
            if message.timestamp() < last.timestamp() {
                message.set_timestamp(last.timestamp());
            }
        }
        self.updated_at = self.updated_at.max(message.timestamp());
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.set_metadata(MODEL_KEY, model.into());
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.get(MODEL_KEY).and_then(Scalar::as_str)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role() == role).count()
    }

    /// The latest `size` messages, or the whole history when `size` is 0.
    pub fn window(&self, size: usize) -> &[Message] {
        if size == 0 || size >= self.messages.len() {
            return &self.messages;
        }
        &self.messages[self.messages.len() - size..]
    }

    /// Title derived from the first user message.
    pub fn title(&self) -> String {
        let first = self
            .messages
            .iter()
            .find(|m| m.is_user())
            .map(|m| m.content().trim());

        match first {
            Some(text) if !text.is_empty() => {
                if text.chars().count() > TITLE_MAX_CHARS {
                    let head: String = text.chars().take(TITLE_MAX_CHARS - 3).collect();
                    format!("{head}...")
                } else {
                    text.to_string()
                }
            }
            _ => format!("Chat {}", self.created_at.format("%Y-%m-%d %H:%M")),
        }
    }
}
