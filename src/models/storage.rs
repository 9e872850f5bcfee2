use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Conversation;

/// Listing entry for a stored conversation. Built without reading the
/// message bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub summary: ConversationSummary,
    pub preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStatistics {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub avg_messages_per_conversation: f64,
    pub most_active_day: Option<(NaiveDate, usize)>,
    pub model_usage: BTreeMap<String, usize>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id().to_string(),
            title: conversation.title(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
            message_count: conversation.len(),
        }
    }
}
