use crate::models::Conversation;

use super::format_timestamp;

const CONTINUATION_INDENT: &str = "    ";

/// One `[timestamp] role: content` entry per message, in stored order.
/// Continuation lines of multi-line content are indented so every entry
/// still starts at column 0.
pub fn render(conversation: &Conversation) -> Vec<u8> {
    let separator = format!("\n{CONTINUATION_INDENT}");
    let mut out = String::new();
    for msg in conversation.messages() {
        let content = msg
            .content()
            .lines()
            .collect::<Vec<_>>()
            .join(separator.as_str());
        out.push_str(&format!(
            "[{}] {}: {}\n",
            format_timestamp(msg.timestamp()),
            msg.role(),
            content
        ));
    }
    out.into_bytes()
}
