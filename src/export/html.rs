#[cfg(test)]
#[path = "html_test.rs"]
mod tests;

use chrono::{DateTime, Utc};

use crate::models::{Conversation, Role};

use super::{format_duration, format_timestamp, summary};

const STYLE: &str = r#"
    body {
        font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        max-width: 800px;
        margin: 0 auto;
        padding: 20px;
        background-color: #f5f5f5;
        color: #333;
    }
    .header {
        text-align: center;
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        color: white;
        padding: 20px;
        border-radius: 10px;
        margin-bottom: 30px;
    }
    .conversation {
        background: white;
        border-radius: 10px;
        padding: 20px;
        box-shadow: 0 2px 10px rgba(0,0,0,0.1);
    }
    .message {
        margin-bottom: 20px;
        padding: 15px;
        border-radius: 10px;
        page-break-inside: avoid;
    }
    .user-message {
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        color: white;
        margin-left: 50px;
    }
    .assistant-message {
        background: #f8f9fa;
        border: 1px solid #e9ecef;
        margin-right: 50px;
    }
    .system-message {
        background: #fff8e1;
        border: 1px dashed #f0c36d;
        font-style: italic;
    }
    .role { font-weight: bold; font-size: 14px; margin-bottom: 5px; }
    .timestamp { font-size: 12px; opacity: 0.7; margin-top: 10px; }
    .content { line-height: 1.6; white-space: pre-wrap; }
    .empty { text-align: center; color: #888; }
    .stats {
        background: #e9ecef;
        padding: 15px;
        border-radius: 5px;
        margin-top: 20px;
    }
    .footer { text-align: center; margin-top: 30px; font-size: 12px; color: #666; }
"#;

/// Escapes the characters that could open or close markup or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn role_class(role: Role) -> &'static str {
    match role {
        Role::User => "user-message",
        Role::Assistant => "assistant-message",
        Role::System => "system-message",
    }
}

pub fn render(conversation: &Conversation, exported_at: DateTime<Utc>) -> Vec<u8> {
    let id = escape_html(conversation.id());
    let stats = summary(conversation);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!("<title>Conversation - {id}</title>\n"));
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));

    html.push_str("<div class=\"header\">\n");
    html.push_str(&format!(
        "<h1>{}</h1>\n",
        escape_html(&conversation.title())
    ));
    html.push_str(&format!("<p>Conversation ID: {id}</p>\n"));
    html.push_str(&format!(
        "<p>Export Date: {}</p>\n",
        format_timestamp(exported_at)
    ));
    for (key, value) in conversation.metadata() {
        html.push_str(&format!(
            "<p>{}: {}</p>\n",
            escape_html(key),
            escape_html(&value.to_string())
        ));
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"conversation\">\n");
    html.push_str(&format!(
        "<h2>Messages ({} total)</h2>\n",
        stats.total_messages
    ));
    if conversation.is_empty() {
        html.push_str("<p class=\"empty\">No messages.</p>\n");
    }
    for msg in conversation.messages() {
        html.push_str(&format!(
            "<div class=\"message {}\">\n",
            role_class(msg.role())
        ));
        html.push_str(&format!(
            "<div class=\"role\">{}</div>\n",
            msg.role().label()
        ));
        html.push_str(&format!(
            "<div class=\"content\">{}</div>\n",
            escape_html(msg.content())
        ));
        html.push_str(&format!(
            "<div class=\"timestamp\">{}</div>\n",
            format_timestamp(msg.timestamp())
        ));
        html.push_str("</div>\n");
    }

    html.push_str("<div class=\"stats\">\n<h3>Conversation Statistics</h3>\n");
    html.push_str(&format!(
        "<p><strong>Total Messages:</strong> {}</p>\n",
        stats.total_messages
    ));
    html.push_str(&format!(
        "<p><strong>Your Messages:</strong> {}</p>\n",
        stats.user_messages
    ));
    html.push_str(&format!(
        "<p><strong>Assistant Messages:</strong> {}</p>\n",
        stats.assistant_messages
    ));
    html.push_str(&format!(
        "<p><strong>Conversation Duration:</strong> {}</p>\n",
        format_duration(stats.duration)
    ));
    html.push_str("</div>\n</div>\n");

    html.push_str(&format!(
        "<div class=\"footer\"><p>Generated by {}</p></div>\n",
        crate::config::user_agent()
    ));
    html.push_str("</body>\n</html>\n");
    html.into_bytes()
}
