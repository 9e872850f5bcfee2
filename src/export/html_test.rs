use chrono::TimeZone;

use crate::models::Message;

use super::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn test_escape_html() {
    assert_eq!(
        escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
        "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
    );
    assert_eq!(escape_html("plain"), "plain");
}

#[test]
fn test_render_escapes_script_content() {
    let mut convo = Conversation::new("chat_html");
    convo.append_message(
        Message::new_user("<script>alert('x')</script>").with_timestamp(at(0)),
    );
    convo.append_message(Message::new_assistant("I won't run that.").with_timestamp(at(60)));

    let html = String::from_utf8(render(&convo, at(120))).unwrap();
    assert!(!html.contains("<script>"));
    assert!(!html.contains("</script>"));
    assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
}

#[test]
fn test_render_distinguishes_roles() {
    let mut convo = Conversation::new("chat_roles");
    convo.append_message(Message::new_user("Hi").with_timestamp(at(0)));
    convo.append_message(Message::new_assistant("Hello! How can I help?").with_timestamp(at(90)));

    let html = String::from_utf8(render(&convo, at(120))).unwrap();
    let user = html.find("message user-message").unwrap();
    let assistant = html.find("message assistant-message").unwrap();
    assert!(user < assistant);
    assert!(html.contains("<h2>Messages (2 total)</h2>"));
    assert!(html.contains("<strong>Conversation Duration:</strong> 1m"));
    assert!(html.contains(&format!("Export Date: {}", super::super::format_timestamp(at(120)))));
}

#[test]
fn test_render_empty_conversation() {
    let convo = Conversation::new("empty");
    let html = String::from_utf8(render(&convo, at(0))).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.trim_end().ends_with("</html>"));
    assert!(html.contains("No messages."));
    assert!(html.contains("<strong>Conversation Duration:</strong> N/A"));
}

#[test]
fn test_render_escapes_id_and_metadata() {
    let mut convo = Conversation::new("id<b>");
    convo.set_metadata("model", "<i>evil</i>");
    let html = String::from_utf8(render(&convo, at(0))).unwrap();
    assert!(!html.contains("<b>"));
    assert!(!html.contains("<i>"));
    assert!(html.contains("id&lt;b&gt;"));
}
