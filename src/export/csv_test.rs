use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Message, Role};

use super::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn parse(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes);
    reader
        .records()
        .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
        .collect()
}

#[test]
fn test_render_recovers_content_with_delimiters() {
    let tricky = "first, second\nthird line with \"quotes\"\r\nend";
    let mut convo = Conversation::new("chat_csv");
    convo.append_message(Message::new_user(tricky).with_timestamp(at(0)));
    convo.append_message(Message::new_assistant("plain").with_timestamp(at(1)));

    let rows = parse(&render(&convo).unwrap());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], HEADER);
    assert_eq!(rows[1][1], "user");
    assert_eq!(rows[1][2], tricky);
    assert_eq!(rows[2][1], "assistant");
    assert_eq!(rows[2][2], "plain");

    let ts: DateTime<Utc> = rows[1][0].parse().unwrap();
    assert_eq!(ts, at(0));
}

#[test]
fn test_render_empty_conversation_has_only_header() {
    let convo = Conversation::new("empty");
    let bytes = render(&convo).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), "timestamp,role,content\n");
}

#[test]
fn test_render_keeps_stored_order() {
    let mut convo = Conversation::new("ordered");
    for (i, role) in [Role::System, Role::User, Role::Assistant].into_iter().enumerate() {
        convo.append_message(Message::new(role, format!("m{i}")).with_timestamp(at(i as i64)));
    }
    let rows = parse(&render(&convo).unwrap());
    let roles = rows[1..].iter().map(|r| r[1].as_str()).collect::<Vec<_>>();
    assert_eq!(roles, vec!["system", "user", "assistant"]);
}
