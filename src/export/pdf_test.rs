use chrono::TimeZone;

use crate::models::Message;

use super::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn test_render_empty_conversation_is_single_page() {
    let pdf = render(&Conversation::new("empty"), at(0));
    assert!(pdf.starts_with(b"%PDF-1.4\n"));
    assert!(pdf.ends_with(b"%%EOF\n"));
    assert!(find(&pdf, b"/Count 1 ").is_some());
    assert!(find(&pdf, b"(No messages.)").is_some());
}

#[test]
fn test_render_xref_offsets_point_at_objects() {
    let mut convo = Conversation::new("chat_001");
    convo.append_message(Message::new_user("Hi").with_timestamp(at(0)));
    convo.append_message(Message::new_assistant("Hello! How can I help?").with_timestamp(at(1)));
    let pdf = render(&convo, at(2));

    let xref = find(&pdf, b"xref\n").unwrap();
    let startxref = find(&pdf, b"startxref\n").unwrap();
    let declared: usize = std::str::from_utf8(&pdf[startxref + 10..])
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, xref);

    let table = std::str::from_utf8(&pdf[xref..startxref]).unwrap();
    let entries = table.lines().skip(3).map(|l| l.trim_end()).collect::<Vec<_>>();
    assert!(!entries.is_empty());
    for (i, entry) in entries.iter().take_while(|l| l.ends_with(" n")).enumerate() {
        let offset: usize = entry[..10].parse().unwrap();
        let expected = format!("{} 0 obj", i + 1);
        assert!(pdf[offset..].starts_with(expected.as_bytes()), "object {}", i + 1);
    }
}

#[test]
fn test_render_escapes_string_delimiters() {
    let mut convo = Conversation::new("escape");
    convo.append_message(Message::new_user(r"call f(x) \ done").with_timestamp(at(0)));
    let pdf = render(&convo, at(1));
    assert!(find(&pdf, br"(call f\(x\) \\ done)").is_some());
}

#[test]
fn test_render_replaces_unencodable_chars() {
    let mut convo = Conversation::new("unicode");
    convo.append_message(Message::new_user("café – 你好").with_timestamp(at(0)));
    let pdf = render(&convo, at(1));
    assert!(find(&pdf, b"(caf\xE9 \x96 ??)").is_some());
}

#[test]
fn test_long_conversation_spans_pages() {
    let mut convo = Conversation::new("long");
    for i in 0..40 {
        convo.append_message(
            Message::new_user(format!("line one {i}\nline two\nline three")).with_timestamp(at(i)),
        );
    }
    let pdf = render(&convo, at(100));
    let pages = count(&pdf, b"/Type /Page ");
    assert!(pages > 1);
    assert!(find(&pdf, format!("/Count {pages} ").as_bytes()).is_some());
    assert!(find(&pdf, format!("(Page {pages} of {pages})").as_bytes()).is_some());
}

#[test]
fn test_paginate_keeps_messages_on_one_page() {
    let mut convo = Conversation::new("blocks");
    let body = (0..7).map(|i| format!("row {i}")).collect::<Vec<_>>().join("\n");
    for i in 0..30 {
        convo.append_message(Message::new_assistant(body.clone()).with_timestamp(at(i)));
    }

    let pages = paginate(layout_blocks(&convo, at(0)));
    assert!(pages.len() > 1);
    for page in &pages {
        assert!(page.len() <= LINES_PER_PAGE);
    }
    for idx in 0..convo.len() {
        let holding = pages
            .iter()
            .filter(|p| p.iter().any(|l| l.message == Some(idx)))
            .count();
        assert_eq!(holding, 1, "message {idx} was split across pages");
    }
}

#[test]
fn test_paginate_splits_oversized_message() {
    let mut convo = Conversation::new("huge");
    let body = (0..(LINES_PER_PAGE * 2))
        .map(|i| format!("row {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    convo.append_message(Message::new_assistant(body).with_timestamp(at(0)));

    let pages = paginate(layout_blocks(&convo, at(0)));
    assert!(pages.len() >= 3);
    let total: usize = pages
        .iter()
        .map(|p| p.iter().filter(|l| l.message == Some(0)).count())
        .sum();
    // header line + body lines, trailing blank may be dropped at a page top
    assert!(total >= LINES_PER_PAGE * 2 + 1);
}

#[test]
fn test_wrap() {
    assert_eq!(wrap("a b\n\nc"), vec!["a b", "", "c"]);

    let words = vec!["word"; 40].join(" ");
    let lines = wrap(&words);
    assert!(lines.len() > 1);
    assert!(lines.iter().all(|l| l.chars().count() <= WRAP_COLUMNS));
    assert_eq!(lines.join(" "), words);

    let long = "x".repeat(WRAP_COLUMNS * 2 + 5);
    let lines = wrap(&format!("see {long}"));
    assert_eq!(lines[0], "see");
    assert_eq!(lines[1].len(), WRAP_COLUMNS);
    assert_eq!(lines[2].len(), WRAP_COLUMNS);
    assert_eq!(lines[3].len(), 5);
}
