use chrono::{DateTime, TimeZone};
use tempfile::TempDir;

use crate::{
    models::{Conversation, Message},
    storage::FileStore,
};

use super::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

async fn seeded_store() -> (FileStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("store"));

    let mut first = Conversation::new("chat_001")
        .with_created_at(at(0))
        .with_updated_at(at(0))
        .with_model("llama3-8b");
    first.append_message(Message::new_user("Hi").with_timestamp(at(1)));
    first.append_message(Message::new_assistant("Hello! How can I help?").with_timestamp(at(2)));
    store.save(&first).await.unwrap();

    let mut second = Conversation::new("chat_002")
        .with_created_at(at(100))
        .with_updated_at(at(100));
    second.append_message(Message::new_user("Explain borrowing in Rust").with_timestamp(at(101)));
    store.save(&second).await.unwrap();

    (store, dir)
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_list() {
    let (store, _dir) = seeded_store().await;

    let mut buf = vec![];
    list(&store, 0, &mut buf).await.unwrap();
    let text = output(buf);
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("chat_002"));
    assert!(lines[0].ends_with("Explain borrowing in Rust"));
    assert!(lines[1].contains("   2 msgs"));

    let mut buf = vec![];
    list(&store, 1, &mut buf).await.unwrap();
    assert!(output(buf).ends_with("... 1 more\n"));
}

#[tokio::test]
async fn test_list_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let mut buf = vec![];
    list(&store, 10, &mut buf).await.unwrap();
    assert_eq!(output(buf), "No conversations yet.\n");
}

#[tokio::test]
async fn test_show() {
    let (store, _dir) = seeded_store().await;
    let mut buf = vec![];
    show(&store, "chat_001", &mut buf).await.unwrap();
    let text = output(buf);
    assert!(text.starts_with("# Hi\n"));
    assert!(text.contains("model: llama3-8b\n"));
    assert!(text.contains("] user: Hi\n"));
    assert!(text.ends_with("] assistant: Hello! How can I help?\n"));

    let err = show(&store, "nope", &mut vec![]).await.unwrap_err();
    assert_eq!(err.to_string(), "Conversation 'nope' was not found.");
}

#[tokio::test]
async fn test_export() {
    let (store, dir) = seeded_store().await;
    let target = dir.path().join("exports");

    let mut buf = vec![];
    export(&store, "chat_001", "json", &target, &mut buf)
        .await
        .unwrap();
    assert!(output(buf).starts_with("Exported chat_001 (application/json"));

    let bytes = std::fs::read(target.join("chat_001.json")).unwrap();
    let imported = crate::export::import(&bytes).unwrap();
    assert_eq!(imported, store.load("chat_001").await.unwrap());

    export(&store, "chat_001", "pdf", &target, &mut vec![])
        .await
        .unwrap();
    assert!(
        std::fs::read(target.join("chat_001.pdf"))
            .unwrap()
            .starts_with(b"%PDF-")
    );

    let err = export(&store, "chat_001", "docx", &target, &mut vec![])
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Unsupported export format 'docx'"));
}

#[tokio::test]
async fn test_delete() {
    let (store, _dir) = seeded_store().await;
    let mut buf = vec![];
    delete(&store, "chat_002", &mut buf).await.unwrap();
    assert_eq!(output(buf), "Deleted chat_002\n");
    assert!(delete(&store, "chat_002", &mut vec![]).await.is_err());
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search() {
    let (store, _dir) = seeded_store().await;
    let mut buf = vec![];
    search(&store, "BORROW", 10, &mut buf).await.unwrap();
    assert_eq!(
        output(buf),
        "chat_002  Explain borrowing in Rust\n    Explain borrowing in Rust\n"
    );

    let mut buf = vec![];
    search(&store, "lifetimes", 10, &mut buf).await.unwrap();
    assert_eq!(output(buf), "No conversations match \"lifetimes\".\n");
}

#[tokio::test]
async fn test_stats_and_cleanup() {
    let (store, _dir) = seeded_store().await;
    let mut buf = vec![];
    stats(&store, &mut buf).await.unwrap();
    let text = output(buf);
    assert!(text.contains("Conversations: 2\n"));
    assert!(text.contains("Messages: 3\n"));
    assert!(text.contains("Average messages per conversation: 1.50\n"));
    assert!(text.contains("    llama3-8b: 1\n"));

    // Seeded conversations are from 2023.
    let mut buf = vec![];
    cleanup(&store, 30, &mut buf).await.unwrap();
    assert_eq!(output(buf), "Deleted 2 conversations older than 30 days\n");
    assert!(store.list().await.unwrap().is_empty());
}
