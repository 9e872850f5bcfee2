use chrono::TimeZone;
use tempfile::TempDir;

use crate::models::Message;

use super::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn new_store() -> (FileStore, TempDir) {
    let dir = TempDir::new().unwrap();
    (FileStore::new(dir.path().join("conversations")), dir)
}

fn build_convo(id: &str, created: i64, texts: &[&str]) -> Conversation {
    let mut convo = Conversation::new(id)
        .with_created_at(at(created))
        .with_updated_at(at(created));
    for (i, text) in texts.iter().enumerate() {
        let ts = at(created + i as i64 + 1);
        let msg = if i % 2 == 0 {
            Message::new_user(*text)
        } else {
            Message::new_assistant(*text)
        };
        convo.append_message(msg.with_timestamp(ts));
    }
    convo
}

#[tokio::test]
async fn test_save_and_load() {
    let (store, _dir) = new_store();
    let convo = build_convo("chat_001", 0, &["Hi", "Hello! How can I help?"]).with_model("llama3");

    store.save(&convo).await.unwrap();
    assert!(store.root().join("chat_001.json").is_file());

    let loaded = store.load("chat_001").await.unwrap();
    assert_eq!(loaded, convo);

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "chat_001");
    assert_eq!(listed[0].title, "Hi");
    assert_eq!(listed[0].message_count, 2);
    assert_eq!(listed[0].created_at, at(0));
    assert_eq!(listed[0].updated_at, at(2));
}

#[tokio::test]
async fn test_save_overwrites_and_leaves_no_temp_files() {
    let (store, _dir) = new_store();
    let mut convo = build_convo("chat_002", 0, &["one"]);
    store.save(&convo).await.unwrap();

    convo.append_message(Message::new_assistant("two").with_timestamp(at(5)));
    store.save(&convo).await.unwrap();

    let loaded = store.load("chat_002").await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.messages()[1].content(), "two");

    let names = std::fs::read_dir(store.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["chat_002.json".to_string()]);
}

#[tokio::test]
async fn test_load_not_found() {
    let (store, _dir) = new_store();
    let err = store.load("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(ref id) if id == "missing"));

    let err = store.delete("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_ids() {
    let (store, _dir) = new_store();
    for id in ["", ".hidden", "../escape", "a/b", "with space", "ümlaut"] {
        let err = store.load(id).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)), "id {id:?}");
    }

    let convo = Conversation::new("../escape");
    assert!(matches!(
        store.save(&convo).await.unwrap_err(),
        StorageError::InvalidId(_)
    ));

    assert!(validate_id("chat_20240101_120000_ab12").is_ok());
    assert!(validate_id("my-notes.v2").is_ok());
}

#[tokio::test]
async fn test_list_empty_or_missing_dir() {
    let (store, _dir) = new_store();
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.statistics().await.unwrap(), StoreStatistics::default());
}

#[tokio::test]
async fn test_list_orders_by_updated_at() {
    let (store, _dir) = new_store();
    store.save(&build_convo("old", 0, &["a"])).await.unwrap();
    store.save(&build_convo("new", 100, &["b"])).await.unwrap();
    store.save(&build_convo("mid", 50, &["c", "d"])).await.unwrap();

    let ids = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn test_list_skips_temp_and_corrupt_records() {
    let (store, _dir) = new_store();
    store.save(&build_convo("good", 0, &["fine"])).await.unwrap();

    let root = store.root();
    std::fs::write(root.join("half.json.tmp-0123abcd"), b"{\"id\": \"half\", \"mess").unwrap();
    std::fs::write(root.join("broken.json"), b"not json at all").unwrap();
    std::fs::write(root.join("notes.txt"), b"ignored").unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "good");

    let err = store.load("broken").await.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { ref id, .. } if id == "broken"));

    assert_eq!(store.statistics().await.unwrap().total_conversations, 1);
}

#[tokio::test]
async fn test_load_rejects_mismatched_record() {
    let (store, _dir) = new_store();
    store.save(&build_convo("original", 0, &["x"])).await.unwrap();
    std::fs::copy(
        store.root().join("original.json"),
        store.root().join("copy.json"),
    )
    .unwrap();

    assert!(matches!(
        store.load("copy").await.unwrap_err(),
        StorageError::Corrupt { .. }
    ));
}

#[tokio::test]
async fn test_list_skips_mismatched_record() {
    let (store, _dir) = new_store();
    store.save(&build_convo("original", 0, &["x"])).await.unwrap();
    std::fs::copy(
        store.root().join("original.json"),
        store.root().join("copy.json"),
    )
    .unwrap();

    let ids = |list: Vec<ConversationSummary>| list.into_iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(ids(store.list().await.unwrap()), vec!["original"]);

    store.delete("original").await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(matches!(
        store.delete("original").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_save_rejects_unreadable_metadata() {
    let (store, _dir) = new_store();
    let mut convo = build_convo("scored", 0, &["x"]);
    convo.set_metadata("score", f64::INFINITY);

    assert!(matches!(
        store.save(&convo).await.unwrap_err(),
        StorageError::Corrupt { .. }
    ));
    assert!(store.list().await.unwrap().is_empty());
    assert!(matches!(
        store.load("scored").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_delete() {
    let (store, _dir) = new_store();
    store.save(&build_convo("gone", 0, &["bye"])).await.unwrap();
    store.delete("gone").await.unwrap();

    assert!(matches!(
        store.load("gone").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search() {
    let (store, _dir) = new_store();
    let long = format!("Rust {}", "x".repeat(150));
    store
        .save(&build_convo("first", 0, &["Tell me about RUST", "Sure"]))
        .await
        .unwrap();
    store
        .save(&build_convo("second", 10, &["python please", &long]))
        .await
        .unwrap();
    store
        .save(&build_convo("third", 20, &["nothing here"]))
        .await
        .unwrap();

    let hits = store.search("rust", 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].summary.id, "second");
    assert_eq!(hits[0].preview.chars().count(), 103);
    assert!(hits[0].preview.ends_with("..."));
    assert_eq!(hits[1].summary.id, "first");
    assert_eq!(hits[1].preview, "Tell me about RUST");

    assert_eq!(store.search("rust", 1).await.unwrap().len(), 1);
    assert!(store.search("  ", 10).await.unwrap().is_empty());
    assert!(store.search("golang", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_statistics() {
    let (store, _dir) = new_store();
    store
        .save(&build_convo("a", 0, &["1", "2", "3"]).with_model("llama3"))
        .await
        .unwrap();
    store
        .save(&build_convo("b", 60, &["1"]).with_model("llama3"))
        .await
        .unwrap();
    store
        .save(&build_convo("c", 3 * 86_400, &["1", "2", "3", "4", "5", "6", "7"]).with_model("gemma"))
        .await
        .unwrap();

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.total_conversations, 3);
    assert_eq!(stats.total_messages, 11);
    assert_eq!(stats.avg_messages_per_conversation, 3.67);
    assert_eq!(stats.most_active_day, Some((at(0).date_naive(), 2)));
    assert_eq!(stats.model_usage.get("llama3"), Some(&2));
    assert_eq!(stats.model_usage.get("gemma"), Some(&1));
}

#[tokio::test]
async fn test_cleanup_older_than() {
    let (store, _dir) = new_store();
    store.save(&build_convo("ancient", 0, &["a"])).await.unwrap();
    store
        .save(&build_convo("recent", 40 * 86_400, &["b"]))
        .await
        .unwrap();

    let now = at(45 * 86_400);
    assert_eq!(store.cleanup_older_than(30, now).await.unwrap(), 1);
    let ids = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["recent"]);
    assert_eq!(store.cleanup_older_than(30, now).await.unwrap(), 0);
}

#[test]
fn test_preview() {
    assert_eq!(preview("short"), "short");
    assert_eq!(preview(&"é".repeat(100)), "é".repeat(100));
    assert_eq!(preview(&"é".repeat(101)), format!("{}...", "é".repeat(100)));
}
