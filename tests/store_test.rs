//! Store Integration Tests
//!
//! Persistence across reopen and the per-contact window under concurrent writers.

use std::sync::Arc;
use tempfile::TempDir;
use whatsbot::{Role, Store};

fn create_test_store(name: &str, window: usize) -> (Arc<Store>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(format!("{}.db", name));
    let store = Store::open_with_config(&db_path, window, 1000).expect("Failed to create store");
    (Arc::new(store), temp_dir)
}

#[test]
fn test_window_holds_under_concurrent_writers() {
    let (store, _temp) = create_test_store("concurrent", 5);
    let contact = "5511999990000@s.whatsapp.net";

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .append_message(contact, Role::User, &format!("thread {} msg {}", t, i))
                        .unwrap();
                    let count = store.recent_messages(contact, 1000).unwrap().len();
                    assert!(count <= 5, "window exceeded: {}", count);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.recent_messages(contact, 1000).unwrap().len(), 5);
    assert_eq!(store.aggregate_stats().total_messages, 5);
}

#[test]
fn test_windows_are_per_contact() {
    let (store, _temp) = create_test_store("per_contact", 3);

    for i in 0..10 {
        store.append_message("alice", Role::User, &format!("a{}", i)).unwrap();
    }
    store.append_message("bob", Role::User, "b0").unwrap();

    assert_eq!(store.recent_messages("alice", 100).unwrap().len(), 3);
    assert_eq!(store.recent_messages("bob", 100).unwrap().len(), 1);

    let stats = store.aggregate_stats();
    assert_eq!(stats.distinct_contacts, 2);
    assert_eq!(stats.total_messages, 4);
    assert_eq!(stats.messages_today, 4);
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("assistant.db");

    {
        let store = Store::open(&db_path).unwrap();
        store.append_message("alice", Role::User, "my name is Alice").unwrap();
        store.record_identity("alice", Some("Alice"), Some("Acme")).unwrap();
        store.set_fact("alice", "budget", &serde_json::json!({"max": 5000})).unwrap();
    }

    let store = Store::open(&db_path).unwrap();
    let contact = store.contact("alice").unwrap().unwrap();
    assert_eq!(contact.display_name.as_deref(), Some("Alice"));
    assert_eq!(contact.company.as_deref(), Some("Acme"));

    let budget: Option<serde_json::Value> = store.get_fact("alice", "budget").unwrap();
    assert_eq!(budget.unwrap()["max"], 5000);
    assert_eq!(store.recent_messages("alice", 10).unwrap().len(), 1);
}

#[test]
fn test_identity_never_downgraded() {
    let (store, _temp) = create_test_store("identity", 20);

    store.record_identity("alice", Some("Alice"), None).unwrap();
    store.record_identity("alice", Some("Alicia"), Some("Acme")).unwrap();
    store.record_identity("alice", Some(""), Some("  ")).unwrap();
    store.record_identity("alice", None, Some("Globex")).unwrap();

    let contact = store.contact("alice").unwrap().unwrap();
    assert_eq!(contact.display_name.as_deref(), Some("Alice"));
    assert_eq!(contact.company.as_deref(), Some("Acme"));
}

#[test]
fn test_open_fails_on_unusable_path() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = Store::open(&blocker.join("assistant.db"));
    assert!(matches!(result, Err(whatsbot::StoreError::Unavailable(_))));
}
