use std::fs;

use secure_store::framing;
use secure_store::{LoadOutcome, Persist, SecureStore, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::tempdir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Progress {
    chapter: u32,
    checkpoints: Vec<String>,
}

#[test]
fn session_survives_restart() {
    let dir = tempdir().expect("temp dir");
    let config = StoreConfig::new(dir.path().join("secure"), "supersecret");

    let progress = Progress {
        chapter: 4,
        checkpoints: vec!["gate".into(), "bridge".into()],
    };
    {
        let mut store = SecureStore::open(&config).expect("open");
        store.set("progress", &progress, Persist::Deferred).unwrap();
        store.set("volume", 0.75, Persist::Deferred).unwrap();
        store.set("player", "ada", Persist::Immediately).unwrap();
    }

    let store = SecureStore::open(&config).expect("reopen");
    assert_eq!(store.len(), 3);
    assert_eq!(store.get_as::<Progress>("progress"), Some(progress));
    assert_eq!(store.get("volume", 1.0), json!(0.75));
    assert_eq!(store.get("player", ""), json!("ada"));
}

#[test]
fn backing_file_holds_one_framed_ciphertext() {
    let dir = tempdir().expect("temp dir");
    let config = StoreConfig::new(dir.path().join("secure"), "supersecret");
    let mut store = SecureStore::open(&config).expect("open");
    store.set("token", "plain-marker", Persist::Immediately).unwrap();

    let raw = fs::read(&config.path).unwrap();
    let payload = framing::decode(&raw).expect("framed string");
    assert!(!payload.contains("plain-marker"));
    assert!(!String::from_utf8_lossy(&raw).contains("plain-marker"));
}

#[test]
fn reset_then_reload_is_empty() {
    let dir = tempdir().expect("temp dir");
    let config = StoreConfig::new(dir.path().join("nested").join("secure"), "supersecret");
    let mut store = SecureStore::open(&config).expect("open");
    store.set("a", 1, Persist::Immediately).unwrap();
    store.reset_all().unwrap();

    let mut reopened = SecureStore::open(&config).expect("reopen");
    assert!(reopened.is_empty());
    assert_eq!(reopened.load().unwrap(), LoadOutcome::Loaded(0));
    assert_eq!(reopened.print(), "{}");
}

#[test]
fn corrupted_file_leaves_memory_untouched() {
    let dir = tempdir().expect("temp dir");
    let config = StoreConfig::new(dir.path().join("secure"), "supersecret");
    let mut store = SecureStore::open(&config).expect("open");
    store.set("lives", 3, Persist::Immediately).unwrap();
    let before = store.print();

    let mut raw = fs::read(&config.path).unwrap();
    let payload_start = 23;
    raw[payload_start] = if raw[payload_start] == b'A' { b'B' } else { b'A' };
    raw[payload_start + 1] = b'#';
    fs::write(&config.path, raw).unwrap();

    assert_eq!(store.load().unwrap(), LoadOutcome::Undecryptable);
    assert_eq!(store.print(), before);
}
