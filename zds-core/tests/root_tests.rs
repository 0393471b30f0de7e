// Root handle tests: directory bootstrap, advisory locking, read-only mode,
// collection listing.

use serde_json::json;
use std::fs;
use tempfile::TempDir;

use zds_core::{Document, OpenMode, ZdsError, ZdsRoot, DEFAULT_BATCH_SIZE};

fn doc(value: serde_json::Value) -> Document {
    value.as_object().unwrap().clone()
}

#[test]
fn test_open_and_write_through_root() {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), DEFAULT_BATCH_SIZE, OpenMode::ReadWrite).unwrap();

    let train = root.collection("train", None, false).unwrap();
    let test = root.collection("test", None, false).unwrap();
    train.put("doc1", doc(json!({"split": "train"}))).unwrap();
    test.put("doc1", doc(json!({"split": "test"}))).unwrap();
    train.flush().unwrap();
    test.flush().unwrap();

    assert_eq!(train.get("doc1").unwrap(), doc(json!({"split": "train"})));
    assert_eq!(test.get("doc1").unwrap(), doc(json!({"split": "test"})));
    assert_eq!(root.list_collections().unwrap(), vec!["test", "train"]);
    root.close().unwrap();
}

#[test]
fn test_second_writer_is_locked_out() {
    let tmp = TempDir::new().unwrap();
    let first = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();

    let err = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap_err();
    assert!(matches!(err, ZdsError::Locked(_)));

    // Releasing the lock lets the next writer in
    first.close().unwrap();
    let second = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    second.close().unwrap();
}

#[test]
fn test_close_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    root.close().unwrap();
    root.close().unwrap();
}

#[test]
fn test_drop_releases_lock() {
    let tmp = TempDir::new().unwrap();
    {
        let _root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    }
    let root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    root.close().unwrap();
}

#[test]
fn test_read_only_root_ignores_lock() {
    let tmp = TempDir::new().unwrap();
    let writer = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    let coll = writer.collection("c", None, false).unwrap();
    coll.put("a", doc(json!({"x": 1}))).unwrap();
    coll.flush().unwrap();

    // A reader coexists with the writer and does not take the lock
    let reader = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadOnly).unwrap();
    assert!(!reader.is_writable());
    assert_eq!(reader.mode(), OpenMode::ReadOnly);

    let ro_coll = reader.collection("c", None, false).unwrap();
    assert_eq!(ro_coll.get("a").unwrap(), doc(json!({"x": 1})));
    assert!(matches!(
        ro_coll.put("b", doc(json!({"x": 2}))),
        Err(ZdsError::ReadOnly(_))
    ));

    writer.close().unwrap();
    reader.close().unwrap();
}

#[test]
fn test_read_only_root_requires_existing_store() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent");
    assert!(ZdsRoot::open(&missing, 100, OpenMode::ReadOnly).is_err());
    // Read-only open must not create the directory skeleton
    assert!(!missing.exists());
}

#[test]
fn test_list_collections_skips_hidden_and_files() {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();
    root.collection("beta", None, false).unwrap();
    root.collection("alpha", None, false).unwrap();

    let collections = tmp.path().join("collections");
    fs::create_dir(collections.join(".hidden")).unwrap();
    fs::write(collections.join("stray.txt"), b"not a collection").unwrap();

    assert_eq!(root.list_collections().unwrap(), vec!["alpha", "beta"]);
    root.close().unwrap();
}

#[test]
fn test_collection_exists() {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();

    assert!(!root.collection_exists("c"));
    root.collection("c", None, false).unwrap();
    assert!(root.collection_exists("c"));
    root.close().unwrap();
}

#[test]
fn test_collection_batch_size_override() {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), 100, OpenMode::ReadWrite).unwrap();

    let default = root.collection("a", None, false).unwrap();
    assert_eq!(default.batch_size(), 100);
    let custom = root.collection("b", Some(7), false).unwrap();
    assert_eq!(custom.batch_size(), 7);
    root.close().unwrap();
}
