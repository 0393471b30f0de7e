// layout.rs - On-disk tree layout and document-ID validation
//
// A ZDS root looks like:
//
//   <root>/
//     collections/
//       <name>/
//         docs/          legacy per-document files, migration source only
//         meta/
//           data.jsonl   append-only record log
//           index.bin    offset index (text format; name is historical)
//           manifest.json
//           order.ids    reserved for external collaborators
//           journal.log  reserved
//     metadata/          root-level, reserved

use std::path::{Path, PathBuf};

use crate::error::{Result, ZdsError};

pub const COLLECTIONS_DIR: &str = "collections";
pub const METADATA_DIR: &str = "metadata";
pub const DOCS_DIR: &str = "docs";
pub const META_DIR: &str = "meta";
pub const DATA_FILE: &str = "data.jsonl";
pub const INDEX_FILE: &str = "index.bin";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const ORDER_FILE: &str = "order.ids";
pub const JOURNAL_FILE: &str = "journal.log";
pub const SCHEMA_REGISTRY_FILE: &str = "schemas.jsonl";
pub const DOC_INDEX_FILE: &str = "doc_index.jsonl";
pub const LOCK_FILE: &str = ".zds.lock";

pub const VERSION: &str = "0.1.0";

pub fn collections_dir(root: &Path) -> PathBuf {
    root.join(COLLECTIONS_DIR)
}

pub fn metadata_dir(root: &Path) -> PathBuf {
    root.join(METADATA_DIR)
}

pub fn collection_dir(root: &Path, collection: &str) -> PathBuf {
    collections_dir(root).join(collection)
}

pub fn docs_dir(root: &Path, collection: &str) -> PathBuf {
    collection_dir(root, collection).join(DOCS_DIR)
}

pub fn meta_dir(root: &Path, collection: &str) -> PathBuf {
    collection_dir(root, collection).join(META_DIR)
}

pub fn doc_file(root: &Path, collection: &str, doc_id: &str) -> PathBuf {
    docs_dir(root, collection).join(format!("{}.json", doc_id))
}

pub fn data_file(root: &Path, collection: &str) -> PathBuf {
    meta_dir(root, collection).join(DATA_FILE)
}

pub fn index_file(root: &Path, collection: &str) -> PathBuf {
    meta_dir(root, collection).join(INDEX_FILE)
}

pub fn manifest_file(root: &Path, collection: &str) -> PathBuf {
    meta_dir(root, collection).join(MANIFEST_FILE)
}

pub fn order_file(root: &Path, collection: &str) -> PathBuf {
    meta_dir(root, collection).join(ORDER_FILE)
}

pub fn journal_file(root: &Path, collection: &str) -> PathBuf {
    meta_dir(root, collection).join(JOURNAL_FILE)
}

pub fn lock_file(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

/// Validate a document ID.
///
/// IDs are caller-supplied strings that end up in log records and, for
/// legacy collections, in file names. Allowed characters are
/// `[A-Za-z0-9._-]`; IDs must be non-empty, must not start with `.` and
/// must not contain `..`.
pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(ZdsError::InvalidId("empty document id".to_string()));
    }

    if let Some(bad) = doc_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ZdsError::InvalidId(format!(
            "invalid character {:?} in document id: {}",
            bad, doc_id
        )));
    }

    // Path traversal guard
    if doc_id.starts_with('.') || doc_id.contains("..") {
        return Err(ZdsError::InvalidId(format!(
            "potentially unsafe document id: {}",
            doc_id
        )));
    }

    Ok(())
}
