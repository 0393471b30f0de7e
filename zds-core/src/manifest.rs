// manifest.rs - Per-collection manifest.json

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::layout::VERSION;

/// Per-collection manifest.
///
/// Unknown fields written by other tools are kept in `extra` and survive a
/// load/save round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub collection: String,
    pub strict: bool,
    pub created_at: String,
    pub doc_count: u64,
    pub schema_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Manifest {
    pub fn new(collection: &str, strict: bool) -> Self {
        Manifest {
            version: VERSION.to_string(),
            collection: collection.to_string(),
            strict,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            doc_count: 0,
            schema_count: 0,
            schema_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Load a manifest from disk. Returns `None` when the file is absent.
    pub fn load(path: &Path) -> Result<Option<Manifest>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        Ok(Some(manifest))
    }

    /// Write the manifest (pretty-printed, flushed).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}
