// collection/mod.rs
// Collection engine: append-only record log + offset index + pending batch.
//
// One collection is a self-contained log/index/manifest triple under
// collections/<name>/meta. Writes queue in an in-memory batch and drain to
// the log in order; reads resolve through the offset index; deletes only
// drop the index entry and compaction rewrites the log without dead
// records. A handle is single-writer; the internal mutex makes it safe to
// share with dataset views, not to write from two handles at once.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::codec::{self, Document};
use crate::error::{Result, ZdsError};
use crate::layout;
use crate::manifest::Manifest;
use crate::root::OpenMode;
use crate::schema;
use crate::{log_debug, log_info};

mod offset_index;
mod scan;

use self::offset_index::OffsetIndex;
use self::scan::RawCursor;
pub use self::scan::{IdScanCursor, ScanCursor};

/// Statistics returned by [`Collection::compact`].
#[derive(Debug, Clone, Default)]
pub struct CompactionStats {
    pub size_before: u64,
    pub size_after: u64,
    pub records_scanned: u64,
    pub records_kept: u64,
    pub dead_records_dropped: u64,
}

impl CompactionStats {
    pub fn space_saved(&self) -> u64 {
        self.size_before.saturating_sub(self.size_after)
    }
}

#[derive(Debug)]
struct CollectionState {
    index: OffsetIndex,
    pending: Vec<(String, Document)>,
    dirty: bool,
    strict: bool,
    schema_id: Option<String>,
    manifest: Manifest,
    closed: bool,
}

/// Handle to one collection.
///
/// All methods take `&self`; mutable state sits behind an internal lock so
/// the handle can be shared (via `Arc`) with dataset views.
///
/// # Examples
///
/// ```ignore
/// use zds_core::{Collection, OpenMode};
///
/// let coll = Collection::open("./data", "train", 1000, false, OpenMode::ReadWrite)?;
/// coll.put("doc_1", doc)?;
/// coll.flush()?;
/// ```
#[derive(Debug)]
pub struct Collection {
    root: PathBuf,
    name: String,
    batch_size: usize,
    mode: OpenMode,
    data_path: PathBuf,
    index_path: PathBuf,
    manifest_path: PathBuf,
    state: Mutex<CollectionState>,
}

impl Collection {
    /// Open or create a collection under `root`.
    ///
    /// The offset index is populated from `index.bin` when present, rebuilt
    /// from the record log otherwise, or produced by migrating legacy
    /// `docs/*.json` files when only those exist. A manifest present on disk
    /// wins over the caller's `strict` flag.
    pub fn open(
        root: impl AsRef<Path>,
        name: &str,
        batch_size: usize,
        strict: bool,
        mode: OpenMode,
    ) -> Result<Collection> {
        let root = root.as_ref().to_path_buf();
        let docs_path = layout::docs_dir(&root, name);
        let meta_path = layout::meta_dir(&root, name);

        match mode {
            OpenMode::ReadWrite => {
                fs::create_dir_all(&docs_path)?;
                fs::create_dir_all(&meta_path)?;
            }
            OpenMode::ReadOnly => {
                if !layout::collection_dir(&root, name).is_dir() {
                    return Err(ZdsError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("collection not found: {}", name),
                    )));
                }
            }
        }

        let manifest_path = layout::manifest_file(&root, name);
        let (manifest, strict, schema_id) = match Manifest::load(&manifest_path)? {
            Some(manifest) => {
                let strict = manifest.strict;
                let schema_id = manifest.schema_id.clone();
                (manifest, strict, schema_id)
            }
            None => {
                let manifest = Manifest::new(name, strict);
                if mode == OpenMode::ReadWrite {
                    manifest.save(&manifest_path)?;
                }
                (manifest, strict, None)
            }
        };

        let data_path = layout::data_file(&root, name);
        let index_path = layout::index_file(&root, name);

        if mode == OpenMode::ReadWrite {
            offset_index::repair_tail(&data_path)?;
        }

        let index = if index_path.exists() {
            let index = offset_index::load(&index_path)?;
            log_debug!("collection '{}': loaded {} index entries", name, index.len());
            index
        } else if data_path.exists() {
            let index = offset_index::rebuild_from_log(&data_path)?;
            log_info!(
                "collection '{}': rebuilt index with {} entries from log",
                name,
                index.len()
            );
            if mode == OpenMode::ReadWrite {
                offset_index::save(&index_path, &index)?;
            }
            index
        } else if mode == OpenMode::ReadWrite && docs_path.is_dir() {
            let index = offset_index::migrate_legacy(&docs_path, &data_path)?;
            if !index.is_empty() {
                offset_index::save(&index_path, &index)?;
            }
            index
        } else {
            OffsetIndex::new()
        };

        Ok(Collection {
            root,
            name: name.to_string(),
            batch_size: batch_size.max(1),
            mode,
            data_path,
            index_path,
            manifest_path,
            state: Mutex::new(CollectionState {
                index,
                pending: Vec::new(),
                dirty: false,
                strict,
                schema_id,
                manifest,
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn strict(&self) -> bool {
        self.state.lock().strict
    }

    /// Fingerprint pinned by strict mode, once adopted.
    pub fn schema_id(&self) -> Option<String> {
        self.state.lock().schema_id.clone()
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(ZdsError::ReadOnly(format!(
                "{} on read-only collection '{}'",
                operation, self.name
            )));
        }
        Ok(())
    }

    // ========== WRITE PATH ==========

    /// Queue a document write. The batch drains to the log once it reaches
    /// `batch_size` entries.
    pub fn put(&self, doc_id: &str, doc: Document) -> Result<()> {
        self.ensure_writable("put")?;
        layout::validate_doc_id(doc_id)?;

        let mut state = self.state.lock();

        if state.strict {
            let schema_id = schema::compute_schema_id(&doc);
            match state.schema_id.clone() {
                // First strict write adopts its fingerprint
                None => {
                    state.schema_id = Some(schema_id.clone());
                    state.manifest.schema_id = Some(schema_id);
                    state.manifest.schema_count = 1;
                    state.dirty = true;
                }
                Some(expected) => {
                    if expected != schema_id {
                        return Err(ZdsError::SchemaMismatch {
                            expected,
                            actual: schema_id,
                        });
                    }
                }
            }
        }

        state.pending.push((doc_id.to_string(), doc));
        if state.pending.len() >= self.batch_size {
            self.drain_locked(&mut state)?;
        }
        Ok(())
    }

    /// Append the pending batch to the record log and update the index.
    /// The lock is held for the whole drain.
    fn drain_locked(&self, state: &mut CollectionState) -> Result<()> {
        if state.pending.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.data_path)?;
        let mut offset = file.seek(SeekFrom::End(0))?;

        let CollectionState { index, pending, .. } = &mut *state;
        for (doc_id, doc) in pending.iter() {
            let mut record = doc.clone();
            // The reserved key always reflects the indexed ID
            record.insert("_id".to_string(), Value::String(doc_id.clone()));
            let line = codec::encode_line(&record)?;
            file.write_all(&line)?;
            index.insert(doc_id.clone(), (offset, line.len() as u64));
            offset += line.len() as u64;
        }
        file.sync_all()?;

        log_debug!(
            "collection '{}': drained {} records",
            self.name,
            state.pending.len()
        );
        state.pending.clear();
        state.dirty = true;
        Ok(())
    }

    /// Remove a document from the index. The log is not touched; the dead
    /// record is dropped by the next compaction.
    pub fn delete(&self, doc_id: &str) -> Result<()> {
        self.ensure_writable("delete")?;
        let mut state = self.state.lock();
        if state.index.remove(doc_id).is_none() {
            return Err(ZdsError::NotFound(doc_id.to_string()));
        }
        state.dirty = true;
        Ok(())
    }

    // ========== READ PATH ==========

    /// Fetch a document by ID. Pending writes win over the log
    /// (last writer wins within the batch).
    pub fn get(&self, doc_id: &str) -> Result<Document> {
        let state = self.state.lock();

        if let Some((_, doc)) = state.pending.iter().rev().find(|(id, _)| id == doc_id) {
            return Ok(doc.clone());
        }

        let (offset, length) = *state
            .index
            .get(doc_id)
            .ok_or_else(|| ZdsError::NotFound(doc_id.to_string()))?;

        let mut file = File::open(&self.data_path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;

        let mut doc = codec::decode(&buf).map_err(|_| {
            ZdsError::Corruption(format!(
                "record at offset {} for '{}' does not decode",
                offset, doc_id
            ))
        })?;
        match doc.remove("_id") {
            Some(Value::String(id)) if id == doc_id => {}
            _ => {
                return Err(ZdsError::Corruption(format!(
                    "record at offset {} is not a record for '{}'",
                    offset, doc_id
                )))
            }
        }
        Ok(doc)
    }

    pub fn exists(&self, doc_id: &str) -> bool {
        let state = self.state.lock();
        state.index.contains_key(doc_id) || state.pending.iter().any(|(id, _)| id == doc_id)
    }

    /// All live document IDs. Drains the pending batch first; order is
    /// stable within a session but unspecified across reopens.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        self.drain_locked(&mut state)?;
        Ok(state.index.keys().cloned().collect())
    }

    pub fn count(&self) -> usize {
        let state = self.state.lock();
        state.index.len() + state.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Sequential scan over all live documents.
    pub fn scan(&self) -> Result<ScanCursor> {
        self.scan_with(None, None)
    }

    /// Sequential scan with an optional field projection and an optional
    /// equality predicate (all named fields must equal the given values).
    pub fn scan_with(
        &self,
        projection: Option<Vec<String>>,
        predicate: Option<Document>,
    ) -> Result<ScanCursor> {
        let raw = self.open_cursor()?;
        Ok(ScanCursor::new(raw, projection, predicate))
    }

    /// Sequential scan yielding `(doc_id, document)` pairs.
    pub fn scan_with_ids(&self) -> Result<IdScanCursor> {
        let raw = self.open_cursor()?;
        Ok(IdScanCursor::new(raw))
    }

    fn open_cursor(&self) -> Result<RawCursor> {
        let mut state = self.state.lock();
        self.drain_locked(&mut state)?;
        let live = state.index.clone();
        drop(state);
        RawCursor::open(&self.data_path, live)
    }

    // ========== MAINTENANCE ==========

    /// Rewrite the record log keeping only currently-indexed records.
    /// Atomic: the live index and the log are only replaced after the
    /// rewritten file has been synced and renamed into place.
    pub fn compact(&self) -> Result<CompactionStats> {
        self.ensure_writable("compact")?;
        let mut state = self.state.lock();
        self.drain_locked(&mut state)?;

        let mut stats = CompactionStats::default();
        if !self.data_path.exists() {
            return Ok(stats);
        }
        stats.size_before = fs::metadata(&self.data_path)?.len();

        let tmp_path = self.data_path.with_extension("tmp");
        let mut reader = BufReader::new(File::open(&self.data_path)?);
        let mut writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?,
        );

        let mut new_index = OffsetIndex::new();
        let mut src_offset: u64 = 0;
        let mut dst_offset: u64 = 0;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 || !buf.ends_with(b"\n") {
                break;
            }
            stats.records_scanned += 1;

            if let Ok(doc) = codec::decode(&buf) {
                if let Some(Value::String(id)) = doc.get("_id") {
                    // Keep only the exact record the index points at, so a
                    // superseded version of a live ID is dropped too.
                    if state.index.get(id) == Some(&(src_offset, read as u64)) {
                        writer.write_all(&buf)?;
                        new_index.insert(id.clone(), (dst_offset, read as u64));
                        dst_offset += read as u64;
                        stats.records_kept += 1;
                    }
                }
            }
            src_offset += read as u64;
        }
        stats.dead_records_dropped = stats.records_scanned - stats.records_kept;

        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        drop(reader);

        fs::rename(&tmp_path, &self.data_path)?;
        state.index = new_index;
        self.persist_index_locked(&mut state)?;

        stats.size_after = fs::metadata(&self.data_path)?.len();
        log_info!(
            "collection '{}': compacted {} -> {} bytes, dropped {} dead records",
            self.name,
            stats.size_before,
            stats.size_after,
            stats.dead_records_dropped
        );
        Ok(stats)
    }

    fn persist_index_locked(&self, state: &mut CollectionState) -> Result<()> {
        offset_index::save(&self.index_path, &state.index)?;
        state.manifest.doc_count = state.index.len() as u64;
        state.manifest.strict = state.strict;
        state.manifest.schema_id = state.schema_id.clone();
        state.manifest.schema_count = if state.schema_id.is_some() { 1 } else { 0 };
        state.manifest.save(&self.manifest_path)?;
        state.dirty = false;
        Ok(())
    }

    /// Drain pending writes and persist the offset index if it changed.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.drain_locked(&mut state)?;
        if state.dirty {
            self.persist_index_locked(&mut state)?;
        }
        Ok(())
    }

    /// Flush and mark the handle closed. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.drain_locked(&mut state)?;
        if state.dirty {
            self.persist_index_locked(&mut state)?;
        }
        state.closed = true;
        Ok(())
    }

    /// Share this handle with dataset views.
    pub fn into_shared(self) -> Arc<Collection> {
        Arc::new(self)
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
