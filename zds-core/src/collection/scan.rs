// collection/scan.rs
// Sequential cursors over the record log.
//
// A cursor snapshots the offset index when it is created and yields only
// the exact record each entry points at. Records that have been deleted or
// superseded by a later write are skipped, as are lines that fail to
// decode (stale tails, torn writes). Cursors never fail mid-iteration: an
// I/O error ends the traversal with a logged error.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use super::offset_index::OffsetIndex;
use crate::codec::{self, Document};
use crate::error::Result;
use crate::log_error;

pub(crate) struct RawCursor {
    reader: Option<BufReader<File>>,
    live: OffsetIndex,
    offset: u64,
    buf: Vec<u8>,
}

impl RawCursor {
    pub(crate) fn open(path: &Path, live: OffsetIndex) -> Result<RawCursor> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(RawCursor {
            reader,
            live,
            offset: 0,
            buf: Vec::new(),
        })
    }

    fn next_record(&mut self) -> Option<(String, Document)> {
        let RawCursor {
            reader,
            live,
            offset,
            buf,
        } = self;
        let reader = reader.as_mut()?;
        loop {
            buf.clear();
            let read = match reader.read_until(b'\n', buf) {
                Ok(0) => return None,
                Ok(read) => read as u64,
                Err(err) => {
                    log_error!("scan aborted by read failure: {}", err);
                    return None;
                }
            };
            // A final chunk without LF is a partial record; ignore it.
            if !buf.ends_with(b"\n") {
                return None;
            }
            let record_offset = *offset;
            *offset += read;

            let mut doc = match codec::decode(buf) {
                Ok(doc) => doc,
                Err(_) => continue,
            };
            let doc_id = match doc.remove("_id") {
                Some(Value::String(id)) => id,
                _ => continue,
            };
            // Only the record the index points at is live; earlier versions
            // of the same ID are dead.
            if live.get(&doc_id) != Some(&(record_offset, read)) {
                continue;
            }
            return Some((doc_id, doc));
        }
    }
}

/// Cursor yielding live documents, with optional field-equality predicate
/// and field projection.
pub struct ScanCursor {
    raw: RawCursor,
    projection: Option<Vec<String>>,
    predicate: Option<Document>,
}

impl ScanCursor {
    pub(crate) fn new(
        raw: RawCursor,
        projection: Option<Vec<String>>,
        predicate: Option<Document>,
    ) -> ScanCursor {
        ScanCursor {
            raw,
            projection,
            predicate,
        }
    }
}

impl Iterator for ScanCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            let (_, doc) = self.raw.next_record()?;

            if let Some(predicate) = &self.predicate {
                if !predicate.iter().all(|(k, v)| doc.get(k) == Some(v)) {
                    continue;
                }
            }

            let doc = match &self.projection {
                Some(fields) => {
                    let mut projected = Document::new();
                    for field in fields {
                        if let Some(value) = doc.get(field) {
                            projected.insert(field.clone(), value.clone());
                        }
                    }
                    projected
                }
                None => doc,
            };

            return Some(doc);
        }
    }
}

/// Cursor yielding `(doc_id, document)` pairs for callers that need the
/// identifier alongside each record.
pub struct IdScanCursor {
    raw: RawCursor,
}

impl IdScanCursor {
    pub(crate) fn new(raw: RawCursor) -> IdScanCursor {
        IdScanCursor { raw }
    }
}

impl Iterator for IdScanCursor {
    type Item = (String, Document);

    fn next(&mut self) -> Option<(String, Document)> {
        self.raw.next_record()
    }
}
