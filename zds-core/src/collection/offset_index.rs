// collection/offset_index.rs
// Persistence of the byte-offset index, rebuild from the record log, and
// one-shot migration from legacy per-document files.
//
// index.bin is UTF-8 text, one entry per line: `<id>\t<offset>\t<length>`.
// The name is historical; the format has always been text.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::codec;
use crate::error::Result;
use crate::{log_info, log_warn};

/// In-memory offset index: document ID -> (byte offset, byte length).
pub type OffsetIndex = HashMap<String, (u64, u64)>;

/// Load index.bin. Blank lines are ignored; malformed lines are skipped
/// with a warning rather than failing the open.
pub fn load(path: &Path) -> Result<OffsetIndex> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut index = OffsetIndex::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        if let (Some(id), Some(offset), Some(length), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        {
            if let (Ok(offset), Ok(length)) = (offset.parse::<u64>(), length.parse::<u64>()) {
                index.insert(id.to_string(), (offset, length));
                continue;
            }
        }
        log_warn!("skipping malformed index line: {}", line);
    }

    Ok(index)
}

/// Rewrite index.bin from the in-memory map.
pub fn save(path: &Path, index: &OffsetIndex) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for (doc_id, (offset, length)) in index {
        writeln!(writer, "{}\t{}\t{}", doc_id, offset, length)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rebuild the index with a single linear pass over the record log.
///
/// A final chunk without a newline terminator is a partial record from an
/// interrupted drain and is treated as absent. Complete lines that fail to
/// decode are skipped so one bad record cannot take the collection down.
pub fn rebuild_from_log(path: &Path) -> Result<OffsetIndex> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut index = OffsetIndex::new();
    let mut offset: u64 = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        if !buf.ends_with(b"\n") {
            log_warn!(
                "ignoring partial record at offset {} in {}",
                offset,
                path.display()
            );
            break;
        }
        match codec::decode(&buf) {
            Ok(doc) => {
                if let Some(Value::String(id)) = doc.get("_id") {
                    index.insert(id.clone(), (offset, read as u64));
                }
            }
            Err(_) => {
                log_warn!("skipping undecodable record at offset {}", offset);
            }
        }
        offset += read as u64;
    }

    Ok(index)
}

/// Truncate a partial final record left by an interrupted drain.
///
/// Returns the valid log length. A log that ends with LF is left untouched.
pub fn repair_tail(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    // Walk backwards in chunks to the last record terminator.
    const CHUNK: u64 = 8192;
    let mut end = len;
    let mut keep: u64 = 0;
    'search: while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let mut buf = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf)?;
        for (i, byte) in buf.iter().enumerate().rev() {
            if *byte == b'\n' {
                keep = start + i as u64 + 1;
                break 'search;
            }
        }
        end = start;
    }

    log_warn!(
        "discarding {} bytes of partial tail in {}",
        len - keep,
        path.display()
    );
    file.set_len(keep)?;
    file.sync_all()?;
    Ok(keep)
}

/// Migrate legacy `docs/<id>.json` files into the record log.
///
/// Source files are read once and left in place; the returned index covers
/// the migrated records. Files that fail to decode are skipped.
pub fn migrate_legacy(docs_dir: &Path, data_path: &Path) -> Result<OffsetIndex> {
    let mut files: Vec<PathBuf> = fs::read_dir(docs_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut index = OffsetIndex::new();
    if files.is_empty() {
        return Ok(index);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(data_path)?;
    let mut offset = file.seek(SeekFrom::End(0))?;
    let mut migrated = 0usize;

    for path in &files {
        let doc_id = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_warn!("failed to read legacy file {}: {}", path.display(), err);
                continue;
            }
        };
        let mut doc = match codec::decode(&bytes) {
            Ok(doc) => doc,
            Err(_) => {
                log_warn!("skipping undecodable legacy file {}", path.display());
                continue;
            }
        };
        doc.insert("_id".to_string(), Value::String(doc_id.clone()));

        let line = codec::encode_line(&doc)?;
        file.write_all(&line)?;
        index.insert(doc_id, (offset, line.len() as u64));
        offset += line.len() as u64;
        migrated += 1;
    }

    file.sync_all()?;
    log_info!(
        "migrated {} legacy documents into {}",
        migrated,
        data_path.display()
    );
    Ok(index)
}
