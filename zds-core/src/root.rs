// root.rs
// Root handle: a directory of collections plus the process-level write lock.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;

use crate::collection::Collection;
use crate::error::{Result, ZdsError};
use crate::layout;
use crate::log_debug;

/// Default batch size handed to collections opened through a root.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Open mode for a root and the collections opened through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    /// Parse `"r"` / `"rw"`.
    pub fn parse(s: &str) -> Option<OpenMode> {
        match s {
            "r" => Some(OpenMode::ReadOnly),
            "rw" => Some(OpenMode::ReadWrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "r",
            OpenMode::ReadWrite => "rw",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, OpenMode::ReadWrite)
    }
}

/// Handle to a ZDS root directory.
///
/// A read-write root creates the directory skeleton and holds an advisory
/// exclusive lock on a sentinel file, so only one writer touches the root
/// at a time. Read-only roots neither take nor respect the lock.
///
/// # Examples
///
/// ```ignore
/// use zds_core::{OpenMode, ZdsRoot, DEFAULT_BATCH_SIZE};
///
/// let root = ZdsRoot::open("./data", DEFAULT_BATCH_SIZE, OpenMode::ReadWrite)?;
/// let train = root.collection("train", None, false)?;
/// train.put("doc_1", doc)?;
/// root.close()?;
/// ```
#[derive(Debug)]
pub struct ZdsRoot {
    root: PathBuf,
    batch_size: usize,
    mode: OpenMode,
    lock: Mutex<Option<File>>,
}

impl ZdsRoot {
    /// Open or create a root directory.
    pub fn open(root: impl AsRef<Path>, batch_size: usize, mode: OpenMode) -> Result<ZdsRoot> {
        let root = root.as_ref().to_path_buf();

        let lock = match mode {
            OpenMode::ReadWrite => {
                fs::create_dir_all(layout::collections_dir(&root))?;
                fs::create_dir_all(layout::metadata_dir(&root))?;

                let file = OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(layout::lock_file(&root))?;
                file.try_lock_exclusive().map_err(|err| {
                    if err.kind() == fs2::lock_contended_error().kind() {
                        ZdsError::Locked(format!(
                            "another writer holds the lock for {}",
                            root.display()
                        ))
                    } else {
                        ZdsError::Io(err)
                    }
                })?;
                log_debug!("acquired write lock for {}", root.display());
                Some(file)
            }
            OpenMode::ReadOnly => {
                if !root.is_dir() {
                    return Err(ZdsError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("store not found: {}", root.display()),
                    )));
                }
                None
            }
        };

        Ok(ZdsRoot {
            root,
            batch_size: batch_size.max(1),
            mode,
            lock: Mutex::new(lock),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    /// Open (or, in read-write mode, create) a collection in this root.
    pub fn collection(
        &self,
        name: &str,
        batch_size: Option<usize>,
        strict: bool,
    ) -> Result<Arc<Collection>> {
        let batch_size = batch_size.unwrap_or(self.batch_size);
        let collection = Collection::open(&self.root, name, batch_size, strict, self.mode)?;
        Ok(Arc::new(collection))
    }

    /// Sorted names of the collections in this root. Hidden directories and
    /// plain files under `collections/` are not collections.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let dir = layout::collections_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        layout::collection_dir(&self.root, name).is_dir()
    }

    /// Release the write lock. Idempotent; read-only roots have nothing to
    /// release.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock.lock();
        if let Some(file) = guard.take() {
            file.unlock()?;
            log_debug!("released write lock for {}", self.root.display());
        }
        Ok(())
    }
}

impl Drop for ZdsRoot {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
