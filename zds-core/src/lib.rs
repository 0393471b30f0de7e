// zds-core/src/lib.rs
// Pure Rust core for ZDS - embedded document store with dataset access layers

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::should_implement_trait)]
// Tests may have helper functions not used in all test cases
#![cfg_attr(test, allow(dead_code))]

pub mod codec;
pub mod collection;
pub mod dataset;
pub mod error;
pub mod iterable;
pub mod layout;
pub mod logging;
pub mod manifest;
pub mod root;
pub mod schema;

// Public exports
pub use codec::Document;
pub use collection::{Collection, CompactionStats, IdScanCursor, ScanCursor};
pub use dataset::{Batches, Dataset, DatasetIter};
pub use error::{Result, ZdsError};
pub use iterable::{IterableDataset, StreamBatches, StreamIter};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use manifest::Manifest;
pub use root::{OpenMode, ZdsRoot, DEFAULT_BATCH_SIZE};
