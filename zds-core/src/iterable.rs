// iterable.rs
// Streaming dataset: lazy transform pipeline with a reservoir-style
// shuffle buffer.
//
// Each call to iter() opens a fresh scan over the collection, so distinct
// traversals are independent. With a buffer of size B the stream is
// approximately shuffled: the buffer fills first, then each arriving
// document evicts a uniformly chosen buffered one, and the remainder is
// shuffled in place when the source runs dry. Every surviving document is
// yielded exactly once.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::codec::Document;
use crate::collection::{Collection, ScanCursor};
use crate::dataset::Transform;
use crate::error::Result;

/// Composable document predicate.
pub type Filter = dyn Fn(&Document) -> bool + Send + Sync;

/// Streaming dataset over a collection.
///
/// # Examples
///
/// ```ignore
/// use zds_core::IterableDataset;
///
/// let stream = IterableDataset::new(collection)
///     .filter(|d| d["split"] == "train")
///     .shuffle(1000, Some(42));
/// for doc in stream.iter()? {
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct IterableDataset {
    store: Arc<Collection>,
    buffer_size: usize,
    seed: Option<u64>,
    transform: Option<Arc<Transform>>,
    filter: Option<Arc<Filter>>,
}

impl IterableDataset {
    pub fn new(store: Arc<Collection>) -> IterableDataset {
        IterableDataset {
            store,
            buffer_size: 0,
            seed: None,
            transform: None,
            filter: None,
        }
    }

    /// Enable (or resize) the shuffle buffer. A `buffer_size` of zero
    /// restores source order.
    pub fn shuffle(&self, buffer_size: usize, seed: Option<u64>) -> IterableDataset {
        IterableDataset {
            store: Arc::clone(&self.store),
            buffer_size,
            seed,
            transform: self.transform.clone(),
            filter: self.filter.clone(),
        }
    }

    /// Compose a transform after any existing one.
    pub fn map<F>(&self, function: F) -> IterableDataset
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        let transform: Arc<Transform> = match &self.transform {
            Some(prior) => {
                let prior = Arc::clone(prior);
                Arc::new(move |doc| function(prior(doc)))
            }
            None => Arc::new(function),
        };
        IterableDataset {
            store: Arc::clone(&self.store),
            buffer_size: self.buffer_size,
            seed: self.seed,
            transform: Some(transform),
            filter: self.filter.clone(),
        }
    }

    /// AND-compose a predicate with any existing one.
    pub fn filter<F>(&self, predicate: F) -> IterableDataset
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        let filter: Arc<Filter> = match &self.filter {
            Some(prior) => {
                let prior = Arc::clone(prior);
                Arc::new(move |doc| prior(doc) && predicate(doc))
            }
            None => Arc::new(predicate),
        };
        IterableDataset {
            store: Arc::clone(&self.store),
            buffer_size: self.buffer_size,
            seed: self.seed,
            transform: self.transform.clone(),
            filter: Some(filter),
        }
    }

    /// Start a traversal.
    pub fn iter(&self) -> Result<StreamIter> {
        let source = self.store.scan()?;
        let rng = ChaCha8Rng::seed_from_u64(self.seed.unwrap_or_else(rand::random));
        Ok(StreamIter {
            source,
            transform: self.transform.clone(),
            filter: self.filter.clone(),
            buffer_size: self.buffer_size,
            rng,
            buffer: Vec::new(),
            filling: self.buffer_size > 0,
            draining: false,
            drain_pos: 0,
        })
    }

    /// Up to `n` documents from a fresh traversal.
    pub fn take(&self, n: usize) -> Result<std::iter::Take<StreamIter>> {
        Ok(self.iter()?.take(n))
    }

    /// A fresh traversal with the first `n` documents dropped.
    pub fn skip(&self, n: usize) -> Result<std::iter::Skip<StreamIter>> {
        Ok(self.iter()?.skip(n))
    }

    /// Chunks of `batch_size` documents (last chunk may be shorter).
    pub fn batch(&self, batch_size: usize) -> Result<StreamBatches> {
        Ok(StreamBatches {
            inner: self.iter()?,
            batch_size: batch_size.max(1),
        })
    }
}

/// One traversal of a streaming dataset.
pub struct StreamIter {
    source: ScanCursor,
    transform: Option<Arc<Transform>>,
    filter: Option<Arc<Filter>>,
    buffer_size: usize,
    rng: ChaCha8Rng,
    buffer: Vec<Document>,
    filling: bool,
    draining: bool,
    drain_pos: usize,
}

impl StreamIter {
    /// Next document from the scan, filtered then transformed.
    fn next_source(&mut self) -> Option<Document> {
        loop {
            let doc = self.source.next()?;
            if let Some(filter) = &self.filter {
                if !filter(&doc) {
                    continue;
                }
            }
            return Some(match &self.transform {
                Some(transform) => transform(doc),
                None => doc,
            });
        }
    }
}

impl Iterator for StreamIter {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.buffer_size == 0 {
            return self.next_source();
        }

        if self.filling {
            while self.buffer.len() < self.buffer_size {
                match self.next_source() {
                    Some(doc) => self.buffer.push(doc),
                    None => break,
                }
            }
            self.filling = false;
        }

        if !self.draining {
            if let Some(doc) = self.next_source() {
                // Buffer is full here: the fill loop only stops short when
                // the source is already exhausted.
                let slot = self.rng.gen_range(0..self.buffer.len());
                return Some(std::mem::replace(&mut self.buffer[slot], doc));
            }
            self.draining = true;
            self.buffer.shuffle(&mut self.rng);
        }

        if self.drain_pos < self.buffer.len() {
            let doc = std::mem::take(&mut self.buffer[self.drain_pos]);
            self.drain_pos += 1;
            Some(doc)
        } else {
            None
        }
    }
}

/// Batching adaptor over a traversal.
pub struct StreamBatches {
    inner: StreamIter,
    batch_size: usize,
}

impl Iterator for StreamBatches {
    type Item = Vec<Document>;

    fn next(&mut self) -> Option<Vec<Document>> {
        let mut chunk = Vec::with_capacity(self.batch_size);
        while chunk.len() < self.batch_size {
            match self.inner.next() {
                Some(doc) => chunk.push(doc),
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}
