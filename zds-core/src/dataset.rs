// dataset.rs
// Map-style dataset: indexed random access over a collection.
//
// A dataset freezes the collection's ID order at construction time (the
// anchor order). Every operation returns a new view sharing the same
// collection handle: subsets are an index vector into the anchor order,
// transforms compose into a single function applied after each read.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::codec::Document;
use crate::collection::Collection;
use crate::error::{Result, ZdsError};

/// Composable document transform.
pub type Transform = dyn Fn(Document) -> Document + Send + Sync;

/// Map-style dataset with random access by position.
///
/// # Examples
///
/// ```ignore
/// use zds_core::Dataset;
///
/// let dataset = Dataset::new(collection)?;
/// let first = dataset.get(0)?;
/// let sample = dataset.shuffle(Some(42)).take(100);
/// ```
#[derive(Clone)]
pub struct Dataset {
    store: Arc<Collection>,
    doc_ids: Arc<Vec<String>>,
    indices: Option<Arc<Vec<usize>>>,
    transform: Option<Arc<Transform>>,
}

impl Dataset {
    /// Snapshot the collection's current IDs and build an identity view.
    pub fn new(store: Arc<Collection>) -> Result<Dataset> {
        let doc_ids = store.list_ids()?;
        Ok(Dataset {
            store,
            doc_ids: Arc::new(doc_ids),
            indices: None,
            transform: None,
        })
    }

    pub fn len(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.doc_ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the document at `index`. Negative indices count from the end.
    pub fn get(&self, index: isize) -> Result<Document> {
        let len = self.len();
        let normalized = if index < 0 { index + len as isize } else { index };
        if normalized < 0 || normalized as usize >= len {
            return Err(ZdsError::IndexOutOfBounds { index, len });
        }

        let position = match &self.indices {
            Some(indices) => indices[normalized as usize],
            None => normalized as usize,
        };
        let doc = self.store.get(&self.doc_ids[position])?;
        Ok(match &self.transform {
            Some(transform) => transform(doc),
            None => doc,
        })
    }

    /// Documents in `[start, stop)`, with negative bounds counted from the
    /// end and the range clamped to the dataset.
    pub fn slice(&self, start: isize, stop: isize) -> Result<Vec<Document>> {
        let len = self.len() as isize;
        let clamp = |i: isize| {
            let i = if i < 0 { i + len } else { i };
            i.clamp(0, len)
        };
        let (start, stop) = (clamp(start), clamp(stop));

        let mut docs = Vec::new();
        let mut i = start;
        while i < stop {
            docs.push(self.get(i)?);
            i += 1;
        }
        Ok(docs)
    }

    /// Restrict to the given positions. Positions compose through any
    /// existing index vector, so chained selects stay flat.
    pub fn select(&self, positions: &[usize]) -> Result<Dataset> {
        let len = self.len();
        let composed = positions
            .iter()
            .map(|&position| {
                if position >= len {
                    return Err(ZdsError::IndexOutOfBounds {
                        index: position as isize,
                        len,
                    });
                }
                Ok(self.resolve(position))
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(self.with_indices(composed))
    }

    fn resolve(&self, position: usize) -> usize {
        match &self.indices {
            Some(indices) => indices[position],
            None => position,
        }
    }

    fn with_indices(&self, indices: Vec<usize>) -> Dataset {
        Dataset {
            store: Arc::clone(&self.store),
            doc_ids: Arc::clone(&self.doc_ids),
            indices: Some(Arc::new(indices)),
            transform: self.transform.clone(),
        }
    }

    /// Deterministic permutation of the current order. Equal seeds over
    /// equal orders permute identically; `None` draws a fresh seed.
    pub fn shuffle(&self, seed: Option<u64>) -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random));
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut rng);
        let composed = order.into_iter().map(|p| self.resolve(p)).collect();
        self.with_indices(composed)
    }

    /// Compose a transform after any existing one.
    pub fn map<F>(&self, function: F) -> Dataset
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
        Dataset {
            store: Arc::clone(&self.store),
            doc_ids: Arc::clone(&self.doc_ids),
            indices: self.indices.clone(),
            transform: Some(transform),
        }
    }

    /// Keep positions whose document satisfies the predicate. Reads every
    /// document once.
    pub fn filter<F>(&self, predicate: F) -> Result<Dataset>
    where
        F: Fn(&Document) -> bool,
    {
        let mut keep = Vec::new();
        for i in 0..self.len() {
            if predicate(&self.get(i as isize)?) {
                keep.push(i);
            }
        }
        self.select(&keep)
    }

    pub fn take(&self, n: usize) -> Dataset {
        let n = n.min(self.len());
        let composed = (0..n).map(|p| self.resolve(p)).collect();
        self.with_indices(composed)
    }

    pub fn skip(&self, n: usize) -> Dataset {
        let n = n.min(self.len());
        let composed = (n..self.len()).map(|p| self.resolve(p)).collect();
        self.with_indices(composed)
    }

    /// Iterate in sequential chunks of `batch_size` (last chunk may be
    /// shorter).
    pub fn batch(&self, batch_size: usize) -> Batches {
        Batches {
            dataset: self.clone(),
            batch_size: batch_size.max(1),
            cursor: 0,
        }
    }

    /// Field-name to type-tag mapping inferred from the first document, or
    /// `None` when the dataset is empty.
    pub fn features(&self) -> Result<Option<HashMap<String, String>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let doc = self.get(0)?;
        let mut features = HashMap::new();
        for (name, value) in &doc {
            let tag = match value {
                Value::String(_) => "string",
                Value::Bool(_) => "bool",
                Value::Number(n) if n.is_i64() || n.is_u64() => "int64",
                Value::Number(_) => "float64",
                Value::Array(_) => "list",
                Value::Object(_) => "dict",
                Value::Null => "null",
            };
            features.insert(name.clone(), tag.to_string());
        }
        Ok(Some(features))
    }

    pub fn iter(&self) -> DatasetIter {
        DatasetIter {
            dataset: self.clone(),
            cursor: 0,
        }
    }
}

/// Iterator over a dataset's documents in dataset order.
pub struct DatasetIter {
    dataset: Dataset,
    cursor: usize,
}

impl Iterator for DatasetIter {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Result<Document>> {
        if self.cursor >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.cursor as isize);
        self.cursor += 1;
        Some(item)
    }
}

/// Iterator over sequential chunks of a dataset.
pub struct Batches {
    dataset: Dataset,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches {
    type Item = Result<Vec<Document>>;

    fn next(&mut self) -> Option<Result<Vec<Document>>> {
        let len = self.dataset.len();
        if self.cursor >= len {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(len);
        let mut chunk = Vec::with_capacity(end - self.cursor);
        for i in self.cursor..end {
            match self.dataset.get(i as isize) {
                Ok(doc) => chunk.push(doc),
                Err(err) => {
                    self.cursor = len;
                    return Some(Err(err));
                }
            }
        }
        self.cursor = end;
        Some(Ok(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::OpenMode;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn fixture(n: usize) -> (TempDir, Arc<Collection>) {
        let tmp = TempDir::new().unwrap();
        let coll =
            Collection::open(tmp.path(), "test", 1000, false, OpenMode::ReadWrite).unwrap();
        for i in 0..n {
            coll.put(&format!("doc_{:03}", i), doc(json!({"i": i})))
                .unwrap();
        }
        coll.flush().unwrap();
        (tmp, Arc::new(coll))
    }

    #[test]
    fn test_len_and_get() {
        let (_tmp, coll) = fixture(5);
        let dataset = Dataset::new(coll).unwrap();

        assert_eq!(dataset.len(), 5);
        let doc = dataset.get(0).unwrap();
        assert!(doc.contains_key("i"));
    }

    #[test]
    fn test_negative_index_and_bounds() {
        let (_tmp, coll) = fixture(3);
        let dataset = Dataset::new(coll).unwrap();

        assert_eq!(dataset.get(-1).unwrap(), dataset.get(2).unwrap());
        assert!(matches!(
            dataset.get(3),
            Err(ZdsError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(matches!(
            dataset.get(-4),
            Err(ZdsError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_select_composes() {
        let (_tmp, coll) = fixture(6);
        let dataset = Dataset::new(coll).unwrap();

        let a = dataset.select(&[0, 2, 4]).unwrap().select(&[1, 2]).unwrap();
        let b = dataset.select(&[2, 4]).unwrap();
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert_eq!(a.get(i as isize).unwrap(), b.get(i as isize).unwrap());
        }
    }

    #[test]
    fn test_select_out_of_bounds() {
        let (_tmp, coll) = fixture(2);
        let dataset = Dataset::new(coll).unwrap();
        assert!(dataset.select(&[0, 2]).is_err());
    }

    #[test]
    fn test_shuffle_deterministic() {
        let (_tmp, coll) = fixture(20);
        let dataset = Dataset::new(coll).unwrap();

        let a = dataset.shuffle(Some(42));
        let b = dataset.shuffle(Some(42));
        let c = dataset.shuffle(Some(7));

        let order = |ds: &Dataset| -> Vec<Document> {
            (0..ds.len()).map(|i| ds.get(i as isize).unwrap()).collect()
        };
        assert_eq!(order(&a), order(&b));
        assert_ne!(order(&a), order(&c));
    }

    #[test]
    fn test_map_composes() {
        let (_tmp, coll) = fixture(3);
        let dataset = Dataset::new(coll).unwrap();

        let chained = dataset
            .map(|mut d| {
                let i = d["i"].as_i64().unwrap();
                d.insert("i".to_string(), json!(i + 1));
                d
            })
            .map(|mut d| {
                let i = d["i"].as_i64().unwrap();
                d.insert("i".to_string(), json!(i * 10));
                d
            });

        // (i + 1) * 10, applied inner-first
        let values: Vec<i64> = (0..3)
            .map(|i| chained.get(i).unwrap()["i"].as_i64().unwrap())
            .collect();
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![10, 20, 30]);
    }

    #[test]
    fn test_filter_take_skip() {
        let (_tmp, coll) = fixture(10);
        let dataset = Dataset::new(coll).unwrap();

        let even = dataset
            .filter(|d| d["i"].as_u64().unwrap() % 2 == 0)
            .unwrap();
        assert_eq!(even.len(), 5);

        assert_eq!(dataset.take(3).len(), 3);
        assert_eq!(dataset.skip(3).len(), 7);
        assert_eq!(dataset.take(99).len(), 10);
        assert_eq!(dataset.skip(99).len(), 0);
    }

    #[test]
    fn test_batch_chunks() {
        let (_tmp, coll) = fixture(7);
        let dataset = Dataset::new(coll).unwrap();

        let sizes: Vec<usize> = dataset.batch(3).map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_slice() {
        let (_tmp, coll) = fixture(5);
        let dataset = Dataset::new(coll).unwrap();

        assert_eq!(dataset.slice(1, 3).unwrap().len(), 2);
        assert_eq!(dataset.slice(-2, 5).unwrap().len(), 2);
        assert_eq!(dataset.slice(4, 2).unwrap().len(), 0);
        assert_eq!(dataset.slice(0, 99).unwrap().len(), 5);
    }

    #[test]
    fn test_features() {
        let tmp = TempDir::new().unwrap();
        let coll =
            Collection::open(tmp.path(), "test", 10, false, OpenMode::ReadWrite).unwrap();
        coll.put(
            "a",
            doc(json!({"s": "x", "b": true, "i": 3, "f": 1.5, "l": [1], "m": {}})),
        )
        .unwrap();
        coll.flush().unwrap();

        let dataset = Dataset::new(Arc::new(coll)).unwrap();
        let features = dataset.features().unwrap().unwrap();
        assert_eq!(features["s"], "string");
        assert_eq!(features["b"], "bool");
        assert_eq!(features["i"], "int64");
        assert_eq!(features["f"], "float64");
        assert_eq!(features["l"], "list");
        assert_eq!(features["m"], "dict");

        let empty = Dataset::new(Arc::new(
            Collection::open(tmp.path(), "empty", 10, false, OpenMode::ReadWrite).unwrap(),
        ))
        .unwrap();
        assert!(empty.features().unwrap().is_none());
    }
}
