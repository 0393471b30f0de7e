// Dataset layer tests: map-style composition laws, deterministic shuffles,
// and streaming reservoir-buffer behavior over a real collection.

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use zds_core::{Collection, Dataset, Document, IterableDataset, OpenMode, ZdsRoot};

fn doc(value: serde_json::Value) -> Document {
    value.as_object().unwrap().clone()
}

fn fixture(n: usize) -> (TempDir, Arc<Collection>) {
    let tmp = TempDir::new().unwrap();
    let root = ZdsRoot::open(tmp.path(), 1000, OpenMode::ReadWrite).unwrap();
    let coll = root.collection("train", None, false).unwrap();
    for i in 0..n {
        coll.put(&format!("doc_{:03}", i), doc(json!({"i": i})))
            .unwrap();
    }
    coll.flush().unwrap();
    root.close().unwrap();
    (tmp, coll)
}

fn values(dataset: &Dataset) -> Vec<u64> {
    (0..dataset.len())
        .map(|i| dataset.get(i as isize).unwrap()["i"].as_u64().unwrap())
        .collect()
}

// =============================================================================
// MAP-STYLE DATASET
// =============================================================================

#[test]
fn test_select_composition_law() {
    let (_tmp, coll) = fixture(10);
    let dataset = Dataset::new(coll).unwrap();

    let p = [0usize, 3, 5, 7, 9];
    let q = [1usize, 3, 4];
    let left = dataset.select(&p).unwrap().select(&q).unwrap();
    let composed: Vec<usize> = q.iter().map(|&i| p[i]).collect();
    let right = dataset.select(&composed).unwrap();

    assert_eq!(values(&left), values(&right));
}

#[test]
fn test_map_composition_law() {
    let (_tmp, coll) = fixture(5);
    let dataset = Dataset::new(coll).unwrap();

    let f = |mut d: Document| {
        let i = d["i"].as_u64().unwrap();
        d.insert("i".to_string(), json!(i + 3));
        d
    };
    let g = |mut d: Document| {
        let i = d["i"].as_u64().unwrap();
        d.insert("i".to_string(), json!(i * 2));
        d
    };

    let chained = dataset.map(f).map(g);
    let fused = dataset.map(move |d| g(f(d)));
    assert_eq!(values(&chained), values(&fused));
}

#[test]
fn test_shuffle_determinism() {
    let (_tmp, coll) = fixture(50);
    let dataset = Dataset::new(coll).unwrap();

    let a = dataset.shuffle(Some(42));
    let b = dataset.shuffle(Some(42));
    assert_eq!(values(&a), values(&b));

    // A permutation, not a prefix or a copy
    let mut sorted = values(&a);
    sorted.sort_unstable();
    assert_eq!(sorted, (0..50).collect::<Vec<u64>>());
    assert_ne!(values(&a), values(&dataset));
}

#[test]
fn test_shuffle_of_selection_stays_within_it() {
    let (_tmp, coll) = fixture(20);
    let dataset = Dataset::new(coll).unwrap();

    let selected = dataset.select(&[2, 4, 6, 8, 10]).unwrap();
    let shuffled = selected.shuffle(Some(7));

    let mut got = values(&shuffled);
    got.sort_unstable();
    assert_eq!(got, vec![2, 4, 6, 8, 10]);
}

#[test]
fn test_take_skip_batch_pipeline() {
    let (_tmp, coll) = fixture(10);
    let dataset = Dataset::new(coll).unwrap();

    let window = dataset.skip(2).take(5);
    assert_eq!(window.len(), 5);

    let batches: Vec<Vec<Document>> = window.batch(2).map(|b| b.unwrap()).collect();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].len(), 1);
}

#[test]
fn test_dataset_snapshot_is_stable() {
    let (_tmp, coll) = fixture(3);
    let dataset = Dataset::new(Arc::clone(&coll)).unwrap();

    // Writes after construction do not change the anchor order
    coll.put("doc_zzz", doc(json!({"i": 99}))).unwrap();
    coll.flush().unwrap();
    assert_eq!(dataset.len(), 3);
}

// =============================================================================
// STREAMING DATASET
// =============================================================================

#[test]
fn test_streaming_shuffle_determinism() {
    let (_tmp, coll) = fixture(100);
    let stream = IterableDataset::new(coll).shuffle(10, Some(42));

    let first: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();
    let second: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();

    assert_eq!(first, second);
    let mut sorted = first.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..100).collect::<Vec<u64>>());
}

#[test]
fn test_streaming_preserves_filtered_multiset() {
    let (_tmp, coll) = fixture(60);
    let stream = IterableDataset::new(coll)
        .filter(|d| d["i"].as_u64().unwrap() % 3 == 0)
        .shuffle(8, Some(5));

    let mut got: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();
    got.sort_unstable();
    let expected: Vec<u64> = (0..60).filter(|i| i % 3 == 0).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_streaming_unshuffled_source_order() {
    let (_tmp, coll) = fixture(10);
    let stream = IterableDataset::new(coll);

    let got: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();
    assert_eq!(got, (0..10).collect::<Vec<u64>>());
}

#[test]
fn test_streaming_batches() {
    let (_tmp, coll) = fixture(10);
    let stream = IterableDataset::new(coll);

    let sizes: Vec<usize> = stream.batch(4).unwrap().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}

#[test]
fn test_streaming_sees_compacted_collection() {
    let (_tmp, coll) = fixture(10);
    for i in 0..5 {
        coll.delete(&format!("doc_{:03}", i)).unwrap();
    }
    coll.compact().unwrap();

    let stream = IterableDataset::new(coll);
    let mut got: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();
    got.sort_unstable();
    assert_eq!(got, vec![5, 6, 7, 8, 9]);
}

#[test]
fn test_map_and_dataset_views_share_one_handle() {
    let (_tmp, coll) = fixture(6);

    let dataset = Dataset::new(Arc::clone(&coll)).unwrap();
    let stream = IterableDataset::new(coll).map(|mut d| {
        let i = d["i"].as_u64().unwrap();
        d.insert("i".to_string(), json!(i + 100));
        d
    });

    assert_eq!(dataset.len(), 6);
    let streamed: Vec<u64> = stream
        .iter()
        .unwrap()
        .map(|d| d["i"].as_u64().unwrap())
        .collect();
    assert_eq!(streamed, vec![100, 101, 102, 103, 104, 105]);
}
