// schema.rs - Structural schema extraction and fingerprinting
//
// Strict-mode collections pin every write to one structural schema. The
// fingerprint is the hex SHA-256 of a canonical serialization of the
// document's shape: types at each position, sorted keys, first element as
// the representative of a sequence.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::codec::Document;

/// Extract the structural schema of a value.
///
/// Scalars map to type tags, mappings map to mappings of schemas, and a
/// sequence maps to a one-element sequence holding its first element's
/// schema (empty sequence when the source is empty).
pub fn extract_schema(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let schema = map
                .iter()
                .map(|(k, v)| (k.clone(), extract_schema(v)))
                .collect();
            Value::Object(schema)
        }
        Value::Array(items) => match items.first() {
            Some(first) => Value::Array(vec![extract_schema(first)]),
            None => Value::Array(Vec::new()),
        },
        Value::String(_) => Value::String("string".to_string()),
        Value::Bool(_) => Value::String("boolean".to_string()),
        Value::Number(n) => {
            // JSON has a single number type; keep the original's int/float split
            if n.is_i64() || n.is_u64() {
                Value::String("integer".to_string())
            } else {
                Value::String("number".to_string())
            }
        }
        Value::Null => Value::String("null".to_string()),
    }
}

/// Canonicalize a JSON value for hashing: sorted mapping keys, no
/// extraneous whitespace.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // String serialization of a key cannot fail
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&serde_json::to_string(scalar).unwrap_or_default());
        }
    }
}

/// Compute the schema fingerprint of a document: hex SHA-256 of the
/// canonical schema bytes.
pub fn compute_schema_id(doc: &Document) -> String {
    let schema = extract_schema(&Value::Object(doc.clone()));
    let canonical = canonicalize(&schema);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
