// codec.rs - JSON codec facade
//
// All record bytes flow through this module so the encoder can be swapped in
// one place (the original shipped orjson/ujson fallbacks behind the same
// facade). The active backend is serde_json.

use serde_json::Value;

use crate::error::{Result, ZdsError};

/// A document is a schemaless JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Name of the active JSON backend.
pub fn backend() -> &'static str {
    "serde_json"
}

/// Serialize a document to compact JSON bytes.
pub fn encode_doc(doc: &Document) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(doc)?)
}

/// Serialize a document to one newline-terminated log record.
pub fn encode_line(doc: &Document) -> Result<Vec<u8>> {
    let mut bytes = encode_doc(doc)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse record bytes into a document. Trailing newline is tolerated.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ZdsError::Serialization(format!(
            "record is not a JSON object: {}",
            other
        ))),
    }
}
