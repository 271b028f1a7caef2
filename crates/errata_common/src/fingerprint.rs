//! Deduplication fingerprint
//!
//! Two reports are the same logical error when category, message, traceback
//! and context are all equal. Contexts are compared through a canonical JSON
//! encoding: object keys sorted at every level, no whitespace, arrays kept in
//! order, scalars as serde_json prints them (so `1` and `1.0` differ).

use crate::category::ErrorCategory;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Encode a context document in its canonical form
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hex SHA-256 over the deduplication key
///
/// Each component is length-prefixed so text cannot move across component
/// boundaries without changing the hash.
pub fn fingerprint(
    category: ErrorCategory,
    error_message: &str,
    traceback: &str,
    canonical_context: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        category.as_str(),
        error_message,
        traceback,
        canonical_context,
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
