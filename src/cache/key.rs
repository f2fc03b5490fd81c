//! Cache key generation.
//!
//! Keys are `<prefix>:<operation>:<hash>` where `hash` is the SHA-256 of the
//! canonical (recursively key-sorted) JSON rendering of the input mapping, so
//! the key depends only on the mapping's contents and never on insertion order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub prefix: String,
    pub operation: String,
    pub hash: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.operation, self.hash)
    }
}

/// Render `value` as JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
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
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(&map[k], out);
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

#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    prefix: String,
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            salt: None,
        }
    }

    /// Mix a version tag into every hash; changing it retires all prior keys.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn derive(&self, operation: &str, input: &Map<String, Value>) -> CacheKey {
        let mut canonical = canonical_json(&Value::Object(input.clone()));
        if let Some(ref salt) = self.salt {
            canonical.push('\u{1f}');
            canonical.push_str(salt);
        }
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let mut hash = String::with_capacity(64);
        for b in hasher.finalize() {
            let _ = write!(hash, "{:02x}", b);
        }
        CacheKey {
            prefix: self.prefix.clone(),
            operation: operation.to_string(),
            hash,
        }
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new("agent")
    }
}
