//! Schema fingerprints
//!
//! An assembled schema is identified by the SHA256 of its canonical JSON
//! document, so identical inputs always persist under the same fingerprint.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of a schema artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON document
    ///
    /// Maps keep insertion order, so the document must be produced
    /// deterministically for the checksum to be stable.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &[u8]) -> bool {
        Self::from_bytes(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let doc = serde_json::json!({"types": {"Article": {"fields": ["ID", "Title"]}}});
        assert_eq!(Checksum::from_json(&doc), Checksum::from_json(&doc.clone()));
    }

    #[test]
    fn test_checksum_respects_key_order() {
        let first = serde_json::json!({"a": 1, "b": 2});
        let second = serde_json::json!({"b": 2, "a": 1});
        assert_ne!(Checksum::from_json(&first), Checksum::from_json(&second));
    }

    #[test]
    fn test_checksum_verification() {
        let checksum = Checksum::from_bytes(b"type Query { ping: String }");
        assert!(checksum.verify(b"type Query { ping: String }"));
        assert!(!checksum.verify(b"type Query { pong: String }"));
    }
}
