//! TPL-007: BLAKE3 fingerprints of canonical renderings.
//!
//! Two scripts with the same resolution state render identically, so their
//! fingerprints match. This is what audit logs and diffs compare.

use crate::core::ast::Script;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Fingerprint of a script's canonical rendering.
pub fn fingerprint(script: &Script) -> String {
    hash_string(&script.to_string())
}

/// Short hex digest of `parts`, NUL-separated. `len` is capped at 64.
pub fn short_digest(parts: &[&str], len: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update(b"\0");
    }
    let hex = hasher.finalize().to_hex();
    let hex = hex.as_str();
    hex[..len.min(hex.len())].to_string()
}
