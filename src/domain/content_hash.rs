// Content digests for drift detection
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the exact bytes of `content`
pub fn digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub fn differs(existing: &str, candidate: &str) -> bool {
    digest(existing) != digest(candidate)
}
