//! Deterministic content-address derivation for cache keys.

use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 digest of an origin URL, used as the cache key.
pub fn fingerprint_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let a = fingerprint_url("https://example.invalid/track.mp3");
        let b = fingerprint_url("https://example.invalid/track.mp3");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_urls() {
        let a = fingerprint_url("https://example.invalid/a.mp3");
        let b = fingerprint_url("https://example.invalid/b.mp3");
        assert_ne!(a, b);
    }
}
