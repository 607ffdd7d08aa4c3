// src/utils/checksum.rs

//! Content fingerprints used for change detection.

use sha1::{Digest, Sha1};

/// Lowercase hex SHA-1 of `bytes`.
///
/// The hub stores fingerprints in this form, so the algorithm and encoding
/// must not change independently of it.
pub fn checksum(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// Whether `bytes` match a previously recorded fingerprint.
pub fn matches(bytes: impl AsRef<[u8]>, known: Option<&str>) -> bool {
    matches_digest(&checksum(bytes), known)
}

/// Whether an already computed `digest` equals a recorded fingerprint.
///
/// Case and surrounding whitespace of the recorded value are ignored.
pub fn matches_digest(digest: &str, known: Option<&str>) -> bool {
    known.is_some_and(|known| digest.eq_ignore_ascii_case(known.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(checksum("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(checksum(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_deterministic() {
        let body = b"<rss><channel><item/></channel></rss>".to_vec();
        assert_eq!(checksum(&body), checksum(body.clone()));
    }

    #[test]
    fn test_matches() {
        let digest = checksum("Hello");
        assert!(matches("Hello", Some(&digest)));
        assert!(matches("Hello", Some(&digest.to_uppercase())));
        assert!(!matches("Hello!", Some(&digest)));
        assert!(!matches("Hello", None));
    }

    #[test]
    fn test_matches_digest_ignores_case_and_padding() {
        let digest = checksum("Hello");
        let padded = format!("  {}\n", digest.to_uppercase());
        assert!(matches_digest(&digest, Some(&padded)));
        assert!(!matches_digest(&digest, Some(&checksum("Hello!"))));
        assert!(!matches_digest(&digest, None));
    }
}
