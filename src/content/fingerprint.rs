//! Content fingerprints for embedding change detection.
//!
//! A fingerprint is the SHA-256 of the trimmed extracted text, rendered as
//! 64 lowercase hex characters. Comparing the stored fingerprint with a
//! freshly computed one tells the pipeline whether a remote embedding call
//! is needed at all.

use sha2::{Digest, Sha256};

/// Compute the fingerprint of a piece of text.
///
/// Leading and trailing whitespace is ignored, so `" x "` and `"x"` share a
/// fingerprint. The empty string still yields a valid digest.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed since it was last embedded.
///
/// Returns `true` if there is no stored hash (never embedded) or if the
/// current hash differs from the stored one.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = content_hash("Hello world");
        let hash2 = content_hash("Hello world");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_content_hash_trims() {
        assert_eq!(content_hash(" x "), content_hash("x"));
        assert_eq!(content_hash("\n\tx"), content_hash("x"));
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash("alpha"), content_hash("beta"));
        assert_ne!(content_hash("a b"), content_hash("ab"));
    }

    #[test]
    fn test_empty_content_hash() {
        // SHA-256 of the empty string
        assert_eq!(
            content_hash("   "),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
