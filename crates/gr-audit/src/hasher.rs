// hasher.rs — SHA-256 hashing for the archive chain.
//
// Hashes are lowercase hex, 64 characters.

use sha2::{Digest, Sha256};

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_empty_digest() {
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(hash_bytes(b"passed"), hash_bytes(b"failed"));
        assert_eq!(hash_str("x"), hash_bytes(b"x"));
    }
}
