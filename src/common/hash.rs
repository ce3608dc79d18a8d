//! Response digests
//!
//! Replicas answer a query with a keyed hash of the query text. The digest is
//! deterministic, so any replica's answer is interchangeable and the caller
//! can verify it against the shared key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;

type HmacMd5 = Hmac<Md5>;

/// Keyed hasher shared by every replica in a cluster
#[derive(Clone)]
pub struct QueryHasher {
    key: Vec<u8>,
}

impl QueryHasher {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// Base64 text of HMAC-MD5(key, query)
    pub fn digest(&self, query: &str) -> String {
        let mut mac = HmacMd5::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// The digest as UTF-8 bytes, exactly what goes on the wire
    pub fn base64_hash_bytes(&self, query: &str) -> Vec<u8> {
        self.digest(query).into_bytes()
    }
}

impl Default for QueryHasher {
    fn default() -> Self {
        Self::new(crate::common::config::DEFAULT_HASH_KEY)
    }
}

impl std::fmt::Debug for QueryHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHasher")
            .field("key_len", &self.key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_pure() {
        let hasher = QueryHasher::default();
        assert_eq!(hasher.base64_hash_bytes("lorem"), hasher.base64_hash_bytes("lorem"));
        assert_eq!(QueryHasher::default().digest("lorem"), hasher.digest("lorem"));
    }

    #[test]
    fn test_digest_depends_on_query_and_key() {
        let hasher = QueryHasher::default();
        assert_ne!(hasher.digest("lorem"), hasher.digest("ipsum"));
        assert_ne!(QueryHasher::new("other").digest("lorem"), hasher.digest("lorem"));
    }

    #[test]
    fn test_digest_shape() {
        // 16 bytes of MD5 output, padded base64
        let digest = QueryHasher::default().digest("lorem");
        assert_eq!(digest.len(), 24);
        assert!(digest.ends_with("=="));
        assert_eq!(STANDARD.decode(&digest).unwrap().len(), 16);
    }

    #[test]
    fn test_known_vector() {
        // RFC 2202 test case 2
        let hasher = QueryHasher::new("Jefe");
        let expected = STANDARD.encode([
            0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e, 0x31, 0x0a, 0x5d,
            0xb7, 0x38,
        ]);
        assert_eq!(hasher.digest("what do ya want for nothing?"), expected);
    }
}
