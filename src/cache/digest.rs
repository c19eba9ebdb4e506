//! Content-addressed dedup digests.

use super::key::CanonicalKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// SHA-256 of a canonical key and a contract version, hex encoded.
///
/// Doubles as the client cache key and the server idempotency key. No process-local salt
/// is mixed in, so the same request yields the same digest in every process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DedupDigest(String);

impl TryFrom<String> for DedupDigest {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid dedup digest: {:?}", value))
    }
}

impl From<DedupDigest> for String {
    fn from(d: DedupDigest) -> Self {
        d.0
    }
}

impl DedupDigest {
    /// Accepts a 64 character lowercase hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for DedupDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn digest(key: &CanonicalKey, contract_version: &str) -> DedupDigest {
    let mut hasher = Sha256::new();
    // Length prefixes keep (key, version) pairs from colliding by concatenation.
    hasher.update((contract_version.len() as u64).to_be_bytes());
    hasher.update(contract_version.as_bytes());
    hasher.update((key.as_str().len() as u64).to_be_bytes());
    hasher.update(key.as_str().as_bytes());
    let hash: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    DedupDigest(hash)
}
