//! Persisted form of a key share set.

use crate::store::StoreError;
use crate::vault::KeyShareSet;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// A [`KeyShareSet`] as it is written to a secret store: the root token and
/// every share, each base64 encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct PersistedSecretRecord {
    pub root_token: String,
    pub shares: Vec<String>,
}

impl std::fmt::Debug for PersistedSecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSecretRecord")
            .field("root_token", &"<redacted>")
            .field("shares", &self.shares.len())
            .finish()
    }
}

pub fn encode_value(raw: &[u8]) -> String {
    BASE64.encode(raw)
}

pub fn decode_value(encoded: &str) -> Result<Vec<u8>, StoreError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| StoreError::Decode(format!("invalid base64: {}", e)))
}

fn decode_string(encoded: &str, what: &str) -> Result<String, StoreError> {
    let raw = decode_value(encoded).map_err(|e| StoreError::Decode(format!("{}: {}", what, e)))?;
    String::from_utf8(raw).map_err(|_| StoreError::Decode(format!("{} is not valid UTF-8", what)))
}

impl PersistedSecretRecord {
    pub fn from_key_shares(set: &KeyShareSet) -> Self {
        Self {
            root_token: encode_value(set.root_token.as_bytes()),
            shares: set.shares.iter().map(|s| encode_value(s.as_bytes())).collect(),
        }
    }

    pub fn decode_root_token(&self) -> Result<String, StoreError> {
        decode_string(&self.root_token, "root token")
    }

    /// Decodes the first `count` shares. Fails as a whole if fewer are
    /// stored or any of them is malformed.
    pub fn decode_shares(&self, count: usize) -> Result<Vec<String>, StoreError> {
        if self.shares.len() < count {
            return Err(StoreError::Decode(format!(
                "record holds {} shares, {} required",
                self.shares.len(),
                count
            )));
        }
        self.shares
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, share)| decode_string(share, &format!("share {}", i + 1)))
            .collect()
    }

    pub fn into_key_shares(self) -> Result<KeyShareSet, StoreError> {
        let root_token = self.decode_root_token()?;
        let shares = self.decode_shares(self.shares.len())?;
        Ok(KeyShareSet { root_token, shares })
    }
}
