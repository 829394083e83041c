//! Vault initialization and unsealing payloads.
//!
//! This module holds the request and response bodies of `sys/init` and
//! `sys/unseal`, plus the [`KeyShareSet`] produced by a successful init.

use serde::{Deserialize, Serialize};

/// Request structure for Vault initialization.
#[derive(Debug, Serialize)]
pub(crate) struct InitRequest {
    pub secret_shares: usize,
    pub secret_threshold: usize,
}

/// Response structure for Vault initialization.
#[derive(Deserialize)]
pub(crate) struct InitResponse {
    pub keys: Vec<String>,
    pub root_token: String,
}

/// Request structure for submitting one unseal key.
#[derive(Debug, Serialize)]
pub(crate) struct UnsealRequest<'a> {
    pub key: &'a str,
}

/// Root token and unseal key shares returned by a one-time init.
///
/// Vault hands these out exactly once. They must be persisted before they
/// are used for anything else.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyShareSet {
    pub root_token: String,
    pub shares: Vec<String>,
}

impl From<InitResponse> for KeyShareSet {
    fn from(resp: InitResponse) -> Self {
        Self {
            root_token: resp.root_token,
            shares: resp.keys,
        }
    }
}

// Never print the secrets themselves.
impl std::fmt::Debug for KeyShareSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShareSet")
            .field("root_token", &"<redacted>")
            .field("shares", &self.shares.len())
            .finish()
    }
}

/// Structure representing the result of a single unseal submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnsealProgress {
    pub sealed: bool,
    #[serde(rename = "t")]
    pub threshold: u32,
    #[serde(rename = "n")]
    pub total_shares: u32,
    pub progress: u32,
}
