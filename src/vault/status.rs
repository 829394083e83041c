//! Classification of Vault health probe responses

use std::fmt;

/// Health of a Vault server as reported by `HEAD /v1/sys/health`.
///
/// The status code is the only signal: Vault answers HEAD requests without a
/// body. Transport failures are not a health state, they surface as
/// [`VaultError::Unreachable`](crate::vault::VaultError::Unreachable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultHealth {
    /// Not initialized yet, and therefore sealed pending init (501).
    Uninitialized,
    /// Initialized but sealed (503).
    Sealed,
    /// Initialized, unsealed and active (200).
    Unsealed,
    /// Unsealed standby node (429).
    Standby,
    /// Any other status code.
    Unknown(u16),
}

impl VaultHealth {
    pub fn from_status(code: u16) -> Self {
        match code {
            200 => VaultHealth::Unsealed,
            429 => VaultHealth::Standby,
            501 => VaultHealth::Uninitialized,
            503 => VaultHealth::Sealed,
            other => VaultHealth::Unknown(other),
        }
    }
}

impl fmt::Display for VaultHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultHealth::Uninitialized => write!(f, "not initialized"),
            VaultHealth::Sealed => write!(f, "sealed"),
            VaultHealth::Unsealed => write!(f, "initialized and unsealed"),
            VaultHealth::Standby => write!(f, "unsealed and in standby mode"),
            VaultHealth::Unknown(code) => write!(f, "unknown (status code {})", code),
        }
    }
}
