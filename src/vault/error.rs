#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Vault unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP status {0}: {1}")]
    HttpStatus(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Returns true for transport failures that may resolve on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, VaultError::Unreachable(_))
    }
}
