#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Secret {0} not found")]
    NotFound(String),

    #[error("Secret {0} already exists")]
    Conflict(String),

    #[error("Secret store unreachable: {0}")]
    Unreachable(String),

    #[error("Secret store error: {0}")]
    Backend(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true for failures worth retrying while holding an unsaved
    /// init response.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unreachable(_) | StoreError::Backend(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(format!("SQLite: {}", err))
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unreachable(format!("SQLite pool: {}", err))
    }
}
