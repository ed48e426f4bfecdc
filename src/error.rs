//! Error types for the history store and its backends.

/// Failure reported by an ordered-set backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking worker running a query panicked or was aborted.
    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("store connection lock poisoned")]
    Poisoned,

    /// The caller stopped waiting before the call reached the database.
    #[error("store call abandoned by caller")]
    Abandoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by the codec and the channel history operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to encode message: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to write to store: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("failed to read from store: {0}")]
    StoreRead(#[source] StoreError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl HistoryError {
    /// True for caller-requested aborts, whether by token or by deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_variants_are_classified() {
        assert!(HistoryError::Cancelled.is_cancellation());
        assert!(HistoryError::DeadlineExceeded.is_cancellation());

        let read = HistoryError::StoreRead(StoreError::Unavailable("down".into()));
        assert!(!read.is_cancellation());
    }

    #[test]
    fn store_errors_keep_backend_message() {
        let err = HistoryError::StoreWrite(StoreError::Unavailable("connection refused".into()));
        assert_eq!(
            err.to_string(),
            "failed to write to store: store unavailable: connection refused"
        );
    }
}
