/// fbuild brokerage error types.
///
/// All failures are absorbed at the brokerage facade and reported as
/// degraded results (an empty worker list, a skipped announcement), so
/// these variants exist for logging and for callers that talk to the
/// lower layers directly.

/// Unified error type for brokerage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BrokerageError {
    #[error("no coordinator or brokerage path configured")]
    Unconfigured,
    #[error("could not reach the coordinator")]
    CoordinatorUnreachable,
    #[error("timed out waiting for the coordinator response")]
    ResponseTimeout,
    #[error("network error")]
    NetworkError,
    #[error("malformed protocol message")]
    ProtocolError,
    #[error("I/O error")]
    Io,
}

/// Result type alias for brokerage operations.
pub type BrokerageResult<T> = Result<T, BrokerageError>;

impl From<std::io::Error> for BrokerageError {
    fn from(_: std::io::Error) -> Self {
        BrokerageError::Io
    }
}
