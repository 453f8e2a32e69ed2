use thiserror::Error;

/// Crate-wide error taxonomy. Call sites that need to branch on recoverability
/// use this enum directly; call sites that merely propagate use `anyhow::Result`
/// with `.context(...)`.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Broker, DB-insert, or KV errors that are retried with backoff and never
    /// surfaced to a caller.
    #[error("transient error: {0}")]
    Transient(#[source] anyhow::Error),

    /// Decode failures, UPSERT failures, and aggregate-read failures. These
    /// terminate the worker process so an orchestrator can restart it.
    #[error("fatal error: {0}")]
    Fatal(#[source] anyhow::Error),

    /// Client-supplied request parameters that violate a documented contract.
    /// Surfaced as HTTP 422 with a one-field JSON body.
    #[error("invalid request: {0}")]
    ClientError(String),

    /// A row that does not exist. Surfaced as HTTP 404.
    #[error("not found")]
    NotFound,
}

impl IndexerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexerError::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
