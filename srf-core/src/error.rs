//! Error types for the dispatch pipeline

use thiserror::Error;

/// Failure to obtain or decode a request body.
#[derive(Error, Debug)]
pub enum BodyError {
    /// The runtime could not deliver the body bytes
    #[error("failed to read request body: {0}")]
    Read(String),

    /// The body exceeded the configured size limit
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// The body is not valid JSON
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl BodyError {
    /// True when the body arrived but could not be parsed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, BodyError::Json(_))
    }

    /// Copy of this error for reporting it again; a JSON error keeps its text only
    pub(crate) fn replay(&self) -> BodyError {
        match self {
            BodyError::Read(reason) => BodyError::Read(reason.clone()),
            BodyError::TooLarge { limit } => BodyError::TooLarge { limit: *limit },
            BodyError::Json(err) => BodyError::Read(err.to_string()),
        }
    }
}

/// Errors raised while building a schema from a declarative source.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A `pattern` constraint is not a valid regular expression
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending expression
        pattern: String,
        /// Regex compiler error
        #[source]
        source: regex::Error,
    },

    /// The schema document could not be decoded
    #[error("invalid schema document: {0}")]
    Decode(String),
}

/// Failures of the blocking worker pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// No worker slot became available within the back-pressure policy
    #[error("blocking worker pool saturated ({max_blocking} slots busy)")]
    Saturated {
        /// Configured pool bound
        max_blocking: usize,
    },

    /// The blocking task panicked or was cancelled by the runtime
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors that escape the pipeline.
///
/// Denials, validation failures, malformed input and unimplemented operations
/// are rendered as responses by the dispatcher and never show up here.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The operation returned an error
    #[error("operation failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// The blocking worker pool refused the operation
    #[error("operation rejected: {0}")]
    Overloaded(#[source] PoolError),

    /// The blocking operation panicked
    #[error("blocking operation aborted: {0}")]
    WorkerPanicked(#[source] PoolError),

    /// The body could not be read from the runtime
    #[error(transparent)]
    BodyRead(BodyError),

    /// The validated data did not fit the operation's declared type
    #[error("validated data does not match declared type {type_name}: {source}")]
    DataMismatch {
        /// Rust type the operation declared
        type_name: &'static str,
        /// Deserialization error
        #[source]
        source: serde_json::Error,
    },
}

impl From<PoolError> for DispatchError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Saturated { .. } => DispatchError::Overloaded(err),
            PoolError::Join(_) => DispatchError::WorkerPanicked(err),
        }
    }
}

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_error_is_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert!(BodyError::Json(json_err).is_malformed());
        assert!(!BodyError::Read("reset".into()).is_malformed());
        assert!(!BodyError::TooLarge { limit: 10 }.is_malformed());
    }

    #[test]
    fn test_pool_error_maps_to_overloaded() {
        let err: DispatchError = PoolError::Saturated { max_blocking: 4 }.into();
        assert!(matches!(err, DispatchError::Overloaded(_)));
        assert!(err.to_string().contains("4 slots busy"));
    }

    #[test]
    fn test_body_read_is_transparent() {
        let err = DispatchError::BodyRead(BodyError::TooLarge { limit: 1024 });
        assert_eq!(err.to_string(), "request body exceeds 1024 bytes");
    }
}
