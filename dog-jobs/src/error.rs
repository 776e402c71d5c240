use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure and routing errors
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The outer `{type, data}` shape of a message could not be parsed
    #[error("Malformed job envelope: {0}")]
    EnvelopeMalformed(String),

    /// The envelope's `data` does not fit the registered job shape
    #[error("Payload mismatch for job type {job_type}: {reason}")]
    PayloadMismatch { job_type: String, reason: String },

    #[error("Job type not registered: {0}")]
    UnknownJobType(String),

    #[error("Job type already registered: {0}")]
    DuplicateJobType(String),

    #[error("Broker unavailable")]
    BrokerUnavailable,

    #[error("Failed to enqueue job of type {job_type}: {source}")]
    Enqueue {
        job_type: String,
        #[source]
        source: Box<QueueError>,
    },

    #[error("Shutdown deadline elapsed with {abandoned} handler(s) still running")]
    ShutdownTimeout { abandoned: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid lease token")]
    InvalidLeaseToken,

    #[error("Backend does not support feature: {0}")]
    BackendUnsupported(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Errors that can never succeed on redelivery.
    ///
    /// The worker drops these messages instead of scheduling a retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::EnvelopeMalformed(_) | Self::PayloadMismatch { .. } | Self::UnknownJobType(_)
        )
    }
}

/// Job execution outcome - determines retry behavior
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Retryable error - will schedule retry if attempts remain
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - fail immediately, no retry
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl JobError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
