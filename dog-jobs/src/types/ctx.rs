use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::JobId;

/// Per-invocation context handed to handlers.
///
/// The token is cancelled when the per-job timeout elapses or when the worker
/// abandons the invocation at shutdown. Handlers should select on
/// [`JobContext::cancelled`] around any blocking call.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub job_type: String,
    pub queue: String,

    /// 1-based attempt number
    pub attempt: u32,

    /// Total attempts the message is allowed
    pub max_retries: u32,

    pub timeout: Option<Duration>,

    cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(
        job_id: JobId,
        job_type: impl Into<String>,
        queue: impl Into<String>,
        attempt: u32,
        max_retries: u32,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            job_type: job_type.into(),
            queue: queue.into(),
            attempt,
            max_retries,
            timeout: None,
            cancellation,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the invocation is cancelled
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
