use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the dispatcher hands to the broker: the encoded envelope plus the
/// submission parameters resolved from job defaults and dispatch options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Job type tag, duplicated from the envelope for routing and logs
    pub job_type: String,

    /// Target queue name
    pub queue: String,

    /// Encoded `{type, data}` envelope
    pub envelope: Vec<u8>,

    /// Total execution attempts allowed before the message is dead-lettered
    pub max_retries: u32,

    /// Earliest time the message may be delivered
    pub process_at: DateTime<Utc>,

    /// Hard execution timeout for each attempt
    pub timeout: Option<Duration>,
}

impl TaskMessage {
    /// Build a message that is ready immediately with no timeout
    pub fn new(job_type: impl Into<String>, queue: impl Into<String>, envelope: Vec<u8>, max_retries: u32) -> Self {
        Self {
            job_type: job_type.into(),
            queue: queue.into(),
            envelope,
            max_retries,
            process_at: Utc::now(),
            timeout: None,
        }
    }

    pub fn with_process_at(mut self, process_at: DateTime<Utc>) -> Self {
        self.process_at = process_at;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check if the message may be delivered at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.process_at <= now
    }
}
