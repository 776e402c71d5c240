use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Lifecycle events published by a broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    Enqueued {
        job_id: JobId,
        queue: String,
        job_type: String,
        at: DateTime<Utc>,
    },

    /// A worker pulled the message; `attempt` is 1-based
    Leased {
        job_id: JobId,
        attempt: u32,
        at: DateTime<Utc>,
    },

    Retrying {
        job_id: JobId,
        retry_at: DateTime<Utc>,
        error: String,
        at: DateTime<Utc>,
    },

    Completed {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Dead-lettered: retries exhausted or the message can never be processed
    Archived {
        job_id: JobId,
        error: String,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Leased { .. } => "leased",
            Self::Retrying { .. } => "retrying",
            Self::Completed { .. } => "completed",
            Self::Archived { .. } => "archived",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Leased { job_id, .. }
            | Self::Retrying { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Archived { job_id, .. } => job_id,
        }
    }
}
