use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, LeaseToken, TaskMessage};
use crate::job::DEFAULT_MAX_RETRIES;

/// Broker-side status of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for `process_at`
    Scheduled,

    /// Ready to be pulled
    Pending,

    /// Held by a worker
    Active,

    /// Handler failed, redelivery after `retry_at`
    Retrying { retry_at: DateTime<Utc> },

    Completed { completed_at: DateTime<Utc> },

    /// Dead-lettered
    Archived { archived_at: DateTime<Utc>, error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Archived { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Retrying { .. } => "retrying",
            Self::Completed { .. } => "completed",
            Self::Archived { .. } => "archived",
        }
    }
}

/// Mutable runtime state a broker keeps per message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,

    /// Immutable submission data
    pub message: TaskMessage,

    pub status: JobStatus,

    /// Deliveries so far (0 until first pulled)
    pub attempt: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,

    /// Token of the current delivery while `Active`
    pub lease_token: Option<LeaseToken>,
}

impl JobRecord {
    pub fn new(job_id: JobId, message: TaskMessage) -> Self {
        let now = Utc::now();
        let status = if message.is_due(now) {
            JobStatus::Pending
        } else {
            JobStatus::Scheduled
        };

        Self {
            job_id,
            message,
            status,
            attempt: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
            lease_token: None,
        }
    }

    /// Whether a pull at `now` may hand this record out
    pub fn is_deliverable(&self, now: DateTime<Utc>) -> bool {
        match &self.status {
            JobStatus::Pending => true,
            JobStatus::Scheduled => self.message.is_due(now),
            JobStatus::Retrying { retry_at } => *retry_at <= now,
            _ => false,
        }
    }

    /// Lease the record to a worker, bumping the attempt count
    pub fn start_processing(&mut self, lease_token: LeaseToken) {
        self.status = JobStatus::Active;
        self.attempt += 1;
        self.lease_token = Some(lease_token);
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed { completed_at: Utc::now() };
        self.lease_token = None;
        self.updated_at = Utc::now();
    }

    pub fn schedule_retry(&mut self, retry_at: DateTime<Utc>, error: String) {
        self.status = JobStatus::Retrying { retry_at };
        self.last_error = Some(error);
        self.lease_token = None;
        self.updated_at = Utc::now();
    }

    pub fn archive(&mut self, error: String) {
        self.status = JobStatus::Archived {
            archived_at: Utc::now(),
            error: error.clone(),
        };
        self.last_error = Some(error);
        self.lease_token = None;
        self.updated_at = Utc::now();
    }
}

/// One delivery of a message to a worker
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job_id: JobId,
    pub message: TaskMessage,

    /// 1-based attempt number of this delivery
    pub attempt: u32,

    pub lease_token: LeaseToken,
}

impl Delivery {
    /// Job type tag of the delivered message
    pub fn job_type(&self) -> &str {
        &self.message.job_type
    }

    /// Queue the message was pulled from
    pub fn queue(&self) -> &str {
        &self.message.queue
    }

    /// Total attempts the message is allowed. A message enqueued with 0,
    /// bypassing the dispatcher, gets [`DEFAULT_MAX_RETRIES`].
    pub fn max_attempts(&self) -> u32 {
        match self.message.max_retries {
            0 => DEFAULT_MAX_RETRIES,
            n => n,
        }
    }

    /// True when this delivery is the last one the retry budget allows
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_record_becomes_deliverable() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        let message = TaskMessage::new("my:job", "default", b"{}".to_vec(), 3).with_process_at(future);
        let record = JobRecord::new(JobId::new(), message);

        assert_eq!(record.status, JobStatus::Scheduled);
        assert!(!record.is_deliverable(Utc::now()));
        assert!(record.is_deliverable(future));
    }

    #[test]
    fn test_processing_bumps_attempt() {
        let message = TaskMessage::new("my:job", "default", b"{}".to_vec(), 3);
        let mut record = JobRecord::new(JobId::new(), message);

        record.start_processing(LeaseToken::new());
        assert_eq!(record.attempt, 1);
        assert!(!record.is_deliverable(Utc::now()));

        let retry_at = Utc::now();
        record.schedule_retry(retry_at, "boom".into());
        assert!(record.is_deliverable(retry_at));
        assert_eq!(record.last_error.as_deref(), Some("boom"));

        record.start_processing(LeaseToken::new());
        assert_eq!(record.attempt, 2);
    }

    #[test]
    fn test_last_attempt() {
        let delivery = Delivery {
            job_id: JobId::new(),
            message: TaskMessage::new("my:job", "default", Vec::new(), 2),
            attempt: 2,
            lease_token: LeaseToken::new(),
        };
        assert!(delivery.is_last_attempt());
    }

    #[test]
    fn test_zero_budget_uses_default() {
        let mut delivery = Delivery {
            job_id: JobId::new(),
            message: TaskMessage::new("my:job", "default", Vec::new(), 0),
            attempt: 1,
            lease_token: LeaseToken::new(),
        };
        assert_eq!(delivery.max_attempts(), DEFAULT_MAX_RETRIES);
        assert!(!delivery.is_last_attempt());

        delivery.attempt = DEFAULT_MAX_RETRIES;
        assert!(delivery.is_last_attempt());
    }
}
