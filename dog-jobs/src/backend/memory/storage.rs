use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::backend::{BoxStream, Broker};
use crate::{
    Delivery, JobEvent, JobId, JobRecord, JobStatus, LeaseToken, QueueError, QueueResult, TaskMessage,
};

#[derive(Default)]
struct MemoryState {
    /// Every message ever enqueued, terminal ones included
    jobs: HashMap<JobId, JobRecord>,

    /// queue name -> FIFO of job ids waiting for delivery
    queues: HashMap<String, VecDeque<JobId>>,
}

/// Per-status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub scheduled: usize,
    pub pending: usize,
    pub active: usize,
    pub retrying: usize,
    pub completed: usize,
    pub archived: usize,
}

/// In-process broker for tests and local development.
///
/// FIFO per queue, delayed and retried messages stay in place until due.
/// Nothing survives the process.
pub struct MemoryBroker {
    state: Mutex<MemoryState>,
    closed: AtomicBool,
    event_broadcaster: broadcast::Sender<JobEvent>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(1000);

        Self {
            state: Mutex::new(MemoryState::default()),
            closed: AtomicBool::new(false),
            event_broadcaster,
        }
    }

    /// Drop the "connection": every later call fails with `BrokerUnavailable`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn record(&self, job_id: &JobId) -> Option<JobRecord> {
        self.state.lock().jobs.get(job_id).cloned()
    }

    pub fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.state.lock().jobs.get(job_id).map(|r| r.status.clone())
    }

    /// Dead-lettered records
    pub fn archived(&self) -> Vec<JobRecord> {
        let state = self.state.lock();
        let mut archived: Vec<JobRecord> = state
            .jobs
            .values()
            .filter(|r| matches!(r.status, JobStatus::Archived { .. }))
            .cloned()
            .collect();
        archived.sort_by_key(|r| r.created_at);
        archived
    }

    pub fn stats(&self) -> BrokerStats {
        let state = self.state.lock();
        let mut stats = BrokerStats::default();
        for record in state.jobs.values() {
            match record.status {
                JobStatus::Scheduled => stats.scheduled += 1,
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Retrying { .. } => stats.retrying += 1,
                JobStatus::Completed { .. } => stats.completed += 1,
                JobStatus::Archived { .. } => stats.archived += 1,
            }
        }
        stats
    }

    /// Messages waiting on `queue`, due or not
    pub fn queue_len(&self, queue: &str) -> usize {
        self.state.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Forget completed and archived records last touched before `cutoff`.
    /// Returns how many were removed.
    pub fn prune_terminal(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        before - state.jobs.len()
    }

    fn ensure_open(&self) -> QueueResult<()> {
        if self.is_closed() {
            Err(QueueError::BrokerUnavailable)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.event_broadcaster.send(event);
    }

    /// Look up the active record a delivery refers to and check its lease
    fn leased_record<'a>(state: &'a mut MemoryState, delivery: &Delivery) -> QueueResult<&'a mut JobRecord> {
        let record = state
            .jobs
            .get_mut(&delivery.job_id)
            .ok_or_else(|| QueueError::JobNotFound(delivery.job_id.to_string()))?;

        if record.lease_token.as_ref() != Some(&delivery.lease_token) {
            return Err(QueueError::InvalidLeaseToken);
        }
        Ok(record)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, message: TaskMessage) -> QueueResult<JobId> {
        self.ensure_open()?;

        let job_id = JobId::new();
        let event = JobEvent::Enqueued {
            job_id: job_id.clone(),
            queue: message.queue.clone(),
            job_type: message.job_type.clone(),
            at: Utc::now(),
        };

        {
            let mut state = self.state.lock();
            state
                .queues
                .entry(message.queue.clone())
                .or_default()
                .push_back(job_id.clone());
            state.jobs.insert(job_id.clone(), JobRecord::new(job_id.clone(), message));
        }

        self.emit(event);
        Ok(job_id)
    }

    async fn dequeue(&self, queues: &[&str]) -> QueueResult<Option<Delivery>> {
        self.ensure_open()?;
        let now = Utc::now();

        let delivery = {
            let mut state = self.state.lock();
            let MemoryState { jobs, queues: pending } = &mut *state;
            let mut found = None;

            for queue_name in queues {
                let Some(queue) = pending.get_mut(*queue_name) else {
                    continue;
                };

                let position = queue
                    .iter()
                    .position(|id| jobs.get(id).is_some_and(|r| r.is_deliverable(now)));

                if let Some(index) = position {
                    found = queue.remove(index);
                    break;
                }
            }

            match found.and_then(|id| jobs.get_mut(&id)) {
                Some(record) => {
                    let lease_token = LeaseToken::new();
                    record.start_processing(lease_token.clone());
                    Some(Delivery {
                        job_id: record.job_id.clone(),
                        message: record.message.clone(),
                        attempt: record.attempt,
                        lease_token,
                    })
                }
                None => None,
            }
        };

        if let Some(delivery) = &delivery {
            debug!(job_id = %delivery.job_id, queue = delivery.queue(), attempt = delivery.attempt, "leased message");
            self.emit(JobEvent::Leased {
                job_id: delivery.job_id.clone(),
                attempt: delivery.attempt,
                at: now,
            });
        }

        Ok(delivery)
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.ensure_open()?;

        {
            let mut state = self.state.lock();
            Self::leased_record(&mut state, delivery)?.complete();
        }

        self.emit(JobEvent::Completed {
            job_id: delivery.job_id.clone(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, retry_at: DateTime<Utc>, error: &str) -> QueueResult<()> {
        self.ensure_open()?;

        {
            let mut state = self.state.lock();
            let record = Self::leased_record(&mut state, delivery)?;
            record.schedule_retry(retry_at, error.to_string());
            let queue = record.message.queue.clone();
            state
                .queues
                .entry(queue)
                .or_default()
                .push_back(delivery.job_id.clone());
        }

        self.emit(JobEvent::Retrying {
            job_id: delivery.job_id.clone(),
            retry_at,
            error: error.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn archive(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        self.ensure_open()?;

        {
            let mut state = self.state.lock();
            Self::leased_record(&mut state, delivery)?.archive(error.to_string());
        }

        self.emit(JobEvent::Archived {
            job_id: delivery.job_id.clone(),
            error: error.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    fn event_stream(&self) -> BoxStream<JobEvent> {
        let receiver = self.event_broadcaster.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|result| result.ok());

        Box::pin(stream)
    }
}
