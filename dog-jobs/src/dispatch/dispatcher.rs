use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::backend::Broker;
use crate::codec::{json::JsonCodec, Envelope, JobCodec};
use crate::dispatch::{DispatchOption, DispatchOptions};
use crate::{Job, JobId, QueueError, QueueResult, TaskMessage};

/// Submits jobs to a broker.
///
/// Holds no mutable state; clone it freely and call it from any task.
#[derive(Clone)]
pub struct Dispatcher {
    broker: Arc<dyn Broker>,
    codec: Arc<dyn JobCodec>,
}

impl Dispatcher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            codec: Arc::new(JsonCodec),
        }
    }

    /// Use a different envelope codec; workers must be configured to match
    pub fn with_codec(mut self, codec: Arc<dyn JobCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Encode `job` and enqueue it with its defaults overridden by `options`
    #[instrument(skip(self, job, options), fields(job_type = J::JOB_TYPE))]
    pub async fn dispatch<J: Job>(&self, job: &J, options: DispatchOptions) -> QueueResult<JobId> {
        let envelope = Envelope::from_job(job).map_err(|e| wrap(job.job_type(), e))?;
        let bytes = self
            .codec
            .encode_envelope(&envelope)
            .map_err(|e| wrap(job.job_type(), e))?;

        let resolved = options.resolve(job, Utc::now());
        let mut message = TaskMessage::new(job.job_type(), resolved.queue, bytes, resolved.max_retries)
            .with_process_at(resolved.process_at);
        message.timeout = resolved.timeout;

        let queue = message.queue.clone();
        match self.broker.enqueue(message).await {
            Ok(job_id) => {
                info!(%job_id, %queue, "dispatched job");
                Ok(job_id)
            }
            Err(e) => {
                warn!(%queue, error = %e, "broker rejected job");
                Err(wrap(job.job_type(), e))
            }
        }
    }

    /// Dispatch after `delay`; options in `options` still take precedence
    pub async fn dispatch_later<J: Job>(&self, job: &J, delay: Duration, options: DispatchOptions) -> QueueResult<JobId> {
        self.dispatch(job, options.prepend(DispatchOption::Delay(delay))).await
    }

    /// Dispatch to run at `at`
    pub async fn dispatch_at<J: Job>(&self, job: &J, at: DateTime<Utc>, options: DispatchOptions) -> QueueResult<JobId> {
        self.dispatch(job, options.prepend(DispatchOption::ProcessAt(at))).await
    }

    /// Dispatch onto an explicit queue
    pub async fn dispatch_on_queue<J: Job>(
        &self,
        job: &J,
        queue: impl Into<String>,
        options: DispatchOptions,
    ) -> QueueResult<JobId> {
        self.dispatch(job, options.prepend(DispatchOption::Queue(queue.into())))
            .await
    }
}

/// Tag errors with the job type; a missing broker is reported as-is
fn wrap(job_type: &str, error: QueueError) -> QueueError {
    match error {
        QueueError::BrokerUnavailable => QueueError::BrokerUnavailable,
        other => QueueError::Enqueue {
            job_type: job_type.to_string(),
            source: Box::new(other),
        },
    }
}
