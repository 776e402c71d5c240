use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::backoff::{after, retry_delay};
use super::PoolState;
use crate::codec::Envelope;
use crate::job::JobRoute;
use crate::{Delivery, JobContext, JobError, QueueError, QueueResult};

impl PoolState {
    /// Run one delivery to completion and settle it with the broker
    #[instrument(
        skip(self, delivery),
        fields(
            job_id = %delivery.job_id,
            job_type = %delivery.job_type(),
            queue = %delivery.queue(),
            attempt = delivery.attempt,
        )
    )]
    pub(super) async fn process(&self, delivery: Delivery) {
        let envelope = match self.codec.decode_envelope(&delivery.message.envelope) {
            Ok(envelope) => envelope,
            Err(e) => return self.drop_message(&delivery, delivery.job_type(), e).await,
        };

        let Some(route) = self.registry.resolve(&envelope.job_type) else {
            let err = QueueError::UnknownJobType(envelope.job_type.clone());
            return self.drop_message(&delivery, &envelope.job_type, err).await;
        };

        let ctx = JobContext::new(
            delivery.job_id.clone(),
            envelope.job_type.clone(),
            delivery.queue(),
            delivery.attempt,
            delivery.max_attempts(),
            self.lifetime.child_token(),
        )
        .with_timeout(delivery.message.timeout.or(self.config.default_timeout));

        let _in_flight = self.metrics.track();
        debug!("handling job");

        let outcome = match self.invoke(&route, &ctx, &envelope).await {
            Ok(outcome) => outcome,
            Err(e) => return self.drop_message(&delivery, &envelope.job_type, e).await,
        };

        match outcome {
            Ok(()) => {
                self.metrics.record_succeeded(&envelope.job_type);
                if let Err(e) = self.broker.ack(&delivery).await {
                    error!(error = %e, "failed to ack job");
                }
                debug!("job completed");
            }
            Err(job_error) if job_error.is_retryable() && !delivery.is_last_attempt() => {
                let delay = retry_delay(self.config.retry_backoff, delivery.attempt);
                let retry_at = after(Utc::now(), delay);
                warn!(error = %job_error, retry_in_ms = delay.as_millis() as u64, "job failed, scheduling retry");

                self.metrics.record_retried(&envelope.job_type);
                if let Err(e) = self.broker.retry(&delivery, retry_at, job_error.message()).await {
                    error!(error = %e, "failed to schedule retry");
                }
            }
            Err(job_error) => {
                error!(
                    error = %job_error,
                    max_retries = delivery.max_attempts(),
                    "job failed permanently"
                );
                self.run_failed_hook(&route, &delivery, &ctx, &envelope, &job_error).await;

                self.metrics.record_failed(&envelope.job_type);
                if let Err(e) = self.broker.archive(&delivery, job_error.message()).await {
                    error!(error = %e, "failed to archive job");
                }
            }
        }
    }

    /// Call the handler under the context's timeout, turning panics and
    /// timeouts into retryable failures
    async fn invoke(
        &self,
        route: &Arc<dyn JobRoute>,
        ctx: &JobContext,
        envelope: &Envelope,
    ) -> QueueResult<Result<(), JobError>> {
        let call = AssertUnwindSafe(route.handle(ctx, envelope)).catch_unwind();

        let caught = match ctx.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(caught) => caught,
                Err(_) => {
                    ctx.cancellation_token().cancel();
                    return Ok(Err(JobError::retryable(format!(
                        "handler timed out after {}ms",
                        limit.as_millis()
                    ))));
                }
            },
            None => call.await,
        };

        match caught {
            Ok(result) => result,
            Err(panic) => Ok(Err(JobError::retryable(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            )))),
        }
    }

    /// Run the terminal hook on a fresh context, so a handler timeout does not
    /// leave it cancelled before it starts. The hook is bounded by the job
    /// timeout, or by the shutdown timeout when the job has none.
    async fn run_failed_hook(
        &self,
        route: &Arc<dyn JobRoute>,
        delivery: &Delivery,
        handler_ctx: &JobContext,
        envelope: &Envelope,
        err: &JobError,
    ) {
        let ctx = JobContext::new(
            delivery.job_id.clone(),
            handler_ctx.job_type.clone(),
            handler_ctx.queue.clone(),
            handler_ctx.attempt,
            handler_ctx.max_retries,
            self.lifetime.child_token(),
        )
        .with_timeout(handler_ctx.timeout);
        let limit = ctx.timeout.unwrap_or(self.config.shutdown_timeout);

        let hook = AssertUnwindSafe(route.failed(&ctx, envelope, err)).catch_unwind();
        match tokio::time::timeout(limit, hook).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "failed hook could not decode job"),
            Ok(Err(panic)) => error!(panic = %panic_message(panic.as_ref()), "failed hook panicked"),
            Err(_) => {
                ctx.cancellation_token().cancel();
                error!(timeout_ms = limit.as_millis() as u64, "failed hook timed out");
            }
        }
    }

    /// Archive a message that can never be handled
    async fn drop_message(&self, delivery: &Delivery, job_type: &str, err: QueueError) {
        error!(error = %err, "dropping undeliverable message");
        self.metrics.record_dropped(job_type);

        if let Err(e) = self.broker.archive(delivery, &err.to_string()).await {
            error!(error = %e, "failed to archive dropped message");
        } else {
            info!("message archived");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
