pub mod registry;

pub use registry::{JobRegistry, JobRoute};

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{JobContext, JobError};

/// Queue a job lands on when neither the job nor the caller picks one
pub const DEFAULT_QUEUE: &str = "default";

/// Execution attempts allowed when a job or option leaves the limit at 0
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A typed, serializable unit of work.
///
/// The serialized fields are the job's payload. `JOB_TYPE` is the routing tag
/// written into every envelope; it must stay stable for as long as messages of
/// this type may be in flight.
///
/// ```rust
/// use dog_jobs::Job;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct CreateLog {
///     loggable_id: i64,
///     action: String,
/// }
///
/// impl Job for CreateLog {
///     const JOB_TYPE: &'static str = "log:create";
///     const QUEUE: &'static str = "logs";
/// }
/// ```
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Job type identifier for dispatch
    const JOB_TYPE: &'static str;

    /// Default queue
    const QUEUE: &'static str = DEFAULT_QUEUE;

    /// Default execution attempts; 0 means [`DEFAULT_MAX_RETRIES`]
    const MAX_RETRIES: u32 = DEFAULT_MAX_RETRIES;

    fn job_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    /// Queue for this instance. Override to route per instance.
    fn queue(&self) -> &str {
        Self::QUEUE
    }

    /// Delay before the job becomes eligible. Zero runs immediately.
    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    fn max_retries(&self) -> u32 {
        Self::MAX_RETRIES
    }
}

/// Executes jobs of one type.
///
/// Delivery is at-least-once, so `handle` must be idempotent: a message whose
/// handler succeeded can be delivered again if the acknowledgment was lost.
#[async_trait]
pub trait JobHandler<J: Job>: Send + Sync + 'static {
    async fn handle(&self, ctx: &JobContext, job: &J) -> Result<(), JobError>;

    /// Terminal hook, invoked once when the retry budget is exhausted or the
    /// handler returned [`JobError::Permanent`]. Panics here are caught and
    /// logged by the worker.
    async fn failed(&self, _ctx: &JobContext, _job: &J, _error: &JobError) {}
}
