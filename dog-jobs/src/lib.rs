//! # dog-jobs: typed background jobs for DogRS
//!
//! Producers describe units of work as plain serializable structs, submit them
//! through a [`Dispatcher`] and forget about them. A [`Worker`] on the other
//! side of the broker pulls messages, rebuilds the job from its envelope and
//! runs the handler registered for its type, retrying failures with a linear
//! backoff until the retry budget runs out.
//!
//! ## Features
//!
//! - **Typed jobs**: one `Job` impl and one `JobHandler` per job type, routed
//!   by a stable string tag carried in a `{type, data}` envelope
//! - **Dispatch options**: delay, absolute schedule, queue, retry budget and
//!   per-job timeout, combined last-wins
//! - **Weighted queues**: every queue is polled every round, heavier queues
//!   first more often; strict priority is available as well
//! - **Bounded concurrency**: a fixed pool of slots, each running at most one
//!   handler
//! - **Graceful stop**: in-flight handlers get a configurable deadline, after
//!   which they are abandoned and their contexts cancelled
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dog_jobs::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct CreateLog {
//!     message: String,
//! }
//!
//! impl Job for CreateLog {
//!     const JOB_TYPE: &'static str = "log:create";
//! }
//!
//! struct CreateLogHandler;
//!
//! #[async_trait]
//! impl JobHandler<CreateLog> for CreateLogHandler {
//!     async fn handle(&self, _ctx: &JobContext, job: &CreateLog) -> Result<(), JobError> {
//!         println!("{}", job.message);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> QueueResult<()> {
//! let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
//!
//! let mut worker = Worker::new(broker.clone(), WorkerConfig::default())?;
//! worker.register_job::<CreateLog, _>(CreateLogHandler)?;
//! let handle = worker.start()?;
//!
//! let dispatcher = Dispatcher::new(broker);
//! dispatcher
//!     .dispatch(&CreateLog { message: "hello".into() }, DispatchOptions::new().max_retries(5))
//!     .await?;
//!
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod observability;
pub mod types;
pub mod worker;

pub use backend::Broker;
pub use codec::json::JsonCodec;
pub use codec::{Envelope, JobCodec};
pub use config::{BrokerConfig, WorkerConfig};
pub use dispatch::{DispatchOption, DispatchOptions, Dispatcher, ResolvedDispatch};
pub use error::{JobError, QueueError, QueueResult};
pub use job::{Job, JobHandler, JobRegistry, JobRoute, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE};
pub use observability::{JobTypeMetrics, MetricsSnapshot, WorkerMetrics};
pub use types::{Delivery, JobContext, JobEvent, JobId, JobRecord, JobStatus, LeaseToken, TaskMessage};
pub use worker::{ShutdownReport, Worker, WorkerHandle};

#[cfg(feature = "memory")]
pub use backend::memory::{BrokerStats, MemoryBroker, RecordReaper};

#[cfg(feature = "tracing-basic")]
pub use observability::init_tracing;

/// Everything needed to define, dispatch and run jobs
pub mod prelude {
    pub use crate::{
        Broker, BrokerConfig, DispatchOption, DispatchOptions, Dispatcher, Job, JobContext, JobError, JobHandler,
        JobId, QueueError, QueueResult, Worker, WorkerConfig, WorkerHandle,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryBroker;

    pub use async_trait::async_trait;
}
