//! Worker pool.
//!
//! A [`Worker`] owns the job registry and a broker connection. `start` spawns
//! `concurrency` slot tasks; each one pulls a message, hands it to the
//! processor and loops, so at most `concurrency` handlers ever run at once.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use dog_jobs::prelude::*;
//! # async fn run(broker: Arc<dyn Broker>) -> QueueResult<()> {
//! let worker = Worker::new(broker, WorkerConfig::from_env())?;
//! // worker.register_job::<MyJob, _>(MyHandler)?;
//! let handle = worker.start()?;
//!
//! tokio::signal::ctrl_c().await.ok();
//! let report = handle.stop().await;
//! if !report.is_clean() {
//!     eprintln!("{} handler(s) abandoned", report.abandoned);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod scheduler;
mod processor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::Broker;
use crate::codec::json::JsonCodec;
use crate::codec::JobCodec;
use crate::config::WorkerConfig;
use crate::job::{Job, JobHandler, JobRegistry};
use crate::observability::WorkerMetrics;
use crate::{QueueError, QueueResult};

pub use scheduler::QueueScheduler;

/// Handler registry plus the settings the pool runs with
pub struct Worker {
    broker: Arc<dyn Broker>,
    codec: Arc<dyn JobCodec>,
    config: WorkerConfig,
    registry: JobRegistry,
}

impl Worker {
    pub fn new(broker: Arc<dyn Broker>, config: WorkerConfig) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self {
            broker,
            codec: Arc::new(JsonCodec),
            config,
            registry: JobRegistry::new(),
        })
    }

    /// Must match the codec the dispatchers encode with
    pub fn with_codec(mut self, codec: Arc<dyn JobCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Route `J::JOB_TYPE` to `handler`. Fails if the type is already taken.
    pub fn register_job<J, H>(&mut self, handler: H) -> QueueResult<()>
    where
        J: Job,
        H: JobHandler<J>,
    {
        self.registry.register::<J, H>(handler)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Spawn the slot tasks on the current tokio runtime and return at once.
    ///
    /// The registry is frozen from here on.
    pub fn start(self) -> QueueResult<WorkerHandle> {
        let runtime = Handle::try_current()
            .map_err(|e| QueueError::Internal(format!("worker must be started inside a tokio runtime: {e}")))?;

        if self.registry.is_empty() {
            warn!("starting worker with no registered job types; every message will be dropped");
        }

        let scheduler = QueueScheduler::new(&self.config.queues, self.config.strict_priority);
        let state = Arc::new(PoolState {
            broker: self.broker,
            codec: self.codec,
            registry: self.registry,
            scheduler,
            metrics: Arc::new(WorkerMetrics::new()),
            shutdown: CancellationToken::new(),
            lifetime: CancellationToken::new(),
            config: self.config,
        });

        let slots = (0..state.config.concurrency)
            .map(|slot| runtime.spawn(run_slot(state.clone(), slot)))
            .collect();

        info!(
            concurrency = state.config.concurrency,
            queues = ?state.scheduler.queue_names(),
            strict_priority = state.config.strict_priority,
            job_types = ?state.registry.registered_types(),
            "worker started"
        );

        Ok(WorkerHandle { state, slots })
    }
}

/// Shared by every slot of a running pool
struct PoolState {
    broker: Arc<dyn Broker>,
    codec: Arc<dyn JobCodec>,
    registry: JobRegistry,
    config: WorkerConfig,
    scheduler: QueueScheduler,
    metrics: Arc<WorkerMetrics>,

    /// Cancelled by `stop`: slots finish their current message and exit
    shutdown: CancellationToken,

    /// Parent of every handler context; cancelled once the stop deadline passes
    lifetime: CancellationToken,
}

async fn run_slot(state: Arc<PoolState>, slot: usize) {
    debug!(slot, "worker slot started");

    // Shutdown is only checked between messages; a leased message is always
    // processed.
    while !state.shutdown.is_cancelled() {
        let pulled = {
            let order = state.scheduler.round();
            state.broker.dequeue(&order).await
        };

        match pulled {
            Ok(Some(delivery)) => state.process(delivery).await,
            Ok(None) => idle(&state).await,
            Err(e) => {
                error!(slot, error = %e, "failed to pull from broker");
                idle(&state).await;
            }
        }
    }

    debug!(slot, "worker slot stopped");
}

async fn idle(state: &PoolState) {
    tokio::select! {
        _ = state.shutdown.cancelled() => {}
        _ = tokio::time::sleep(state.config.poll_interval) => {}
    }
}

/// Outcome of [`WorkerHandle::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Slots whose handler was still running at the deadline
    pub abandoned: usize,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.abandoned == 0
    }
}

/// A running pool
pub struct WorkerHandle {
    state: Arc<PoolState>,
    slots: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        self.state.metrics.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.state.metrics.in_flight()
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.state.registry.registered_types()
    }

    /// Stop pulling and wait for in-flight handlers, up to the configured
    /// shutdown timeout.
    ///
    /// Handlers still running at the deadline are abandoned: their contexts
    /// are cancelled and their tasks detached, but never awaited.
    pub async fn stop(mut self) -> ShutdownReport {
        let started = Instant::now();
        let deadline = self.state.config.shutdown_timeout;
        info!(in_flight = self.in_flight(), timeout_ms = deadline.as_millis() as u64, "stopping worker");

        self.state.shutdown.cancel();

        let abandoned = match tokio::time::timeout(deadline, futures::future::join_all(self.slots.iter_mut())).await {
            Ok(results) => {
                for joined in results {
                    if let Err(e) = joined {
                        error!(error = %e, "worker slot crashed");
                    }
                }
                0
            }
            Err(_) => {
                let abandoned = self.slots.iter().filter(|slot| !slot.is_finished()).count();
                warn!(error = %QueueError::ShutdownTimeout { abandoned }, "abandoning in-flight handlers");
                abandoned
            }
        };

        self.state.lifetime.cancel();
        self.slots.clear();

        let report = ShutdownReport {
            abandoned,
            elapsed: started.elapsed(),
        };
        info!(abandoned = report.abandoned, elapsed_ms = report.elapsed.as_millis() as u64, "worker stopped");
        report
    }
}
