use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::codec::Envelope;
use crate::job::{Job, JobHandler};
use crate::{JobContext, JobError, QueueError, QueueResult};

/// Type-erased route from a job type tag to its handler.
///
/// Each call rebuilds a fresh job instance from the envelope, so no instance
/// is ever shared between invocations.
#[async_trait]
pub trait JobRoute: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Decode the payload and run the handler.
    ///
    /// The outer error is a decoding failure and must not be retried; the
    /// inner one is whatever the handler returned.
    async fn handle(&self, ctx: &JobContext, envelope: &Envelope) -> QueueResult<Result<(), JobError>>;

    /// Decode the payload and run the handler's terminal hook
    async fn failed(&self, ctx: &JobContext, envelope: &Envelope, error: &JobError) -> QueueResult<()>;
}

struct TypedRoute<J, H> {
    handler: H,
    _job: PhantomData<fn() -> J>,
}

#[async_trait]
impl<J, H> JobRoute for TypedRoute<J, H>
where
    J: Job,
    H: JobHandler<J>,
{
    fn job_type(&self) -> &'static str {
        J::JOB_TYPE
    }

    async fn handle(&self, ctx: &JobContext, envelope: &Envelope) -> QueueResult<Result<(), JobError>> {
        let job: J = envelope.to_job()?;
        Ok(self.handler.handle(ctx, &job).await)
    }

    async fn failed(&self, ctx: &JobContext, envelope: &Envelope, error: &JobError) -> QueueResult<()> {
        let job: J = envelope.to_job()?;
        self.handler.failed(ctx, &job, error).await;
        Ok(())
    }
}

/// Maps job type tags to handlers.
///
/// Populated before the worker starts and read-only afterwards; the worker
/// moves it behind an `Arc` on start, so lookups need no locking.
#[derive(Default)]
pub struct JobRegistry {
    routes: HashMap<String, Arc<dyn JobRoute>>,
}

impl JobRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `J`. A second registration for the same type
    /// tag is rejected.
    pub fn register<J, H>(&mut self, handler: H) -> QueueResult<()>
    where
        J: Job,
        H: JobHandler<J>,
    {
        if self.routes.contains_key(J::JOB_TYPE) {
            return Err(QueueError::DuplicateJobType(J::JOB_TYPE.to_string()));
        }

        let route = TypedRoute::<J, H> {
            handler,
            _job: PhantomData,
        };
        self.routes.insert(J::JOB_TYPE.to_string(), Arc::new(route));
        debug!(job_type = J::JOB_TYPE, "registered job route");
        Ok(())
    }

    /// Route for `job_type`, if one was registered
    pub fn resolve(&self, job_type: &str) -> Option<Arc<dyn JobRoute>> {
        self.routes.get(job_type).cloned()
    }

    /// Whether a handler claims `job_type`
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.routes.contains_key(job_type)
    }

    /// Registered type tags, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.routes.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered job types
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True before any handler is registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
