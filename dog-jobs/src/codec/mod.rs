//! Wire envelope for jobs.
//!
//! Every message on the broker is an [`Envelope`]: the job's type tag plus its
//! own serialized fields, `{"type": "log:create", "data": {...}}`. Decoding is
//! two-phase. The outer shape is parsed first so the worker can route on the
//! tag, then `data` is deserialized into the concrete job registered for it.

pub mod json;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Job, QueueError, QueueResult};

/// The `{type, data}` record carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub job_type: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(job_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            data,
        }
    }

    /// Wrap a job, tagging it with its own type
    pub fn from_job<J: Job>(job: &J) -> QueueResult<Self> {
        let data = serde_json::to_value(job)?;
        Ok(Self::new(job.job_type(), data))
    }

    /// Rebuild a fresh job instance from `data`
    pub fn to_job<J: DeserializeOwned>(&self) -> QueueResult<J> {
        J::deserialize(&self.data).map_err(|e| QueueError::PayloadMismatch {
            job_type: self.job_type.clone(),
            reason: e.to_string(),
        })
    }
}

/// Byte-level envelope format
pub trait JobCodec: Send + Sync {
    fn encode_envelope(&self, envelope: &Envelope) -> QueueResult<Vec<u8>>;

    /// Parse the outer shape; failures are [`QueueError::EnvelopeMalformed`]
    fn decode_envelope(&self, bytes: &[u8]) -> QueueResult<Envelope>;

    fn codec_id(&self) -> &'static str;

    /// Encode a job as `{type: job.job_type(), data: job}`
    fn encode<J: Job>(&self, job: &J) -> QueueResult<Vec<u8>>
    where
        Self: Sized,
    {
        self.encode_envelope(&Envelope::from_job(job)?)
    }

    /// Decode straight into a known job type
    fn decode<J: DeserializeOwned>(&self, bytes: &[u8]) -> QueueResult<J>
    where
        Self: Sized,
    {
        self.decode_envelope(bytes)?.to_job()
    }
}
