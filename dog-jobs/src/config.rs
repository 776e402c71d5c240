//! Worker and broker configuration.
//!
//! Everything has a default, and `from_env` overrides individual values:
//!
//! ```bash
//! export QUEUE_CONCURRENCY=20
//! export QUEUE_QUEUES="critical=6,default=3,low=1"
//! export QUEUE_SHUTDOWN_TIMEOUT_SECS=30
//! ```
//!
//! Unset or unparsable variables keep the default.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::Broker;
use crate::{QueueError, QueueResult};

/// Configuration for the worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of handler invocations in flight
    pub concurrency: usize,

    /// Queue name -> relative weight
    pub queues: BTreeMap<String, u32>,

    /// Always poll queues by descending weight instead of weighted-random order
    pub strict_priority: bool,

    /// How long `stop` waits for in-flight handlers before abandoning them
    pub shutdown_timeout: Duration,

    /// Sleep between polls when every queue is empty
    pub poll_interval: Duration,

    /// Base of the linear retry backoff (`attempt * retry_backoff`)
    pub retry_backoff: Duration,

    /// Timeout applied to jobs dispatched without one
    pub default_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            queues: BTreeMap::from([(crate::job::DEFAULT_QUEUE.to_string(), 1)]),
            strict_priority: false,
            shutdown_timeout: Duration::from_secs(8),
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
            default_timeout: None,
        }
    }
}

impl WorkerConfig {
    /// Defaults overridden by `QUEUE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(concurrency) = env_parse::<usize>("QUEUE_CONCURRENCY") {
            config.concurrency = concurrency;
        }
        if let Ok(raw) = env::var("QUEUE_QUEUES") {
            match parse_queue_weights(&raw) {
                Ok(queues) => config.queues = queues,
                Err(e) => warn!(value = %raw, error = %e, "ignoring QUEUE_QUEUES"),
            }
        }
        if let Some(strict) = env_parse::<bool>("QUEUE_STRICT_PRIORITY") {
            config.strict_priority = strict;
        }
        if let Some(secs) = env_parse::<u64>("QUEUE_SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>("QUEUE_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("QUEUE_RETRY_BACKOFF_MS") {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("QUEUE_DEFAULT_TIMEOUT_SECS") {
            config.default_timeout = Some(Duration::from_secs(secs));
        }

        config
    }

    /// Number of slots, and so the cap on concurrent handlers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replace the queue map
    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        self.queues = queues.into_iter().map(|(name, weight)| (name.into(), weight)).collect();
        self
    }

    /// Always drain heavier queues first instead of sampling by weight
    pub fn with_strict_priority(mut self, strict: bool) -> Self {
        self.strict_priority = strict;
        self
    }

    /// How long `stop` waits for in-flight handlers
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Handler deadline for jobs dispatched without one
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Reject settings the pool cannot run with
    pub fn validate(&self) -> QueueResult<()> {
        if self.concurrency == 0 {
            return Err(QueueError::InvalidConfig("concurrency must be greater than 0".into()));
        }
        if self.queues.is_empty() {
            return Err(QueueError::InvalidConfig("at least one queue is required".into()));
        }
        if let Some((name, _)) = self.queues.iter().find(|(_, weight)| **weight == 0) {
            return Err(QueueError::InvalidConfig(format!("queue '{name}' must have a positive weight")));
        }
        if self.queues.keys().any(|name| name.is_empty()) {
            return Err(QueueError::InvalidConfig("queue names must not be empty".into()));
        }
        Ok(())
    }
}

/// Where the broker lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker address, e.g. `memory://`
    pub url: String,

    pub password: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "memory://".to_string(),
            password: None,
        }
    }
}

impl BrokerConfig {
    /// Defaults overridden by `BROKER_URL` and `BROKER_PASSWORD`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("BROKER_URL") {
            config.url = url;
        }
        config.password = env::var("BROKER_PASSWORD").ok().filter(|p| !p.is_empty());
        config
    }

    pub fn scheme(&self) -> &str {
        self.url.split_once("://").map_or("", |(scheme, _)| scheme)
    }

    /// Open a broker for this address
    pub fn connect(&self) -> QueueResult<Arc<dyn Broker>> {
        match self.scheme() {
            #[cfg(feature = "memory")]
            "memory" => Ok(Arc::new(crate::backend::memory::MemoryBroker::new())),
            other => Err(QueueError::BackendUnsupported(format!("broker scheme '{other}'"))),
        }
    }
}

/// Parse `name=weight,name=weight`
pub fn parse_queue_weights(raw: &str) -> QueueResult<BTreeMap<String, u32>> {
    let mut queues = BTreeMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, weight) = entry
            .split_once('=')
            .ok_or_else(|| QueueError::InvalidConfig(format!("expected name=weight, got '{entry}'")))?;
        let weight = weight
            .trim()
            .parse::<u32>()
            .map_err(|e| QueueError::InvalidConfig(format!("bad weight for queue '{}': {e}", name.trim())))?;
        queues.insert(name.trim().to_string(), weight);
    }

    if queues.is_empty() {
        return Err(QueueError::InvalidConfig("no queues given".into()));
    }
    Ok(queues)
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.queues.get("default"), Some(&1));
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_validation() {
        let zero = WorkerConfig::default().with_concurrency(0);
        assert!(matches!(zero.validate(), Err(QueueError::InvalidConfig(_))));

        let empty = WorkerConfig::default().with_queues(Vec::<(String, u32)>::new());
        assert!(matches!(empty.validate(), Err(QueueError::InvalidConfig(_))));

        let zero_weight = WorkerConfig::default().with_queues([("critical", 6), ("low", 0)]);
        assert!(matches!(zero_weight.validate(), Err(QueueError::InvalidConfig(msg)) if msg.contains("low")));
    }

    #[test]
    fn test_parse_queue_weights() {
        let queues = parse_queue_weights("critical=6, default=3,low=1").unwrap();
        assert_eq!(queues.len(), 3);
        assert_eq!(queues["critical"], 6);
        assert_eq!(queues["default"], 3);
        assert_eq!(queues["low"], 1);

        assert!(parse_queue_weights("critical").is_err());
        assert!(parse_queue_weights("critical=high").is_err());
        assert!(parse_queue_weights("").is_err());
    }

    #[test]
    fn test_broker_scheme() {
        let config = BrokerConfig::default();
        assert_eq!(config.scheme(), "memory");
        assert!(config.connect().is_ok());

        let redis = BrokerConfig {
            url: "redis://127.0.0.1:6379".into(),
            password: None,
        };
        assert!(matches!(redis.connect(), Err(QueueError::BackendUnsupported(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: WorkerConfig = serde_json::from_str(r#"{"concurrency": 4}"#).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.queues, WorkerConfig::default().queues);
    }
}
