use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::job::{Job, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE};
use crate::worker::backoff::after;

/// One modifier applied to an outgoing job
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOption {
    /// Run after a delay from submission
    Delay(Duration),
    /// Run at an absolute time
    ProcessAt(DateTime<Utc>),
    Queue(String),
    /// Total execution attempts; 0 means the default
    MaxRetries(u32),
    /// Hard timeout for each execution attempt
    Timeout(Duration),
}

/// Ordered list of dispatch modifiers.
///
/// Options are applied in insertion order on top of the job's own defaults,
/// so a later option wins over an earlier one touching the same field.
/// `Delay` and `ProcessAt` both set the schedule.
///
/// ```rust
/// use std::time::Duration;
/// use dog_jobs::DispatchOptions;
///
/// let options = DispatchOptions::new()
///     .queue("critical")
///     .max_retries(5)
///     .timeout(Duration::from_secs(30));
/// assert_eq!(options.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOptions {
    options: Vec<DispatchOption>,
}

/// Final submission parameters for one job
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDispatch {
    pub queue: String,
    pub max_retries: u32,
    pub process_at: DateTime<Utc>,
    pub timeout: Option<Duration>,
}

enum Schedule {
    In(Duration),
    At(DateTime<Utc>),
}

impl DispatchOptions {
    /// No options: the job's own defaults apply
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `option`; later options win over earlier ones
    pub fn with(mut self, option: DispatchOption) -> Self {
        self.options.push(option);
        self
    }

    /// Hold the message back for `delay` from dispatch time
    pub fn delay(self, delay: Duration) -> Self {
        self.with(DispatchOption::Delay(delay))
    }

    /// Make the message deliverable no earlier than `at`
    pub fn process_at(self, at: DateTime<Utc>) -> Self {
        self.with(DispatchOption::ProcessAt(at))
    }

    /// Route to `queue` instead of the job's default queue
    pub fn queue(self, queue: impl Into<String>) -> Self {
        self.with(DispatchOption::Queue(queue.into()))
    }

    /// Total attempts allowed; 0 falls back to the default
    pub fn max_retries(self, max_retries: u32) -> Self {
        self.with(DispatchOption::MaxRetries(max_retries))
    }

    /// Per-attempt deadline for the handler
    pub fn timeout(self, timeout: Duration) -> Self {
        self.with(DispatchOption::Timeout(timeout))
    }

    /// Put `option` in front, so everything already in the list overrides it
    pub fn prepend(mut self, option: DispatchOption) -> Self {
        self.options.insert(0, option);
        self
    }

    /// Options in application order
    pub fn iter(&self) -> impl Iterator<Item = &DispatchOption> {
        self.options.iter()
    }

    /// Number of options collected
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// True when no option was given
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Merge the job's defaults with every option, in order
    pub fn resolve<J: Job>(&self, job: &J, now: DateTime<Utc>) -> ResolvedDispatch {
        let mut queue = job.queue().to_string();
        let mut max_retries = job.max_retries();
        let mut schedule = Schedule::In(job.delay());
        let mut timeout = None;

        for option in &self.options {
            match option {
                DispatchOption::Delay(delay) => schedule = Schedule::In(*delay),
                DispatchOption::ProcessAt(at) => schedule = Schedule::At(*at),
                DispatchOption::Queue(name) => queue = name.clone(),
                DispatchOption::MaxRetries(n) => max_retries = *n,
                DispatchOption::Timeout(t) => timeout = Some(*t),
            }
        }

        if queue.is_empty() {
            queue = DEFAULT_QUEUE.to_string();
        }
        if max_retries == 0 {
            max_retries = DEFAULT_MAX_RETRIES;
        }

        let process_at = match schedule {
            Schedule::In(delay) => after(now, delay),
            Schedule::At(at) => at,
        };

        ResolvedDispatch {
            queue,
            max_retries,
            process_at,
            timeout,
        }
    }
}

impl From<Vec<DispatchOption>> for DispatchOptions {
    fn from(options: Vec<DispatchOption>) -> Self {
        Self { options }
    }
}

impl FromIterator<DispatchOption> for DispatchOptions {
    fn from_iter<I: IntoIterator<Item = DispatchOption>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}
