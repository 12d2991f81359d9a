//! Named periodic job slots on the Tokio runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Result of one job run, as reported to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The run finished (or there was nothing to do).
    Success,
    /// The run failed and retrying will not help.
    Failure,
    /// The run failed transiently and should be retried.
    Retry,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Perform one run.
    async fn run(&self) -> JobOutcome;
}

/// Runs jobs periodically under stable names.
///
/// Scheduling under a name that is already in use aborts the previous job
/// first, so a slot never holds more than one job.
pub struct JobScheduler {
    slots: Mutex<HashMap<String, JoinHandle<()>>>,
    retry: RetryPolicy,
}

impl JobScheduler {
    /// Create a scheduler that retries [`JobOutcome::Retry`] runs with `retry`.
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            retry,
        }
    }

    /// Run `job` every `period`, starting after `initial_delay`, in slot `name`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_periodic(
        &self,
        name: &str,
        job: Arc<dyn Job>,
        initial_delay: Duration,
        period: Duration,
    ) {
        let retry = self.retry;
        let slot = name.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = run_with_retry(job.as_ref(), retry).await;
                info!("Job {} finished: {}", slot, outcome);
            }
        });

        if let Some(previous) = self.slots.lock().insert(name.to_string(), handle) {
            previous.abort();
            debug!("Replaced scheduled job {}", name);
        }
        info!(
            "Scheduled job {} every {:?}, first run in {:?}",
            name, period, initial_delay
        );
    }

    /// Stop the job in slot `name`. Returns whether one was scheduled.
    pub fn cancel(&self, name: &str) -> bool {
        match self.slots.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                info!("Cancelled job {}", name);
                true
            }
            None => false,
        }
    }

    /// Whether a live job occupies slot `name`.
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.slots
            .lock()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Run `job` once right away, with the same retry handling as scheduled
    /// runs.
    pub async fn run_now(&self, job: &dyn Job) -> JobOutcome {
        run_with_retry(job, self.retry).await
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.slots.lock().drain() {
            handle.abort();
        }
    }
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.slots.lock().keys().cloned().collect();
        f.debug_struct("JobScheduler")
            .field("slots", &names)
            .field("retry", &self.retry)
            .finish()
    }
}

async fn run_with_retry(job: &dyn Job, retry: RetryPolicy) -> JobOutcome {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = job.run().await;
        if outcome != JobOutcome::Retry {
            return outcome;
        }
        if attempt >= max_attempts {
            warn!("Job still failing after {} attempts", attempt);
            return JobOutcome::Retry;
        }
        let delay = retry.delay(attempt);
        warn!(
            "Job asked to be retried (attempt {}/{}), waiting {:?}",
            attempt, max_attempts, delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingJob {
        runs: AtomicU32,
        outcome: JobOutcome,
    }

    impl CountingJob {
        fn new(outcome: JobOutcome) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicU32::new(0),
                outcome,
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs() {
        let scheduler = JobScheduler::default();
        let job = CountingJob::new(JobOutcome::Success);
        scheduler.schedule_periodic(
            "work",
            job.clone(),
            Duration::from_secs(10),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.runs(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.runs(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(job.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_slot() {
        let scheduler = JobScheduler::default();
        let first = CountingJob::new(JobOutcome::Success);
        let second = CountingJob::new(JobOutcome::Success);

        scheduler.schedule_periodic("work", first.clone(), Duration::from_secs(1), Duration::from_secs(60));
        scheduler.schedule_periodic("work", second.clone(), Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(first.runs(), 0);
        assert_eq!(second.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let scheduler = JobScheduler::default();
        let job = CountingJob::new(JobOutcome::Success);
        scheduler.schedule_periodic("work", job.clone(), Duration::from_secs(1), Duration::from_secs(1));
        assert!(scheduler.is_scheduled("work"));

        assert!(scheduler.cancel("work"));
        assert!(!scheduler.is_scheduled("work"));
        assert!(!scheduler.cancel("work"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_retries_bounded() {
        let scheduler = JobScheduler::new(RetryPolicy::exponential(
            3,
            Duration::from_secs(1),
            Duration::from_secs(4),
        ));
        let job = CountingJob::new(JobOutcome::Retry);
        assert_eq!(scheduler.run_now(job.as_ref()).await, JobOutcome::Retry);
        assert_eq!(job.runs(), 3);

        let failing = CountingJob::new(JobOutcome::Failure);
        assert_eq!(scheduler.run_now(failing.as_ref()).await, JobOutcome::Failure);
        assert_eq!(failing.runs(), 1);
    }
}
