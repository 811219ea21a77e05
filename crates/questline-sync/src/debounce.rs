//! Single-slot trailing debounce.
//!
//! At most one job is armed at a time. Scheduling a new job cancels the
//! armed one and restarts the quiet period, so a burst of schedules runs
//! only the last job, once, after the burst goes quiet.
//!
//! Cancellation only reaches a job that is still waiting out its delay.
//! Once the delay elapses the job runs on its own detached task, so a
//! remote write that has started is never torn down halfway.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// An owned, cancellable trailing-debounce timer.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// The quiet period.
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm `job` to run after the quiet period, replacing any armed job.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(job);
        }));
    }

    /// Disarm the pending job. Returns whether one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether a job is armed and still waiting.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
