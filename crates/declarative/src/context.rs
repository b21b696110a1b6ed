//! Apply context and provider traits
//!
//! These let the lifecycle run without depending on a specific UI,
//! logger or scheduler. The caller decides where progress goes and how
//! long a pass may take.

use crate::diff::Decision;
use crate::error::LifecycleError;
use crate::types::Outcome;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep while waiting, so cancellation is noticed promptly
const SLICE: Duration = Duration::from_millis(100);

/// Progress callback for lifecycle operations
///
/// Implement this trait to receive structured notifications. These are
/// observability hooks only; nothing depends on them for control flow.
pub trait ProgressCallback: Send {
    /// Called when a reconcile pass has decided what to do
    fn on_decision(&mut self, title: &str, decision: Decision);

    /// Called for each progress message a component emits
    fn on_message(&mut self, message: &str);

    /// Called when a pass finishes successfully
    fn on_complete(&mut self, title: &str, outcome: Outcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_decision(&mut self, _title: &str, _decision: Decision) {}
    fn on_message(&mut self, _message: &str) {}
    fn on_complete(&mut self, _title: &str, _outcome: Outcome) {}
}

/// Progress callback that forwards to the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_decision(&mut self, title: &str, decision: Decision) {
        if decision.is_change() {
            log::info!("{title}: {decision}");
        } else {
            log::debug!("{title}: {decision}");
        }
    }

    fn on_message(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn on_complete(&mut self, title: &str, outcome: Outcome) {
        if outcome.is_change() {
            log::info!("{title}: {outcome}");
        } else {
            log::debug!("{title}: {outcome}");
        }
    }
}

/// Cooperative cancellation flag shared between the caller and a pass
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; waits in progress return `Cancelled`
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context passed to deploy and remove operations
pub struct ApplyContext<'a> {
    /// Where progress messages go
    pub progress: &'a mut dyn ProgressCallback,
    /// Absolute point after which waits fail with `Timeout`
    pub deadline: Option<Instant>,
    /// Cancellation flag checked while waiting
    pub cancel: CancelToken,
}

impl<'a> ApplyContext<'a> {
    /// Create a context with no deadline
    pub fn new(progress: &'a mut dyn ProgressCallback) -> Self {
        Self {
            progress,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Share a cancellation token with the caller
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Emit a progress message
    pub fn log(&mut self, message: &str) {
        self.progress.on_message(message);
    }

    /// Time left before the caller's deadline, if one was set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail with `Cancelled` or `Timeout` if the pass must stop now
    pub fn checkpoint(&self, resource: &str, started: Instant) -> Result<(), LifecycleError> {
        if self.cancel.is_cancelled() {
            return Err(LifecycleError::Cancelled {
                resource: resource.to_string(),
            });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LifecycleError::Timeout {
                resource: resource.to_string(),
                waited: started.elapsed(),
            });
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early to honor cancellation and the deadline
    pub fn pause(&self, resource: &str, duration: Duration) -> Result<(), LifecycleError> {
        let started = Instant::now();
        loop {
            self.checkpoint(resource, started)?;
            let left = duration.saturating_sub(started.elapsed());
            if left.is_zero() {
                return Ok(());
            }
            let mut step = left.min(SLICE);
            if let Some(remaining) = self.remaining() {
                step = step.min(remaining);
            }
            thread::sleep(step);
        }
    }
}
