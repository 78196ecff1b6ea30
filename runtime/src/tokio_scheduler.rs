//! Real-time scheduler backed by a tokio runtime.

use crate::error::SchedulerError;
use reflux_core::cancellation::CancelHandle;
use reflux_core::scheduler::{AnyScheduler, Scheduler, Work};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Runs work on a tokio runtime after real delays.
///
/// Each scheduled item is its own tokio task that sleeps, then runs the
/// work unless cancelled. Cancelling the returned handle aborts the task.
///
/// Work runs on tokio worker threads; actions it emits re-enter the store
/// through the store's pump, so reducers still never run concurrently.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    name: Cow<'static, str>,
}

impl TokioScheduler {
    /// Schedule onto the runtime behind `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            name: Cow::Borrowed("tokio"),
        }
    }

    /// Schedule onto the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulerError::NoRuntime)
    }

    /// Rename the scheduler (shows up in logs).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Shared instance, ready to be placed in an environment.
    #[must_use]
    pub fn shared(self) -> AnyScheduler {
        Arc::new(self)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) -> CancelHandle {
        let cancel = CancelHandle::new();
        let guard = cancel.clone();
        let scheduler = self.name.clone();

        let task = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if guard.is_cancelled() {
                tracing::trace!(%scheduler, "Skipping cancelled work");
                return;
            }
            work();
        });

        let abort = task.abort_handle();
        cancel.on_cancel(move || abort.abort());
        cancel
    }

    fn name(&self) -> &str {
        &self.name
    }
}
