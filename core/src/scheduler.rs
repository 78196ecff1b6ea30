//! Schedulers decide *when* effect work runs.
//!
//! Every asynchronous effect is bound to a [`Scheduler`]. Swapping the
//! scheduler held by an environment is how production code, tests and
//! previews run the same reducer on different timelines:
//!
//! - [`ImmediateScheduler`]: runs work synchronously, ignoring delays
//! - [`UnimplementedScheduler`]: fails loudly when used
//! - `TokioScheduler` (runtime crate): real time on a tokio runtime
//! - `TestScheduler` (testing crate): virtual time advanced by the test

use crate::cancellation::CancelHandle;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// A unit of work handed to a scheduler.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Shared, type-erased scheduler as stored in environments.
pub type AnyScheduler = Arc<dyn Scheduler>;

/// Runs units of work after a delay on some timeline.
///
/// Work whose returned [`CancelHandle`] is cancelled before it fires must
/// never run.
pub trait Scheduler: Send + Sync {
    /// Run `work` once `delay` has elapsed on this scheduler's timeline.
    fn schedule_after(&self, delay: Duration, work: Work) -> CancelHandle;

    /// Run `work` as soon as the scheduler gets to it.
    fn schedule_now(&self, work: Work) -> CancelHandle {
        self.schedule_after(Duration::ZERO, work)
    }

    /// Human readable name, used in logs.
    fn name(&self) -> &str;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule_after(&self, delay: Duration, work: Work) -> CancelHandle {
        (**self).schedule_after(delay, work)
    }

    fn schedule_now(&self, work: Work) -> CancelHandle {
        (**self).schedule_now(work)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Runs every piece of work synchronously on the calling thread.
///
/// Delays are ignored. Useful in tests that don't care about time, where a
/// virtual-time scheduler would only add `advance` calls.
///
/// The returned handle is already spent: cancelling it has no effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// Shared instance, ready to be placed in an environment.
    #[must_use]
    pub fn shared() -> AnyScheduler {
        Arc::new(Self)
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) -> CancelHandle {
        tracing::trace!(?delay, "Running work immediately");
        work();
        CancelHandle::new()
    }

    fn name(&self) -> &str {
        "immediate"
    }
}

/// A scheduler that must never be used.
///
/// Environments built for tests default every scheduler to this, so a test
/// that exercises a code path touching time without providing a real
/// scheduler fails with a message naming the missing dependency.
///
/// # Panics
///
/// Every `schedule_*` call panics.
#[derive(Debug, Clone)]
pub struct UnimplementedScheduler {
    name: Cow<'static, str>,
}

impl UnimplementedScheduler {
    /// Create a scheduler that reports `name` when invoked.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Shared instance, ready to be placed in an environment.
    #[must_use]
    pub fn shared(name: impl Into<Cow<'static, str>>) -> AnyScheduler {
        Arc::new(Self::new(name))
    }
}

impl Default for UnimplementedScheduler {
    fn default() -> Self {
        Self::new("unimplemented")
    }
}

impl Scheduler for UnimplementedScheduler {
    #[allow(clippy::panic)] // Invoking this scheduler is a test bug by contract
    fn schedule_after(&self, delay: Duration, _work: Work) -> CancelHandle {
        panic!(
            "UnimplementedScheduler {:?} was invoked (delay: {delay:?})",
            self.name
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}
