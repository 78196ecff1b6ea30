//! # Reflux Runtime
//!
//! Runtime implementation for the Reflux architecture.
//!
//! This crate provides the [`Store`](store::Store) that coordinates reducer
//! execution and effect handling, plus a real-time scheduler on tokio.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, serializes actions through a single pump and
//!   interprets effects
//! - **Effect Interpreter**: Starts effect descriptions and feeds emitted
//!   actions back into the pump (or into an [`ActionInbox`] when recording)
//! - **`TokioScheduler`**: Real-time scheduling on a tokio runtime
//!
//! ## Example
//!
//! ```ignore
//! use reflux_runtime::{Store, TokioScheduler};
//!
//! let store = Store::new(
//!     CounterState::default(),
//!     CounterReducer,
//!     CounterEnvironment {
//!         main_queue: TokioScheduler::current()?.shared(),
//!     },
//! );
//!
//! // Send an action
//! store.send(CounterAction::Decrement)?;
//!
//! // Read state
//! let count = store.state(|s| s.count);
//! ```

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Metrics recorded by the store
pub mod metrics;

/// Store runtime
pub mod store;

/// Real-time scheduler on tokio
pub mod tokio_scheduler;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after `shutdown()`.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }

    /// Errors constructing a scheduler
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum SchedulerError {
        /// No tokio runtime is running on the current thread
        #[error("No tokio runtime is available on this thread")]
        NoRuntime,
    }
}

pub use error::{SchedulerError, StoreError};
pub use store::Store;
pub use tokio_scheduler::TokioScheduler;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use reflux_runtime::StoreConfig;
///
/// let config = StoreConfig::new("checkout").with_queue_warn_threshold(64);
/// assert_eq!(config.label(), "checkout");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    label: Cow<'static, str>,
    queue_warn_threshold: usize,
}

impl StoreConfig {
    /// Default pump backlog before a warning is logged.
    pub const DEFAULT_QUEUE_WARN_THRESHOLD: usize = 1024;

    /// Create a configuration for a store named `label`.
    ///
    /// The label appears in tracing spans and as the `store` metrics label.
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            queue_warn_threshold: Self::DEFAULT_QUEUE_WARN_THRESHOLD,
        }
    }

    /// Set the label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Warn when more than `threshold` actions are waiting in the pump
    #[must_use]
    pub const fn with_queue_warn_threshold(mut self, threshold: usize) -> Self {
        self.queue_warn_threshold = threshold;
        self
    }

    /// The store label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The pump backlog warning threshold
    #[must_use]
    pub const fn queue_warn_threshold(&self) -> usize {
        self.queue_warn_threshold
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("store")
    }
}

/// Actions emitted by effects of a recording store.
///
/// A store built with [`Store::recording`] doesn't feed effect output back
/// into its reducer; it pushes it here instead, in production order, for a
/// test harness to consume. Clones share the same queue.
pub struct ActionInbox<A> {
    queue: Arc<Mutex<VecDeque<A>>>,
}

impl<A> ActionInbox<A> {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub(crate) fn push(&self, action: A) {
        lock(&self.queue).push_back(action);
    }

    /// Take the oldest action.
    #[must_use]
    pub fn pop_front(&self) -> Option<A> {
        lock(&self.queue).pop_front()
    }

    /// Put an action back at the head of the queue.
    pub fn push_front(&self, action: A) {
        lock(&self.queue).push_front(action);
    }

    /// Take every action, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<A> {
        lock(&self.queue).drain(..).collect()
    }

    /// Number of actions waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }

    /// `Debug` rendering of every waiting action, oldest first.
    #[must_use]
    pub fn describe(&self) -> Vec<String>
    where
        A: fmt::Debug,
    {
        lock(&self.queue).iter().map(|action| format!("{action:?}")).collect()
    }
}

impl<A> Clone for ActionInbox<A> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for ActionInbox<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(lock(&self.queue).iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builders() {
        let config = StoreConfig::default()
            .with_label("web-socket")
            .with_queue_warn_threshold(8);
        assert_eq!(config.label(), "web-socket");
        assert_eq!(config.queue_warn_threshold(), 8);
        assert_eq!(
            StoreConfig::default().queue_warn_threshold(),
            StoreConfig::DEFAULT_QUEUE_WARN_THRESHOLD
        );
    }

    #[test]
    fn inbox_is_fifo_and_shared() {
        let inbox = ActionInbox::new();
        let clone = inbox.clone();
        inbox.push(1);
        inbox.push(2);
        clone.push(3);

        assert_eq!(inbox.describe(), vec!["1", "2", "3"]);
        assert_eq!(clone.pop_front(), Some(1));
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox.drain(), vec![2, 3]);
        assert!(clone.is_empty());
    }
}
