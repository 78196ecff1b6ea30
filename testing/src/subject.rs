//! A passthrough test double for external producers.

use reflux_core::effect::{Effect, Task, TaskContext};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stands in for something that pushes values at the system under test:
/// a socket's receive stream, a notification center, a location manager.
///
/// Each [`effect`](Self::effect) subscribes a task; the test then drives it
/// with [`send`](Self::send) and ends it with [`finish`](Self::finish).
/// Cancelled subscribers are pruned and never see later values.
///
/// # Example
///
/// ```
/// use reflux_core::{Effect, reducer_fn};
/// use reflux_testing::{Subject, TestStore};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Action {
///     Listen,
///     Heard(u8),
/// }
///
/// let messages: Subject<Action> = Subject::new();
/// let source = messages.clone();
///
/// let reducer = reducer_fn(move |state: &mut Vec<u8>, action: Action, _env: &()| match action {
///     Action::Listen => source.effect(),
///     Action::Heard(byte) => {
///         state.push(byte);
///         Effect::none()
///     },
/// });
///
/// let mut store = TestStore::new(Vec::new(), reducer, ());
/// store.send(Action::Listen, |_| {});
///
/// messages.send(Action::Heard(7));
/// store.receive(Action::Heard(7), |state| state.push(7));
///
/// messages.finish();
/// store.finish();
/// ```
pub struct Subject<T> {
    subscribers: Arc<Mutex<Vec<TaskContext<T>>>>,
}

fn lock<T>(subscribers: &Mutex<Vec<TaskContext<T>>>) -> MutexGuard<'_, Vec<TaskContext<T>>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + 'static> Subject<T> {
    /// A subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An effect that forwards every value sent to this subject until
    /// [`finish`](Self::finish) or cancellation.
    #[must_use]
    pub fn effect(&self) -> Effect<T> {
        let subscribers = Arc::clone(&self.subscribers);
        Effect::Task(Task::new(None, move |ctx: TaskContext<T>| {
            lock(&subscribers).push(ctx);
        }))
    }

    /// Forward `value` to every live subscriber.
    pub fn send(&self, value: T)
    where
        T: Clone,
    {
        let live: Vec<TaskContext<T>> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|ctx| !ctx.is_cancelled());
            subscribers.clone()
        };
        tracing::trace!(subscribers = live.len(), "Subject send");
        for ctx in live {
            ctx.send(value.clone());
        }
    }

    /// Complete every subscriber.
    pub fn finish(&self) {
        let finished: Vec<TaskContext<T>> = lock(&self.subscribers).drain(..).collect();
        for ctx in finished {
            ctx.finish();
        }
    }

    /// Number of subscribers that have not been cancelled or finished.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers)
            .iter()
            .filter(|ctx| !ctx.is_cancelled())
            .count()
    }
}

impl<T: Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("subscribers", &lock(&self.subscribers).len())
            .finish()
    }
}
