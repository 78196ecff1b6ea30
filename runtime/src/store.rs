//! The Store - runtime coordinator for a reducer
//!
//! The store owns state, reducer and environment. Every action, whether sent
//! from outside or emitted by an effect, goes through one pump so the
//! reducer never runs concurrently with itself.

use crate::metrics::{ACTIONS, EFFECTS_CANCELLED, EFFECTS_STARTED, REDUCER_DURATION, SENDS_REJECTED};
use crate::{ActionInbox, StoreConfig, StoreError, lock};
use reflux_core::cancellation::{
    CancelHandle, CancellationRegistry, Concurrency, EffectId, InFlightEffect,
};
use reflux_core::effect::{Effect, Sink};
use reflux_core::reducer::Reducer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;
use tokio::sync::watch;

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// The Store - runtime coordinator for a reducer
///
/// The Store manages:
/// 1. State (behind an `RwLock`; written only by the reducer)
/// 2. Reducer (business logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
/// 5. The cancellation registry for its in-flight effects
///
/// Cloning is cheap and shares the same store. Dropping the last clone
/// cancels every effect still in flight.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
///
/// # Example
///
/// ```ignore
/// let store = Store::new(
///     EffectsBasicsState::default(),
///     EffectsBasicsReducer,
///     live_environment(),
/// );
///
/// store.send(EffectsBasicsAction::DecrementButtonTapped)?;
/// let count = store.state(|s| s.count);
/// ```
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    inner: Arc<StoreInner<S, A, E, R>>,
}

struct StoreInner<S, A, E, R> {
    state: RwLock<S>,
    reducer: R,
    environment: E,
    registry: Arc<CancellationRegistry>,
    pump: Mutex<Pump<A>>,
    idle: Condvar,
    feedback: Feedback<A>,
    shutdown: AtomicBool,
    revision: watch::Sender<u64>,
    config: StoreConfig,
}

struct Pump<A> {
    queue: VecDeque<A>,
    draining: bool,
    /// Thread currently running the drain loop.
    owner: Option<ThreadId>,
}

/// Internal: Destination for actions produced by effects
///
/// - Pump: Send back through the store (production)
/// - Inbox: Push to a queue for a harness to consume (testing)
enum Feedback<A> {
    Pump,
    Inbox(ActionInbox<A>),
}

/// Internal: RAII guard that releases the pump if the reducer panics
///
/// Without it a panicking reducer would leave `draining` set and every later
/// send would wait forever.
struct DrainGuard<'a, A> {
    pump: &'a Mutex<Pump<A>>,
    idle: &'a Condvar,
}

impl<A> Drop for DrainGuard<'_, A> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut pump = lock(self.pump);
            pump.draining = false;
            pump.owner = None;
            self.idle.notify_all();
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    ///
    /// Effect output is fed back into the store.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a store with custom configuration
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        Self::build(initial_state, reducer, environment, config, Feedback::Pump)
    }

    /// Create a store whose effect output is recorded instead of fed back.
    ///
    /// Every action an effect emits lands in the returned [`ActionInbox`];
    /// the reducer only runs for actions passed to [`send`](Self::send).
    /// This is the mode the test harness drives.
    #[must_use]
    pub fn recording(initial_state: S, reducer: R, environment: E) -> (Self, ActionInbox<A>) {
        Self::recording_with_config(
            initial_state,
            reducer,
            environment,
            StoreConfig::new("test-store"),
        )
    }

    /// [`recording`](Self::recording) with custom configuration
    #[must_use]
    pub fn recording_with_config(
        initial_state: S,
        reducer: R,
        environment: E,
        config: StoreConfig,
    ) -> (Self, ActionInbox<A>) {
        let inbox = ActionInbox::new();
        let store = Self::build(
            initial_state,
            reducer,
            environment,
            config,
            Feedback::Inbox(inbox.clone()),
        );
        (store, inbox)
    }

    fn build(
        initial_state: S,
        reducer: R,
        environment: E,
        config: StoreConfig,
        feedback: Feedback<A>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        tracing::debug!(store = config.label(), "Creating store");

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial_state),
                reducer,
                environment,
                registry: CancellationRegistry::new(),
                pump: Mutex::new(Pump {
                    queue: VecDeque::new(),
                    draining: false,
                    owner: None,
                }),
                idle: Condvar::new(),
                feedback,
                shutdown: AtomicBool::new(false),
                revision,
                config,
            }),
        }
    }

    /// Send an action to the store
    ///
    /// The reducer runs for `action`, the returned effect starts, and any
    /// actions emitted synchronously are processed depth-first before
    /// `send` returns. If another thread is draining the pump, this call
    /// blocks until that drain finishes and then drains its own action.
    ///
    /// A send made on the draining thread itself (from inside a synchronously
    /// started effect) is queued behind the action being processed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`shutdown`](Self::shutdown).
    #[tracing::instrument(skip_all, name = "store_send", fields(store = self.inner.config.label()))]
    pub fn send(&self, action: A) -> Result<(), StoreError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejecting action: store is shutting down");
            metrics::counter!(SENDS_REJECTED, "store" => self.inner.label()).increment(1);
            return Err(StoreError::ShutdownInProgress);
        }

        self.inner.apply(action);
        Ok(())
    }

    /// Read current state via a closure
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count = store.state(|s| s.count);
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Subscribe to state revisions.
    ///
    /// The value is bumped after every reducer run; read the new state with
    /// [`state`](Self::state).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Number of reducer runs so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// The injected dependencies.
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.inner.environment
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Every registration currently in flight, oldest first.
    #[must_use]
    pub fn in_flight_effects(&self) -> Vec<InFlightEffect> {
        self.inner.registry.in_flight()
    }

    /// Whether work is in flight under `id`.
    #[must_use]
    pub fn is_in_flight(&self, id: &EffectId) -> bool {
        self.inner.registry.is_in_flight(id)
    }

    /// Cancel in-flight work under `id` from outside the reducer.
    pub fn cancel(&self, id: &EffectId) -> usize {
        let cancelled = self.inner.registry.cancel(id);
        self.inner.record_cancelled(cancelled);
        cancelled
    }

    /// Cancel every in-flight effect, named or anonymous.
    pub fn cancel_all_effects(&self) -> usize {
        let cancelled = self.inner.registry.cancel_all();
        self.inner.record_cancelled(cancelled);
        cancelled
    }

    /// Stop accepting actions and cancel every in-flight effect.
    ///
    /// Returns the number of effects cancelled. Calling it again is a no-op.
    pub fn shutdown(&self) -> usize {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let cancelled = self.cancel_all_effects();
        tracing::info!(store = self.inner.config.label(), cancelled, "Store shut down");
        cancelled
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

impl<S, A, E, R> StoreInner<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn label(&self) -> String {
        self.config.label().to_owned()
    }

    fn record_cancelled(&self, cancelled: usize) {
        if cancelled > 0 {
            metrics::counter!(EFFECTS_CANCELLED, "store" => self.label()).increment(cancelled as u64);
        }
    }

    fn push(&self, pump: &mut Pump<A>, action: A) {
        pump.queue.push_back(action);

        let backlog = pump.queue.len();
        if backlog > self.config.queue_warn_threshold() {
            tracing::warn!(
                store = self.config.label(),
                backlog,
                threshold = self.config.queue_warn_threshold(),
                "Pump backlog over threshold"
            );
        }
    }

    /// Effect feedback: queue the action and drain only if the pump is idle.
    fn enqueue(self: &Arc<Self>, action: A) {
        {
            let mut pump = lock(&self.pump);
            self.push(&mut pump, action);

            if pump.draining {
                return;
            }
            pump.draining = true;
            pump.owner = Some(thread::current().id());
        }

        self.drain();
    }

    /// External send: the action is reduced before this returns.
    fn apply(self: &Arc<Self>, action: A) {
        let current = thread::current().id();
        {
            let mut pump = lock(&self.pump);
            if pump.draining && pump.owner == Some(current) {
                self.push(&mut pump, action);
                return;
            }

            while pump.draining {
                pump = self.idle.wait(pump).unwrap_or_else(PoisonError::into_inner);
            }

            self.push(&mut pump, action);
            pump.draining = true;
            pump.owner = Some(current);
        }

        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        let _guard = DrainGuard {
            pump: &self.pump,
            idle: &self.idle,
        };

        loop {
            let (action, mark) = {
                let mut pump = lock(&self.pump);
                match pump.queue.pop_front() {
                    Some(action) => (action, pump.queue.len()),
                    None => {
                        pump.draining = false;
                        pump.owner = None;
                        self.idle.notify_all();
                        return;
                    },
                }
            };

            self.process(action);

            // Actions emitted while the effect started go next, in order.
            let mut pump = lock(&self.pump);
            if pump.queue.len() > mark {
                let emitted: Vec<A> = pump.queue.drain(mark..).collect();
                for action in emitted.into_iter().rev() {
                    pump.queue.push_front(action);
                }
            }
        }
    }

    fn process(self: &Arc<Self>, action: A) {
        metrics::counter!(ACTIONS, "store" => self.label()).increment(1);

        let effect = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let start = Instant::now();
            let effect = self.reducer.reduce(&mut state, action, &self.environment);
            metrics::histogram!(REDUCER_DURATION, "store" => self.label())
                .record(start.elapsed().as_secs_f64());
            effect
        };

        self.revision.send_modify(|revision| *revision += 1);
        tracing::debug!(revision = *self.revision.borrow(), "Action processed");

        let scope = CancelHandle::new();
        self.start(effect, &scope, Box::new(|| {}));
    }

    fn sink(self: &Arc<Self>) -> Sink<A> {
        let store = Arc::downgrade(self);
        Arc::new(move |action| {
            if let Some(store) = store.upgrade() {
                store.feed(action);
            }
        })
    }

    fn feed(self: &Arc<Self>, action: A) {
        match &self.feedback {
            Feedback::Pump => self.enqueue(action),
            Feedback::Inbox(inbox) => inbox.push(action),
        }
    }

    /// Start `effect` inside `scope`; `done` runs on natural completion.
    fn start(self: &Arc<Self>, effect: Effect<A>, scope: &CancelHandle, done: Completion) {
        match effect {
            Effect::None => {
                tracing::trace!("Effect::None");
                done();
            },
            Effect::Actions(actions) => {
                tracing::trace!(count = actions.len(), "Effect::Actions");
                self.record_started("actions");
                for action in actions {
                    if scope.is_cancelled() {
                        return;
                    }
                    self.feed(action);
                }
                done();
            },
            Effect::Task(task) => {
                tracing::trace!(?task, "Effect::Task");
                self.record_started("task");
                let handle = scope.child();
                let token = self.registry.register(None, &handle);
                let registry = Arc::clone(&self.registry);
                task.run(self.sink(), handle, move || {
                    registry.complete(token);
                    done();
                });
            },
            Effect::Cancel(ids) => {
                tracing::trace!(?ids, "Effect::Cancel");
                self.record_started("cancel");
                for id in &ids {
                    let cancelled = self.registry.cancel(id);
                    self.record_cancelled(cancelled);
                }
                done();
            },
            Effect::Cancellable {
                id,
                concurrency,
                effect,
            } => {
                tracing::trace!(%id, ?concurrency, "Effect::Cancellable");
                self.record_started("cancellable");
                if concurrency == Concurrency::CancelInFlight {
                    let cancelled = self.registry.cancel(&id);
                    self.record_cancelled(cancelled);
                }
                let handle = scope.child();
                let token = self.registry.register(Some(id), &handle);
                let registry = Arc::clone(&self.registry);
                self.start(
                    *effect,
                    &handle,
                    Box::new(move || {
                        registry.complete(token);
                        done();
                    }),
                );
            },
            Effect::Parallel(effects) => {
                tracing::trace!(count = effects.len(), "Effect::Parallel");
                self.record_started("parallel");
                if effects.is_empty() {
                    done();
                    return;
                }
                let remaining = Arc::new(AtomicUsize::new(effects.len()));
                let done = Arc::new(Mutex::new(Some(done)));
                for effect in effects {
                    let remaining = Arc::clone(&remaining);
                    let done = Arc::clone(&done);
                    self.start(
                        effect,
                        scope,
                        Box::new(move || {
                            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                                let done = lock(&done).take();
                                if let Some(done) = done {
                                    done();
                                }
                            }
                        }),
                    );
                }
            },
            Effect::Sequential(effects) => {
                tracing::trace!(count = effects.len(), "Effect::Sequential");
                self.record_started("sequential");
                self.start_sequence(effects.into(), scope.clone(), done);
            },
        }
    }

    fn start_sequence(
        self: &Arc<Self>,
        mut remaining: VecDeque<Effect<A>>,
        scope: CancelHandle,
        done: Completion,
    ) {
        let Some(next) = remaining.pop_front() else {
            done();
            return;
        };

        let store: Weak<Self> = Arc::downgrade(self);
        let next_scope = scope.clone();
        self.start(
            next,
            &scope,
            Box::new(move || {
                if next_scope.is_cancelled() {
                    return;
                }
                if let Some(store) = store.upgrade() {
                    store.start_sequence(remaining, next_scope, done);
                }
            }),
        );
    }

    fn record_started(&self, kind: &'static str) {
        metrics::counter!(EFFECTS_STARTED, "store" => self.label(), "type" => kind).increment(1);
    }
}

impl<S, A, E, R> Drop for StoreInner<S, A, E, R> {
    fn drop(&mut self) {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            tracing::debug!(
                store = self.config.label(),
                cancelled,
                "Store dropped; cancelled in-flight effects"
            );
        }
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
