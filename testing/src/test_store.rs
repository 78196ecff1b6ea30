//! Exhaustive test harness around a recording [`Store`].
//!
//! Every state change and every action an effect produces must be asserted.
//! Leftovers (unreceived actions, effects still in flight) fail the test at
//! [`TestStore::finish`] or when the harness is dropped.

#![allow(clippy::module_name_repetitions)] // TestStore is the natural name

use crate::diff::StateDiff;
use reflux_core::cancellation::InFlightEffect;
use reflux_core::reducer::Reducer;
use reflux_runtime::{ActionInbox, Store, StoreConfig, StoreError};
use std::fmt::{self, Debug};
use thiserror::Error;

/// Which harness call produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// [`TestStore::send`]
    Send,
    /// [`TestStore::receive`]
    Receive,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

/// How strictly the harness checks leftovers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Exhaustivity {
    /// Leftovers fail the test.
    #[default]
    On,
    /// Leftovers are logged with `tracing::warn!`, and `receive` skips
    /// actions that don't match.
    Off,
}

/// Configuration for a [`TestStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestStoreConfig {
    /// Leftover policy
    pub exhaustivity: Exhaustivity,
}

impl TestStoreConfig {
    /// Set the exhaustivity
    #[must_use]
    pub const fn with_exhaustivity(mut self, exhaustivity: Exhaustivity) -> Self {
        self.exhaustivity = exhaustivity;
        self
    }
}

/// Failures reported by the `try_*` harness calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestStoreError {
    /// The state after a step differs from the expected mutation
    #[error("state mismatch after {step} {action}\nfirst difference at `{path}`\n{diff}")]
    StateMismatch {
        /// The step that ran
        step: Step,
        /// `Debug` rendering of the action
        action: String,
        /// Field path of the first difference
        path: String,
        /// Rendered expected/actual diff
        diff: String,
    },

    /// `receive` was called with nothing in the inbox
    #[error("expected to receive {expected}, but no actions were received")]
    NoReceivedActions {
        /// The action the test expected
        expected: String,
    },

    /// The next received action is not the expected one
    #[error("expected to receive {expected}, but received {actual}")]
    UnexpectedAction {
        /// The action the test expected
        expected: String,
        /// The action at the front of the inbox
        actual: String,
    },

    /// `send` was called while received actions were still unasserted
    #[error("must handle {} received action(s) before sending {action}: {pending:?}", .pending.len())]
    UnhandledReceivedActions {
        /// The action the test tried to send
        action: String,
        /// Actions still waiting in the inbox
        pending: Vec<String>,
    },

    /// The inbox was not empty at teardown
    #[error("unreceived actions remaining: {actions:?}")]
    UnreceivedActions {
        /// Actions still waiting in the inbox
        actions: Vec<String>,
    },

    /// Registrations were still live at teardown
    #[error("effects still in flight: {effects:?}")]
    EffectsInFlight {
        /// Identities of the live registrations
        effects: Vec<String>,
    },

    /// The underlying store rejected an action
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Exhaustive test harness.
///
/// # Example
///
/// ```
/// use reflux_core::{Effect, reducer_fn};
/// use reflux_testing::TestStore;
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Counter {
///     count: i64,
/// }
///
/// #[derive(Debug, PartialEq)]
/// enum Action {
///     Twice,
///     Add(i64),
/// }
///
/// let reducer = reducer_fn(|state: &mut Counter, action: Action, _env: &()| match action {
///     Action::Twice => Effect::just(vec![Action::Add(1), Action::Add(1)]),
///     Action::Add(n) => {
///         state.count += n;
///         Effect::none()
///     },
/// });
///
/// let mut store = TestStore::new(Counter::default(), reducer, ());
/// store.send(Action::Twice, |_| {});
/// store.receive(Action::Add(1), |state| state.count = 1);
/// store.receive(Action::Add(1), |state| state.count = 2);
/// store.finish();
/// ```
pub struct TestStore<S, A, E, R>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    A: PartialEq + Debug + Send + 'static,
    E: Send + Sync + 'static,
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
{
    store: Store<S, A, E, R>,
    inbox: ActionInbox<A>,
    config: TestStoreConfig,
    finished: bool,
}

impl<S, A, E, R> TestStore<S, A, E, R>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    A: PartialEq + Debug + Send + 'static,
    E: Send + Sync + 'static,
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
{
    /// Create an exhaustive harness.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, TestStoreConfig::default())
    }

    /// Create a harness with custom configuration.
    #[must_use]
    pub fn with_config(
        initial_state: S,
        reducer: R,
        environment: E,
        config: TestStoreConfig,
    ) -> Self {
        let (store, inbox) = Store::recording_with_config(
            initial_state,
            reducer,
            environment,
            StoreConfig::new("test-store"),
        );
        Self {
            store,
            inbox,
            config,
            finished: false,
        }
    }

    /// Send `action` and assert the state change.
    ///
    /// `update` receives a copy of the state from before the action and must
    /// turn it into the expected state. Pass `|_| {}` to assert no change.
    ///
    /// # Panics
    ///
    /// Panics with the [`TestStoreError`] from [`try_send`](Self::try_send).
    #[track_caller]
    #[allow(clippy::panic)] // Test assertion
    pub fn send(&mut self, action: A, update: impl FnOnce(&mut S)) {
        if let Err(error) = self.try_send(action, update) {
            panic!("{error}");
        }
    }

    /// Fallible [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// - [`TestStoreError::UnhandledReceivedActions`] if received actions are
    ///   still waiting (exhaustive mode only)
    /// - [`TestStoreError::StateMismatch`] if the state differs from `update`
    pub fn try_send(&mut self, action: A, update: impl FnOnce(&mut S)) -> Result<(), TestStoreError> {
        let description = format!("{action:?}");

        if self.config.exhaustivity == Exhaustivity::On && !self.inbox.is_empty() {
            return Err(TestStoreError::UnhandledReceivedActions {
                action: description,
                pending: self.inbox.describe(),
            });
        }

        tracing::debug!(action = %description, "TestStore send");
        self.step(Step::Send, description, action, update)
    }

    /// Assert that `expected` is the next action produced by an effect,
    /// run it through the reducer, and assert the state change.
    ///
    /// # Panics
    ///
    /// Panics with the [`TestStoreError`] from [`try_receive`](Self::try_receive).
    #[track_caller]
    #[allow(clippy::panic)] // Test assertion
    pub fn receive(&mut self, expected: A, update: impl FnOnce(&mut S)) {
        if let Err(error) = self.try_receive(expected, update) {
            panic!("{error}");
        }
    }

    /// Fallible [`receive`](Self::receive).
    ///
    /// With [`Exhaustivity::Off`], received actions before the first match
    /// are run through the reducer without assertions.
    ///
    /// # Errors
    ///
    /// - [`TestStoreError::NoReceivedActions`] if the inbox is empty
    /// - [`TestStoreError::UnexpectedAction`] if the next action differs
    /// - [`TestStoreError::StateMismatch`] if the state differs from `update`
    pub fn try_receive(&mut self, expected: A, update: impl FnOnce(&mut S)) -> Result<(), TestStoreError> {
        let description = format!("{expected:?}");

        let actual = loop {
            let Some(actual) = self.inbox.pop_front() else {
                return Err(TestStoreError::NoReceivedActions {
                    expected: description,
                });
            };
            if actual == expected {
                break actual;
            }
            if self.config.exhaustivity == Exhaustivity::On {
                let actual_description = format!("{actual:?}");
                self.inbox.push_front(actual);
                return Err(TestStoreError::UnexpectedAction {
                    expected: description,
                    actual: actual_description,
                });
            }
            tracing::debug!(skipped = ?actual, "Skipping received action");
            self.store.send(actual)?;
        };

        tracing::debug!(action = %description, "TestStore receive");
        self.step(Step::Receive, description, actual, update)
    }

    fn step(
        &mut self,
        step: Step,
        description: String,
        action: A,
        update: impl FnOnce(&mut S),
    ) -> Result<(), TestStoreError> {
        let mut expected = self.state();
        self.store.send(action)?;
        update(&mut expected);

        let actual = self.state();
        match StateDiff::between(&expected, &actual) {
            None => Ok(()),
            Some(diff) => Err(TestStoreError::StateMismatch {
                step,
                action: description,
                path: diff.path,
                diff: diff.rendered,
            }),
        }
    }

    /// Run every waiting received action through the reducer without
    /// asserting anything. Returns how many were processed.
    pub fn skip_received_actions(&mut self) -> usize {
        let mut skipped = 0;
        while let Some(action) = self.inbox.pop_front() {
            if let Err(error) = self.store.send(action) {
                tracing::warn!(%error, "Could not process skipped action");
                break;
            }
            skipped += 1;
        }
        tracing::debug!(skipped, "Skipped received actions");
        skipped
    }

    /// Cancel every in-flight effect. Returns how many were cancelled.
    pub fn cancel_in_flight_effects(&self) -> usize {
        self.store.cancel_all_effects()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> S {
        self.store.state(Clone::clone)
    }

    /// The injected dependencies.
    #[must_use]
    pub fn environment(&self) -> &E {
        self.store.environment()
    }

    /// Number of received actions not yet asserted.
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.inbox.len()
    }

    /// Registrations currently in flight.
    #[must_use]
    pub fn in_flight_effects(&self) -> Vec<InFlightEffect> {
        self.store.in_flight_effects()
    }

    /// Assert that nothing is left over and consume the harness.
    ///
    /// # Panics
    ///
    /// Panics with the [`TestStoreError`] from [`try_finish`](Self::try_finish).
    #[track_caller]
    #[allow(clippy::panic)] // Test assertion
    pub fn finish(self) {
        if let Err(error) = self.try_finish() {
            panic!("{error}");
        }
    }

    /// Fallible [`finish`](Self::finish).
    ///
    /// # Errors
    ///
    /// - [`TestStoreError::UnreceivedActions`] if the inbox is not empty
    /// - [`TestStoreError::EffectsInFlight`] if registrations are still live
    ///
    /// With [`Exhaustivity::Off`] both are logged and `Ok` is returned.
    pub fn try_finish(mut self) -> Result<(), TestStoreError> {
        self.finished = true;
        self.teardown()
    }

    fn teardown(&self) -> Result<(), TestStoreError> {
        let result = self.leftovers();
        match (&result, self.config.exhaustivity) {
            (Err(error), Exhaustivity::Off) => {
                tracing::warn!(%error, "TestStore finished with leftovers");
                Ok(())
            },
            _ => result,
        }
    }

    fn leftovers(&self) -> Result<(), TestStoreError> {
        if !self.inbox.is_empty() {
            return Err(TestStoreError::UnreceivedActions {
                actions: self.inbox.describe(),
            });
        }

        let effects = self.store.in_flight_effects();
        if !effects.is_empty() {
            return Err(TestStoreError::EffectsInFlight {
                effects: effects.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(())
    }
}

impl<S, A, E, R> Drop for TestStore<S, A, E, R>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    A: PartialEq + Debug + Send + 'static,
    E: Send + Sync + 'static,
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
{
    #[allow(clippy::panic)] // Dropping with leftovers is a test failure
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        self.finished = true;
        if let Err(error) = self.teardown() {
            panic!("TestStore dropped without finish(): {error}");
        }
    }
}

impl<S, A, E, R> Debug for TestStore<S, A, E, R>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    A: PartialEq + Debug + Send + 'static,
    E: Send + Sync + 'static,
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStore")
            .field("state", &self.state())
            .field("received", &self.inbox)
            .field("in_flight", &self.in_flight_effects().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
