//! # Reflux Core
//!
//! Core traits and types for the Reflux architecture.
//!
//! This crate provides the fundamental abstractions for building unidirectional,
//! testable state machines: a reducer applies actions to state and describes
//! side effects as values, which a runtime interprets.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature, owned by exactly one store
//! - **Action**: All possible inputs to a reducer (user intents and effect responses)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effect)`
//! - **Effect**: Side effect descriptions (not execution), cancellable by identity
//! - **Scheduler**: Abstraction over *when* effect work runs
//! - **Environment**: Injected dependencies (schedulers, clients)
//!
//! ## Example
//!
//! ```
//! use reflux_core::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Decrement,
//!     DelayedIncrement,
//! }
//!
//! struct CounterEnvironment {
//!     main_queue: AnyScheduler,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = CounterEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         env: &CounterEnvironment,
//!     ) -> Effect<CounterAction> {
//!         match action {
//!             CounterAction::Decrement => {
//!                 state.count -= 1;
//!                 Effect::delay(
//!                     Arc::clone(&env.main_queue),
//!                     Duration::from_secs(1),
//!                     CounterAction::DelayedIncrement,
//!                 )
//!                 .cancellable("delayed-increment")
//!             },
//!             CounterAction::DelayedIncrement => {
//!                 state.count += 1;
//!                 Effect::none()
//!             },
//!         }
//!     }
//! }
//! ```

pub mod cancellation;
pub mod composition;
pub mod effect;
pub mod effect_macros;
pub mod scheduler;

pub use cancellation::{
    CancelHandle, CancellationRegistry, Concurrency, EffectId, InFlightEffect, RegistrationToken,
};
pub use effect::{Effect, Sink, Task, TaskContext};
pub use reducer::{FnReducer, Reducer, reducer_fn};
pub use scheduler::{AnyScheduler, ImmediateScheduler, Scheduler, UnimplementedScheduler, Work};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effect)`
///
/// They contain all business logic and are deterministic and testable. Any
/// interaction with the outside world is described by the returned [`Effect`]
/// and performed by the runtime.
///
/// [`Effect`]: crate::effect::Effect
pub mod reducer {
    use super::effect::Effect;
    use std::marker::PhantomData;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```
    /// use reflux_core::{Effect, Reducer};
    ///
    /// struct ToggleReducer;
    ///
    /// impl Reducer for ToggleReducer {
    ///     type State = bool;
    ///     type Action = ();
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, state: &mut bool, (): (), _env: &()) -> Effect<()> {
    ///         *state = !*state;
    ///         Effect::none()
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and an effect
        ///
        /// This is a pure function that:
        /// 1. Updates state in place
        /// 2. Returns a description of the work to perform next
        ///
        /// The returned effect is started by the store after the state write
        /// lock has been released.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effect<Self::Action>;
    }

    /// A [`Reducer`] backed by a plain function or closure.
    ///
    /// Created with [`reducer_fn`].
    pub struct FnReducer<S, A, E, F> {
        reduce: F,
        _marker: PhantomData<fn(&mut S, A, &E)>,
    }

    /// Wrap a transition function as a [`Reducer`].
    ///
    /// ```
    /// use reflux_core::{Effect, reducer_fn};
    ///
    /// let counter = reducer_fn(|count: &mut i64, delta: i64, _env: &()| {
    ///     *count += delta;
    ///     Effect::none()
    /// });
    /// # let _ = counter;
    /// ```
    pub const fn reducer_fn<S, A, E, F>(reduce: F) -> FnReducer<S, A, E, F>
    where
        F: Fn(&mut S, A, &E) -> Effect<A>,
    {
        FnReducer {
            reduce,
            _marker: PhantomData,
        }
    }

    impl<S, A, E, F> Reducer for FnReducer<S, A, E, F>
    where
        F: Fn(&mut S, A, &E) -> Effect<A>,
    {
        type State = S;
        type Action = A;
        type Environment = E;

        fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
            (self.reduce)(state, action, env)
        }
    }
}

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::cancellation::{CancelHandle, Concurrency, EffectId};
    pub use crate::effect::{Effect, TaskContext};
    pub use crate::reducer::{Reducer, reducer_fn};
    pub use crate::scheduler::{
        AnyScheduler, ImmediateScheduler, Scheduler, UnimplementedScheduler,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_reducer_applies_closure() {
        let reducer = reducer_fn(|count: &mut i64, delta: i64, _env: &()| {
            *count += delta;
            if *count > 10 {
                Effect::send(-*count)
            } else {
                Effect::none()
            }
        });

        let mut count = 0;
        assert!(reducer.reduce(&mut count, 4, &()).is_none());
        assert_eq!(count, 4);

        let effect = reducer.reduce(&mut count, 7, &());
        assert_eq!(count, 11);
        assert!(matches!(effect, Effect::Actions(ref actions) if actions == &[-11]));
    }
}
