//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`scope_reducer`**: Run a child feature's reducer inside a parent feature
//!
//! # Examples
//!
//! ## Combining Reducers
//!
//! ```
//! use reflux_core::{Effect, Reducer};
//! use reflux_core::composition::combine_reducers;
//!
//! #[derive(Clone, Default)]
//! struct MyState {
//!     count: i32,
//!     name: String,
//! }
//!
//! #[derive(Clone)]
//! enum MyAction {
//!     Increment,
//!     SetName(String),
//! }
//!
//! struct CounterReducer;
//! struct NameReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = MyState;
//!     type Action = MyAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut MyState, action: MyAction, _env: &()) -> Effect<MyAction> {
//!         if let MyAction::Increment = action {
//!             state.count += 1;
//!         }
//!         Effect::none()
//!     }
//! }
//!
//! impl Reducer for NameReducer {
//!     type State = MyState;
//!     type Action = MyAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut MyState, action: MyAction, _env: &()) -> Effect<MyAction> {
//!         if let MyAction::SetName(name) = action {
//!             state.name = name;
//!         }
//!         Effect::none()
//!     }
//! }
//!
//! let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);
//! let mut state = MyState::default();
//! let _ = combined.reduce(&mut state, MyAction::Increment, &());
//! assert_eq!(state.count, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use std::marker::PhantomData;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in order and their effects are merged, so they run
/// concurrently.
#[must_use]
pub fn combine_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> CombinedReducer<S, A, E>
where
    A: Clone,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E> {
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    A: Clone,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
        self.reducers
            .iter()
            .fold(Effect::none(), |effect, reducer| {
                effect.merge_with(reducer.reduce(state, action.clone(), env))
            })
    }
}

/// How a child feature plugs into its parent.
///
/// - `state` borrows the child's state out of the parent's
/// - `action` extracts a child action from a parent action, if it is one
/// - `embed` wraps a child action back into the parent's action type
/// - `environment` borrows the child's dependencies from the parent's
pub struct Scope<S, SubS, A, SubA, E, SubE> {
    /// Focus on the child's state.
    pub state: fn(&mut S) -> &mut SubS,
    /// Extract a child action, or `None` for actions the child ignores.
    pub action: fn(A) -> Option<SubA>,
    /// Wrap a child action so its effects feed back into the parent.
    pub embed: fn(SubA) -> A,
    /// Focus on the child's environment.
    pub environment: fn(&E) -> &SubE,
}

/// Runs a child feature's reducer inside a parent feature.
///
/// Parent actions that aren't child actions are ignored. Effects returned by
/// the child are mapped back into the parent's action type.
///
/// # Examples
///
/// ```
/// use reflux_core::{Effect, Reducer, reducer_fn};
/// use reflux_core::composition::{Scope, scope_reducer};
///
/// #[derive(Default)]
/// struct AppState {
///     counter: i64,
///     title: String,
/// }
///
/// enum AppAction {
///     Counter(i64),
///     Rename(String),
/// }
///
/// let counter = reducer_fn(|count: &mut i64, delta: i64, _env: &()| {
///     *count += delta;
///     Effect::none()
/// });
///
/// let scoped = scope_reducer(
///     counter,
///     Scope {
///         state: |app: &mut AppState| &mut app.counter,
///         action: |action: AppAction| match action {
///             AppAction::Counter(delta) => Some(delta),
///             AppAction::Rename(_) => None,
///         },
///         embed: AppAction::Counter,
///         environment: |env: &()| env,
///     },
/// );
///
/// let mut state = AppState::default();
/// let _ = scoped.reduce(&mut state, AppAction::Counter(3), &());
/// assert_eq!(state.counter, 3);
/// ```
pub const fn scope_reducer<S, A, E, R>(
    reducer: R,
    scope: Scope<S, R::State, A, R::Action, E, R::Environment>,
) -> ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    ScopedReducer {
        reducer,
        scope,
        _phantom: PhantomData,
    }
}

/// A child reducer lifted into its parent's state, action and environment.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    reducer: R,
    scope: Scope<S, R::State, A, R::Action, E, R::Environment>,
    _phantom: PhantomData<fn(&mut S, A, &E)>,
}

impl<S, A, E, R> Reducer for ScopedReducer<S, A, E, R>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
        let Some(child_action) = (self.scope.action)(action) else {
            return Effect::none();
        };

        let child_state = (self.scope.state)(state);
        let child_env = (self.scope.environment)(env);
        self.reducer
            .reduce(child_state, child_action, child_env)
            .map(self.scope.embed)
    }
}
