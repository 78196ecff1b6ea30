//! Effects basics: a counter that talks to the outside world.
//!
//! - Decrementing below zero schedules a delayed response that brings the
//!   count back up. Incrementing back to zero cancels it.
//! - "Number fact" runs a fallible request through the main queue and turns
//!   either outcome into an action.

use reflux_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Identity of the pending decrement response.
pub const DECREMENT_DELAY: EffectId = EffectId::from_static("effects-basics.decrement-delay");

/// How long the decrement response waits.
pub const DECREMENT_DELAY_DURATION: Duration = Duration::from_secs(1);

/// Counter state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectsBasicsState {
    /// Current count
    pub count: i64,
    /// Whether a number fact request is outstanding
    pub is_number_fact_request_in_flight: bool,
    /// The last fact received
    pub number_fact: Option<String>,
}

/// Counter actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectsBasicsAction {
    /// User tapped "−"
    DecrementButtonTapped,
    /// The delayed response to a decrement below zero
    DecrementDelayResponse,
    /// User tapped "+"
    IncrementButtonTapped,
    /// User asked for a fact about the current count
    NumberFactButtonTapped,
    /// The fact client answered
    NumberFactResponse(Result<String, FactError>),
}

/// Failures from the fact client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    /// The service could not be reached
    #[error("number fact service unavailable")]
    Unavailable,
    /// The service has nothing to say about this number
    #[error("no fact known for {0}")]
    NotFound(i64),
}

/// Fetches trivia about a number.
#[derive(Clone)]
pub struct FactClient {
    /// Blocking fetch; runs on the environment's main queue.
    pub fetch: Arc<dyn Fn(i64) -> Result<String, FactError> + Send + Sync>,
}

impl FactClient {
    /// A client that answers from a fixed template without any I/O.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            fetch: Arc::new(|number: i64| match number {
                0 => Err(FactError::NotFound(0)),
                n => Ok(format!("{n} is a good number.")),
            }),
        }
    }

    /// A client that fails the test if it is ever called.
    #[must_use]
    #[allow(clippy::panic)] // Unstubbed dependency
    pub fn unimplemented() -> Self {
        Self {
            fetch: Arc::new(|number: i64| -> Result<String, FactError> {
                panic!("FactClient.fetch is unimplemented (called with {number})")
            }),
        }
    }
}

impl std::fmt::Debug for FactClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactClient").finish_non_exhaustive()
    }
}

/// Dependencies of the counter
#[derive(Clone)]
pub struct EffectsBasicsEnvironment {
    /// Number trivia
    pub fact: FactClient,
    /// Where responses are delivered and delays are measured
    pub main_queue: AnyScheduler,
}

impl EffectsBasicsEnvironment {
    /// Build an environment.
    #[must_use]
    pub fn new(fact: FactClient, main_queue: AnyScheduler) -> Self {
        Self { fact, main_queue }
    }

    /// Every dependency fails loudly; tests replace what they use.
    #[must_use]
    pub fn unimplemented() -> Self {
        Self::new(
            FactClient::unimplemented(),
            UnimplementedScheduler::shared("main_queue"),
        )
    }
}

/// Counter reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectsBasicsReducer;

impl Reducer for EffectsBasicsReducer {
    type State = EffectsBasicsState;
    type Action = EffectsBasicsAction;
    type Environment = EffectsBasicsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match action {
            EffectsBasicsAction::DecrementButtonTapped => {
                state.count -= 1;
                state.number_fact = None;

                if state.count >= 0 {
                    return Effect::none();
                }
                Effect::delay(
                    Arc::clone(&env.main_queue),
                    DECREMENT_DELAY_DURATION,
                    EffectsBasicsAction::DecrementDelayResponse,
                )
                .cancellable(DECREMENT_DELAY)
            },

            EffectsBasicsAction::DecrementDelayResponse => {
                if state.count < 0 {
                    state.count += 1;
                }
                Effect::none()
            },

            EffectsBasicsAction::IncrementButtonTapped => {
                state.count += 1;
                state.number_fact = None;

                if state.count >= 0 {
                    Effect::cancel(DECREMENT_DELAY)
                } else {
                    Effect::none()
                }
            },

            EffectsBasicsAction::NumberFactButtonTapped => {
                state.is_number_fact_request_in_flight = true;
                state.number_fact = None;

                let fetch = Arc::clone(&env.fact.fetch);
                let number = state.count;
                Effect::catching(
                    Arc::clone(&env.main_queue),
                    move || fetch(number),
                    EffectsBasicsAction::NumberFactResponse,
                )
            },

            EffectsBasicsAction::NumberFactResponse(Ok(fact)) => {
                state.is_number_fact_request_in_flight = false;
                state.number_fact = Some(fact);
                Effect::none()
            },

            EffectsBasicsAction::NumberFactResponse(Err(error)) => {
                tracing::warn!(%error, "Number fact request failed");
                state.is_number_fact_request_in_flight = false;
                Effect::none()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflux_testing::{ReducerTest, assertions};

    #[test]
    fn decrement_at_zero_schedules_cancellable_delay() {
        ReducerTest::new(EffectsBasicsReducer)
            .with_env(EffectsBasicsEnvironment::unimplemented())
            .given_state(EffectsBasicsState::default())
            .when_action(EffectsBasicsAction::DecrementButtonTapped)
            .then_state(|state| assert_eq!(state.count, -1))
            .then_effect(|effect| {
                assertions::assert_has_task(effect);
                assertions::assert_cancellable(effect, DECREMENT_DELAY);
            })
            .run();
    }

    #[test]
    fn decrement_above_zero_has_no_effect() {
        ReducerTest::new(EffectsBasicsReducer)
            .with_env(EffectsBasicsEnvironment::unimplemented())
            .given_state(EffectsBasicsState {
                count: 3,
                number_fact: Some("3 is prime.".into()),
                ..EffectsBasicsState::default()
            })
            .when_action(EffectsBasicsAction::DecrementButtonTapped)
            .then_state(|state| {
                assert_eq!(state.count, 2);
                assert_eq!(state.number_fact, None);
            })
            .then_effect(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn increment_to_zero_cancels_delay() {
        ReducerTest::new(EffectsBasicsReducer)
            .with_env(EffectsBasicsEnvironment::unimplemented())
            .given_state(EffectsBasicsState {
                count: -1,
                ..EffectsBasicsState::default()
            })
            .when_action(EffectsBasicsAction::IncrementButtonTapped)
            .then_state(|state| assert_eq!(state.count, 0))
            .then_effect(|effect| assertions::assert_cancels(effect, DECREMENT_DELAY))
            .run();
    }

    #[test]
    fn delay_response_never_overshoots_zero() {
        ReducerTest::new(EffectsBasicsReducer)
            .with_env(EffectsBasicsEnvironment::unimplemented())
            .given_state(EffectsBasicsState::default())
            .when_action(EffectsBasicsAction::DecrementDelayResponse)
            .then_state(|state| assert_eq!(state.count, 0))
            .then_effect(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn offline_client() {
        let client = FactClient::offline();
        assert_eq!((client.fetch)(7), Ok("7 is a good number.".to_owned()));
        assert_eq!((client.fetch)(0), Err(FactError::NotFound(0)));
    }
}
