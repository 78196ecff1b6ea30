//! Integration tests for a Store driven by the real-time tokio scheduler
//!
//! These use short real delays; effect output arrives on tokio tasks and
//! re-enters the store through its pump.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use reflux_core::{AnyScheduler, Effect, EffectId, Reducer};
use reflux_runtime::{Store, StoreError, TokioScheduler};
use std::time::Duration;
use tokio::time::{sleep, timeout};

const DELAY: Duration = Duration::from_millis(20);
const SETTLE: Duration = Duration::from_millis(80);
const FETCH: EffectId = EffectId::from_static("fetch");

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Fetch(i64),
    Fetched(i64),
    CancelFetch,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct State {
    loading: bool,
    value: Option<i64>,
}

struct Environment {
    background: AnyScheduler,
}

struct FetchReducer;

impl Reducer for FetchReducer {
    type State = State;
    type Action = Action;
    type Environment = Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match action {
            Action::Fetch(value) => {
                state.loading = true;
                Effect::delay(env.background.clone(), DELAY, Action::Fetched(value)).cancellable(FETCH)
            },
            Action::Fetched(value) => {
                state.loading = false;
                state.value = Some(value);
                Effect::none()
            },
            Action::CancelFetch => {
                state.loading = false;
                Effect::cancel(FETCH)
            },
        }
    }
}

fn store() -> Store<State, Action, Environment, FetchReducer> {
    let background = TokioScheduler::current()
        .expect("running inside a tokio runtime")
        .with_name("background")
        .shared();
    Store::new(State::default(), FetchReducer, Environment { background })
}

#[tokio::test]
async fn effect_output_arrives_through_the_pump() {
    reflux_testing::init_test_tracing();
    let store = store();
    let mut revisions = store.subscribe();

    store.send(Action::Fetch(42)).unwrap();
    assert!(store.state(|s| s.loading));
    revisions.borrow_and_update();

    timeout(Duration::from_secs(2), revisions.changed())
        .await
        .expect("effect output within two seconds")
        .unwrap();

    assert_eq!(
        store.state(Clone::clone),
        State {
            loading: false,
            value: Some(42),
        }
    );
    assert!(store.in_flight_effects().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn last_fetch_wins_on_a_multi_threaded_runtime() {
    let store = store();
    let mut revisions = store.subscribe();

    store.send(Action::Fetch(1)).unwrap();
    store.send(Action::Fetch(2)).unwrap();
    revisions.borrow_and_update();

    timeout(Duration::from_secs(2), revisions.changed())
        .await
        .expect("effect output within two seconds")
        .unwrap();
    sleep(SETTLE).await;

    assert_eq!(store.state(|s| s.value), Some(2));
    assert_eq!(store.revision(), 3);
}

#[tokio::test]
async fn cancelled_fetch_never_lands() {
    let store = store();

    store.send(Action::Fetch(7)).unwrap();
    store.send(Action::CancelFetch).unwrap();
    sleep(SETTLE).await;

    assert_eq!(store.state(Clone::clone), State::default());
    assert!(store.in_flight_effects().is_empty());
}

#[tokio::test]
async fn shutdown_aborts_in_flight_work() {
    let store = store();

    store.send(Action::Fetch(9)).unwrap();
    assert_eq!(store.shutdown(), 2);
    sleep(SETTLE).await;

    assert_eq!(store.state(|s| s.value), None);
    assert_eq!(store.send(Action::Fetch(1)), Err(StoreError::ShutdownInProgress));
}
