//! # Reflux Testing
//!
//! Testing utilities and helpers for the Reflux architecture.
//!
//! This crate provides:
//! - [`TestStore`]: an exhaustive harness asserting every state change and
//!   every action produced by effects
//! - [`TestScheduler`]: a virtual clock for deterministic timing
//! - [`Subject`]: a passthrough double for external producers
//! - [`ReducerTest`] and [`assertions`]: pure reducer tests without a store
//!
//! ## Example
//!
//! ```
//! use reflux_core::prelude::*;
//! use reflux_testing::{TestScheduler, TestStore};
//! use std::time::Duration;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct State {
//!     count: i64,
//! }
//!
//! #[derive(Debug, PartialEq)]
//! enum Action {
//!     Decrement,
//!     DelayedIncrement,
//! }
//!
//! struct Env {
//!     main_queue: AnyScheduler,
//! }
//!
//! let reducer = reducer_fn(|state: &mut State, action: Action, env: &Env| match action {
//!     Action::Decrement => {
//!         state.count -= 1;
//!         Effect::delay(env.main_queue.clone(), Duration::from_secs(1), Action::DelayedIncrement)
//!     },
//!     Action::DelayedIncrement => {
//!         state.count += 1;
//!         Effect::none()
//!     },
//! });
//!
//! let scheduler = TestScheduler::new();
//! let mut store = TestStore::new(State::default(), reducer, Env { main_queue: scheduler.shared() });
//!
//! store.send(Action::Decrement, |state| state.count = -1);
//! scheduler.advance(Duration::from_secs(1));
//! store.receive(Action::DelayedIncrement, |state| state.count = 0);
//! store.finish();
//! ```

pub mod diff;
pub mod subject;
pub mod test_scheduler;
pub mod test_store;

pub use diff::StateDiff;
pub use reducer_test::{ReducerTest, assertions};
pub use subject::Subject;
pub use test_scheduler::TestScheduler;
pub use test_store::{Exhaustivity, Step, TestStore, TestStoreConfig, TestStoreError};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to debug output from the Reflux crates.
/// Safe to call from every test: only the first call installs anything.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reflux_core=debug,reflux_runtime=debug,reflux_testing=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        tracing::debug!("tracing initialised twice without panicking");
    }
}
