//! Metrics emitted by the store runtime.
//!
//! The store records through the `metrics` facade; install any recorder
//! (Prometheus exporter, statsd, ...) in the host application to collect
//! them. Call [`describe_metrics`] once after installing the recorder so
//! the exporter carries help text.
//!
//! - Store actions processed
//! - Reducer execution time
//! - Effects started, by variant
//! - Effects cancelled

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Actions processed by a store's reducer.
pub const ACTIONS: &str = "reflux.store.actions";

/// Wall-clock time spent inside `Reducer::reduce`.
pub const REDUCER_DURATION: &str = "reflux.store.reducer.duration_seconds";

/// Effects started, labelled by `type`.
pub const EFFECTS_STARTED: &str = "reflux.store.effects.started";

/// Registrations cancelled by identity, teardown or shutdown.
pub const EFFECTS_CANCELLED: &str = "reflux.effects.cancelled";

/// Sends rejected because the store was shut down.
pub const SENDS_REJECTED: &str = "reflux.store.sends_rejected";

/// Register descriptions for every metric the runtime records.
pub fn describe_metrics() {
    describe_counter!(ACTIONS, "Total number of actions processed by the reducer");
    describe_histogram!(
        REDUCER_DURATION,
        metrics::Unit::Seconds,
        "Time spent executing the reducer"
    );
    describe_counter!(EFFECTS_STARTED, "Total number of effects started, by variant");
    describe_counter!(
        EFFECTS_CANCELLED,
        "Total number of in-flight effects cancelled"
    );
    describe_counter!(
        SENDS_REJECTED,
        "Total number of actions rejected after shutdown"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describing_without_recorder_is_harmless() {
        // No recorder installed: the facade drops descriptions silently.
        describe_metrics();
        counter!(ACTIONS, "store" => "test").increment(1);
    }
}
