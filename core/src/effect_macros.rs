//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating scheduled `Effect`s.

/// Create an `Effect` that emits an action after a delay on a scheduler
///
/// # Example
///
/// ```rust,ignore
/// use reflux_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     scheduler: env.main_queue,
///     duration: Duration::from_secs(1),
///     action: CounterAction::DecrementDelayResponse
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        scheduler: $scheduler:expr,
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::delay(
            ::std::sync::Arc::clone(&$scheduler),
            $duration,
            $action,
        )
    };
}

/// Create an `Effect::Task` from a closure over its `TaskContext`
///
/// # Example
///
/// ```rust,ignore
/// use reflux_core::task;
///
/// task! {
///     scheduler: env.main_queue,
///     |ctx| ctx.send(SearchAction::Loaded(results))
/// }
/// ```
#[macro_export]
macro_rules! task {
    (
        scheduler: $scheduler:expr,
        |$ctx:ident| $body:expr
    ) => {
        $crate::effect::Effect::task(
            ::std::sync::Arc::clone(&$scheduler),
            move |$ctx: $crate::effect::TaskContext<_>| $body,
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;
    use crate::scheduler::{AnyScheduler, ImmediateScheduler};
    use std::time::Duration;

    #[derive(Clone, Debug)]
    enum TestAction {
        AsyncResult { value: i32 },
        TimeoutExpired,
    }

    #[test]
    fn test_task_macro() {
        let scheduler: AnyScheduler = ImmediateScheduler::shared();
        let value = 42;
        let effect = task! {
            scheduler: scheduler,
            |ctx| ctx.send(TestAction::AsyncResult { value })
        };

        assert!(matches!(effect, Effect::Task(ref task) if task.scheduler().is_some()));
    }

    #[test]
    fn test_delay_macro() {
        let scheduler: AnyScheduler = ImmediateScheduler::shared();
        let effect = delay! {
            scheduler: scheduler,
            duration: Duration::from_secs(30),
            action: TestAction::TimeoutExpired
        };

        assert!(matches!(effect, Effect::Task(_)));
        // The macro clones the scheduler rather than consuming it.
        assert_eq!(scheduler.name(), "immediate");
    }
}
