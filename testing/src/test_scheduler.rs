//! Virtual-time scheduler for deterministic tests.

use reflux_core::cancellation::CancelHandle;
use reflux_core::scheduler::{AnyScheduler, Scheduler, Work};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// A scheduler whose clock only moves when the test says so.
///
/// Work is queued by fire time and insertion order. Nothing runs until
/// [`advance`](Self::advance), [`advance_to`](Self::advance_to) or
/// [`run`](Self::run) is called; zero-delay work is queued too.
///
/// Clones share the same clock and queue, so a test keeps one clone and
/// hands another to the environment.
///
/// # Example
///
/// ```
/// use reflux_core::Scheduler;
/// use reflux_testing::TestScheduler;
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// let scheduler = TestScheduler::new();
/// let fired = Arc::new(Mutex::new(Vec::new()));
///
/// let log = Arc::clone(&fired);
/// scheduler.schedule_after(Duration::from_secs(2), Box::new(move || log.lock().unwrap().push(2)));
/// let log = Arc::clone(&fired);
/// scheduler.schedule_after(Duration::from_secs(1), Box::new(move || log.lock().unwrap().push(1)));
///
/// scheduler.advance(Duration::from_secs(1));
/// assert_eq!(*fired.lock().unwrap(), vec![1]);
///
/// scheduler.run();
/// assert_eq!(*fired.lock().unwrap(), vec![1, 2]);
/// assert_eq!(scheduler.now(), Duration::from_secs(2));
/// ```
#[derive(Clone, Default)]
pub struct TestScheduler {
    timeline: Arc<Mutex<Timeline>>,
}

#[derive(Default)]
struct Timeline {
    now: Duration,
    next_sequence: u64,
    queue: BTreeMap<(Duration, u64), Scheduled>,
}

struct Scheduled {
    work: Work,
    handle: CancelHandle,
}

fn lock(timeline: &Mutex<Timeline>) -> MutexGuard<'_, Timeline> {
    timeline.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TestScheduler {
    /// Create a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle for an environment; the clock stays shared with `self`.
    #[must_use]
    pub fn shared(&self) -> AnyScheduler {
        Arc::new(self.clone())
    }

    /// Current virtual time since the scheduler was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        lock(&self.timeline).now
    }

    /// Number of queued items that have not been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.timeline)
            .queue
            .values()
            .filter(|scheduled| !scheduled.handle.is_cancelled())
            .count()
    }

    /// Move the clock forward by `by`, running everything due on the way.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Move the clock to `target`, running everything due on the way.
    ///
    /// Work scheduled while draining runs in the same call if it falls due
    /// at or before `target`. The clock never moves backwards.
    pub fn advance_to(&self, target: Duration) {
        tracing::trace!(?target, "Advancing test scheduler");
        while let Some(scheduled) = self.pop_due(Some(target)) {
            scheduled.fire();
        }
        let mut timeline = lock(&self.timeline);
        timeline.now = timeline.now.max(target);
    }

    /// Run until the queue is empty, jumping the clock to each fire time.
    ///
    /// Never returns while an uncancelled repeating timer is queued.
    pub fn run(&self) {
        while let Some(scheduled) = self.pop_due(None) {
            scheduled.fire();
        }
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Scheduled> {
        let mut timeline = lock(&self.timeline);
        let (&(fire_at, _), _) = timeline.queue.first_key_value()?;
        if limit.is_some_and(|limit| fire_at > limit) {
            return None;
        }
        timeline.now = timeline.now.max(fire_at);
        timeline.queue.pop_first().map(|(_, scheduled)| scheduled)
    }
}

impl Scheduled {
    fn fire(self) {
        if !self.handle.is_cancelled() {
            (self.work)();
        }
    }
}

impl Scheduler for TestScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) -> CancelHandle {
        let handle = CancelHandle::new();
        let key = {
            let mut timeline = lock(&self.timeline);
            let key = (timeline.now + delay, timeline.next_sequence);
            timeline.next_sequence += 1;
            timeline.queue.insert(
                key,
                Scheduled {
                    work,
                    handle: handle.clone(),
                },
            );
            key
        };

        // Drop cancelled work eagerly so captured state is released.
        let timeline: Weak<Mutex<Timeline>> = Arc::downgrade(&self.timeline);
        handle.on_cancel(move || {
            if let Some(timeline) = timeline.upgrade() {
                let removed = lock(&timeline).queue.remove(&key);
                drop(removed);
            }
        });

        handle
    }

    fn name(&self) -> &str {
        "test"
    }
}

impl From<TestScheduler> for AnyScheduler {
    fn from(scheduler: TestScheduler) -> Self {
        Arc::new(scheduler)
    }
}

impl fmt::Debug for TestScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = lock(&self.timeline);
        f.debug_struct("TestScheduler")
            .field("now", &timeline.now)
            .field("queued", &timeline.queue.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Work) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Work {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn zero_delay_work_waits_for_advance() {
        let scheduler = TestScheduler::new();
        let (log, work) = recorder();

        scheduler.schedule_now(work("now"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::ZERO);
        assert_eq!(*log.lock().unwrap(), vec!["now"]);
    }

    #[test]
    fn ties_fire_in_insertion_order() {
        let scheduler = TestScheduler::new();
        let (log, work) = recorder();
        let second = Duration::from_secs(1);

        scheduler.schedule_after(second, work("a"));
        scheduler.schedule_after(second, work("b"));
        scheduler.schedule_after(Duration::ZERO, work("first"));

        scheduler.advance(second);
        assert_eq!(*log.lock().unwrap(), vec!["first", "a", "b"]);
    }

    #[test]
    fn clock_reads_fire_time_while_work_runs() {
        let scheduler = TestScheduler::new();
        let seen = Arc::new(Mutex::new(None));
        let clock = scheduler.clone();
        let slot = Arc::clone(&seen);

        scheduler.schedule_after(
            Duration::from_secs(3),
            Box::new(move || *slot.lock().unwrap() = Some(clock.now())),
        );
        scheduler.advance(Duration::from_secs(10));

        assert_eq!(*seen.lock().unwrap(), Some(Duration::from_secs(3)));
        assert_eq!(scheduler.now(), Duration::from_secs(10));
    }

    #[test]
    fn reentrant_work_due_before_target_runs_in_same_advance() {
        let scheduler = TestScheduler::new();
        let (log, work) = recorder();
        let inner = scheduler.clone();
        let follow_up = work("follow-up");
        let too_late = work("too-late");

        scheduler.schedule_after(
            Duration::from_secs(1),
            Box::new(move || {
                inner.schedule_after(Duration::from_secs(1), follow_up);
                inner.schedule_after(Duration::from_secs(5), too_late);
            }),
        );

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(*log.lock().unwrap(), vec!["follow-up"]);
        assert_eq!(scheduler.pending(), 1);

        scheduler.run();
        assert_eq!(*log.lock().unwrap(), vec!["follow-up", "too-late"]);
        assert_eq!(scheduler.now(), Duration::from_secs(6));
    }

    #[test]
    fn cancelled_work_is_dropped() {
        let scheduler = TestScheduler::new();
        let (log, work) = recorder();

        let handle = scheduler.schedule_after(Duration::from_secs(1), work("cancelled"));
        scheduler.schedule_after(Duration::from_secs(1), work("kept"));
        handle.cancel();

        assert_eq!(scheduler.pending(), 1);
        scheduler.run();
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let scheduler = TestScheduler::new();
        scheduler.advance(Duration::from_secs(5));
        scheduler.advance_to(Duration::from_secs(2));
        assert_eq!(scheduler.now(), Duration::from_secs(5));
    }

    #[test]
    fn clones_share_the_clock() {
        let scheduler = TestScheduler::new();
        let shared: AnyScheduler = scheduler.shared();
        let (log, work) = recorder();

        shared.schedule_after(Duration::from_millis(500), work("shared"));
        scheduler.advance(Duration::from_millis(500));

        assert_eq!(*log.lock().unwrap(), vec!["shared"]);
        assert_eq!(shared.name(), "test");
    }
}
