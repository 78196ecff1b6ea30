//! Effect module - Side effect descriptions
//!
//! Effects describe side effects to be performed by the runtime. They are
//! values (not execution), composable, and cancellable by identity.
//!
//! A reducer returns exactly one [`Effect`]. Several effects are combined
//! with [`Effect::merge`] (concurrently) or [`Effect::concatenate`] (one
//! after another).
//!
//! Asynchronous work is an [`Effect::Task`]: a closure bound to a
//! [`Scheduler`](crate::scheduler::Scheduler) that receives a [`TaskContext`]. Through the context the
//! task emits actions, schedules delayed continuations and observes
//! cancellation. Every suspension point is a scheduler call, which is what
//! makes effects fully deterministic under a virtual-time scheduler.

use crate::cancellation::{CancelHandle, Concurrency, EffectId, lock};
use crate::scheduler::AnyScheduler;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Where a task delivers the actions it emits.
pub type Sink<Action> = Arc<dyn Fn(Action) + Send + Sync + 'static>;

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Effect type - describes a side effect to be executed
///
/// Effects are NOT executed immediately. They are descriptions of what should
/// happen, returned from reducers and interpreted by the store.
///
/// # Type Parameters
///
/// - `Action`: The action type that effects can produce (feedback loop)
pub enum Effect<Action> {
    /// No-op effect
    None,

    /// Emit actions synchronously, in order
    Actions(Vec<Action>),

    /// Asynchronous work bound to an optional scheduler
    Task(Task<Action>),

    /// Cancel all live work under these identities; emits nothing
    Cancel(Vec<EffectId>),

    /// Run the inner effect under a cancellation identity
    Cancellable {
        /// Identity to register under
        id: EffectId,
        /// Behaviour when work under `id` is already live
        concurrency: Concurrency,
        /// The effect being tagged
        effect: Box<Effect<Action>>,
    },

    /// Run effects concurrently
    Parallel(Vec<Effect<Action>>),

    /// Run effects one after another; each starts when the previous completes
    Sequential(Vec<Effect<Action>>),
}

// Manual Debug implementation since tasks are closures
impl<Action> fmt::Debug for Effect<Action>
where
    Action: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Actions(actions) => f.debug_tuple("Effect::Actions").field(actions).finish(),
            Effect::Task(task) => write!(f, "Effect::Task({task:?})"),
            Effect::Cancel(ids) => f.debug_tuple("Effect::Cancel").field(ids).finish(),
            Effect::Cancellable {
                id,
                concurrency,
                effect,
            } => f
                .debug_struct("Effect::Cancellable")
                .field("id", id)
                .field("concurrency", concurrency)
                .field("effect", effect)
                .finish(),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Effect::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
        }
    }
}

impl<Action> Default for Effect<Action> {
    fn default() -> Self {
        Self::None
    }
}

impl<Action> Effect<Action> {
    /// No work.
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// Emit a single action synchronously.
    #[must_use]
    pub fn send(action: Action) -> Self {
        Self::Actions(vec![action])
    }

    /// Emit several actions synchronously, in order.
    #[must_use]
    pub fn just(actions: Vec<Action>) -> Self {
        if actions.is_empty() {
            Self::None
        } else {
            Self::Actions(actions)
        }
    }

    /// Cancel live work under `id`.
    #[must_use]
    pub fn cancel(id: impl Into<EffectId>) -> Self {
        Self::Cancel(vec![id.into()])
    }

    /// Cancel live work under each of `ids`.
    #[must_use]
    pub fn cancel_all(ids: impl IntoIterator<Item = EffectId>) -> Self {
        Self::Cancel(ids.into_iter().collect())
    }

    /// Combine effects to run in parallel
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially
    #[must_use]
    pub const fn concatenate(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Sequential(effects)
    }

    /// Tag this effect with a cancellation identity.
    ///
    /// Live work under the same identity is cancelled before this one starts.
    #[must_use]
    pub fn cancellable(self, id: impl Into<EffectId>) -> Self {
        self.cancellable_with(id, Concurrency::CancelInFlight)
    }

    /// Tag this effect with a cancellation identity and explicit concurrency.
    #[must_use]
    pub fn cancellable_with(self, id: impl Into<EffectId>, concurrency: Concurrency) -> Self {
        if self.is_none() {
            return self;
        }
        Self::Cancellable {
            id: id.into(),
            concurrency,
            effect: Box::new(self),
        }
    }

    /// Run `self` and `other` concurrently.
    #[must_use]
    pub fn merge_with(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, effect) | (effect, Self::None) => effect,
            (Self::Parallel(mut effects), other) => {
                effects.push(other);
                Self::Parallel(effects)
            },
            (effect, other) => Self::Parallel(vec![effect, other]),
        }
    }

    /// Run `other` once `self` has completed.
    #[must_use]
    pub fn then(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, effect) | (effect, Self::None) => effect,
            (Self::Sequential(mut effects), other) => {
                effects.push(other);
                Self::Sequential(effects)
            },
            (effect, other) => Self::Sequential(vec![effect, other]),
        }
    }

    /// Whether this effect does nothing at all.
    #[must_use]
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Actions(actions) => actions.is_empty(),
            Self::Cancel(ids) => ids.is_empty(),
            Self::Task(_) => false,
            Self::Cancellable { effect, .. } => effect.is_none(),
            Self::Parallel(effects) | Self::Sequential(effects) => {
                effects.iter().all(Effect::is_none)
            },
        }
    }
}

impl<Action: Send + 'static> Effect<Action> {
    /// Run `work` when the effect starts, emitting nothing.
    #[must_use]
    pub fn fire_and_forget(work: impl FnOnce() + Send + 'static) -> Self {
        Self::Task(Task::new(None, move |_ctx| work()))
    }

    /// Asynchronous work on `scheduler`.
    ///
    /// The task completes when [`TaskContext::finish`] is called or the last
    /// clone of its context is dropped.
    #[must_use]
    pub fn task(
        scheduler: AnyScheduler,
        work: impl FnOnce(TaskContext<Action>) + Send + 'static,
    ) -> Self {
        Self::Task(Task::new(Some(scheduler), work))
    }

    /// Run a fallible operation on `scheduler` and turn its result into
    /// exactly one action.
    ///
    /// There is no error channel: failures must become actions.
    #[must_use]
    pub fn catching<T: 'static, E: 'static>(
        scheduler: AnyScheduler,
        operation: impl FnOnce() -> Result<T, E> + Send + 'static,
        into_action: impl FnOnce(Result<T, E>) -> Action + Send + 'static,
    ) -> Self {
        Self::task(scheduler, move |ctx| ctx.send(into_action(operation())))
    }

    /// Emit `action` once `duration` has elapsed on `scheduler`.
    #[must_use]
    pub fn delay(scheduler: AnyScheduler, duration: Duration, action: Action) -> Self {
        Self::task(scheduler, move |ctx| {
            ctx.after(duration, move |ctx| ctx.send(action));
        })
    }

    /// Emit `make_action()` every `interval` until cancelled.
    ///
    /// A timer never completes on its own, so it should always be tagged
    /// with [`cancellable`](Self::cancellable). Under an immediate scheduler
    /// the timer recurses forever.
    #[must_use]
    pub fn timer(
        scheduler: AnyScheduler,
        interval: Duration,
        make_action: impl Fn() -> Action + Send + Sync + 'static,
    ) -> Self {
        let make_action = Arc::new(make_action);
        Self::task(scheduler, move |ctx| tick(&ctx, interval, make_action))
    }

    /// Deliver every action this effect emits through `scheduler`.
    ///
    /// The equivalent of hopping back onto the main queue before feeding a
    /// response into the store.
    #[must_use]
    pub fn receive_on(self, scheduler: AnyScheduler) -> Self {
        self.delayed(scheduler, Duration::ZERO)
    }

    /// Delay every action this effect emits by `duration` on `scheduler`.
    ///
    /// The underlying work still starts right away; only delivery waits.
    #[must_use]
    pub fn delayed(self, scheduler: AnyScheduler, duration: Duration) -> Self {
        match self {
            Self::None => Self::None,
            Self::Cancel(ids) => Self::Cancel(ids),
            Self::Actions(actions) if actions.is_empty() => Self::None,
            Self::Actions(actions) => Self::Task(Task::new(None, move |ctx: TaskContext<Action>| {
                let ctx = ctx.deliver_via(scheduler, duration);
                for action in actions {
                    ctx.send(action);
                }
            })),
            Self::Task(task) => Self::Task(task.delayed(scheduler, duration)),
            Self::Cancellable {
                id,
                concurrency,
                effect,
            } => Self::Cancellable {
                id,
                concurrency,
                effect: Box::new(effect.delayed(scheduler, duration)),
            },
            Self::Parallel(effects) => Self::Parallel(
                effects
                    .into_iter()
                    .map(|effect| effect.delayed(Arc::clone(&scheduler), duration))
                    .collect(),
            ),
            Self::Sequential(effects) => Self::Sequential(
                effects
                    .into_iter()
                    .map(|effect| effect.delayed(Arc::clone(&scheduler), duration))
                    .collect(),
            ),
        }
    }

    /// Transform every action this effect emits.
    ///
    /// Used to lift a child feature's effect into its parent's action type.
    #[must_use]
    pub fn map<B: Send + 'static>(
        self,
        transform: impl Fn(Action) -> B + Send + Sync + 'static,
    ) -> Effect<B> {
        let transform: Arc<dyn Fn(Action) -> B + Send + Sync> = Arc::new(transform);
        self.map_shared(&transform)
    }

    fn map_shared<B: Send + 'static>(
        self,
        transform: &Arc<dyn Fn(Action) -> B + Send + Sync>,
    ) -> Effect<B> {
        match self {
            Self::None => Effect::None,
            Self::Actions(actions) => Effect::Actions(actions.into_iter().map(|a| transform(a)).collect()),
            Self::Task(task) => Effect::Task(task.map(Arc::clone(transform))),
            Self::Cancel(ids) => Effect::Cancel(ids),
            Self::Cancellable {
                id,
                concurrency,
                effect,
            } => Effect::Cancellable {
                id,
                concurrency,
                effect: Box::new(effect.map_shared(transform)),
            },
            Self::Parallel(effects) => {
                Effect::Parallel(effects.into_iter().map(|e| e.map_shared(transform)).collect())
            },
            Self::Sequential(effects) => {
                Effect::Sequential(effects.into_iter().map(|e| e.map_shared(transform)).collect())
            },
        }
    }
}

fn tick<Action, F>(ctx: &TaskContext<Action>, interval: Duration, make_action: Arc<F>)
where
    Action: Send + 'static,
    F: Fn() -> Action + Send + Sync + 'static,
{
    ctx.after(interval, move |ctx| {
        ctx.send(make_action());
        tick(&ctx, interval, make_action);
    });
}

/// Asynchronous work bound to an optional scheduler.
pub struct Task<Action> {
    scheduler: Option<AnyScheduler>,
    work: Box<dyn FnOnce(TaskContext<Action>) + Send + 'static>,
}

impl<Action> fmt::Debug for Task<Action> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheduler {
            Some(scheduler) => write!(f, "<task on {}>", scheduler.name()),
            None => write!(f, "<task>"),
        }
    }
}

impl<Action: Send + 'static> Task<Action> {
    /// Wrap `work`, to be started on `scheduler` (or inline when `None`).
    pub fn new(
        scheduler: Option<AnyScheduler>,
        work: impl FnOnce(TaskContext<Action>) + Send + 'static,
    ) -> Self {
        Self {
            scheduler,
            work: Box::new(work),
        }
    }

    /// The scheduler this task is bound to, if any.
    #[must_use]
    pub fn scheduler(&self) -> Option<&AnyScheduler> {
        self.scheduler.as_ref()
    }

    /// Start the task.
    ///
    /// Emitted actions go to `sink`. `on_complete` runs once the task
    /// finishes naturally; it never runs if `handle` is cancelled first,
    /// nor if the scheduler drops the work without running it.
    pub fn run(
        self,
        sink: Sink<Action>,
        handle: CancelHandle,
        on_complete: impl FnOnce() + Send + 'static,
    ) {
        let ctx = TaskContext::new(sink, handle.clone(), self.scheduler.clone(), on_complete);
        let work = self.work;
        match self.scheduler {
            Some(scheduler) => {
                let deferred = Deferred::new(ctx);
                let pending = scheduler.schedule_now(Box::new(move || {
                    if let Some(ctx) = deferred.take().filter(|ctx| !ctx.is_cancelled()) {
                        work(ctx);
                    }
                }));
                handle.adopt(&pending);
            },
            None => work(ctx),
        }
    }

    fn map<B: Send + 'static>(self, transform: Arc<dyn Fn(Action) -> B + Send + Sync>) -> Task<B> {
        let work = self.work;
        Task {
            scheduler: self.scheduler,
            work: Box::new(move |ctx: TaskContext<B>| work(ctx.embed(transform))),
        }
    }

    fn delayed(self, scheduler: AnyScheduler, duration: Duration) -> Self {
        let work = self.work;
        Self {
            scheduler: self.scheduler,
            work: Box::new(move |ctx: TaskContext<Action>| work(ctx.deliver_via(scheduler, duration))),
        }
    }
}

struct CompletionGuard {
    handle: CancelHandle,
    /// Set when a scheduler dropped queued work holding this task.
    abandoned: AtomicBool,
    on_complete: Mutex<Option<Completion>>,
}

impl CompletionGuard {
    fn complete(&self) {
        if self.handle.is_cancelled() {
            return;
        }
        let on_complete = lock(&self.on_complete).take();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.handle.is_cancelled() || *self.abandoned.get_mut() {
            return;
        }
        let on_complete = self
            .on_complete
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }
}

/// A context parked in scheduled work.
///
/// Dropping it before [`take`](Self::take) means the scheduler discarded the
/// work unrun (a dropped test clock, a runtime shutting down), so the task is
/// marked abandoned instead of completing.
struct Deferred<Action> {
    ctx: Option<TaskContext<Action>>,
}

impl<Action> Deferred<Action> {
    fn new(ctx: TaskContext<Action>) -> Self {
        Self { ctx: Some(ctx) }
    }

    fn take(mut self) -> Option<TaskContext<Action>> {
        self.ctx.take()
    }
}

impl<Action> Drop for Deferred<Action> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            tracing::debug!("Scheduled work dropped unrun; task abandoned");
            ctx.completion.abandoned.store(true, Ordering::Release);
        }
    }
}

/// The capabilities handed to a running task.
///
/// Cloning shares the task: it completes when [`finish`](Self::finish) is
/// called or the last clone drops, whichever comes first.
pub struct TaskContext<Action> {
    sink: Sink<Action>,
    handle: CancelHandle,
    scheduler: Option<AnyScheduler>,
    completion: Arc<CompletionGuard>,
}

impl<Action> Clone for TaskContext<Action> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            handle: self.handle.clone(),
            scheduler: self.scheduler.clone(),
            completion: Arc::clone(&self.completion),
        }
    }
}

impl<Action> fmt::Debug for TaskContext<Action> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.is_cancelled())
            .field("scheduler", &self.scheduler.as_ref().map(|s| s.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl<Action> TaskContext<Action> {
    /// Build a context. Runtimes call this; reducers never need to.
    pub fn new(
        sink: Sink<Action>,
        handle: CancelHandle,
        scheduler: Option<AnyScheduler>,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            sink,
            completion: Arc::new(CompletionGuard {
                handle: handle.clone(),
                abandoned: AtomicBool::new(false),
                on_complete: Mutex::new(Some(Box::new(on_complete))),
            }),
            handle,
            scheduler,
        }
    }

    /// Emit an action, unless the task has been cancelled.
    pub fn send(&self, action: Action) {
        if self.is_cancelled() {
            return;
        }
        (self.sink)(action);
    }

    /// Whether the task has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Run `hook` when the task is cancelled (immediately if it already is).
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        self.handle.on_cancel(hook);
    }

    /// The task's cancellation handle.
    #[must_use]
    pub const fn handle(&self) -> &CancelHandle {
        &self.handle
    }

    /// The scheduler this task runs on, if any.
    #[must_use]
    pub const fn scheduler(&self) -> Option<&AnyScheduler> {
        self.scheduler.as_ref()
    }

    /// Mark the task as completed now, regardless of live clones.
    pub fn finish(self) {
        self.completion.complete();
    }

    /// A context for a different action type that forwards into this one.
    fn embed<Inner: 'static>(
        &self,
        transform: Arc<dyn Fn(Inner) -> Action + Send + Sync>,
    ) -> TaskContext<Inner>
    where
        Action: 'static,
    {
        let sink = Arc::clone(&self.sink);
        TaskContext {
            sink: Arc::new(move |action| sink(transform(action))),
            handle: self.handle.clone(),
            scheduler: self.scheduler.clone(),
            completion: Arc::clone(&self.completion),
        }
    }
}

impl<Action: Send + 'static> TaskContext<Action> {
    /// Run `continuation` after `delay` on the task's scheduler.
    ///
    /// Without a scheduler the continuation runs inline. Nothing runs if the
    /// task is cancelled before the delay elapses.
    pub fn after(&self, delay: Duration, continuation: impl FnOnce(TaskContext<Action>) + Send + 'static) {
        if self.is_cancelled() {
            return;
        }
        let ctx = self.clone();
        match &self.scheduler {
            Some(scheduler) => {
                let deferred = Deferred::new(ctx);
                let pending = scheduler.schedule_after(
                    delay,
                    Box::new(move || {
                        if let Some(ctx) = deferred.take().filter(|ctx| !ctx.is_cancelled()) {
                            continuation(ctx);
                        }
                    }),
                );
                self.handle.adopt(&pending);
            },
            None => continuation(ctx),
        }
    }

    /// A context whose emissions hop through `scheduler` after `delay`.
    fn deliver_via(&self, scheduler: AnyScheduler, delay: Duration) -> Self {
        let outer = self.clone();
        let sink: Sink<Action> = Arc::new(move |action| {
            let target = Deferred::new(outer.clone());
            let pending = scheduler.schedule_after(
                delay,
                Box::new(move || {
                    if let Some(target) = target.take() {
                        target.send(action);
                    }
                }),
            );
            outer.handle.adopt(&pending);
        });
        Self {
            sink,
            handle: self.handle.clone(),
            scheduler: self.scheduler.clone(),
            completion: Arc::clone(&self.completion),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::scheduler::ImmediateScheduler;
    use crate::scheduler::{Scheduler, Work};

    #[derive(Clone, Debug, PartialEq)]
    enum Child {
        Tick,
        Loaded(u32),
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Parent {
        Child(Child),
    }

    fn collect<A: Send + 'static>() -> (Sink<A>, Arc<Mutex<Vec<A>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&received);
        (Arc::new(move |a| target.lock().unwrap().push(a)), received)
    }

    #[test]
    fn merge_with_flattens_and_skips_none() {
        let effect = Effect::send(1).merge_with(Effect::none()).merge_with(Effect::send(2));
        match effect {
            Effect::Parallel(effects) => assert_eq!(effects.len(), 2),
            other => panic!("expected Parallel, got {other:?}"),
        }
        assert!(Effect::<u8>::none().merge_with(Effect::none()).is_none());
    }

    #[test]
    fn then_builds_sequence() {
        let effect = Effect::send(1).then(Effect::send(2)).then(Effect::send(3));
        assert!(matches!(effect, Effect::Sequential(ref e) if e.len() == 3));
    }

    #[test]
    fn cancellable_none_stays_none() {
        assert!(matches!(Effect::<u8>::none().cancellable("id"), Effect::None));
        let tagged = Effect::send(1).cancellable_with("id", Concurrency::Allow);
        assert!(matches!(
            tagged,
            Effect::Cancellable { concurrency: Concurrency::Allow, .. }
        ));
    }

    #[test]
    fn is_none_sees_through_composition() {
        let empty: Effect<u8> = Effect::merge(vec![Effect::none(), Effect::concatenate(vec![])]);
        assert!(empty.is_none());
        assert!(Effect::<u8>::just(vec![]).is_none());
        assert!(!Effect::<u8>::cancel("x").is_none());
        assert!(!Effect::<u8>::fire_and_forget(|| {}).is_none());
    }

    #[test]
    fn map_lifts_actions_and_tasks() {
        let effect: Effect<Parent> = Effect::merge(vec![
            Effect::send(Child::Tick),
            Effect::task(ImmediateScheduler::shared(), |ctx| ctx.send(Child::Loaded(7))),
        ])
        .map(Parent::Child);

        let Effect::Parallel(mut effects) = effect else {
            panic!("expected Parallel");
        };
        let Effect::Task(task) = effects.pop().unwrap() else {
            panic!("expected Task");
        };
        assert!(matches!(
            effects.pop().unwrap(),
            Effect::Actions(ref actions) if actions == &[Parent::Child(Child::Tick)]
        ));

        let (sink, received) = collect();
        task.run(sink, CancelHandle::new(), || {});
        assert_eq!(*received.lock().unwrap(), vec![Parent::Child(Child::Loaded(7))]);
    }

    #[test]
    fn task_completes_when_context_drops() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let (sink, received) = collect();

        let Effect::Task(task) = Effect::catching(
            ImmediateScheduler::shared(),
            || Err::<u32, &str>("offline"),
            |result| result.map_or(0, |n| n),
        ) else {
            panic!("expected Task");
        };
        task.run(sink, CancelHandle::new(), move || flag.store(true, Ordering::SeqCst));

        assert_eq!(*received.lock().unwrap(), vec![0]);
        assert!(completed.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelled_task_never_completes_or_emits() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let (sink, received) = collect();
        let stash = Arc::new(Mutex::new(None));
        let parked = Arc::clone(&stash);

        let task = Task::new(None, move |ctx: TaskContext<u32>| {
            *parked.lock().unwrap() = Some(ctx);
        });
        let handle = CancelHandle::new();
        task.run(sink, handle.clone(), move || flag.store(true, Ordering::SeqCst));

        handle.cancel();
        let ctx = stash.lock().unwrap().take().unwrap();
        ctx.send(1);
        drop(ctx);

        assert!(received.lock().unwrap().is_empty());
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[test]
    fn finish_completes_despite_live_clones() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let (sink, _received) = collect::<u32>();
        let ctx = TaskContext::new(sink, CancelHandle::new(), None, move || {
            flag.store(true, Ordering::SeqCst);
        });

        let clone = ctx.clone();
        ctx.finish();
        assert!(completed.load(Ordering::SeqCst));
        drop(clone);
    }

    /// Accepts work and throws it away, like a runtime that is shutting down.
    struct DiscardingScheduler;

    impl Scheduler for DiscardingScheduler {
        fn schedule_after(&self, _delay: Duration, work: Work) -> CancelHandle {
            drop(work);
            CancelHandle::new()
        }

        fn name(&self) -> &str {
            "discarding"
        }
    }

    #[test]
    fn task_dropped_by_its_scheduler_never_completes() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let (sink, received) = collect::<u32>();

        let task = Task::new(Some(Arc::new(DiscardingScheduler)), |ctx: TaskContext<u32>| ctx.send(1));
        task.run(sink, CancelHandle::new(), move || flag.store(true, Ordering::SeqCst));

        assert!(received.lock().unwrap().is_empty());
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[test]
    fn continuation_dropped_by_its_scheduler_abandons_the_task() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let (sink, _received) = collect::<u32>();
        let ctx = TaskContext::new(
            sink,
            CancelHandle::new(),
            Some(Arc::new(DiscardingScheduler)),
            move || flag.store(true, Ordering::SeqCst),
        );

        ctx.after(Duration::from_secs(1), |ctx| ctx.send(1));
        drop(ctx);

        assert!(!completed.load(Ordering::SeqCst));
    }

    #[test]
    fn after_without_scheduler_runs_inline() {
        let (sink, received) = collect();
        let ctx = TaskContext::new(sink, CancelHandle::new(), None, || {});
        ctx.after(Duration::from_secs(5), |ctx| ctx.send("late"));
        assert_eq!(*received.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn debug_output_names_variants() {
        let effect = Effect::send(1).cancellable("load");
        let rendered = format!("{effect:?}");
        assert!(rendered.contains("Effect::Cancellable"));
        assert!(rendered.contains("load"));

        let task: Effect<u8> = Effect::task(ImmediateScheduler::shared(), |_| {});
        assert_eq!(format!("{task:?}"), "Effect::Task(<task on immediate>)");
    }
}
