//! Cancellation: handles, identities and the per-store registry.
//!
//! A [`CancelHandle`] is a cloneable, idempotent token. Handles form a tree:
//! cancelling a parent cancels every live child, and hooks attached with
//! [`CancelHandle::on_cancel`] run exactly once.
//!
//! An [`EffectId`] names a family of effects so a reducer can cancel them
//! later. The [`CancellationRegistry`] maps identities to the live handles of
//! in-flight effects for one store.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cooperative cancellation token.
///
/// Cloning shares the token. Cancelling is idempotent.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<HandleInner>,
}

#[derive(Default)]
struct HandleInner {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<Hook>>,
    // Weak so that finished children don't outlive their work.
    children: Mutex<Vec<Weak<HandleInner>>>,
}

impl CancelHandle {
    /// Create a fresh, live handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner::default()),
        }
    }

    /// Create a handle that is cancelled whenever `self` is.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        self.adopt(&child);
        child
    }

    /// Link an existing handle so it is cancelled whenever `self` is.
    ///
    /// If `self` is already cancelled, `child` is cancelled right away.
    pub fn adopt(&self, child: &Self) {
        if self.is_cancelled() {
            child.cancel();
            return;
        }

        {
            let mut children = lock(&self.inner.children);
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        // A concurrent cancel may have taken the children before our push.
        if self.is_cancelled() {
            child.cancel();
        }
    }

    /// Run `hook` when this handle is cancelled.
    ///
    /// Runs `hook` immediately if the handle is already cancelled.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            hook();
            return;
        }

        let mut hooks = lock(&self.inner.hooks);
        if self.is_cancelled() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }

    /// Cancel this handle and every live descendant.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let hooks = std::mem::take(&mut *lock(&self.inner.hooks));
        for hook in hooks {
            hook();
        }

        let children = std::mem::take(&mut *lock(&self.inner.children));
        for inner in children.iter().filter_map(Weak::upgrade) {
            Self { inner }.cancel();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called on this handle or an ancestor.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Cancellation identity for a family of effects.
///
/// Identities are scoped to the store that runs the effect.
///
/// ```
/// use reflux_core::EffectId;
///
/// const SEARCH: EffectId = EffectId::from_static("search");
/// assert_eq!(SEARCH, EffectId::new("search"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(Cow<'static, str>);

impl EffectId {
    /// Create an identity from any string.
    #[must_use]
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Create an identity in a `const` context.
    #[must_use]
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EffectId {
    fn from(id: &'static str) -> Self {
        Self::from_static(id)
    }
}

impl From<String> for EffectId {
    fn from(id: String) -> Self {
        Self(Cow::Owned(id))
    }
}

impl From<&EffectId> for EffectId {
    fn from(id: &EffectId) -> Self {
        id.clone()
    }
}

/// What happens when an effect starts under an identity that already has
/// live work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Concurrency {
    /// Cancel the in-flight work first (last writer wins).
    #[default]
    CancelInFlight,
    /// Let several instances run side by side under the same identity.
    Allow,
}

/// Receipt for a registration, used to mark natural completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationToken(u64);

/// Snapshot of one live registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightEffect {
    /// Registration receipt.
    pub token: RegistrationToken,
    /// Identity, or `None` for anonymous tasks.
    pub id: Option<EffectId>,
}

impl fmt::Display for InFlightEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "<anonymous task #{}>", self.token.0),
        }
    }
}

struct Registration {
    id: Option<EffectId>,
    handle: CancelHandle,
}

/// Table of in-flight effects owned by one store.
///
/// Registrations are removed either on natural completion
/// ([`complete`](Self::complete)) or by a cancel hook installed at
/// [`register`](Self::register) time, so the table only ever holds live work.
#[derive(Default)]
pub struct CancellationRegistry {
    next_token: AtomicU64,
    entries: Mutex<HashMap<u64, Registration>>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Track `handle` under `id` (or anonymously) until it completes or is cancelled.
    pub fn register(self: &Arc<Self>, id: Option<EffectId>, handle: &CancelHandle) -> RegistrationToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(token, id = ?id, "Registering effect");

        lock(&self.entries).insert(
            token,
            Registration {
                id,
                handle: handle.clone(),
            },
        );

        let registry = Arc::downgrade(self);
        handle.on_cancel(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(token);
            }
        });

        RegistrationToken(token)
    }

    /// Mark a registration as naturally completed.
    pub fn complete(&self, token: RegistrationToken) {
        if self.remove(token.0) {
            tracing::trace!(token = token.0, "Effect completed");
        }
    }

    fn remove(&self, token: u64) -> bool {
        // Bind first so the registration drops after the lock is released.
        let removed = lock(&self.entries).remove(&token);
        removed.is_some()
    }

    /// Cancel every live registration under `id`.
    ///
    /// Returns how many were cancelled. Unknown identities are a no-op.
    pub fn cancel(&self, id: &EffectId) -> usize {
        let handles: Vec<CancelHandle> = lock(&self.entries)
            .values()
            .filter(|registration| registration.id.as_ref() == Some(id))
            .map(|registration| registration.handle.clone())
            .collect();

        for handle in &handles {
            handle.cancel();
        }

        if !handles.is_empty() {
            tracing::debug!(%id, cancelled = handles.len(), "Cancelled effects");
        }
        handles.len()
    }

    /// Cancel everything, named or anonymous.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<CancelHandle> = lock(&self.entries)
            .values()
            .map(|registration| registration.handle.clone())
            .collect();

        for handle in &handles {
            handle.cancel();
        }
        handles.len()
    }

    /// Number of live registrations under `id`.
    #[must_use]
    pub fn live_count(&self, id: &EffectId) -> usize {
        lock(&self.entries)
            .values()
            .filter(|registration| registration.id.as_ref() == Some(id))
            .count()
    }

    /// Whether any work is live under `id`.
    #[must_use]
    pub fn is_in_flight(&self, id: &EffectId) -> bool {
        self.live_count(id) > 0
    }

    /// Snapshot of all live registrations, oldest first.
    #[must_use]
    pub fn in_flight(&self) -> Vec<InFlightEffect> {
        let mut effects: Vec<InFlightEffect> = lock(&self.entries)
            .iter()
            .map(|(token, registration)| InFlightEffect {
                token: RegistrationToken(*token),
                id: registration.id.clone(),
            })
            .collect();
        effects.sort_by_key(|effect| effect.token);
        effects
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn cancel_is_idempotent_and_runs_hooks_once() {
        let handle = CancelHandle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        handle.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        handle.clone().cancel();

        assert!(handle.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_on_cancelled_handle_runs_immediately() {
        let handle = CancelHandle::new();
        handle.cancel();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        handle.on_cancel(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelling_parent_cancels_children_not_siblings() {
        let root = CancelHandle::new();
        let parent = root.child();
        let child = parent.child();
        let sibling = root.child();

        parent.cancel();

        assert!(child.is_cancelled());
        assert!(!sibling.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn adopting_into_cancelled_parent_cancels_child() {
        let parent = CancelHandle::new();
        parent.cancel();

        let orphan = parent.child();
        assert!(orphan.is_cancelled());
    }

    #[test]
    fn dead_children_are_pruned() {
        let parent = CancelHandle::new();
        for _ in 0..100 {
            let _ = parent.child();
        }
        let _live = parent.child();

        assert_eq!(lock(&parent.inner.children).len(), 1);
    }

    #[test]
    fn registry_cancel_by_identity() {
        let registry = CancellationRegistry::new();
        let id = EffectId::new("timer");
        let other = EffectId::new("socket");

        let first = CancelHandle::new();
        let second = CancelHandle::new();
        let third = CancelHandle::new();
        registry.register(Some(id.clone()), &first);
        registry.register(Some(id.clone()), &second);
        registry.register(Some(other.clone()), &third);

        assert_eq!(registry.live_count(&id), 2);
        assert_eq!(registry.cancel(&id), 2);

        assert!(first.is_cancelled() && second.is_cancelled());
        assert!(!third.is_cancelled());
        assert!(!registry.is_in_flight(&id));
        assert!(registry.is_in_flight(&other));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancelling_unknown_identity_is_a_noop() {
        let registry = CancellationRegistry::new();
        assert_eq!(registry.cancel(&EffectId::new("missing")), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn completion_removes_registration() {
        let registry = CancellationRegistry::new();
        let handle = CancelHandle::new();
        let token = registry.register(None, &handle);

        assert_eq!(registry.len(), 1);
        registry.complete(token);
        assert!(registry.is_empty());

        // Cancelling after completion must not disturb the table.
        handle.cancel();
        assert!(registry.is_empty());
    }

    #[test]
    fn cancelling_a_handle_directly_deregisters_it() {
        let registry = CancellationRegistry::new();
        let scope = CancelHandle::new();
        let task = scope.child();
        registry.register(Some(EffectId::new("scope")), &scope);
        registry.register(None, &task);

        scope.cancel();

        assert!(registry.is_empty());
    }

    #[test]
    fn registering_a_cancelled_handle_leaves_no_entry() {
        let registry = CancellationRegistry::new();
        let handle = CancelHandle::new();
        handle.cancel();

        registry.register(Some(EffectId::new("late")), &handle);
        assert!(registry.is_empty());
    }

    #[test]
    fn in_flight_lists_oldest_first() {
        let registry = CancellationRegistry::new();
        let a = CancelHandle::new();
        let b = CancelHandle::new();
        registry.register(Some(EffectId::new("a")), &a);
        registry.register(None, &b);

        let in_flight = registry.in_flight();
        assert_eq!(in_flight.len(), 2);
        assert_eq!(in_flight[0].id, Some(EffectId::new("a")));
        assert_eq!(in_flight[1].id, None);
        assert!(in_flight[1].to_string().starts_with("<anonymous task"));

        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn effect_id_conversions() {
        const STATIC: EffectId = EffectId::from_static("ping");
        assert_eq!(EffectId::from("ping"), STATIC);
        assert_eq!(EffectId::from(String::from("ping")), STATIC);
        assert_eq!(STATIC.to_string(), "ping");
        assert_eq!(STATIC.as_str(), "ping");
    }
}
