//! Context identifier and per-thread "current context" slot (C1).

use std::{
    any::Any,
    cell::RefCell,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::error::MockError;

/// Interface a user-defined context id must satisfy to be used as a
/// [`ContextId`]; see [`ContextId::custom`].
///
/// Implemented automatically for any `Eq + Hash + Debug + Send + Sync +
/// 'static` type via the blanket impl below, mirroring the data model's
/// requirement that the core "treats [string-wrapped and user-defined ids]
/// uniformly through an equality/hash contract".
pub trait ContextKey: Any + Send + Sync + fmt::Debug {
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;
    #[doc(hidden)]
    fn key_eq(&self, other: &dyn ContextKey) -> bool;
    #[doc(hidden)]
    fn key_hash(&self, state: &mut dyn Hasher);
}

impl<T> ContextKey for T
where
    T: Any + Eq + Hash + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn key_eq(&self, other: &dyn ContextKey) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn key_hash(&self, mut state: &mut dyn Hasher) {
        // Mix in the concrete type so two different types holding "equal"
        // representations never collide into the same bucket.
        self.as_any().type_id().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Opaque, value-equal identifier partitioning all mock interactions.
///
/// Cheap to clone (an `Arc` bump); equality and hashing delegate to the
/// wrapped [`ContextKey`], so two independently constructed `ContextId`s
/// that wrap equal values compare equal, matching the data model's "value
/// equal" requirement for context ids.
#[derive(Clone)]
pub struct ContextId(Arc<dyn ContextKey>);

impl ContextId {
    /// Wraps a plain string as a context id. This is the "string-wrapped id"
    /// variant named in the data model (§3).
    pub fn named(name: impl Into<String>) -> Self {
        Self::custom(name.into())
    }

    /// Wraps a user-defined id type. This is the "user-defined id" variant
    /// named in the data model (§3).
    pub fn custom<K>(key: K) -> Self
    where
        K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(key))
    }

    /// Attempts to view the wrapped value as a concrete `K`.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl PartialEq for ContextId {
    fn eq(&self, other: &Self) -> bool {
        self.0.key_eq(&*other.0)
    }
}

impl Eq for ContextId {}

impl Hash for ContextId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key_hash(state);
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self::named(value)
    }
}

impl From<String> for ContextId {
    fn from(value: String) -> Self {
        Self::named(value)
    }
}

std::thread_local! {
    static CURRENT: RefCell<Option<ContextId>> = RefCell::new(None);
}

/// Per-thread "current context" slot.
///
/// Thread-affine by design (§5: "Thread-local state... must not leak across
/// threads"); a worker thread spawned by the code under test must call
/// [`ContextHolder::set`] itself before interacting with mocks.
#[derive(Debug)]
pub struct ContextHolder;

impl ContextHolder {
    /// Sets the current context for this thread. Passing `None` clears it.
    pub fn set(ctx: Option<ContextId>) {
        CURRENT.with(|cell| *cell.borrow_mut() = ctx);
    }

    /// Returns the current context for this thread, or [`MockError::MissingContext`]
    /// if none is set.
    pub fn get() -> Result<ContextId, MockError> {
        CURRENT.with(|cell| cell.borrow().clone().ok_or(MockError::MissingContext))
    }

    /// Returns the current context without failing, for call sites (spies)
    /// where an absent context is a legal, if unusual, state.
    pub fn try_get() -> Option<ContextId> {
        CURRENT.with(|cell| cell.borrow().clone())
    }

    /// Clears the current context for this thread.
    pub fn clear() {
        CURRENT.with(|cell| cell.borrow_mut().take());
    }
}

/// Guard returned by [`scoped_context`]; restores the previous context on
/// drop, including when the scope unwinds via panic.
#[must_use = "the context reverts as soon as this guard is dropped"]
#[derive(Debug)]
pub struct ScopedContext {
    previous: Option<ContextId>,
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        ContextHolder::set(self.previous.take());
    }
}

/// Sets `ctx` as the current context, runs `f`, then restores whatever
/// context was active before the call — on every exit path, including a
/// panic inside `f` (the guard's `Drop` runs during unwind).
pub fn scoped_context<R>(ctx: impl Into<ContextId>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|cell| cell.replace(Some(ctx.into())));
    let _guard = ScopedContext { previous };
    f()
}

static_assertions::assert_impl_all!(ContextId: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_contexts_compare_by_value() {
        let a = ContextId::named("tenant-a");
        let b = ContextId::named("tenant-a");
        let c = ContextId::named("tenant-b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn custom_contexts_compare_by_value() {
        #[derive(Debug, PartialEq, Eq, Hash)]
        struct UserId(u64);

        let a = ContextId::custom(UserId(1));
        let b = ContextId::custom(UserId(1));
        let c = ContextId::custom(UserId(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<UserId>(), Some(&UserId(1)));
    }

    #[test]
    fn distinct_key_types_never_collide() {
        #[derive(Debug, PartialEq, Eq, Hash)]
        struct Wrapped(String);

        let stringly = ContextId::named("x");
        let wrapped = ContextId::custom(Wrapped("x".to_owned()));
        assert_ne!(stringly, wrapped);
    }

    #[test]
    fn get_fails_without_a_set_context() {
        ContextHolder::clear();
        assert!(matches!(ContextHolder::get(), Err(MockError::MissingContext)));
    }

    #[test]
    fn scoped_context_restores_previous_value_on_panic() {
        ContextHolder::set(Some(ContextId::named("outer")));
        let result = std::panic::catch_unwind(|| {
            scoped_context("inner", || {
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert_eq!(ContextHolder::get().unwrap(), ContextId::named("outer"));
        ContextHolder::clear();
    }
}
