//! Stable identities for mocks and methods.
//!
//! Neither type carries any reflection-derived information; both are plain
//! value types computed once at proxy-construction / macro-expansion time and
//! then compared by equality, mirroring the "identity, not value equality"
//! requirement for mocks (data model, §3) and the "stable identity of the
//! method" requirement for invocation records.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Opaque identity of a single mocked/spied proxy instance.
///
/// Two `MockId`s are equal if and only if they were minted for the same
/// `MockCore` (i.e. the same mock/spy instance, not two instances that
/// happen to hold equal state). This is the "identity hash" the registry
/// keys on. Ids come from a monotonic counter rather than an allocation
/// address, so a reclaimed mock's id is never reused by a later one — the
/// "entry disappears" semantics for a dropped mock (see `DESIGN.md`) never
/// has to worry about an unrelated live mock coincidentally reusing its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockId(pub(crate) usize);

impl MockId {
    /// Mints a fresh, globally unique id. Called once per `MockCore`.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Stable identity of a method on a mocked trait.
///
/// Generated proxies construct one `MethodId` per trait method at compile
/// time (a `&'static str` pair is enough: no two methods in one `#[mockable]`
/// trait share a name, and distinct traits never compare their `MethodId`s
/// against each other in practice since each mock is only ever matched
/// against rules registered for the same mock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    /// Name of the trait the method belongs to, e.g. `"UserService"`.
    pub trait_name: &'static str,
    /// Name of the method itself, e.g. `"get_user"`.
    pub method_name: &'static str,
}

impl MethodId {
    /// Creates a new method identity. Used by generated proxy code.
    pub const fn new(trait_name: &'static str, method_name: &'static str) -> Self {
        Self {
            trait_name,
            method_name,
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.trait_name, self.method_name)
    }
}
