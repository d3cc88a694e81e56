//! Concurrent store of stubbing rules, invocation records and per-context
//! state, keyed by (mock, context) (C5).

use dashmap::DashMap;
use parking_lot::RwLock;

use std::{
    any::type_name,
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
    thread::ThreadId,
};

use crate::{
    context::ContextId,
    id::{MethodId, MockId},
    invocation::Invocation,
    rule::StubbingRule,
    value::BoxedArg,
};

/// Static metadata about a mocked/spied type, used for `Debug` formatting
/// (the Rust analogue of the Java `toString` format named in spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct MockMetadata {
    /// Name of the mocked trait.
    pub trait_name: &'static str,
    /// Whether this proxy is a spy (delegates on miss) or a pure mock.
    pub is_spy: bool,
}

/// The identity anchor shared by a proxy and everything the registry records
/// about it.
///
/// A proxy (`Mock<Trait>`/`Spy<Trait, R>`) owns one `Arc<MockCoreInner>`.
/// [`Invocation`] only ever stores a [`Weak`] reference to it (data model,
/// §3: "`mock` (weakly held; may be reclaimed while the record lives)"), so
/// recorded history never keeps a dropped mock's state alive.
pub struct MockCoreInner {
    pub(crate) id: MockId,
    pub(crate) metadata: MockMetadata,
}

impl fmt::Debug for MockCoreInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.metadata.is_spy { "Spy" } else { "Mock" };
        write!(f, "{kind}<{}>@{}", self.metadata.trait_name, self.id)
    }
}

/// Handle embedded in every generated proxy; owns the identity anchor and
/// exposes the operations the dispatcher needs.
#[derive(Clone)]
pub struct MockCore {
    inner: Arc<MockCoreInner>,
}

impl MockCore {
    /// Creates a fresh identity for a newly constructed mock/spy.
    pub fn new<T: ?Sized>(is_spy: bool) -> Self {
        let inner = Arc::new(MockCoreInner {
            id: MockId::next(),
            metadata: MockMetadata {
                trait_name: type_name::<T>(),
                is_spy,
            },
        });
        Self { inner }
    }

    /// Stable identity of this mock/spy.
    pub fn id(&self) -> MockId {
        self.inner.id
    }

    /// Metadata recorded at construction time.
    pub fn metadata(&self) -> MockMetadata {
        self.inner.metadata
    }

    pub(crate) fn weak(&self) -> Weak<MockCoreInner> {
        Arc::downgrade(&self.inner)
    }
}

impl fmt::Debug for MockCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl PartialEq for MockCore {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MockCore {}

impl std::hash::Hash for MockCore {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

#[derive(Default)]
struct ContextBucket {
    rules: Vec<StubbingRule>,
    invocations: Vec<Arc<Invocation>>,
    state: Option<BoxedArg>,
}

#[derive(Default)]
struct MockBucket {
    anchor: Option<Weak<MockCoreInner>>,
    contexts: HashMap<ContextId, ContextBucket>,
}

/// The concurrent store backing every mock/spy (C5).
///
/// One process-wide instance (see [`registry()`]) backs every mock, keyed by
/// [`MockId`]. Each mock's own data is further partitioned by [`ContextId`]
/// inside a [`parking_lot::RwLock`], so unrelated mocks never contend on one
/// global lock and readers of one bucket never block on a writer of another.
#[derive(Default)]
pub struct MockRegistry {
    mocks: DashMap<MockId, RwLock<MockBucket>>,
}

impl MockRegistry {
    /// Registers a freshly created mock/spy so its bucket can be found by
    /// id. Idempotent.
    pub(crate) fn register(&self, core: &MockCore) {
        self.mocks
            .entry(core.id())
            .or_default()
            .write()
            .anchor
            .get_or_insert_with(|| core.weak());
    }

    fn with_bucket<R>(&self, mock: MockId, f: impl FnOnce(&mut MockBucket) -> R) -> Option<R> {
        let entry = self.mocks.get(&mock)?;
        let mut bucket = entry.write();
        if let Some(anchor) = &bucket.anchor {
            if anchor.upgrade().is_none() {
                drop(bucket);
                self.mocks.remove(&mock);
                return None;
            }
        }
        Some(f(&mut bucket))
    }

    /// Appends `record` to the invocation history for (mock, its context).
    pub fn record_invocation(&self, mock: MockId, record: Invocation) -> Arc<Invocation> {
        let record = Arc::new(record);
        let ctx = record.context().clone();
        self.with_bucket(mock, |bucket| {
            bucket
                .contexts
                .entry(ctx)
                .or_default()
                .invocations
                .push(Arc::clone(&record));
        });
        record
    }

    /// Pops the most recent invocation appended by `thread` for `method`
    /// under (mock, context). Used by the stubbing/verification DSL to undo
    /// a probe call.
    ///
    /// Keying by thread id + method identity (rather than "pop the global
    /// tail", which spec.md §9 flags as racy in the source) is the stricter
    /// resolution to that Open Question: a concurrent recorder on another
    /// thread can never have its own, unrelated invocation popped by this
    /// call.
    pub fn remove_last_invocation(
        &self,
        mock: MockId,
        ctx: &ContextId,
        method: MethodId,
        thread: ThreadId,
    ) {
        self.with_bucket(mock, |bucket| {
            if let Some(context) = bucket.contexts.get_mut(ctx) {
                if let Some(pos) = context
                    .invocations
                    .iter()
                    .rposition(|rec| rec.method() == method && rec.thread_id() == thread)
                {
                    context.invocations.remove(pos);
                }
            }
        });
    }

    /// Appends a newly constructed rule; insertion order defines "newest"
    /// for [`Self::find_stubbing_rule`].
    pub fn add_stubbing_rule(&self, mock: MockId, ctx: ContextId, rule: StubbingRule) {
        self.with_bucket(mock, |bucket| {
            bucket.contexts.entry(ctx).or_default().rules.push(rule);
        });
    }

    /// Selects the newest non-expired rule matching `method`/`args` under
    /// `current_state`, per the algorithm in spec.md §4.3.
    pub fn find_stubbing_rule(
        &self,
        mock: MockId,
        ctx: &ContextId,
        method: MethodId,
        args: &[BoxedArg],
        current_state: Option<&BoxedArg>,
    ) -> Option<StubbingRule> {
        self.with_bucket(mock, |bucket| {
            let context = bucket.contexts.get(ctx)?;
            context
                .rules
                .iter()
                .rev()
                .find(|rule| rule.accepts(method, args, current_state))
                .cloned()
        })
        .flatten()
    }

    /// Snapshot, in append order, of every invocation recorded for (mock, context).
    pub fn get_invocation_records(&self, mock: MockId, ctx: &ContextId) -> Vec<Arc<Invocation>> {
        self.with_bucket(mock, |bucket| {
            bucket
                .contexts
                .get(ctx)
                .map(|context| context.invocations.clone())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Sets the per-context state token.
    pub fn set_state(&self, mock: MockId, ctx: ContextId, value: BoxedArg) {
        self.with_bucket(mock, |bucket| {
            bucket.contexts.entry(ctx).or_default().state = Some(value);
        });
    }

    /// Reads the per-context state token, if any.
    pub fn get_state(&self, mock: MockId, ctx: &ContextId) -> Option<BoxedArg> {
        self.with_bucket(mock, |bucket| {
            bucket.contexts.get(ctx).and_then(|c| c.state.clone())
        })
        .flatten()
    }

    /// Drops every rule, invocation and state entry for `mock`, across all
    /// contexts.
    pub fn reset(&self, mock: MockId) {
        self.mocks.remove(&mock);
    }

    /// Drops rules, invocations and state for (mock, context) only, leaving
    /// other contexts of the same mock untouched.
    pub fn reset_context(&self, mock: MockId, ctx: &ContextId) {
        self.with_bucket(mock, |bucket| {
            bucket.contexts.remove(ctx);
        });
    }

    /// Drops buckets whose anchor mock has been dropped. Cheap to call
    /// opportunistically; every read/write path above also self-prunes its
    /// own bucket lazily on a failed upgrade.
    pub fn prune_dead(&self) {
        self.mocks
            .retain(|_, bucket| bucket.read().anchor.as_ref().map_or(true, |a| a.upgrade().is_some()));
    }
}

static REGISTRY: once_cell::sync::Lazy<MockRegistry> = once_cell::sync::Lazy::new(MockRegistry::default);

/// The one process-wide [`MockRegistry`] instance every mock/spy registers
/// with.
pub fn registry() -> &'static MockRegistry {
    &REGISTRY
}
