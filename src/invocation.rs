//! Immutable record of one observed call (C3).

use std::{
    fmt,
    sync::{atomic::{AtomicBool, Ordering}, Weak},
    thread::ThreadId,
    time::Instant,
};

use crate::{context::ContextId, id::MethodId, registry::MockCoreInner, value::BoxedArg};

/// One observed call on a mock or spy.
///
/// Two `Invocation`s are never equal structurally (the data model says so
/// explicitly: "identity is the record itself"), so this type deliberately
/// does not implement `PartialEq`; verification compares arguments, not
/// whole invocations.
pub struct Invocation {
    pub(crate) mock: Weak<MockCoreInner>,
    pub(crate) method: MethodId,
    pub(crate) args: Vec<BoxedArg>,
    pub(crate) context: ContextId,
    pub(crate) timestamp: Instant,
    pub(crate) thread_id: ThreadId,
    pub(crate) verified: AtomicBool,
}

impl Invocation {
    pub(crate) fn new(
        mock: Weak<MockCoreInner>,
        method: MethodId,
        args: Vec<BoxedArg>,
        context: ContextId,
    ) -> Self {
        Self {
            mock,
            method,
            args,
            context,
            timestamp: Instant::now(),
            thread_id: std::thread::current().id(),
            verified: AtomicBool::new(false),
        }
    }

    /// Method this invocation called.
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Arguments the call was made with (defensive copies taken at dispatch
    /// time, so later mutation by the caller is never observed here).
    pub fn args(&self) -> &[BoxedArg] {
        &self.args
    }

    /// Context this invocation was recorded under.
    pub fn context(&self) -> &ContextId {
        &self.context
    }

    /// When this invocation was dispatched.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Thread this invocation was dispatched from.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether a verification has already matched this invocation.
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_verified(&self) {
        self.verified.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("args", &self.args)
            .field("context", &self.context)
            .field("thread_id", &self.thread_id)
            .field("verified", &self.is_verified())
            .finish()
    }
}
