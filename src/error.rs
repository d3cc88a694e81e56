//! Error kinds surfaced by the engine.

use std::sync::Arc;

use crate::{id::MethodId, invocation::Invocation};

/// Errors raised synchronously by the public DSL and registry operations.
///
/// None of these are recovered inside the engine (§7 of the design): they are
/// always surfaced to the caller, usually via a panic at the `given`/`verify`
/// call site, since a broken stubbing/verification expression is a test bug,
/// not a runtime condition a test should handle gracefully.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    /// An operation that requires the current context found the thread-local
    /// slot empty.
    #[error("no context is set on the current thread; call scoped_context() or ContextHolder::set() first")]
    MissingContext,

    /// `given(..).when(..)` or `verify(..).that(..)` did not observe any
    /// method call on a mock/spy proxy.
    #[error("no mocked method call was captured; call exactly one method on the proxy inside when()/that()")]
    CaptureFailed,

    /// A verification mode's expectation was violated.
    #[error(
        "verification failed for {method}({args:?}) in context {context:?}: \
         expected {expectation}, found {observed} matching invocation(s); \
         all recorded invocations: {history:?}"
    )]
    VerificationFailed {
        /// Human-readable description of the failed expectation (e.g. `"exactly 2"`).
        expectation: String,
        /// Number of invocations that matched the verification predicate.
        observed: usize,
        /// Method that was being verified.
        method: MethodId,
        /// Arguments captured by the probe call.
        args: Vec<String>,
        /// Context the verification was scoped to.
        context: String,
        /// Snapshot of every invocation recorded for (mock, context), for diagnostics.
        history: Vec<Arc<Invocation>>,
    },

    /// Misuse of the stubbing DSL: terminator called twice, matchers supplied
    /// without a preceding probe call, or a null mock/method was passed in.
    #[error("stubbing misuse: {0}")]
    StubbingMisuse(&'static str),

    /// A `null` (absent) context id, method id or mock handle was passed to a
    /// registry operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
