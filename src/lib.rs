//! A context-partitioned mocking and spying engine.
//!
//! Ordinary mocking libraries key stubbing rules and recorded invocations by
//! the mock instance alone. That falls apart the moment a single mock
//! instance is exercised by more than one logical actor at once — e.g. a
//! shared repository mock driving several simulated tenants, or a service
//! mock replayed across multiple async tasks on a thread pool — because one
//! actor's stubbing silently clobbers or shadows another's.
//!
//! `ctxmock` adds one more key to every stubbing rule, invocation record and
//! piece of per-mock state: a [`ContextId`](context::ContextId). Two calls to
//! the same mock under two different contexts behave as if they hit two
//! independent mocks; [`scoped_context`] is how a test (or the code under
//! test) declares which context is active on the calling thread.
//!
//! # Mocking a trait
//!
//! ```ignore
//! #[ctxmock::mockable]
//! trait Greeter {
//!     fn greet(&self, name: String) -> String;
//! }
//!
//! ctxmock::scoped_context("alice", || {
//!     let mock = MockGreeter::new();
//!     ctxmock::given(&mock)
//!         .when(|m| m.greet(ctxmock::eq(String::from("Alice"))))
//!         .then_return(String::from("hi, Alice"));
//!
//!     assert_eq!(mock.greet(String::from("Alice")), "hi, Alice");
//!
//!     ctxmock::verify(&mock)
//!         .that(|m| m.greet(String::from("Alice")), ctxmock::times(1))
//!         .unwrap();
//! });
//! ```
//!
//! `#[ctxmock::mockable]` expands a trait definition into a `Mock<Trait>`
//! proxy (panics on an unstubbed call) and a `Spy<Trait>` proxy (falls back to
//! a wrapped real implementation on an unstubbed call) that both route every
//! method through [`dispatch::invoke`]. See `ctxmock-derive` for the macro's
//! supported subset of trait shapes.
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`context`] | Context identifiers and the thread-local "current context" slot |
//! | [`matchers`] | Argument matchers and the per-thread matcher buffer |
//! | [`invocation`] | Immutable invocation records |
//! | [`rule`] | Stubbing rules and their actions |
//! | [`registry`] | The concurrent store backing every mock |
//! | [`dispatch`] | The call-dispatch algorithm shared by mocks and spies |
//! | [`dsl`] | `given`/`verify` fluent surface |
//! | [`modes`] | Verification modes (`times`, `at_least`, `at_most`) |

mod context;
mod dispatch;
mod dsl;
mod error;
mod id;
mod invocation;
mod matchers;
mod modes;
mod registry;
mod rule;
mod value;

pub use ctxmock_derive::mockable;

pub use context::{scoped_context, ContextHolder, ContextId, ScopedContext};
pub use dispatch::{invoke, Fallback};
pub use dsl::{given, verify, Given, OngoingStubbing, Verification};
pub use error::MockError;
pub use id::{MethodId, MockId};
pub use invocation::Invocation;
pub use matchers::{
    any, any_bool, any_double, any_int, any_long, any_string, arg_that, capture, contains,
    double_that, ends_with, eq, int_that, is_null, long_that, matches_regex, not_null,
    starts_with, ArgMatcher, Captor,
};
pub use modes::{at_least, at_least_once, at_most, never, times, VerificationMode};
pub use registry::{registry, MockCore, MockMetadata};
pub use rule::{Action, StubbingRule};
pub use value::BoxedArg;

/// Registers a freshly constructed [`MockCore`] with the process-wide
/// registry. Called by code generated by `#[mockable]`; user code never
/// needs this directly.
#[doc(hidden)]
pub fn register(core: &MockCore) {
    registry().register(core);
}

/// Drops every rule, invocation and state entry recorded for `mock`, across
/// every context. Intended for test teardown between otherwise-independent
/// test cases sharing one mock instance.
pub fn reset(mock: &MockCore) {
    registry().reset(mock.id());
}

/// Drops rules, invocations and state for (`mock`, `ctx`) only, leaving the
/// mock's other contexts untouched.
pub fn reset_context(mock: &MockCore, ctx: &ContextId) {
    registry().reset_context(mock.id(), ctx);
}

/// Every invocation recorded for (`mock`, `ctx`), in call order. Mostly
/// useful for custom verification logic beyond [`verify`]'s mode-based
/// matching.
pub fn invocations_for(mock: &MockCore, ctx: &ContextId) -> Vec<std::sync::Arc<Invocation>> {
    registry().get_invocation_records(mock.id(), ctx)
}
