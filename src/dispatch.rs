//! Shared call-dispatch algorithm (C6), invoked by every generated proxy
//! method body, for both mocks and spies.

use std::{any::Any, cell::RefCell, fmt};

use tracing::trace;

use crate::{
    context::ContextHolder,
    error::MockError,
    id::{MethodId, MockId},
    invocation::Invocation,
    matchers::MatcherBuffer,
    registry::{registry, MockCore},
    value::BoxedArg,
};

/// Which DSL entry point armed the current thread to capture the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    Stub,
    Verify,
}

/// A captured probe call, handed back to the DSL builder that armed it.
pub(crate) struct Capture {
    pub mock: MockId,
    pub method: MethodId,
    pub args: Vec<BoxedArg>,
    pub context: crate::context::ContextId,
    pub probe: Probe,
}

enum RecordingState {
    Idle,
    Armed(Probe),
    Captured(Capture),
}

thread_local! {
    static RECORDING: RefCell<RecordingState> = RefCell::new(RecordingState::Idle);
}

/// Arms the current thread so the next [`invoke`] call is captured rather
/// than dispatched. Used by `given()`/`verify()` entry points.
pub(crate) fn arm(probe: Probe) {
    RECORDING.with(|cell| {
        let mut state = cell.borrow_mut();
        if !matches!(*state, RecordingState::Idle) {
            panic!(
                "{}",
                MockError::StubbingMisuse(
                    "given()/verify() called while a previous probe call is still pending; \
                     call exactly one mock method before starting another"
                )
            );
        }
        *state = RecordingState::Armed(probe);
    });
}

/// Consumes the capture left by the single probe call made since [`arm`].
/// Resets the thread back to `Idle` regardless of outcome.
pub(crate) fn take_capture() -> Result<Capture, MockError> {
    RECORDING.with(|cell| match cell.replace(RecordingState::Idle) {
        RecordingState::Captured(capture) => Ok(capture),
        RecordingState::Armed(_) | RecordingState::Idle => Err(MockError::CaptureFailed),
    })
}

fn try_capture(mock: MockId, method: MethodId, args: &[BoxedArg], context: &crate::context::ContextId) -> bool {
    RECORDING.with(|cell| {
        let mut state = cell.borrow_mut();
        match *state {
            RecordingState::Armed(probe) => {
                *state = RecordingState::Captured(Capture {
                    mock,
                    method,
                    args: args.to_vec(),
                    context: context.clone(),
                    probe,
                });
                true
            }
            _ => false,
        }
    })
}

/// Real-implementation fallback for a [`invoke`] call on a spy.
pub type Fallback<T> = Box<dyn FnOnce() -> T>;

/// Runs the full dispatch algorithm for one mocked-trait method call:
///
/// 1. If the current thread is armed by `given`/`verify`, the call (and its
///    arguments) is captured instead of dispatched, and a default value is
///    returned to satisfy the method's signature without doing real work.
/// 2. Otherwise, the call is matched against this (mock, context)'s stubbing
///    rules, applied if one matches (state transitions only after a
///    non-throwing action returns), recorded as an invocation either way, and
///    falls back to `fallback` (a spy's real implementation) or a
///    type-appropriate default (a plain mock with no matching rule) on a miss.
pub fn invoke<T>(core: &MockCore, method: MethodId, args: Vec<BoxedArg>, fallback: Option<Fallback<T>>) -> T
where
    T: Any + Clone + PartialEq + fmt::Debug + Send + Sync + Default,
{
    let context = ContextHolder::try_get().unwrap_or_else(|| panic!("{}", MockError::MissingContext));

    if try_capture(core.id(), method, &args, &context) {
        trace!(mock = ?core, %method, "captured probe call");
        return T::default();
    }

    // A matcher registered on this thread/context but never consumed by a
    // `given`/`verify` probe must not leak into this, unrelated, call.
    let _ = MatcherBuffer::consume(Some(&context));

    let current_state = registry().get_state(core.id(), &context);
    let rule = registry().find_stubbing_rule(core.id(), &context, method, &args, current_state.as_ref());

    let invocation = Invocation::new(core.weak(), method, args.clone(), context.clone());
    registry().record_invocation(core.id(), invocation);

    match rule {
        Some(rule) => {
            trace!(mock = ?core, %method, "dispatched stubbed call");
            let result = apply_action(rule.action(), &context, method, &args);
            // Only reached if `apply_action` returned rather than panicked
            // (`Throw`/`Answer::Err`), so a throwing rule leaves state intact.
            if let Some(next_state) = rule.next_state() {
                registry().set_state(core.id(), context.clone(), next_state.clone());
            }
            result
        }
        None => match fallback {
            Some(fallback) => {
                trace!(mock = ?core, %method, "no stubbing matched, falling back to real implementation");
                fallback()
            }
            None => {
                trace!(mock = ?core, %method, "no stubbing matched, returning type default");
                T::default()
            }
        },
    }
}

fn apply_action<T>(
    action: &crate::rule::Action,
    context: &crate::context::ContextId,
    method: MethodId,
    args: &[BoxedArg],
) -> T
where
    T: Any + Clone + PartialEq + fmt::Debug + Send + Sync + Default,
{
    use crate::rule::Action;
    match action {
        Action::Return(value) => value
            .downcast_ref::<T>()
            .unwrap_or_else(|| panic!("stubbed return value has the wrong type for {method}"))
            .clone(),
        Action::Throw(payload) => std::panic::panic_any(payload.clone()),
        Action::Answer(answer) => match answer(context, method, args) {
            Ok(value) => value
                .downcast_ref::<T>()
                .unwrap_or_else(|| panic!("answer returned the wrong type for {method}"))
                .clone(),
            Err(payload) => std::panic::panic_any(payload),
        },
    }
}
