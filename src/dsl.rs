//! Fluent stubbing and verification surface (C7), built on top of the probe
//! capture mechanics in [`crate::dispatch`].

use std::{fmt, sync::Arc};

use crate::{
    context::ContextId,
    dispatch::{self, Probe},
    error::MockError,
    id::MethodId,
    matchers::MatcherBuffer,
    modes::VerificationMode,
    registry::registry,
    rule::{Action, StubbingRule},
    value::BoxedArg,
};

fn matchers_for(capture_args_len: usize, ctx: &ContextId) -> Option<Vec<Option<Box<dyn crate::matchers::ArgMatcher>>>> {
    let consumed = MatcherBuffer::consume(Some(ctx));
    if consumed.is_empty() {
        None
    } else if consumed.len() == capture_args_len {
        Some(consumed.into_iter().map(Some).collect())
    } else {
        panic!(
            "mixing matchers and plain arguments is not supported; if any argument uses a \
             matcher, every argument must (found {} matcher(s) for {} argument(s))",
            consumed.len(),
            capture_args_len
        );
    }
}

/// Entry point returned by [`given`]; makes exactly one probe call, then
/// hands off to [`OngoingStubbing`].
pub struct Given<'a, M> {
    mock: &'a M,
}

/// Arms the current thread to stub the next method call made on `mock`.
pub fn given<M>(mock: &M) -> Given<'_, M> {
    dispatch::arm(Probe::Stub);
    Given { mock }
}

impl<'a, M> Given<'a, M> {
    /// Makes the probe call that identifies which method/arguments to stub.
    /// The closure's return value is discarded — the proxy returns a dummy
    /// placeholder while armed, never real stubbed data.
    pub fn when<T>(self, call: impl FnOnce(&M) -> T) -> OngoingStubbing {
        call(self.mock);
        let capture = dispatch::take_capture()
            .expect("given(..).when(..) must call exactly one method on the mock");
        registry().remove_last_invocation(
            capture.mock,
            &capture.context,
            capture.method,
            std::thread::current().id(),
        );
        let matchers = matchers_for(capture.args.len(), &capture.context);
        OngoingStubbing {
            mock: capture.mock,
            method: capture.method,
            args: capture.args,
            context: capture.context,
            matchers,
            required_state: None,
            next_state: None,
            ttl_millis: 0,
        }
    }
}

/// Builder accumulating the optional preconditions of a stubbing rule before
/// a terminator (`then_return`/`then_throw`/`then_answer`) commits it.
pub struct OngoingStubbing {
    mock: crate::id::MockId,
    method: MethodId,
    args: Vec<BoxedArg>,
    context: ContextId,
    matchers: Option<Vec<Option<Box<dyn crate::matchers::ArgMatcher>>>>,
    required_state: Option<BoxedArg>,
    next_state: Option<BoxedArg>,
    ttl_millis: i64,
}

impl OngoingStubbing {
    /// Overrides the context captured from the probe call (useful when
    /// stubbing on behalf of a different context than the one active on
    /// this thread).
    pub fn for_context(mut self, ctx: impl Into<ContextId>) -> Self {
        self.context = ctx.into();
        self
    }

    /// Only fires when (mock, context)'s current state equals `state`.
    pub fn when_state_is<T>(mut self, state: T) -> Self
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.required_state = Some(BoxedArg::new(state));
        self
    }

    /// Transitions (mock, context) to `state` once this rule fires.
    pub fn will_set_state_to<T>(mut self, state: T) -> Self
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.next_state = Some(BoxedArg::new(state));
        self
    }

    /// Rule expires (stops matching) `millis` after this call, if positive.
    pub fn ttl_millis(mut self, millis: i64) -> Self {
        self.ttl_millis = millis;
        self
    }

    fn commit(self, action: Action) {
        let rule = StubbingRule::new(
            self.method,
            self.matchers,
            self.args,
            self.required_state,
            self.next_state,
            action,
            self.ttl_millis,
        );
        registry().add_stubbing_rule(self.mock, self.context, rule);
    }

    /// Stubs the matched call to return `value`.
    pub fn then_return<T>(self, value: T)
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.commit(Action::Return(BoxedArg::new(value)));
    }

    /// Stubs the matched call to panic, carrying `payload` verbatim.
    pub fn then_throw<T>(self, payload: T)
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.commit(Action::Throw(BoxedArg::new(payload)));
    }

    /// Stubs the matched call to compute its return value from the live
    /// context/method/arguments at dispatch time.
    pub fn then_answer<T, F>(self, f: F)
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
        F: Fn(&ContextId, MethodId, &[BoxedArg]) -> T + Send + Sync + 'static,
    {
        self.commit(Action::Answer(Arc::new(move |ctx, method, args| {
            Ok(BoxedArg::new(f(ctx, method, args)))
        })));
    }

    /// Like [`Self::then_answer`], but `f` may itself throw by returning
    /// `Err`.
    pub fn then_try_answer<T, E, F>(self, f: F)
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
        E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
        F: Fn(&ContextId, MethodId, &[BoxedArg]) -> Result<T, E> + Send + Sync + 'static,
    {
        self.commit(Action::Answer(Arc::new(move |ctx, method, args| {
            f(ctx, method, args)
                .map(BoxedArg::new)
                .map_err(BoxedArg::new)
        })));
    }
}

/// Entry point returned by [`verify`]; makes exactly one probe call, then
/// checks the real invocation history via [`Verification::that`].
pub struct Verification<'a, M> {
    mock: &'a M,
}

/// Arms the current thread to verify the next method call made on `mock`.
pub fn verify<M>(mock: &M) -> Verification<'_, M> {
    dispatch::arm(Probe::Verify);
    Verification { mock }
}

impl<'a, M> Verification<'a, M> {
    /// Makes the probe call identifying which method/arguments to verify,
    /// then checks recorded history against `mode`.
    pub fn that<T>(self, call: impl FnOnce(&M) -> T, mode: VerificationMode) -> Result<(), MockError> {
        call(self.mock);
        let capture = dispatch::take_capture()?;
        registry().remove_last_invocation(
            capture.mock,
            &capture.context,
            capture.method,
            std::thread::current().id(),
        );
        let matchers = matchers_for(capture.args.len(), &capture.context);

        let history = registry().get_invocation_records(capture.mock, &capture.context);
        let matching: Vec<_> = history
            .iter()
            .filter(|invocation| invocation.method() == capture.method)
            .filter(|invocation| args_match(&matchers, &capture.args, invocation.args()))
            .collect();

        let observed = matching.len();
        if mode.accepts(observed) {
            for invocation in &matching {
                invocation.mark_verified();
            }
            Ok(())
        } else {
            Err(MockError::VerificationFailed {
                expectation: mode.to_string(),
                observed,
                method: capture.method,
                args: capture.args.iter().map(|a| format!("{a:?}")).collect(),
                context: capture.context.to_string(),
                history,
            })
        }
    }
}

fn args_match(
    matchers: &Option<Vec<Option<Box<dyn crate::matchers::ArgMatcher>>>>,
    expected: &[BoxedArg],
    actual: &[BoxedArg],
) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    match matchers {
        Some(matchers) => matchers.iter().zip(actual).enumerate().all(|(i, (matcher, arg))| match matcher {
            Some(matcher) => matcher.matches(arg),
            None => expected[i] == *arg,
        }),
        None => expected == actual,
    }
}
