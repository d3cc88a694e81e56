//! Stubbing rule (C4): an immutable (predicate, action, state, TTL) tuple
//! the dispatcher may apply to one call.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{context::ContextId, id::MethodId, matchers::ArgMatcher, value::BoxedArg};

/// What a rule does once it is selected.
#[derive(Clone)]
pub enum Action {
    /// Returns a fixed value.
    Return(BoxedArg),
    /// Throws a fixed payload — modeled as a Rust panic carrying the payload
    /// verbatim (see `DESIGN.md`'s resolution of the "throw" Open Question).
    Throw(BoxedArg),
    /// Computes the value (or panics) from the call context.
    ///
    /// `f(context, mock, method, args)`, matching spec.md §3's signature for
    /// `Answer`. Returning `Err` is how an `Answer` "may throw": the engine
    /// treats the error payload exactly like `Throw`.
    Answer(Arc<dyn Fn(&ContextId, MethodId, &[BoxedArg]) -> Result<BoxedArg, BoxedArg> + Send + Sync>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return(v) => write!(f, "Return({v:?})"),
            Self::Throw(v) => write!(f, "Throw({v:?})"),
            Self::Answer(_) => write!(f, "Answer(..)"),
        }
    }
}

/// Immutable rule wired into the registry by the stubbing DSL's terminator
/// (`thenReturn`/`thenThrow`/`thenAnswer`).
#[derive(Clone)]
pub struct StubbingRule {
    method: MethodId,
    matchers: Option<Arc<Vec<Option<Box<dyn ArgMatcher>>>>>,
    expected_args: Vec<BoxedArg>,
    required_state: Option<BoxedArg>,
    next_state: Option<BoxedArg>,
    action: Action,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl StubbingRule {
    /// Constructs a new rule. `matchers`, when present, must have one
    /// (possibly absent) entry per argument position; a `None` entry at
    /// position *i* falls back to equality against `expected_args[i]`, per
    /// spec.md §3's "index *i* either holds a matcher or is absent".
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: MethodId,
        matchers: Option<Vec<Option<Box<dyn ArgMatcher>>>>,
        expected_args: Vec<BoxedArg>,
        required_state: Option<BoxedArg>,
        next_state: Option<BoxedArg>,
        action: Action,
        ttl_millis: i64,
    ) -> Self {
        Self {
            method,
            matchers: matchers.map(Arc::new),
            expected_args,
            required_state,
            next_state,
            action,
            created_at: Instant::now(),
            ttl: (ttl_millis > 0).then(|| Duration::from_millis(ttl_millis as u64)),
        }
    }

    /// The action to apply once this rule is selected.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// State to transition (mock, context) to after this rule fires, if any.
    pub fn next_state(&self) -> Option<&BoxedArg> {
        self.next_state.as_ref()
    }

    /// Whether this rule's TTL (if any) has elapsed.
    pub fn is_expired(&self) -> bool {
        self.ttl.map_or(false, |ttl| self.created_at.elapsed() >= ttl)
    }

    /// Evaluates every selection check from spec.md §4.3 steps 2–5 in order.
    pub fn accepts(
        &self,
        method: MethodId,
        args: &[BoxedArg],
        current_state: Option<&BoxedArg>,
    ) -> bool {
        if self.method != method {
            return false;
        }
        if self.is_expired() {
            return false;
        }
        if let Some(required) = &self.required_state {
            if current_state != Some(required) {
                return false;
            }
        } else if current_state.is_some() && self.required_state.is_none() {
            // A rule with no state precondition fires in any state, including
            // "no state set" — spec.md: "absent means 'any state'".
        }
        self.args_match(args)
    }

    fn args_match(&self, args: &[BoxedArg]) -> bool {
        match &self.matchers {
            Some(matchers) => {
                if matchers.len() != args.len() || self.expected_args.len() != args.len() {
                    return false;
                }
                matchers.iter().zip(args).enumerate().all(|(i, (matcher, arg))| {
                    match matcher {
                        Some(matcher) => matcher.matches(arg),
                        None => self.expected_args[i] == *arg,
                    }
                })
            }
            None => self.expected_args == args,
        }
    }
}

impl fmt::Debug for StubbingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubbingRule")
            .field("method", &self.method)
            .field("expected_args", &self.expected_args)
            .field("required_state", &self.required_state)
            .field("next_state", &self.next_state)
            .field("action", &self.action)
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> MethodId {
        MethodId::new("Svc", "get")
    }

    #[test]
    fn equality_fallback_without_matchers() {
        let rule = StubbingRule::new(
            method(),
            None,
            vec![BoxedArg::new(String::from("k"))],
            None,
            None,
            Action::Return(BoxedArg::new(1_i32)),
            0,
        );
        assert!(rule.accepts(method(), &[BoxedArg::new(String::from("k"))], None));
        assert!(!rule.accepts(method(), &[BoxedArg::new(String::from("other"))], None));
    }

    #[test]
    fn state_precondition_gates_firing() {
        let rule = StubbingRule::new(
            method(),
            None,
            vec![],
            Some(BoxedArg::new(String::from("full"))),
            Some(BoxedArg::new(String::from("empty"))),
            Action::Return(BoxedArg::new(())),
            0,
        );
        assert!(!rule.accepts(method(), &[], None));
        assert!(!rule.accepts(method(), &[], Some(&BoxedArg::new(String::from("empty")))));
        assert!(rule.accepts(method(), &[], Some(&BoxedArg::new(String::from("full")))));
    }

    #[test]
    fn ttl_expiry() {
        let rule = StubbingRule::new(
            method(),
            None,
            vec![],
            None,
            None,
            Action::Return(BoxedArg::new(())),
            10,
        );
        assert!(rule.accepts(method(), &[], None));
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(!rule.accepts(method(), &[], None));
    }

    #[test]
    fn no_ttl_never_expires() {
        let rule = StubbingRule::new(method(), None, vec![], None, None, Action::Return(BoxedArg::new(())), 0);
        assert!(!rule.is_expired());
    }
}
