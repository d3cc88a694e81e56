//! Argument matchers and the thread-local, context-partitioned matcher
//! buffer (C2).

use regex::Regex;

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    context::{ContextHolder, ContextId},
    error::MockError,
    value::BoxedArg,
};

/// A predicate over a single argument position.
///
/// Implementations are leaf matchers such as [`any`], [`eq`] or
/// [`arg_that`]; user code never implements this trait directly except via
/// [`arg_that`].
pub trait ArgMatcher: Send + Sync {
    /// Returns whether `arg` satisfies this matcher.
    fn matches(&self, arg: &BoxedArg) -> bool;

    /// Short description used in diagnostics. Default implementation is
    /// deliberately generic; leaf matchers override it where it helps.
    fn describe(&self) -> String {
        "<matcher>".to_owned()
    }
}

impl fmt::Debug for dyn ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

struct AnyMatcher;

impl ArgMatcher for AnyMatcher {
    fn matches(&self, _arg: &BoxedArg) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any()".to_owned()
    }
}

struct EqMatcher<T>(T);

impl<T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static> ArgMatcher for EqMatcher<T> {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<T>().map_or(false, |v| *v == self.0)
    }

    fn describe(&self) -> String {
        format!("eq({:?})", self.0)
    }
}

struct IsNull<T>(std::marker::PhantomData<T>);

impl<T: Send + Sync + 'static> ArgMatcher for IsNull<Option<T>> {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<Option<T>>().map_or(false, Option::is_none)
    }

    fn describe(&self) -> String {
        "isNull()".to_owned()
    }
}

struct NotNull<T>(std::marker::PhantomData<T>);

impl<T: Send + Sync + 'static> ArgMatcher for NotNull<Option<T>> {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<Option<T>>().map_or(false, Option::is_some)
    }

    fn describe(&self) -> String {
        "notNull()".to_owned()
    }
}

struct Contains(String);

impl ArgMatcher for Contains {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<String>()
            .map_or(false, |s| s.contains(&self.0))
    }

    fn describe(&self) -> String {
        format!("contains({:?})", self.0)
    }
}

struct StartsWith(String);

impl ArgMatcher for StartsWith {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<String>()
            .map_or(false, |s| s.starts_with(&self.0))
    }

    fn describe(&self) -> String {
        format!("startsWith({:?})", self.0)
    }
}

struct EndsWith(String);

impl ArgMatcher for EndsWith {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<String>()
            .map_or(false, |s| s.ends_with(&self.0))
    }

    fn describe(&self) -> String {
        format!("endsWith({:?})", self.0)
    }
}

struct MatchesRegex(Regex);

impl ArgMatcher for MatchesRegex {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<String>().map_or(false, |s| self.0.is_match(s))
    }

    fn describe(&self) -> String {
        format!("matches(/{}/)", self.0.as_str())
    }
}

struct Predicate<T> {
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
    label: &'static str,
}

impl<T: Send + Sync + 'static> ArgMatcher for Predicate<T> {
    fn matches(&self, arg: &BoxedArg) -> bool {
        arg.downcast_ref::<T>().map_or(false, |v| (self.predicate)(v))
    }

    fn describe(&self) -> String {
        format!("argThat({})", self.label)
    }
}

/// Numeric range matcher backing `intThat`/`longThat`/`doubleThat`.
struct Range<T> {
    min: T,
    max: T,
}

macro_rules! impl_range_matcher {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ArgMatcher for Range<$ty> {
                fn matches(&self, arg: &BoxedArg) -> bool {
                    arg.downcast_ref::<$ty>()
                        .map_or(false, |v| *v >= self.min && *v <= self.max)
                }

                fn describe(&self) -> String {
                    format!(concat!(stringify!($ty), "That({:?}..={:?})"), self.min, self.max)
                }
            }
        )+
    };
}

impl_range_matcher!(i32, i64, f64);

/// Shared sink a [`capture`] matcher writes every matched argument into.
///
/// Always matches (like [`any`]); its purpose is recording, not filtering.
#[derive(Debug, Clone, Default)]
pub struct Captor<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone + Send + 'static> Captor<T> {
    /// Creates an empty captor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every value captured so far, in call order.
    pub fn values(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }

    /// Returns the most recently captured value, if any.
    pub fn last(&self) -> Option<T> {
        self.0.lock().unwrap().last().cloned()
    }
}

struct Capture<T> {
    sink: Captor<T>,
}

impl<T: Clone + Send + Sync + 'static> ArgMatcher for Capture<T> {
    fn matches(&self, arg: &BoxedArg) -> bool {
        if let Some(value) = arg.downcast_ref::<T>() {
            self.sink.0.lock().unwrap().push(value.clone());
            true
        } else {
            false
        }
    }

    fn describe(&self) -> String {
        "capture()".to_owned()
    }
}

std::thread_local! {
    static BUFFER: RefCell<HashMap<ContextId, Vec<Box<dyn ArgMatcher>>>> = RefCell::new(HashMap::new());
}

/// Per-thread × per-context ordered buffer of pending matchers (C2).
pub struct MatcherBuffer;

impl MatcherBuffer {
    /// Appends `matcher` to the list for the current context.
    ///
    /// # Panics
    ///
    /// Panics (via [`MockError::MissingContext`]) if no context is set on
    /// this thread — matcher placeholders are meaningless without a context
    /// to scope them to.
    fn add(matcher: Box<dyn ArgMatcher>) {
        let ctx = ContextHolder::get().expect(
            "argument matcher registered with no context set; \
             wrap the stubbing/verification in scoped_context() first",
        );
        BUFFER.with(|cell| {
            cell.borrow_mut().entry(ctx).or_default().push(matcher);
        });
    }

    /// Snapshots and clears the matcher list for the given context (or the
    /// empty list if `ctx` is `None`, which only happens for spy calls made
    /// with no context active).
    pub fn consume(ctx: Option<&ContextId>) -> Vec<Box<dyn ArgMatcher>> {
        match ctx {
            Some(ctx) => BUFFER.with(|cell| cell.borrow_mut().remove(ctx).unwrap_or_default()),
            None => Vec::new(),
        }
    }

    /// Drops the matcher list for the current context without consuming it.
    pub fn clear_current() -> Result<(), MockError> {
        let ctx = ContextHolder::get()?;
        BUFFER.with(|cell| {
            cell.borrow_mut().remove(&ctx);
        });
        Ok(())
    }
}

/// Matches any argument of type `T`.
pub fn any<T: Default + Send + Sync + 'static>() -> T {
    MatcherBuffer::add(Box::new(AnyMatcher));
    T::default()
}

/// Matches an argument equal to `value`.
pub fn eq<T>(value: T) -> T
where
    T: Clone + PartialEq + fmt::Debug + Default + Send + Sync + 'static,
{
    MatcherBuffer::add(Box::new(EqMatcher(value)));
    T::default()
}

/// Matches `None`.
pub fn is_null<T: Send + Sync + 'static>() -> Option<T> {
    MatcherBuffer::add(Box::new(IsNull::<Option<T>>(std::marker::PhantomData)));
    None
}

/// Matches `Some(_)`.
pub fn not_null<T: Send + Sync + 'static>() -> Option<T> {
    MatcherBuffer::add(Box::new(NotNull::<Option<T>>(std::marker::PhantomData)));
    None
}

/// Matches a string argument containing `needle`.
pub fn contains(needle: impl Into<String>) -> String {
    MatcherBuffer::add(Box::new(Contains(needle.into())));
    String::new()
}

/// Matches a string argument starting with `prefix`.
pub fn starts_with(prefix: impl Into<String>) -> String {
    MatcherBuffer::add(Box::new(StartsWith(prefix.into())));
    String::new()
}

/// Matches a string argument ending with `suffix`.
pub fn ends_with(suffix: impl Into<String>) -> String {
    MatcherBuffer::add(Box::new(EndsWith(suffix.into())));
    String::new()
}

/// Matches a string argument against a regular expression.
///
/// # Panics
///
/// Panics if `pattern` does not compile, same as a malformed `eq()` literal
/// would be a test-authoring bug rather than a runtime condition.
pub fn matches_regex(pattern: &str) -> String {
    let regex = Regex::new(pattern).unwrap_or_else(|err| {
        panic!("invalid regex {pattern:?} passed to matches_regex(): {err}")
    });
    MatcherBuffer::add(Box::new(MatchesRegex(regex)));
    String::new()
}

/// Matches an argument of type `T` satisfying `predicate`.
pub fn arg_that<T>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> T
where
    T: Default + Send + Sync + 'static,
{
    MatcherBuffer::add(Box::new(Predicate {
        predicate: Box::new(predicate),
        label: "predicate",
    }));
    T::default()
}

macro_rules! range_matcher {
    ($fn_name:ident, $ty:ty) => {
        #[doc = concat!("Matches a `", stringify!($ty), "` argument within `min..=max`.")]
        pub fn $fn_name(min: $ty, max: $ty) -> $ty {
            MatcherBuffer::add(Box::new(Range { min, max }));
            <$ty>::default()
        }
    };
}

range_matcher!(int_that, i32);
range_matcher!(long_that, i64);
range_matcher!(double_that, f64);

/// Matches any argument of type `T`, recording every matched value into
/// `captor` for later retrieval.
pub fn capture<T: Clone + Send + Sync + Default + 'static>(captor: &Captor<T>) -> T {
    MatcherBuffer::add(Box::new(Capture {
        sink: captor.clone(),
    }));
    T::default()
}

/// Equivalent to `any::<i32>()`.
pub fn any_int() -> i32 {
    any::<i32>()
}

/// Equivalent to `any::<i64>()`.
pub fn any_long() -> i64 {
    any::<i64>()
}

/// Equivalent to `any::<f64>()`.
pub fn any_double() -> f64 {
    any::<f64>()
}

/// Equivalent to `any::<bool>()`.
pub fn any_bool() -> bool {
    any::<bool>()
}

/// Equivalent to `any::<String>()`.
pub fn any_string() -> String {
    any::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ctx<R>(name: &str, f: impl FnOnce() -> R) -> R {
        crate::context::scoped_context(name, f)
    }

    #[test]
    fn consume_returns_registered_matchers_in_order() {
        with_ctx("c1", || {
            let _ = any::<i32>();
            let _ = eq(String::from("x"));
            let matchers = MatcherBuffer::consume(Some(&ContextId::named("c1")));
            assert_eq!(matchers.len(), 2);
            assert!(matchers[0].matches(&BoxedArg::new(123)));
            assert!(matchers[1].matches(&BoxedArg::new(String::from("x"))));
            assert!(!matchers[1].matches(&BoxedArg::new(String::from("y"))));
        });
    }

    #[test]
    fn consume_clears_the_buffer() {
        with_ctx("c2", || {
            let _ = any::<i32>();
            let ctx = ContextId::named("c2");
            assert_eq!(MatcherBuffer::consume(Some(&ctx)).len(), 1);
            assert_eq!(MatcherBuffer::consume(Some(&ctx)).len(), 0);
        });
    }

    #[test]
    fn matcher_isolation_across_contexts_on_one_thread() {
        with_ctx("isolated-a", || {
            let _ = any::<i32>();
        });
        with_ctx("isolated-b", || {
            let _ = eq(7_i32);
            let _ = eq(8_i32);
        });
        assert_eq!(
            MatcherBuffer::consume(Some(&ContextId::named("isolated-a"))).len(),
            1
        );
        assert_eq!(
            MatcherBuffer::consume(Some(&ContextId::named("isolated-b"))).len(),
            2
        );
    }

    #[test]
    fn range_matcher_bounds() {
        let m = Range { min: 1_i32, max: 5 };
        assert!(!m.matches(&BoxedArg::new(0)));
        assert!(m.matches(&BoxedArg::new(1)));
        assert!(m.matches(&BoxedArg::new(5)));
        assert!(!m.matches(&BoxedArg::new(6)));
    }

    #[test]
    fn capture_records_values_and_still_matches() {
        with_ctx("capture-ctx", || {
            let captor = Captor::<i32>::new();
            let _ = capture(&captor);
            let matchers = MatcherBuffer::consume(Some(&ContextId::named("capture-ctx")));
            assert!(matchers[0].matches(&BoxedArg::new(10)));
            assert!(matchers[0].matches(&BoxedArg::new(20)));
            assert_eq!(captor.values(), vec![10, 20]);
            assert_eq!(captor.last(), Some(20));
        });
    }
}
