//! Procedural macros for `ctxmock`.

#![recursion_limit = "128"]

extern crate proc_macro;

mod mockable;

use proc_macro::TokenStream;

/// Expands a trait definition into `Mock<Trait>` and `Spy<Trait>` proxies
/// that route every method call through `ctxmock`'s dispatcher.
///
/// Supported trait shape, for this first release:
/// - no generics on the trait or its methods;
/// - every method takes `&self` (no `&mut self`, no free functions);
/// - every argument is a plain binding (no destructuring patterns);
/// - every argument and return type implements `Clone + PartialEq + Debug +
///   Send + Sync + Default + 'static` (the proxy needs to box, compare and
///   fabricate placeholder values for them);
/// - no async methods, associated types or associated constants.
///
/// See `ctxmock::dsl` for how the generated proxies are stubbed and verified.
#[proc_macro_attribute]
pub fn mockable(attr: TokenStream, item: TokenStream) -> TokenStream {
    match mockable::expand(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
