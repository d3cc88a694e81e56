//! Expansion of `#[mockable]`: trait -> `Mock<Trait>` + `Spy<Trait>` proxies.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemTrait, Pat, PatType, ReturnType, TraitItem, TraitItemMethod};

struct MockedMethod {
    sig: syn::Signature,
    const_ident: syn::Ident,
    arg_idents: Vec<syn::Ident>,
    return_type: TokenStream,
}

fn parse_method(method: &TraitItemMethod) -> syn::Result<MockedMethod> {
    let sig = method.sig.clone();

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            &sig,
            "#[mockable] does not support async methods",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[mockable] does not support generic methods",
        ));
    }

    let mut receiver_ok = false;
    let mut arg_idents = Vec::new();
    for input in &sig.inputs {
        match input {
            FnArg::Receiver(receiver) => {
                if receiver.reference.is_some() && receiver.mutability.is_none() {
                    receiver_ok = true;
                }
            }
            FnArg::Typed(PatType { pat, .. }) => match &**pat {
                Pat::Ident(pat_ident) => arg_idents.push(pat_ident.ident.clone()),
                _ => {
                    return Err(syn::Error::new_spanned(
                        pat,
                        "#[mockable] requires plain argument bindings, not destructuring patterns",
                    ))
                }
            },
        }
    }
    if !receiver_ok {
        return Err(syn::Error::new_spanned(
            &sig,
            "#[mockable] methods must take `&self` (no `&mut self`, `self`, or free functions)",
        ));
    }

    let return_type = match &sig.output {
        ReturnType::Default => quote!(()),
        ReturnType::Type(_, ty) => quote!(#ty),
    };

    let const_ident = format_ident!("__{}", sig.ident.to_string().to_uppercase());
    Ok(MockedMethod {
        sig,
        const_ident,
        arg_idents,
        return_type,
    })
}

pub fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    if !attr.is_empty() {
        return Err(syn::Error::new_spanned(
            attr,
            "#[mockable] does not take any arguments",
        ));
    }

    let trait_item: ItemTrait = syn::parse2(item)?;
    if !trait_item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &trait_item.generics,
            "#[mockable] does not support generic traits",
        ));
    }

    let trait_ident = trait_item.ident.clone();
    let trait_name = trait_ident.to_string();
    let vis = trait_item.vis.clone();

    let mut methods = Vec::new();
    for raw in &trait_item.items {
        match raw {
            TraitItem::Method(method) => methods.push(parse_method(method)?),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "#[mockable] only supports plain methods: no associated types, \
                     constants or default-implemented items",
                ))
            }
        }
    }

    let mod_ident = format_ident!("__ctxmock_{}_methods", trait_name.to_lowercase());
    let mock_ident = format_ident!("Mock{trait_name}");
    let spy_ident = format_ident!("Spy{trait_name}");
    let mock_doc = format!("Generated mock proxy for [`{trait_name}`].");
    let spy_doc = format!(
        "Generated spy proxy for [`{trait_name}`], falling back to a wrapped real \
         implementation on an unstubbed call."
    );

    let method_consts = methods.iter().map(|m| {
        let const_ident = &m.const_ident;
        let method_name = m.sig.ident.to_string();
        quote! {
            pub(super) const #const_ident: ::ctxmock::MethodId =
                ::ctxmock::MethodId::new(#trait_name, #method_name);
        }
    });

    let mock_methods = methods.iter().map(|m| {
        let sig = &m.sig;
        let const_ident = &m.const_ident;
        let return_type = &m.return_type;
        let boxed_args = m
            .arg_idents
            .iter()
            .map(|id| quote!(::ctxmock::BoxedArg::new(#id.clone())));
        quote! {
            #sig {
                ::ctxmock::invoke::<#return_type>(
                    &self.core,
                    #mod_ident::#const_ident,
                    vec![#(#boxed_args),*],
                    None,
                )
            }
        }
    });

    let spy_methods = methods.iter().map(|m| {
        let sig = &m.sig;
        let const_ident = &m.const_ident;
        let return_type = &m.return_type;
        let method_ident = &m.sig.ident;
        let boxed_args = m
            .arg_idents
            .iter()
            .map(|id| quote!(::ctxmock::BoxedArg::new(#id.clone())));
        let call_args = &m.arg_idents;
        quote! {
            #sig {
                let __real = &self.real;
                ::ctxmock::invoke::<#return_type>(
                    &self.core,
                    #mod_ident::#const_ident,
                    vec![#(#boxed_args),*],
                    Some(::std::boxed::Box::new(move || __real.#method_ident(#(#call_args),*))),
                )
            }
        }
    });

    Ok(quote! {
        #trait_item

        #[allow(non_snake_case, non_upper_case_globals)]
        mod #mod_ident {
            use super::*;
            #(#method_consts)*
        }

        #[doc = #mock_doc]
        #vis struct #mock_ident {
            core: ::ctxmock::MockCore,
        }

        impl #mock_ident {
            /// Creates a fresh mock with no stubbed behavior.
            pub fn new() -> Self {
                let core = ::ctxmock::MockCore::new::<dyn #trait_ident>(false);
                ::ctxmock::register(&core);
                Self { core }
            }

            /// The identity handle the stubbing/verification DSL operates on.
            pub fn core(&self) -> &::ctxmock::MockCore {
                &self.core
            }
        }

        impl ::std::default::Default for #mock_ident {
            fn default() -> Self {
                Self::new()
            }
        }

        impl #trait_ident for #mock_ident {
            #(#mock_methods)*
        }

        #[doc = #spy_doc]
        #vis struct #spy_ident<T: #trait_ident> {
            core: ::ctxmock::MockCore,
            real: T,
        }

        impl<T: #trait_ident> #spy_ident<T> {
            /// Wraps `real`; unstubbed calls are forwarded to it.
            pub fn new(real: T) -> Self {
                let core = ::ctxmock::MockCore::new::<dyn #trait_ident>(true);
                ::ctxmock::register(&core);
                Self { core, real }
            }

            /// The identity handle the stubbing/verification DSL operates on.
            pub fn core(&self) -> &::ctxmock::MockCore {
                &self.core
            }
        }

        impl<T: #trait_ident> #trait_ident for #spy_ident<T> {
            #(#spy_methods)*
        }
    })
}
