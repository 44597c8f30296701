//! Attribute macros that remove the derive boilerplate required by the
//! `annbench::Metric` and `annbench::Aggregate` traits.
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

extern crate proc_macro;

/// Derives the serde and comparison traits a per-query sample needs and
/// implements `Metric` for it. `Metric` must be in scope at the call site.
#[proc_macro_attribute]
pub fn metric(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let input_struct = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialOrd,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast

        impl #impl_generics Metric for #input_struct #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

/// Derives the serde and comparison traits an `Aggregate` implementation
/// needs, plus `Default` as the empty aggregate. The trait impl itself is
/// written by hand.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialOrd,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone,
            std::default::Default
        )]
        #ast
    };

    TokenStream::from(expanded)
}
