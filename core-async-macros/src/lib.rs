//! `#[core_async::test]`: runs an `async fn` test on a fresh current-thread
//! runtime, so test crates never name Tokio directly.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let tokens = TokenStream2::from(attr);
        return syn::Error::new_spanned(tokens, "core_async::test takes no arguments")
            .to_compile_error()
            .into();
    }

    let input = parse_macro_input!(item as ItemFn);
    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(input.sig.fn_token, "core_async::test requires `async fn`")
            .to_compile_error()
            .into();
    }

    let mut sig = input.sig;
    sig.asyncness = None;
    let attrs = input.attrs;
    let vis = input.vis;
    let body = input.block;

    quote! {
        #(#attrs)*
        #[test]
        #vis #sig {
            core_async::runtime::block_on(async move #body)
                .expect("core_async::test: failed to build runtime")
        }
    }
    .into()
}
