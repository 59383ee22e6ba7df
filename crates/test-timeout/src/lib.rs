//! Test attributes that run each test on its own thread and fail it after a
//! deadline. `#[timeout]` wraps synchronous tests, `#[tokio_timeout_test]`
//! runs async tests on a current-thread Tokio runtime.
//!
//! The deadline defaults to 60 seconds, can be set per test
//! (`#[timeout(5)]`), and is overridden at run time by
//! `UMBRELLA_TEST_TIMEOUT_SECS`. Tests may return a value such as
//! `Result<(), E>`; it is handed back to the test harness unchanged.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, ItemFn, LitInt, ReturnType, parse_macro_input};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const TIMEOUT_ENV: &str = "UMBRELLA_TEST_TIMEOUT_SECS";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Sync,
    Tokio,
}

#[proc_macro_attribute]
pub fn timeout(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemFn);
    expand(Flavor::Sync, attr.into(), item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemFn);
    expand(Flavor::Tokio, attr.into(), item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn parse_timeout(attr: TokenStream2) -> syn::Result<u64> {
    if attr.is_empty() {
        return Ok(DEFAULT_TIMEOUT_SECS);
    }
    let lit: LitInt = syn::parse2(attr)?;
    let secs: u64 = lit.base10_parse()?;
    if secs == 0 {
        return Err(syn::Error::new_spanned(lit, "timeout must be greater than zero"));
    }
    Ok(secs)
}

fn expand(flavor: Flavor, attr: TokenStream2, item: ItemFn) -> syn::Result<TokenStream2> {
    let default_secs = parse_timeout(attr)?;
    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = item;

    match (flavor, sig.asyncness.is_some()) {
        (Flavor::Sync, true) => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "timeout expects a synchronous test function; use tokio_timeout_test",
            ));
        }
        (Flavor::Tokio, false) => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "tokio_timeout_test can only be applied to async functions",
            ));
        }
        _ => {}
    }
    sig.asyncness = None;

    let output = match &sig.output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => quote! { #ty },
    };
    let attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !is_test_attribute(attr))
        .collect();

    let run = match flavor {
        Flavor::Sync => quote! {
            let body = move || -> #output #block;
            Ok::<#output, &'static str>(body())
        },
        Flavor::Tokio => quote! {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build Tokio runtime");
            runtime
                .block_on(async move { tokio::time::timeout(deadline, async move #block).await })
                .map_err(|_| "test timed out")
        },
    };

    Ok(quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let deadline = std::env::var(#TIMEOUT_ENV)
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(std::time::Duration::from_secs)
                .unwrap_or(std::time::Duration::from_secs(#default_secs));
            let (sender, receiver) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                    || -> ::core::result::Result<#output, &'static str> { #run },
                ));
                let _ = sender.send(result);
            });
            match receiver.recv_timeout(deadline) {
                Ok(Ok(Ok(value))) => value,
                Ok(Ok(Err(reason))) => panic!("{}", reason),
                Ok(Err(payload)) => std::panic::resume_unwind(payload),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => panic!("test timed out"),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("test thread exited before reporting a result")
                }
            }
        }
    })
}

/// `#[test]` and `#[tokio::test]` are replaced by the generated harness.
fn is_test_attribute(attr: &Attribute) -> bool {
    let path = attr.path();
    path.is_ident("test")
        || (path.segments.len() == 2
            && path.segments[0].ident == "tokio"
            && path.segments[1].ident == "test")
}
