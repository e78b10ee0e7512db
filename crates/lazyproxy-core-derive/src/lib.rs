//! # lazyproxy-core-derive
//!
//! Procedural macros for the lazyproxy-core engine:
//! - `#[lazy_contract]`: turn a trait into a contract lazy proxies can implement
//! - `#[injectable]`: implement `Injectable` for a struct from its fields

use proc_macro::TokenStream;

mod injectable;
mod lazy_contract;

/// Declare a trait as a lazy contract.
///
/// Emits, next to the trait itself:
/// - a forwarding implementation of the trait for `LazyProxy<C>`
/// - `LazyContract` for `dyn Trait`, carrying the contract descriptor
/// - `Upcast<I>` for `dyn Trait`, for every implementation `I`
///
/// Forwarded members take `&self` and return a `Result` whose error type
/// implements `From<CoreError>`; realization failures surface through it.
/// Generic members must have a default body and are not forwarded.
/// Members may be tagged `#[lazy(getter)]`, `#[lazy(setter)]` or
/// `#[lazy(event)]` to record their role in the descriptor.
#[proc_macro_attribute]
pub fn lazy_contract(args: TokenStream, input: TokenStream) -> TokenStream {
    lazy_contract::lazy_contract_impl(args, input)
}

/// Injectable attribute macro for automatic dependency injection
#[proc_macro_attribute]
pub fn injectable(args: TokenStream, input: TokenStream) -> TokenStream {
    injectable::injectable_impl(args, input)
}
