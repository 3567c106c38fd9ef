#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! Attribute macros shared by every Tally crate.
//!
//! * [`macro@tally_error`] turns a struct-variant enum into a `thiserror` error with `.context(..)`,
//!   `?` conversions from wrapped sources and an optional `tally_domain::error::ErrorKind` classification.
//! * [`macro@tally_slice`] turns a slice's state struct into a cloneable `Arc` handle.
//!
//! Crates using `#[kind(..)]` must depend on `tally-domain`: the generated `Classify` impl names
//! `::tally_domain::error` directly.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemStruct, parse_macro_input};

/// Error enum boilerplate.
///
/// Every variant must use named fields. A field called `context` must be
/// `Option<Cow<'static, str>>`; variants wrapping another error (a `source` field, or one marked
/// `#[source]`/`#[from]`) must have one. The expansion adds:
///
/// * `#[derive(Debug, thiserror::Error)]` unless already derived;
/// * `<Name>Ext<T>` with `.context(..)` on `Result<T, Name>` and on `Result<T, Source>`;
/// * `From<Source>` for each wrapping variant, and `From<&'static str>`/`From<String>` when an
///   `Internal { message, context }` variant exists;
/// * `impl Classify` when any variant carries `#[kind(NotFound | ValidationFailed | Conflict |
///   Unauthorized | Forbidden | Unknown)]`; the rest classify as `Unknown`;
/// * a module-level `format_context` helper for the `#[error(..)]` strings.
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[tally_derive::tally_error]
/// pub enum StoreError {
///     #[kind(Conflict)]
///     #[error("Version conflict{}: {message}", format_context(.context))]
///     VersionConflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("Io failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
/// }
///
/// fn load() -> Result<Vec<u8>, StoreError> {
///     std::fs::read("rows.json").context("loading rows")
/// }
/// ```
#[proc_macro_attribute]
pub fn tally_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// `struct Orders { .. }` becomes `OrdersInner { .. }` plus `Orders(Arc<OrdersInner>)` with
/// `new`, `From<OrdersInner>` and `Deref<Target = OrdersInner>`.
#[proc_macro_attribute]
pub fn tally_slice(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as ItemStruct);
    macros::slice::expand_slice(input).into()
}
