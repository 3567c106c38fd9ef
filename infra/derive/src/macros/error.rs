use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Field, Fields, FieldsNamed, Ident, Type, Variant};

/// Closed set of kinds accepted by `#[kind(..)]`; mirrors `tally_domain::error::ErrorKind`.
const KNOWN_KINDS: &[&str] =
    &["NotFound", "ValidationFailed", "Conflict", "Unauthorized", "Forbidden", "Unknown"];

/// Name of the catch-all variant that also accepts plain strings.
const FALLBACK: &str = "Internal";

/// What the expansion needs to know about one variant.
struct Shape {
    ident: Ident,
    source: Option<(Ident, Type)>,
    has_context: bool,
    /// Fields besides the source and `context`; such variants cannot be built from the source alone.
    has_payload: bool,
    kind: Option<Ident>,
    cfg: Vec<Attribute>,
}

impl Shape {
    fn read(variant: &mut Variant) -> syn::Result<Self> {
        let kind = take_kind(variant)?;
        let Fields::Named(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                &*variant,
                "tally_error requires named fields for source/context handling",
            ));
        };

        let has_context = context_field(fields)?.is_some();
        let source = source_field(fields)
            .and_then(|field| field.ident.clone().map(|ident| (ident, field.ty.clone())));
        let has_payload = fields.named.iter().any(|field| {
            let is_source =
                source.as_ref().is_some_and(|(ident, _)| field.ident.as_ref() == Some(ident));
            let is_context = field.ident.as_ref().is_some_and(|ident| ident == "context");
            !is_source && !is_context
        });
        if source.is_some() && !has_context {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "tally_error requires `context: Option<Cow<'static, str>>` for variants with a source",
            ));
        }

        Ok(Self {
            ident: variant.ident.clone(),
            source,
            has_context,
            has_payload,
            kind,
            cfg: variant.attrs.iter().filter(|attr| attr.path().is_ident("cfg")).cloned().collect(),
        })
    }

    fn is_fallback(&self) -> bool {
        self.ident == FALLBACK
    }
}

pub fn expand_derive(mut input: DeriveInput) -> TokenStream {
    let Data::Enum(data) = &mut input.data else {
        return quote! { compile_error!("tally_error can only be applied to enums"); };
    };

    let shapes = match data.variants.iter_mut().map(Shape::read).collect::<syn::Result<Vec<_>>>() {
        Ok(shapes) => shapes,
        Err(err) => return err.to_compile_error(),
    };

    let name = &input.ident;
    let ext = format_ident!("{}Ext", name);
    let derives = missing_derives(&input.attrs);
    let context = context_trait(name, &ext, &shapes);
    let conversions = shapes.iter().filter(|s| !s.is_fallback()).filter_map(|s| source_impls(name, &ext, s));
    let fallback = shapes.iter().find(|s| s.is_fallback()).map(|s| fallback_impls(name, s));
    let classify = classify_impl(name, &shapes);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #context
        #(#conversions)*
        #fallback
        #classify

        #[allow(dead_code)]
        fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
            context.as_ref().map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
        }
    }
}

/// Removes the `#[kind(..)]` helper from the variant; `thiserror` would reject it.
fn take_kind(variant: &mut Variant) -> syn::Result<Option<Ident>> {
    let (kinds, kept): (Vec<_>, Vec<_>) =
        variant.attrs.drain(..).partition(|attr| attr.path().is_ident("kind"));
    variant.attrs = kept;

    let mut found = None;
    for attr in kinds {
        let kind: Ident = attr.parse_args()?;
        if !KNOWN_KINDS.iter().any(|known| kind == known) {
            return Err(syn::Error::new_spanned(
                &kind,
                format!("unknown error kind, expected one of: {}", KNOWN_KINDS.join(", ")),
            ));
        }
        if found.replace(kind).is_some() {
            return Err(syn::Error::new_spanned(
                &attr,
                "a variant can carry at most one #[kind(..)] attribute",
            ));
        }
    }
    Ok(found)
}

fn context_field(fields: &FieldsNamed) -> syn::Result<Option<&Field>> {
    let Some(field) = fields.named.iter().find(|f| f.ident.as_ref().is_some_and(|i| i == "context"))
    else {
        return Ok(None);
    };
    if is_context_type(&field.ty) {
        Ok(Some(field))
    } else {
        Err(syn::Error::new_spanned(&field.ty, "context field must be Option<Cow<'static, str>>"))
    }
}

fn source_field(fields: &FieldsNamed) -> Option<&Field> {
    fields.named.iter().find(|field| {
        field.ident.as_ref().is_some_and(|ident| ident == "source")
            || field.attrs.iter().any(|attr| attr.path().is_ident("source") || attr.path().is_ident("from"))
    })
}

/// Accepts `Option<Cow<'static, str>>` under any path prefix (`std::borrow::Cow`, `Cow`).
fn is_context_type(ty: &Type) -> bool {
    let rendered: String =
        ty.to_token_stream().to_string().chars().filter(|c| !c.is_whitespace()).collect();
    let Some((_, tail)) = rendered.rsplit_once("Option<") else {
        return false;
    };
    rendered.ends_with("Cow<'static,str>>") && tail.trim_start_matches("std::borrow::").starts_with("Cow<")
}

fn missing_derives(attrs: &[Attribute]) -> TokenStream {
    let mut present = FxHashSet::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                present.insert(last.ident.to_string());
            }
            Ok(())
        });
    }

    let mut missing = Vec::new();
    if !present.contains("Debug") {
        missing.push(quote! { Debug });
    }
    if !present.contains("Error") {
        missing.push(quote! { ::thiserror::Error });
    }
    if missing.is_empty() { quote! {} } else { quote! { #[derive(#(#missing),*)] } }
}

fn context_trait(name: &Ident, ext: &Ident, shapes: &[Shape]) -> TokenStream {
    let arms = shapes.iter().filter(|s| s.has_context).map(|s| {
        let Shape { ident, cfg, .. } = s;
        quote! { #(#cfg)* #name::#ident { context: slot, .. } => *slot = Some(context.into()), }
    });

    quote! {
        pub trait #ext<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut err| {
                    match &mut err {
                        #( #arms )*
                        _ => {}
                    }
                    err
                })
            }
        }
    }
}

fn source_impls(name: &Ident, ext: &Ident, shape: &Shape) -> Option<TokenStream> {
    if shape.has_payload {
        return None;
    }
    let (field, ty) = shape.source.as_ref()?;
    let Shape { ident, cfg, .. } = shape;

    Some(quote! {
        #(#cfg)*
        #[automatically_derived]
        impl From<#ty> for #name {
            #[inline]
            fn from(#field: #ty) -> Self { Self::#ident { #field, context: None } }
        }

        #(#cfg)*
        impl<T> #ext<T> for std::result::Result<T, #ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
            }
        }
    })
}

fn fallback_impls(name: &Ident, shape: &Shape) -> TokenStream {
    let cfg = &shape.cfg;
    quote! {
        #(#cfg)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self { Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None } }
        }
        #(#cfg)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self { Self::Internal { message: std::borrow::Cow::Owned(s), context: None } }
        }
    }
}

fn classify_impl(name: &Ident, shapes: &[Shape]) -> TokenStream {
    let arms: Vec<_> = shapes
        .iter()
        .filter_map(|s| {
            let kind = s.kind.as_ref()?;
            let Shape { ident, cfg, .. } = s;
            Some(quote! { #(#cfg)* #name::#ident { .. } => ::tally_domain::error::ErrorKind::#kind, })
        })
        .collect();
    if arms.is_empty() {
        return quote!();
    }

    quote! {
        #[automatically_derived]
        impl ::tally_domain::error::Classify for #name {
            #[allow(unreachable_patterns)]
            fn kind(&self) -> ::tally_domain::error::ErrorKind {
                match self {
                    #( #arms )*
                    _ => ::tally_domain::error::ErrorKind::Unknown,
                }
            }
        }
    }
}
