use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ItemStruct;

pub fn expand_slice(mut input: ItemStruct) -> TokenStream {
    let handle = input.ident.clone();
    let vis = input.vis.clone();
    let state = format_ident!("{handle}Inner");
    let doc = format!("Cheap-to-clone handle over [`{state}`].");

    input.ident = state.clone();
    input.attrs.push(syn::parse_quote!(#[derive(Debug)]));

    quote! {
        #input

        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #handle(std::sync::Arc<#state>);

        impl #handle {
            #[must_use]
            pub fn new(state: #state) -> Self {
                Self(std::sync::Arc::new(state))
            }
        }

        impl From<#state> for #handle {
            fn from(state: #state) -> Self {
                Self::new(state)
            }
        }

        impl std::ops::Deref for #handle {
            type Target = #state;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    }
}
