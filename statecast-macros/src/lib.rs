//! Procedural macros for statecast

use darling::{FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Action)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ActionOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<ActionVariant, ()>,

    /// Success companion type, `()` when omitted
    #[darling(default)]
    success: Option<syn::Type>,

    /// Failure companion type, `()` when omitted
    #[darling(default)]
    failure: Option<syn::Type>,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<()>,

    /// Name reported by `name()` instead of the variant identifier
    #[darling(default)]
    rename: Option<String>,
}

/// Derive macro for the Action trait
///
/// Generates a `name()` method that returns the variant name as a static string,
/// and declares the action's outcome companion types.
///
/// # Attributes
///
/// - `#[action(success = "Type", failure = "Type")]` on the enum sets
///   `Action::Success` / `Action::Failure`. Both default to `()`.
/// - `#[action(rename = "Name")]` on a variant overrides its `name()`.
///
/// # Example
/// ```ignore
/// #[derive(Action, Clone, Debug, PartialEq)]
/// #[action(success = "u32", failure = "String")]
/// enum FetchAction {
///     Load { id: u32 },
///     #[action(rename = "Reload")]
///     Refresh,
/// }
///
/// assert_eq!(FetchAction::Load { id: 1 }.name(), "Load");
/// assert_eq!(FetchAction::Refresh.name(), "Reload");
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match ActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Action can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    if variants.is_empty() {
        return syn::Error::new_spanned(&input, "Action needs at least one variant")
            .to_compile_error()
            .into();
    }

    let name_arms = variants.iter().map(|v| {
        let variant_name = &v.ident;
        let variant_str = v
            .rename
            .clone()
            .unwrap_or_else(|| variant_name.to_string());

        match &v.fields.style {
            darling::ast::Style::Unit => quote! {
                #name::#variant_name => #variant_str
            },
            darling::ast::Style::Tuple => quote! {
                #name::#variant_name(..) => #variant_str
            },
            darling::ast::Style::Struct => quote! {
                #name::#variant_name { .. } => #variant_str
            },
        }
    });

    let unit: syn::Type = syn::parse_quote!(());
    let success = opts.success.as_ref().unwrap_or(&unit);
    let failure = opts.failure.as_ref().unwrap_or(&unit);

    let expanded = quote! {
        impl #impl_generics statecast::Action for #name #ty_generics #where_clause {
            type Success = #success;
            type Failure = #failure;

            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}
