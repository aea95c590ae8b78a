//! Proc-macro generating category enums from a JSON catalog.
//!
//! The catalog is read at compile time relative to the calling crate's
//! manifest directory, validated, and turned into a fieldless enum that
//! serializes as the catalog codes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! errcat::declare_categories! {
//!     path = "categories/store.json",
//!     name = "StoreCategory",
//!     vis = "pub"
//! }
//! ```
//!
//! with `categories/store.json`:
//!
//! ```json
//! [
//!     { "code": "store.not-found", "title": "Row not found" },
//!     { "code": "store.conflict", "title": "Write conflict", "variant": "WriteConflict" }
//! ]
//! ```

use std::collections::HashSet;

use heck::ToUpperCamelCase;
use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use serde::Deserialize;
use syn::parse::{Parse, ParseStream};
use syn::{LitStr, Token, parse_macro_input};

/// JSON schema for a single catalog entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryEntry {
    code: String,
    title: String,
    #[serde(default)]
    variant: Option<String>,
}

/// Parsed macro input
struct DeclareCategoriesInput {
    path: String,
    name: syn::Ident,
    vis: syn::Visibility,
}

impl Parse for DeclareCategoriesInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut path = None;
        let mut name = None;
        let mut vis = syn::Visibility::Inherited;

        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match key.to_string().as_str() {
                "path" => {
                    let lit: LitStr = input.parse()?;
                    path = Some(lit.value());
                }
                "name" => {
                    let lit: LitStr = input.parse()?;
                    name = Some(lit.parse::<syn::Ident>()?);
                }
                "vis" => {
                    let lit: LitStr = input.parse()?;
                    vis = match lit.value().as_str() {
                        "pub" => syn::Visibility::Public(syn::token::Pub::default()),
                        "pub(crate)" => syn::parse_quote!(pub(crate)),
                        _ => syn::Visibility::Inherited,
                    };
                }
                _ => return Err(syn::Error::new(key.span(), "Unknown parameter")),
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(Self {
            path: path.ok_or_else(|| input.error("Missing 'path' parameter"))?,
            name: name.ok_or_else(|| input.error("Missing 'name' parameter"))?,
            vis,
        })
    }
}

/// Declare a category enum from a JSON catalog.
#[proc_macro]
pub fn declare_categories(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeclareCategoriesInput);

    match generate_categories(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_categories(input: &DeclareCategoriesInput) -> syn::Result<TokenStream2> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map_err(|_| syn::Error::new(Span::call_site(), "CARGO_MANIFEST_DIR not set"))?;
    let json_path = std::path::Path::new(&manifest_dir).join(&input.path);

    let json_content = std::fs::read_to_string(&json_path).map_err(|e| {
        syn::Error::new(
            Span::call_site(),
            format!("Failed to read category catalog at {}: {e}", json_path.display()),
        )
    })?;

    let entries: Vec<CategoryEntry> = serde_json::from_str(&json_content).map_err(|e| {
        syn::Error::new(
            Span::call_site(),
            format!("Failed to parse category catalog JSON at {}: {e}", json_path.display()),
        )
    })?;

    let variants =
        validate_entries(&entries).map_err(|msg| syn::Error::new(Span::call_site(), msg))?;

    let name = &input.name;
    let catalog = name.to_string();
    let vis = &input.vis;
    let json_file_path = &input.path;

    let enum_variants = entries.iter().zip(&variants).map(|(e, v)| {
        let code = &e.code;
        let title = &e.title;
        quote! {
            #[doc = #title]
            #[serde(rename = #code)]
            #v
        }
    });
    let code_arms = entries.iter().zip(&variants).map(|(e, v)| {
        let code = &e.code;
        quote! { Self::#v => #code }
    });
    let title_arms = entries.iter().zip(&variants).map(|(e, v)| {
        let title = &e.title;
        quote! { Self::#v => #title }
    });
    let parse_arms = entries.iter().zip(&variants).map(|(e, v)| {
        let code = &e.code;
        quote! { #code => ::core::result::Result::Ok(Self::#v) }
    });

    Ok(quote! {
        // Force Cargo to rebuild if the catalog changes
        const _: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", #json_file_path));

        /// Error categories generated from a JSON catalog
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::errcat::__private::serde::Serialize,
            ::errcat::__private::serde::Deserialize,
        )]
        #[serde(crate = "::errcat::__private::serde")]
        #vis enum #name {
            #(#enum_variants),*
        }

        impl #name {
            /// Every category of the catalog, in catalog order.
            pub const ALL: &'static [Self] = &[#(Self::#variants),*];

            /// The serialized code.
            #[must_use]
            pub const fn code(&self) -> &'static str {
                match self {
                    #(#code_arms),*
                }
            }

            #[must_use]
            pub const fn title(&self) -> &'static str {
                match self {
                    #(#title_arms),*
                }
            }

            /// Create an error of this category.
            pub fn error(
                self,
                message: impl ::core::convert::Into<::std::string::String>,
            ) -> ::errcat::Error {
                ::errcat::Error::new(self, message)
            }
        }

        impl ::core::fmt::Display for #name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl ::core::str::FromStr for #name {
            type Err = ::errcat::category::UnknownCode;

            fn from_str(code: &str) -> ::core::result::Result<Self, Self::Err> {
                match code {
                    #(#parse_arms,)*
                    _ => ::core::result::Result::Err(::errcat::category::UnknownCode {
                        catalog: #catalog,
                        code: ::std::borrow::ToOwned::to_owned(code),
                    }),
                }
            }
        }
    })
}

/// Check every entry and compute the variant identifiers, in entry order.
fn validate_entries(entries: &[CategoryEntry]) -> Result<Vec<syn::Ident>, String> {
    if entries.is_empty() {
        return Err("Category catalog is empty".to_owned());
    }

    let mut codes = HashSet::new();
    let mut names = HashSet::new();
    let mut variants = Vec::with_capacity(entries.len());

    for entry in entries {
        validate_code(&entry.code)?;

        if entry.title.trim().is_empty() {
            return Err(format!("Empty title for category '{}'", entry.code));
        }

        if !codes.insert(entry.code.as_str()) {
            return Err(format!("Duplicate category code: '{}'", entry.code));
        }

        let name = variant_name(entry);
        let ident = syn::parse_str::<syn::Ident>(&name).map_err(|_| {
            format!(
                "Category '{}' maps to '{name}', which is not a valid variant name; \
                 set 'variant' explicitly",
                entry.code
            )
        })?;
        if !names.insert(name.clone()) {
            return Err(format!(
                "Variant name collision: '{name}' is derived from more than one code; \
                 set 'variant' explicitly"
            ));
        }
        variants.push(ident);
    }

    Ok(variants)
}

/// Codes are non-empty and use only lowercase letters, digits, `_`, `.` and `-`.
fn validate_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("Category code must not be empty".to_owned());
    }
    if let Some(bad) = code
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!(
            "Category code '{code}' contains '{bad}': \
             only lowercase letters, digits, '_', '.' and '-' are allowed"
        ));
    }
    Ok(())
}

fn variant_name(entry: &CategoryEntry) -> String {
    match &entry.variant {
        Some(v) => v.clone(),
        None => entry.code.replace('.', "_").to_upper_camel_case(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn entry(code: &str, variant: Option<&str>) -> CategoryEntry {
        CategoryEntry {
            code: code.to_owned(),
            title: "Some title".to_owned(),
            variant: variant.map(str::to_owned),
        }
    }

    fn names(entries: &[CategoryEntry]) -> Vec<String> {
        validate_entries(entries)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn derives_camel_case_variants() {
        let got = names(&[
            entry("store.not-found", None),
            entry("err-asdf", None),
            entry("quota_exceeded", None),
        ]);
        assert_eq!(got, ["StoreNotFound", "ErrAsdf", "QuotaExceeded"]);
    }

    #[test]
    fn explicit_variant_wins() {
        assert_eq!(names(&[entry("store.conflict", Some("WriteConflict"))]), ["WriteConflict"]);
    }

    #[test]
    fn rejects_bad_codes() {
        assert!(validate_code("").is_err());
        assert!(validate_code("Store.NotFound").unwrap_err().contains("'S'"));
        assert!(validate_code("store/x").is_err());
        assert!(validate_code("store.not-found_2").is_ok());
    }

    #[test]
    fn rejects_duplicates_and_collisions() {
        let dup = validate_entries(&[entry("a.b", None), entry("a.b", None)]).unwrap_err();
        assert!(dup.contains("Duplicate category code"));

        let clash = validate_entries(&[entry("a.b", None), entry("a-b", None)]).unwrap_err();
        assert!(clash.contains("Variant name collision"));
    }

    #[test]
    fn rejects_unusable_identifiers() {
        let err = validate_entries(&[entry("404", None)]).unwrap_err();
        assert!(err.contains("set 'variant' explicitly"));
        assert!(validate_entries(&[entry("404", Some("NotFound"))]).is_ok());
    }

    #[test]
    fn rejects_empty_catalog_and_titles() {
        assert!(validate_entries(&[]).is_err());
        let mut untitled = entry("a", None);
        untitled.title = "  ".to_owned();
        assert!(validate_entries(&[untitled]).unwrap_err().contains("Empty title"));
    }
}
