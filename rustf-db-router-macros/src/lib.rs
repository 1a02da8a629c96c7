//! rustf-db-router macros
//!
//! Provides `#[in_database]`, the attribute form of
//! `rustf_db_router::InDatabase`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Expr, Ident, ItemFn, LitBool, ReturnType, Token, Type};

/// Run every call of the annotated function inside a fresh database override
///
/// The first argument is the alias (any expression convertible into
/// `DatabaseSpec`). `read` defaults to `true`, `write` to `false`. The
/// function keeps its name, visibility, attributes, docs and signature.
/// Works on both sync and async functions.
///
/// # Usage
/// ```rust,ignore
/// use rustf_db_router::prelude::*;
///
/// #[in_database("replica")]
/// fn monthly_totals() -> Vec<Total> {
///     Total::query().all()
/// }
///
/// #[in_database("primary", read = false, write = true)]
/// async fn archive(invoice: Invoice) -> Result<()> {
///     invoice.save().await
/// }
/// ```
#[proc_macro_attribute]
pub fn in_database(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as OverrideArgs);
    let input_fn = parse_macro_input!(input as ItemFn);
    expand(args, input_fn).into()
}

struct OverrideArgs {
    database: Expr,
    read: Option<LitBool>,
    write: Option<LitBool>,
}

impl Parse for OverrideArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Err(input.error(
                "expected a database alias, e.g. #[in_database(\"replica\", write = true)]",
            ));
        }

        let database: Expr = input.parse()?;
        let mut read = None;
        let mut write = None;

        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: LitBool = input.parse()?;

            let slot = match key.to_string().as_str() {
                "read" => &mut read,
                "write" => &mut write,
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "unknown option, expected `read` or `write`",
                    ))
                }
            };
            if slot.replace(value).is_some() {
                return Err(syn::Error::new(key.span(), "option given twice"));
            }
        }

        Ok(Self {
            database,
            read,
            write,
        })
    }
}

fn expand(args: OverrideArgs, input_fn: ItemFn) -> TokenStream2 {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input_fn;
    let OverrideArgs {
        database,
        read,
        write,
    } = args;

    let read = read.map(|value| quote!(.read(#value)));
    let write = write.map(|value| quote!(.write(#value)));
    let scope = quote! {
        ::rustf_db_router::InDatabase::new(#database) #read #write
    };

    // `impl Trait` cannot be named on a closure or a `let`, leave it inferred
    let ret = match &sig.output {
        ReturnType::Default => Some(quote!(())),
        ReturnType::Type(_, ty) if matches!(**ty, Type::ImplTrait(_)) => None,
        ReturnType::Type(_, ty) => Some(quote!(#ty)),
    };

    let body = if sig.asyncness.is_some() {
        let fut = match ret {
            Some(ret) => quote! {
                async move {
                    let __in_database_ret: #ret = #block;
                    __in_database_ret
                }
            },
            None => quote!(async move #block),
        };
        quote! {
            #scope.scope(#fut).await
        }
    } else {
        let closure = match ret {
            Some(ret) => quote!(|| -> #ret #block),
            None => quote!(|| #block),
        };
        quote! {
            #scope.call(#closure)
        }
    };

    quote! {
        #(#attrs)*
        #vis #sig {
            #body
        }
    }
}
