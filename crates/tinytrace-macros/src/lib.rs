//! Procedural macros for tinytrace.
//!
//! This crate provides:
//! - `#[program]` - Registers a traced function so it can be run by name
//! - `#[derive(ToValue)]` - Converts a struct into a traced record value

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, Data, DeriveInput, Fields, FnArg, Ident, ItemFn, LitStr, Pat, ReturnType, Type,
};

/// Parses program attributes from the macro invocation.
#[derive(Default)]
struct ProgramAttrs {
    description: Option<String>,
}

impl ProgramAttrs {
    fn parse(attr: TokenStream) -> syn::Result<Self> {
        let mut attrs = ProgramAttrs::default();
        if attr.is_empty() {
            return Ok(attrs);
        }

        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("description") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.description = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported program attribute; expected `description = \"...\"`"))
            }
        });
        syn::parse::Parser::parse(parser, attr)?;
        Ok(attrs)
    }
}

/// Marks a function as a traced tinytrace program.
///
/// The first parameter must be the `&mut Frame` the program reports through;
/// every other parameter must implement `FromValue`. The return type must
/// implement `ToValue`, or be a `Result` whose error implements `Display`,
/// in which case an `Err` becomes a target runtime failure.
///
/// This macro:
/// 1. Preserves the original function unchanged
/// 2. Generates an entry point that checks arity and converts arguments
/// 3. Registers the program in the global `PROGRAM_REGISTRY` distributed slice
///
/// # Example
/// ```ignore
/// #[program(description = "Sums the numbers below a limit")]
/// fn sum_below(frame: &mut Frame<'_>, limit: i64) -> i64 {
///     let mut total = 0; observe!(frame; limit, total);
///     for i in 0..limit {
///         total += i; observe!(frame; i, total);
///     }
///     total
/// }
/// ```
#[proc_macro_attribute]
pub fn program(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match ProgramAttrs::parse(attr) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };
    let input_fn = parse_macro_input!(item as ItemFn);

    match expand_program(&attrs, &input_fn) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_program(attrs: &ProgramAttrs, input_fn: &ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let fn_name = &input_fn.sig.ident;
    let fn_name_str = fn_name.to_string();
    let entry_name = format_ident!("__tinytrace_program_entry_{}", fn_name);
    let registration_name = format_ident!("__TINYTRACE_PROGRAM_REGISTRATION_{}", fn_name_str.to_uppercase());

    let mut inputs = input_fn.sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Typed(_)) => {}
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(receiver, "programs cannot take `self`"));
        }
        None => {
            return Err(syn::Error::new_spanned(
                &input_fn.sig,
                "programs take `&mut Frame` as their first parameter",
            ));
        }
    }

    let mut param_names = Vec::new();
    let mut param_types = Vec::new();
    for arg in inputs {
        let FnArg::Typed(pat_type) = arg else {
            return Err(syn::Error::new_spanned(arg, "programs cannot take `self`"));
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return Err(syn::Error::new_spanned(&pat_type.pat, "program parameters must be plain identifiers"));
        };
        param_names.push(pat_ident.ident.clone());
        param_types.push(&*pat_type.ty);
    }

    let param_strs: Vec<String> = param_names.iter().map(|name| name.to_string()).collect();
    let arity = param_names.len();
    let indices: Vec<usize> = (0..arity).collect();

    let convert_args = quote! {
        #(
            let #param_names: #param_types =
                <#param_types as ::tinytrace::core::FromValue>::from_value(&__args[#indices]).map_err(|err| {
                    ::tinytrace::core::Error::InvalidArgument {
                        program: ::std::string::String::from(#fn_name_str),
                        index: #indices,
                        message: err.to_string(),
                    }
                })?;
        )*
    };

    let call = quote! { #fn_name(__frame, #(#param_names),*) };
    let call_and_convert = match &input_fn.sig.output {
        ReturnType::Default => quote! {
            #call;
            ::std::result::Result::Ok(::tinytrace::core::Value::None)
        },
        ReturnType::Type(_, ty) if returns_result(ty) => quote! {
            match #call {
                ::std::result::Result::Ok(value) => {
                    ::std::result::Result::Ok(::tinytrace::core::ToValue::to_value(&value))
                }
                ::std::result::Result::Err(err) => ::std::result::Result::Err(::tinytrace::core::Error::TargetRuntime {
                    program: ::std::string::String::from(#fn_name_str),
                    message: err.to_string(),
                    partial: ::std::option::Option::None,
                }),
            }
        },
        ReturnType::Type(..) => quote! {
            let value = #call;
            ::std::result::Result::Ok(::tinytrace::core::ToValue::to_value(&value))
        },
    };

    let description_expr = match &attrs.description {
        Some(desc) => quote! { ::std::option::Option::Some(#desc) },
        None => quote! { ::std::option::Option::None },
    };

    Ok(quote! {
        #input_fn

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #entry_name(
            __frame: &mut ::tinytrace::runtime::Frame<'_>,
            __args: &[::tinytrace::core::Value],
        ) -> ::tinytrace::core::Result<::tinytrace::core::Value> {
            if __args.len() != #arity {
                return ::std::result::Result::Err(::tinytrace::core::Error::ArityMismatch {
                    program: ::std::string::String::from(#fn_name_str),
                    expected: #arity,
                    actual: __args.len(),
                });
            }
            #convert_args
            #call_and_convert
        }

        #[::tinytrace::runtime::linkme::distributed_slice(::tinytrace::runtime::registry::PROGRAM_REGISTRY)]
        #[linkme(crate = ::tinytrace::runtime::linkme)]
        static #registration_name: ::tinytrace::runtime::registry::ProgramRegistration =
            ::tinytrace::runtime::registry::ProgramRegistration::new(
                ::tinytrace::runtime::registry::ProgramMetadataStatic::new(
                    #fn_name_str,
                    #description_expr,
                    &[#(#param_strs),*],
                    ::std::file!(),
                ),
                #entry_name,
            );
    })
}

fn returns_result(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident == "Result")
            .unwrap_or(false),
        _ => false,
    }
}

/// Derives `ToValue` for a struct, producing a record named after the type.
///
/// Tuple struct fields are named by position.
///
/// # Example
/// ```ignore
/// #[derive(ToValue)]
/// struct Item { weight: i64, value: i64 }
/// // Item(weight=10, value=60)
/// ```
#[proc_macro_derive(ToValue)]
pub fn derive_to_value(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    match expand_to_value(input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_to_value(mut input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    let fields: Vec<proc_macro2::TokenStream> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .map(|ident| {
                    let field_str = ident.to_string();
                    quote! { .field(#field_str, ::tinytrace::core::ToValue::to_value(&self.#ident)) }
                })
                .collect(),
            Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
                .map(|index| {
                    let member = syn::Index::from(index);
                    let field_str = index.to_string();
                    quote! { .field(#field_str, ::tinytrace::core::ToValue::to_value(&self.#member)) }
                })
                .collect(),
            Fields::Unit => Vec::new(),
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new(
                Span::call_site(),
                "ToValue can only be derived for structs",
            ));
        }
    };

    let type_params: Vec<Ident> = input.generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = input.generics.make_where_clause();
    for param in &type_params {
        where_clause
            .predicates
            .push(parse_quote! { #param: ::tinytrace::core::ToValue });
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tinytrace::core::ToValue for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::tinytrace::core::Value {
                ::tinytrace::core::Value::Record(
                    ::tinytrace::core::value::Record::new(#name_str)
                        #(#fields)*
                )
            }
        }
    })
}
