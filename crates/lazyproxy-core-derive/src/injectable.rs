//! Injectable attribute macro implementation
//!
//! Implements `Injectable` for a struct by resolving each field through the
//! `ResolveContext`:
//! - `Arc<T>` fields are dependencies
//! - `Option<Arc<T>>` fields are optional dependencies
//! - `PhantomData` fields are filled in directly
//! - `#[inject(property)]` fields are properties
//! - any other field is a value parameter

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;
use syn::{
    parse::Result, parse_macro_input, parse_quote, Error, Fields, GenericArgument, Item, ItemStruct,
    PathArguments, PathSegment, Type, TypePath, WhereClause,
};

/// Main implementation function for the injectable macro
pub fn injectable_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return Error::new(Span::call_site(), "#[injectable] takes no arguments")
            .to_compile_error()
            .into();
    }

    let input_item = parse_macro_input!(input as Item);

    match process_injectable_item(input_item) {
        Ok(result) => result.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Process the injectable attribute on different item types
fn process_injectable_item(item: Item) -> Result<proc_macro2::TokenStream> {
    match item {
        Item::Struct(mut item_struct) => process_injectable_struct(&mut item_struct),
        _ => Err(Error::new_spanned(
            item,
            "#[injectable] can only be applied to structs",
        )),
    }
}

/// Process a struct marked with #[injectable]
fn process_injectable_struct(item_struct: &mut ItemStruct) -> Result<proc_macro2::TokenStream> {
    let fields = extract_fields(item_struct)?;
    let injectable_impl = generate_injectable_impl(item_struct, &fields);

    Ok(quote! {
        #item_struct

        #injectable_impl
    })
}

/// How a field receives its value
#[derive(Debug, Clone)]
enum FieldSource {
    Dependency(Type),
    OptionalDependency(Type),
    Parameter(Type),
    Property(Type),
    OptionalProperty(Type),
    Marker,
}

#[derive(Debug, Clone)]
struct FieldInfo {
    name: Ident,
    source: FieldSource,
}

/// Extract field information, stripping `#[inject(...)]` attributes
fn extract_fields(item_struct: &mut ItemStruct) -> Result<Vec<FieldInfo>> {
    if matches!(item_struct.fields, Fields::Unnamed(_)) {
        return Err(Error::new_spanned(
            &*item_struct,
            "#[injectable] requires structs with named fields",
        ));
    }

    let mut infos = Vec::new();
    if let Fields::Named(fields) = &mut item_struct.fields {
        for field in fields.named.iter_mut() {
            let mut is_property = false;
            let mut error: Option<Error> = None;
            field.attrs.retain(|attr| {
                if !attr.path().is_ident("inject") {
                    return true;
                }
                let parsed = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("property") {
                        is_property = true;
                        Ok(())
                    } else {
                        Err(meta.error("expected `property`"))
                    }
                });
                if let Err(err) = parsed {
                    error = Some(err);
                }
                false
            });
            if let Some(err) = error {
                return Err(err);
            }

            if let Some(name) = &field.ident {
                infos.push(FieldInfo {
                    name: name.clone(),
                    source: analyze_field_type(&field.ty, is_property),
                });
            }
        }
    }

    Ok(infos)
}

/// Classify a field by its type
fn analyze_field_type(field_type: &Type, is_property: bool) -> FieldSource {
    let segment = match field_type {
        Type::Path(type_path) => last_segment(type_path),
        _ => None,
    };

    let Some(segment) = segment else {
        return if is_property {
            FieldSource::Property(field_type.clone())
        } else {
            FieldSource::Parameter(field_type.clone())
        };
    };

    match segment.ident.to_string().as_str() {
        "PhantomData" => FieldSource::Marker,
        "Option" if is_property => match extract_generic_type(segment) {
            Some(inner) => FieldSource::OptionalProperty(inner),
            None => FieldSource::Property(field_type.clone()),
        },
        _ if is_property => FieldSource::Property(field_type.clone()),
        "Arc" => match extract_generic_type(segment) {
            Some(inner) => FieldSource::Dependency(inner),
            None => FieldSource::Parameter(field_type.clone()),
        },
        "Option" => match extract_generic_type(segment).and_then(|inner| extract_arc_inner_type(&inner)) {
            Some(inner) => FieldSource::OptionalDependency(inner),
            None => FieldSource::Parameter(field_type.clone()),
        },
        _ => FieldSource::Parameter(field_type.clone()),
    }
}

fn last_segment(type_path: &TypePath) -> Option<&PathSegment> {
    if type_path.qself.is_some() {
        return None;
    }
    type_path.path.segments.last()
}

/// Extract the generic type from a type segment
fn extract_generic_type(segment: &PathSegment) -> Option<Type> {
    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(GenericArgument::Type(inner_type)) = args.args.first() {
            return Some(inner_type.clone());
        }
    }
    None
}

/// Extract the inner type from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = last_segment(type_path) {
            if segment.ident == "Arc" {
                return extract_generic_type(segment);
            }
        }
    }
    None
}

/// Generate the Injectable trait implementation
fn generate_injectable_impl(item_struct: &ItemStruct, fields: &[FieldInfo]) -> proc_macro2::TokenStream {
    let struct_name = &item_struct.ident;
    let (impl_generics, ty_generics, where_clause) = item_struct.generics.split_for_impl();

    let mut where_clause: WhereClause = where_clause.cloned().unwrap_or_else(|| parse_quote!(where));
    where_clause.predicates.push(parse_quote!(
        #struct_name #ty_generics: ::core::marker::Send + ::core::marker::Sync + 'static
    ));

    let parameter_names: Vec<String> = fields
        .iter()
        .filter(|field| {
            matches!(
                field.source,
                FieldSource::Dependency(_) | FieldSource::OptionalDependency(_) | FieldSource::Parameter(_)
            )
        })
        .map(|field| field.name.to_string())
        .collect();

    let field_initializers: Vec<proc_macro2::TokenStream> = fields
        .iter()
        .map(|field| {
            let name = &field.name;
            let key = name.to_string();
            match &field.source {
                FieldSource::Dependency(ty) => quote! {
                    #name: ctx.dependency::<#ty>(#key)?
                },
                FieldSource::OptionalDependency(ty) => quote! {
                    #name: ctx.optional_dependency::<#ty>(#key)?
                },
                FieldSource::Parameter(ty) => quote! {
                    #name: ctx.parameter::<#ty>(#key)?
                },
                FieldSource::Property(ty) => quote! {
                    #name: ctx.property::<#ty>(#key)?
                },
                FieldSource::OptionalProperty(ty) => quote! {
                    #name: ctx.optional_property::<#ty>(#key)?
                },
                FieldSource::Marker => quote! {
                    #name: ::core::marker::PhantomData
                },
            }
        })
        .collect();

    let construct = match &item_struct.fields {
        Fields::Unit => quote!(Self),
        _ => quote!(Self { #(#field_initializers),* }),
    };

    quote! {
        impl #impl_generics ::lazyproxy_core::container::Injectable for #struct_name #ty_generics #where_clause {
            fn parameter_names() -> &'static [&'static str] {
                &[#(#parameter_names),*]
            }

            #[allow(unused_variables)]
            fn create(
                ctx: &mut ::lazyproxy_core::container::ResolveContext,
            ) -> ::core::result::Result<Self, ::lazyproxy_core::CoreError> {
                ::core::result::Result::Ok(#construct)
            }
        }
    }
}
