//! `#[lazy_contract]` implementation
//!
//! Validates the trait shape and emits the proxy forwarding impl, the
//! `LazyContract` descriptor impl and the `Upcast` impl next to the trait.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    parse::Result, parse_macro_input, parse_quote, Attribute, Error, FnArg, GenericParam, Generics,
    Ident, ItemTrait, ReturnType, Signature, TraitItem, TraitItemFn, Type, TypeParamBound,
    Visibility, WherePredicate,
};

pub fn lazy_contract_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return Error::new(Span::call_site(), "#[lazy_contract] takes no arguments")
            .to_compile_error()
            .into();
    }

    let item = parse_macro_input!(input as ItemTrait);

    match expand(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Method,
    Getter,
    Setter,
    Event,
}

impl MemberKind {
    fn tokens(self) -> TokenStream2 {
        match self {
            MemberKind::Method => quote!(::lazyproxy_core::MemberKind::Method),
            MemberKind::Getter => quote!(::lazyproxy_core::MemberKind::Getter),
            MemberKind::Setter => quote!(::lazyproxy_core::MemberKind::Setter),
            MemberKind::Event => quote!(::lazyproxy_core::MemberKind::Event),
        }
    }
}

struct Member {
    kind: MemberKind,
    generic_params: Vec<String>,
    forwarded: bool,
    sig: Signature,
    cfg_attrs: Vec<Attribute>,
}

fn expand(mut item: ItemTrait) -> Result<TokenStream2> {
    validate_trait(&item)?;
    ensure_thread_safe(&mut item);
    let members = collect_members(&mut item)?;

    let forwarding = forwarding_impl(&item, &members);
    let contract = contract_impl(&item, &members);
    let upcast = upcast_impl(&item);

    Ok(quote! {
        #item

        #forwarding

        #contract

        #upcast
    })
}

fn validate_trait(item: &ItemTrait) -> Result<()> {
    let mut errors: Vec<Error> = Vec::new();

    if item.auto_token.is_some() {
        errors.push(Error::new_spanned(item.auto_token, "auto traits cannot be lazy contracts"));
    }
    if item.unsafety.is_some() {
        errors.push(Error::new_spanned(item.unsafety, "unsafe traits cannot be lazy contracts"));
    }

    for param in &item.generics.params {
        match param {
            GenericParam::Type(_) => {}
            GenericParam::Lifetime(lifetime) => errors.push(Error::new_spanned(
                lifetime,
                "lazy contracts cannot have lifetime parameters",
            )),
            GenericParam::Const(constant) => errors.push(Error::new_spanned(
                constant,
                "lazy contracts cannot have const parameters",
            )),
        }
    }

    for trait_item in &item.items {
        match trait_item {
            TraitItem::Fn(_) => {}
            TraitItem::Type(ty) => errors.push(Error::new_spanned(
                ty,
                "associated types are not supported by lazy contracts",
            )),
            TraitItem::Const(constant) => errors.push(Error::new_spanned(
                constant,
                "associated constants are not supported by lazy contracts",
            )),
            other => errors.push(Error::new_spanned(other, "unsupported item in a lazy contract")),
        }
    }

    combine(errors)
}

/// Proxies are shared across threads, so every contract is `Send + Sync`
fn ensure_thread_safe(item: &mut ItemTrait) {
    let has_bound = |item: &ItemTrait, name: &str| {
        item.supertraits.iter().any(|bound| match bound {
            TypeParamBound::Trait(trait_bound) => trait_bound
                .path
                .segments
                .last()
                .map(|segment| segment.ident == name)
                .unwrap_or(false),
            _ => false,
        })
    };

    let needs_send = !has_bound(item, "Send");
    let needs_sync = !has_bound(item, "Sync");
    if needs_send || needs_sync {
        item.colon_token.get_or_insert_with(Default::default);
    }
    if needs_send {
        item.supertraits.push(parse_quote!(::core::marker::Send));
    }
    if needs_sync {
        item.supertraits.push(parse_quote!(::core::marker::Sync));
    }
}

fn collect_members(item: &mut ItemTrait) -> Result<Vec<Member>> {
    let mut members = Vec::new();
    let mut errors = Vec::new();

    for trait_item in item.items.iter_mut() {
        if let TraitItem::Fn(method) = trait_item {
            match analyze_member(method) {
                Ok(member) => members.push(member),
                Err(err) => errors.push(err),
            }
        }
    }

    combine(errors)?;
    Ok(members)
}

fn analyze_member(method: &mut TraitItemFn) -> Result<Member> {
    let kind = take_member_kind(&mut method.attrs)?;
    let sig = &method.sig;

    if let Some(asyncness) = &sig.asyncness {
        return Err(Error::new_spanned(asyncness, "async members cannot be forwarded by a lazy proxy"));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(Error::new_spanned(variadic, "variadic members are not supported"));
    }

    let generic_params: Vec<String> = sig
        .generics
        .params
        .iter()
        .map(|param| match param {
            GenericParam::Type(ty) => ty.ident.to_string(),
            GenericParam::Lifetime(lifetime) => lifetime.lifetime.to_string(),
            GenericParam::Const(constant) => constant.ident.to_string(),
        })
        .collect();

    let cfg_attrs: Vec<Attribute> = method
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("cfg"))
        .cloned()
        .collect();

    if !is_dyn_dispatchable(sig) {
        if method.default.is_some() {
            // keeps `dyn Trait` object safe
            if !is_sized_only(sig) {
                method
                    .sig
                    .generics
                    .make_where_clause()
                    .predicates
                    .push(parse_quote!(Self: ::core::marker::Sized));
            }
            return Ok(Member {
                kind,
                generic_params,
                forwarded: false,
                sig: method.sig.clone(),
                cfg_attrs,
            });
        }
        return Err(Error::new_spanned(
            sig,
            "generic members and members without a `&self` receiver need a default body",
        ));
    }

    let takes_shared_self = sig
        .receiver()
        .map(|receiver| {
            receiver.reference.is_some() && receiver.mutability.is_none() && receiver.colon_token.is_none()
        })
        .unwrap_or(false);
    if !takes_shared_self {
        return Err(Error::new_spanned(
            &sig.inputs,
            "forwarded members must take `&self`",
        ));
    }

    if !returns_result(&sig.output) {
        return Err(Error::new_spanned(
            &sig.output,
            "forwarded members must return a `Result` whose error type implements `From<CoreError>`",
        ));
    }

    Ok(Member {
        kind,
        generic_params,
        forwarded: true,
        sig: sig.clone(),
        cfg_attrs,
    })
}

/// Remove `#[lazy(...)]` attributes and read the member kind from them
fn take_member_kind(attrs: &mut Vec<Attribute>) -> Result<MemberKind> {
    let mut kind = MemberKind::Method;
    let mut error: Option<Error> = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("lazy") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("getter") {
                kind = MemberKind::Getter;
            } else if meta.path.is_ident("setter") {
                kind = MemberKind::Setter;
            } else if meta.path.is_ident("event") {
                kind = MemberKind::Event;
            } else {
                return Err(meta.error("expected `getter`, `setter` or `event`"));
            }
            Ok(())
        });
        if let Err(err) = parsed {
            error = Some(err);
        }
        false
    });

    match error {
        Some(err) => Err(err),
        None => Ok(kind),
    }
}

/// Whether the member can be called through `dyn Trait`
fn is_dyn_dispatchable(sig: &Signature) -> bool {
    let generic = sig
        .generics
        .params
        .iter()
        .any(|param| !matches!(param, GenericParam::Lifetime(_)));

    let impl_trait_argument = sig.inputs.iter().any(|input| match input {
        FnArg::Typed(pat_type) => contains_impl_trait(&pat_type.ty),
        FnArg::Receiver(_) => false,
    });

    sig.receiver().is_some() && !generic && !is_sized_only(sig) && !impl_trait_argument
}

/// Whether the member carries a `where Self: Sized` bound
fn is_sized_only(sig: &Signature) -> bool {
    sig
        .generics
        .where_clause
        .as_ref()
        .map(|where_clause| {
            where_clause.predicates.iter().any(|predicate| match predicate {
                WherePredicate::Type(predicate) => {
                    let is_self = matches!(&predicate.bounded_ty, Type::Path(path) if path.path.is_ident("Self"));
                    is_self
                        && predicate.bounds.iter().any(|bound| {
                            matches!(bound, TypeParamBound::Trait(trait_bound) if trait_bound
                                .path
                                .segments
                                .last()
                                .map(|segment| segment.ident == "Sized")
                                .unwrap_or(false))
                        })
                }
                _ => false,
            })
        })
        .unwrap_or(false)
}

fn contains_impl_trait(ty: &Type) -> bool {
    match ty {
        Type::ImplTrait(_) => true,
        Type::Reference(reference) => contains_impl_trait(&reference.elem),
        Type::Paren(paren) => contains_impl_trait(&paren.elem),
        Type::Group(group) => contains_impl_trait(&group.elem),
        _ => false,
    }
}

/// `Result<..>` or an alias named like one, such as `io::Result<T>`
fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map(|segment| segment.ident.to_string().ends_with("Result"))
                .unwrap_or(false),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// Trait generics with every type parameter bounded by `'static`
fn static_generics(generics: &Generics) -> Generics {
    let mut generics = generics.clone();
    for param in generics.params.iter_mut() {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!('static));
        }
    }
    generics
}

fn forwarding_impl(item: &ItemTrait, members: &[Member]) -> TokenStream2 {
    let name = &item.ident;
    let (_, ty_generics, _) = item.generics.split_for_impl();

    let mut generics = static_generics(&item.generics);
    generics.params.insert(
        0,
        parse_quote!(__C: ?Sized + #name #ty_generics + ::core::marker::Send + ::core::marker::Sync + 'static),
    );
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    let trait_path = quote!(#name #ty_generics);
    let methods = members
        .iter()
        .filter(|member| member.forwarded)
        .map(|member| forwarding_method(&trait_path, member));

    quote! {
        impl #impl_generics #name #ty_generics for ::lazyproxy_core::LazyProxy<__C> #where_clause {
            #(#methods)*
        }
    }
}

fn forwarding_method(trait_path: &TokenStream2, member: &Member) -> TokenStream2 {
    let mut sig = member.sig.clone();
    let mut arguments: Vec<Ident> = Vec::new();

    for (index, input) in sig.inputs.iter_mut().enumerate() {
        if let FnArg::Typed(pat_type) = input {
            let argument = format_ident!("__arg{}", index);
            *pat_type.pat = parse_quote!(#argument);
            pat_type.attrs.clear();
            arguments.push(argument);
        }
    }

    let method = &sig.ident;
    let call = quote!(<__C as #trait_path>::#method(&**__target #(, #arguments)*));
    let call = if sig.unsafety.is_some() {
        quote!(unsafe { #call })
    } else {
        call
    };
    let cfg_attrs = &member.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        #sig {
            let __target = ::lazyproxy_core::LazyProxy::target(self)?;
            #call
        }
    }
}

fn contract_impl(item: &ItemTrait, members: &[Member]) -> TokenStream2 {
    let name = &item.ident;
    let name_str = name.to_string();

    let generics = static_generics(&item.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let type_params: Vec<&Ident> = item.generics.type_params().map(|param| &param.ident).collect();
    let param_names: Vec<String> = type_params.iter().map(|ident| ident.to_string()).collect();

    let visibility = match &item.vis {
        Visibility::Public(_) => quote!(::lazyproxy_core::Visibility::Public),
        _ => quote!(::lazyproxy_core::Visibility::Restricted),
    };

    let supertraits: Vec<String> = item
        .supertraits
        .iter()
        .filter_map(|bound| match bound {
            TypeParamBound::Trait(trait_bound) => trait_bound.path.segments.last(),
            _ => None,
        })
        .map(|segment| segment.ident.to_string())
        .filter(|ident| ident != "Send" && ident != "Sync")
        .collect();

    let member_descriptors = members.iter().map(|member| {
        let member_name = member.sig.ident.to_string();
        let kind = member.kind.tokens();
        let generic_params = &member.generic_params;
        let forwarded = member.forwarded;
        quote! {
            ::lazyproxy_core::MemberDescriptor {
                name: #member_name,
                kind: #kind,
                generic_params: &[#(#generic_params),*],
                forwarded: #forwarded,
            }
        }
    });

    quote! {
        impl #impl_generics ::lazyproxy_core::LazyContract for dyn #name #ty_generics #where_clause {
            fn descriptor() -> ::lazyproxy_core::ContractDescriptor {
                const MEMBERS: &[::lazyproxy_core::MemberDescriptor] = &[#(#member_descriptors),*];

                ::lazyproxy_core::ContractDescriptor {
                    name: #name_str,
                    family: ::core::concat!(::core::module_path!(), "::", #name_str),
                    kind: ::lazyproxy_core::ContractKind::Interface,
                    visibility: #visibility,
                    generic_params: &[#(#param_names),*],
                    type_args: ::std::vec![#(::core::any::type_name::<#type_params>()),*],
                    supertraits: &[#(#supertraits),*],
                    members: MEMBERS,
                }
            }

            fn bind(
                proxy: ::lazyproxy_core::LazyProxy<Self>,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(proxy)
            }
        }
    }
}

fn upcast_impl(item: &ItemTrait) -> TokenStream2 {
    let name = &item.ident;
    let (_, ty_generics, _) = item.generics.split_for_impl();

    let mut generics = static_generics(&item.generics);
    generics.params.insert(
        0,
        parse_quote!(__I: #name #ty_generics + ::core::marker::Send + ::core::marker::Sync + 'static),
    );
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics ::lazyproxy_core::Upcast<__I> for dyn #name #ty_generics #where_clause {
            fn upcast(instance: ::std::sync::Arc<__I>) -> ::std::sync::Arc<Self> {
                instance
            }
        }
    }
}

fn combine(errors: Vec<Error>) -> Result<()> {
    let mut errors = errors.into_iter();
    match errors.next() {
        Some(mut first) => {
            for error in errors {
                first.combine(error);
            }
            Err(first)
        }
        None => Ok(()),
    }
}
