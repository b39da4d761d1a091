use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, LitStr};

pub enum Kind {
    Command,
    Event,
}

struct MessageArgs {
    module: Option<String>,
    name: Option<String>,
}

pub fn derive_message(input: TokenStream, kind: Kind) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;

    let args = match parse_args(&input) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    let Some(module) = args.module else {
        return syn::Error::new(
            Span::call_site(),
            "message contracts need an owning module: #[message(module = \"...\")]",
        )
        .to_compile_error()
        .into();
    };

    let name = args
        .name
        .unwrap_or_else(|| to_snake_case(&ident.to_string()));
    let type_ref = format!("{}::{}", module, ident);

    let (kind_variant, marker) = match kind {
        Kind::Command => (
            quote!(modular_rust::MessageKind::Command),
            quote!(modular_rust::Command),
        ),
        Kind::Event => (
            quote!(modular_rust::MessageKind::Event),
            quote!(modular_rust::Event),
        ),
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics modular_rust::Message for #ident #ty_generics #where_clause {
            const MODULE: &'static str = #module;
            const NAME: &'static str = #name;
            const TYPE: &'static str = #type_ref;
            const KIND: modular_rust::MessageKind = #kind_variant;
        }

        impl #impl_generics #marker for #ident #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

fn parse_args(input: &DeriveInput) -> syn::Result<MessageArgs> {
    let mut args = MessageArgs {
        module: None,
        name: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("module") {
                let value: LitStr = meta.value()?.parse()?;
                args.module = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `module` or `name`"))
            }
        })?;
    }

    Ok(args)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
