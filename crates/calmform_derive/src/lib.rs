use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{
    Attribute, Data, DataStruct, DeriveInput, Field, Fields, LitStr, parse_macro_input,
};

/// Generates one `FieldLens` per named field plus a `<Model>Fields` accessor.
///
/// A field may carry `#[form(label = "...")]`; the label is what rule
/// messages substitute for `{label}`. Without it the field name is used.
#[proc_macro_derive(FormModel, attributes(form))]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "FormModel cannot be derived for generic structs",
        ));
    }
    let model = &input.ident;
    let fields = named_fields(&input)?;
    let calmform = calmform_path();
    let accessor = format_ident!("{model}Fields");

    let mut lenses = Vec::new();
    let mut accessors = Vec::new();
    let mut names = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.to_string();
        let label = field_label(&field.attrs)?.unwrap_or_else(|| name.clone());
        let ty = &field.ty;
        let lens = format_ident!("{model}{}Lens", to_pascal_case(&name));

        lenses.push(quote! {
            #[derive(Clone, Copy, Debug, Default)]
            pub struct #lens;

            impl #calmform::form::FieldLens<#model> for #lens {
                type Value = #ty;

                fn key(self) -> #calmform::form::FieldKey {
                    #calmform::form::FieldKey::new(#name)
                }

                fn label(self) -> &'static str {
                    #label
                }

                fn get<'a>(self, model: &'a #model) -> &'a Self::Value {
                    &model.#ident
                }

                fn set(self, model: &mut #model, value: Self::Value) {
                    model.#ident = value;
                }
            }
        });
        accessors.push(quote! {
            pub const fn #ident(&self) -> #lens {
                #lens
            }
        });
        names.push(name);
    }

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #accessor;

        impl #accessor {
            #(#accessors)*
        }

        impl #calmform::form::FormModel for #model {
            type Fields = #accessor;

            const FIELD_NAMES: &'static [&'static str] = &[#(#names),*];

            fn fields() -> Self::Fields {
                #accessor
            }
        }

        #(#lenses)*
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<&Punctuated<Field, Comma>> {
    match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(named),
            ..
        }) => Ok(&named.named),
        Data::Struct(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel needs named fields to generate lenses",
        )),
        _ => Err(syn::Error::new(
            Span::call_site(),
            "FormModel can only be derived for structs",
        )),
    }
}

fn field_label(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut label = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("form")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("label") {
                let value: LitStr = meta.value()?.parse()?;
                label = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported form attribute, expected `label`"))
            }
        })?;
    }
    Ok(label)
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}

fn to_pascal_case(input: &str) -> String {
    let mut out = String::new();
    for segment in input.split('_') {
        if segment.is_empty() {
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
