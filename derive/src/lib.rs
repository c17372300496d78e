extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Member};

/// How a field is carried on the wire, parsed from `#[nucleus(...)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// Through `WireValue`, the field type's fixed encoding.
    Value,
    /// Through `SmallText`, the one-byte-prefixed string form.
    Small,
    /// Through `NestedField`, the nullable self-serializing convention.
    Nested,
    /// Through the generic fallback registry.
    Fallback,
    /// Not written and not read.
    Skip,
}

/// Extract and parse the `#[nucleus(...)]` attribute of a field
///
/// # Supported Attributes
///
/// * `#[nucleus(small)]` - String written with the small form
/// * `#[nucleus(nested)]` - `Option<T>` or `Vec<Option<T>>` of self-serializing values
/// * `#[nucleus(fallback)]` - `Option<T>` written through the fallback registry
/// * `#[nucleus(skip)]` - Field is neither written nor read
fn get_field_kind(attrs: &[Attribute], field_name: &str) -> syn::Result<FieldKind> {
    let mut kind = FieldKind::Value;

    for attr in attrs {
        if !attr.path().is_ident("nucleus") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let parsed = if meta.path.is_ident("small") {
                FieldKind::Small
            } else if meta.path.is_ident("nested") {
                FieldKind::Nested
            } else if meta.path.is_ident("fallback") {
                FieldKind::Fallback
            } else if meta.path.is_ident("skip") {
                FieldKind::Skip
            } else {
                return Err(meta.error(format!(
                    "Unknown attribute for field '{}': expected small, nested, fallback or skip",
                    field_name
                )));
            };
            if kind != FieldKind::Value {
                return Err(meta.error(format!(
                    "Field '{}' has more than one encoding attribute",
                    field_name
                )));
            }
            kind = parsed;
            Ok(())
        })?;
    }

    Ok(kind)
}

/// Derive macro for implementing the `BinarySerializable` trait
///
/// Fields are written in declaration order and read back in the same order.
/// Each field uses the encoding selected by its `#[nucleus(...)]` attribute,
/// or its type's `WireValue` encoding when it has none.
///
/// # Examples
///
/// ```ignore
/// #[derive(BinarySerializable, Default)]
/// struct Arena {
///     #[nucleus(small)]
///     name: String,
///     enabled: bool,
///     #[nucleus(nested)]
///     spawn: Option<Spawn>,
/// }
/// ```
#[proc_macro_derive(BinarySerializable, attributes(nucleus))]
pub fn derive_binary_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_binary_serializable(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_binary_serializable(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "BinarySerializable can only be derived for structs; use EnumConstant for fieldless enums",
            ))
        }
    };

    let members: Vec<(Member, FieldKind)> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| -> syn::Result<(Member, FieldKind)> {
                let ident = f
                    .ident
                    .clone()
                    .ok_or_else(|| syn::Error::new_spanned(f, "named field without an identifier"))?;
                let kind = get_field_kind(&f.attrs, &ident.to_string())?;
                Ok((Member::Named(ident), kind))
            })
            .collect::<syn::Result<_>>()?,
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| -> syn::Result<(Member, FieldKind)> {
                let kind = get_field_kind(&f.attrs, &i.to_string())?;
                Ok((Member::Unnamed(syn::Index::from(i)), kind))
            })
            .collect::<syn::Result<_>>()?,
        Fields::Unit => Vec::new(),
    };

    let mut serialize_fields = Vec::new();
    let mut deserialize_fields = Vec::new();
    for (member, kind) in &members {
        let (write, read) = match kind {
            FieldKind::Value => (
                quote! { ::nucleus_codec::WireValue::write_value(&self.#member, encoder)?; },
                quote! { self.#member = ::nucleus_codec::WireValue::read_value(decoder)?; },
            ),
            FieldKind::Small => (
                quote! { ::nucleus_codec::SmallText::write_small(&self.#member, encoder)?; },
                quote! { self.#member = ::nucleus_codec::SmallText::read_small(decoder)?; },
            ),
            FieldKind::Nested => (
                quote! { ::nucleus_codec::NestedField::write_nested(&self.#member, encoder)?; },
                quote! { self.#member = ::nucleus_codec::NestedField::read_nested(decoder)?; },
            ),
            FieldKind::Fallback => (
                quote! { encoder.write_object(self.#member.as_ref())?; },
                quote! { self.#member = decoder.read_object()?; },
            ),
            FieldKind::Skip => continue,
        };
        serialize_fields.push(write);
        deserialize_fields.push(read);
    }

    Ok(quote! {
        impl #impl_generics ::nucleus_codec::BinarySerializable for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn serialize<__W: ::std::io::Write>(
                &self,
                encoder: &mut ::nucleus_codec::Encoder<__W>,
            ) -> ::nucleus_codec::Result<()> {
                #(#serialize_fields)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn deserialize<__R: ::std::io::Read>(
                &mut self,
                decoder: &mut ::nucleus_codec::Decoder<__R>,
            ) -> ::nucleus_codec::Result<()> {
                #(#deserialize_fields)*
                Ok(())
            }
        }
    })
}

/// Derive macro for implementing the `EnumConstant` trait
///
/// Only fieldless enums are supported. Each constant is written by its
/// identifier, so renaming a variant changes the wire format. A `WireValue`
/// implementation is generated as well, letting the enum be a plain field of
/// a derived `BinarySerializable` struct. The enum must also implement `Clone`.
///
/// # Examples
///
/// ```ignore
/// #[derive(EnumConstant, Clone, Copy, PartialEq, Debug)]
/// enum GameMode {
///     Survival,
///     Creative,
///     Adventure,
/// }
/// ```
#[proc_macro_derive(EnumConstant)]
pub fn derive_enum_constant(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_enum_constant(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_enum_constant(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "EnumConstant can only be derived for enums",
            ))
        }
    };

    let mut constants = Vec::new();
    let mut name_arms = Vec::new();
    for v in variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                v,
                format!(
                    "Variant '{}::{}' has fields; EnumConstant requires a fieldless enum",
                    name, v.ident
                ),
            ));
        }
        let variant_ident = &v.ident;
        let variant_str = variant_ident.to_string();
        constants.push(quote! { #name::#variant_ident });
        name_arms.push(quote! { #name::#variant_ident => #variant_str, });
    }

    // an enum without variants has no values, so `name` is never called
    let name_body = if name_arms.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(#name_arms)*
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::nucleus_codec::EnumConstant for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #name_str;
            const CONSTANTS: &'static [Self] = &[#(#constants),*];

            fn name(&self) -> &'static str {
                #name_body
            }
        }

        impl #impl_generics ::nucleus_codec::WireValue for #name #ty_generics #where_clause {
            fn write_value<__W: ::std::io::Write>(
                &self,
                encoder: &mut ::nucleus_codec::Encoder<__W>,
            ) -> ::nucleus_codec::Result<()> {
                encoder.write_enum(self)
            }

            fn read_value<__R: ::std::io::Read>(
                decoder: &mut ::nucleus_codec::Decoder<__R>,
            ) -> ::nucleus_codec::Result<Self> {
                decoder.read_enum()
            }
        }
    })
}
