use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataEnum, DeriveInput, Fields};

/// Parse field-level `#[wire(...)]` attributes.
struct WireFieldAttrs {
    skip: bool,
    default_expr: Option<syn::Expr>,
}

impl WireFieldAttrs {
    fn from_field(field: &syn::Field) -> syn::Result<Self> {
        let mut skip = false;
        let mut default_expr = None;

        for attr in &field.attrs {
            if !attr.path().is_ident("wire") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }
                if meta.path.is_ident("default") {
                    let value = meta.value()?;
                    let lit_str: syn::LitStr = value.parse()?;
                    default_expr = Some(lit_str.parse::<syn::Expr>()?);
                    return Ok(());
                }
                Err(meta.error("unrecognized wire attribute"))
            })?;
        }

        Ok(WireFieldAttrs { skip, default_expr })
    }
}

/// Variant-level `#[wire(tag = N)]`. Defaults to the variant's position.
fn variant_tag(variant: &syn::Variant, position: usize) -> syn::Result<u16> {
    let mut tag = None;
    for attr in &variant.attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let lit: syn::LitInt = meta.value()?.parse()?;
                tag = Some(lit.base10_parse::<u16>()?);
                return Ok(());
            }
            Err(meta.error("unrecognized wire attribute"))
        })?;
    }
    match tag {
        Some(t) => Ok(t),
        None => u16::try_from(position)
            .map_err(|_| syn::Error::new_spanned(&variant.ident, "too many variants")),
    }
}

/// Determine the `#[repr(...)]` type on an enum. Returns the ident (e.g. `u16`).
fn repr_type(attrs: &[syn::Attribute]) -> Option<syn::Ident> {
    for attr in attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }
        let mut found = None;
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                let s = ident.to_string();
                if matches!(
                    s.as_str(),
                    "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64"
                ) {
                    found = Some(ident.clone());
                }
            }
            Ok(())
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

fn is_fieldless(data: &DataEnum) -> bool {
    data.variants.iter().all(|v| matches!(v.fields, Fields::Unit))
}

// ---------------------------------------------------------------------------
// WireSerialize
// ---------------------------------------------------------------------------

#[proc_macro_derive(WireSerialize, attributes(wire))]
pub fn derive_wire_serialize(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_serialize(&input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_serialize(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data_struct) => {
            let stmts = serialize_struct_fields(&data_struct.fields)?;
            quote! {
                #stmts
                Ok(())
            }
        }
        Data::Enum(data_enum) => match repr_type(&input.attrs) {
            Some(repr) if is_fieldless(data_enum) => quote! {
                let v = *self as #repr;
                vfuse_serde::WireSerialize::wire_serialize(&v, buf)
            },
            _ => serialize_tagged_enum(data_enum)?,
        },
        Data::Union(u) => {
            return Err(syn::Error::new_spanned(
                u.union_token,
                "WireSerialize cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics vfuse_serde::WireSerialize for #name #ty_generics #where_clause {
            fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), vfuse_serde::WireError> {
                #body
            }
        }
    })
}

fn serialize_struct_fields(fields: &Fields) -> syn::Result<proc_macro2::TokenStream> {
    let mut stmts = Vec::new();
    match fields {
        Fields::Named(named) => {
            for f in &named.named {
                if WireFieldAttrs::from_field(f)?.skip {
                    continue;
                }
                let ident = &f.ident;
                stmts.push(quote! {
                    vfuse_serde::WireSerialize::wire_serialize(&self.#ident, buf)?;
                });
            }
        }
        Fields::Unnamed(unnamed) => {
            for (i, f) in unnamed.unnamed.iter().enumerate() {
                if WireFieldAttrs::from_field(f)?.skip {
                    continue;
                }
                let index = syn::Index::from(i);
                stmts.push(quote! {
                    vfuse_serde::WireSerialize::wire_serialize(&self.#index, buf)?;
                });
            }
        }
        Fields::Unit => {}
    }
    Ok(quote! { #(#stmts)* })
}

/// Data-carrying enums are encoded as a `u16` tag followed by the variant's
/// fields in declaration order.
fn serialize_tagged_enum(data: &DataEnum) -> syn::Result<proc_macro2::TokenStream> {
    let mut arms = Vec::new();
    for (pos, variant) in data.variants.iter().enumerate() {
        let tag = variant_tag(variant, pos)?;
        let vname = &variant.ident;
        let arm = match &variant.fields {
            Fields::Named(named) => {
                let mut idents = Vec::new();
                for f in &named.named {
                    if !WireFieldAttrs::from_field(f)?.skip {
                        idents.push(&f.ident);
                    }
                }
                quote! {
                    Self::#vname { #(#idents,)* .. } => {
                        vfuse_serde::WireSerialize::wire_serialize(&#tag, buf)?;
                        #( vfuse_serde::WireSerialize::wire_serialize(#idents, buf)?; )*
                    }
                }
            }
            Fields::Unnamed(unnamed) => {
                let mut patterns = Vec::new();
                let mut vars = Vec::new();
                for (i, f) in unnamed.unnamed.iter().enumerate() {
                    if WireFieldAttrs::from_field(f)?.skip {
                        patterns.push(quote! { _ });
                    } else {
                        let var = format_ident!("__wire_v{}", i);
                        patterns.push(quote! { #var });
                        vars.push(var);
                    }
                }
                quote! {
                    Self::#vname( #(#patterns),* ) => {
                        vfuse_serde::WireSerialize::wire_serialize(&#tag, buf)?;
                        #( vfuse_serde::WireSerialize::wire_serialize(#vars, buf)?; )*
                    }
                }
            }
            Fields::Unit => quote! {
                Self::#vname => {
                    vfuse_serde::WireSerialize::wire_serialize(&#tag, buf)?;
                }
            },
        };
        arms.push(arm);
    }
    Ok(quote! {
        match self {
            #(#arms)*
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// WireDeserialize
// ---------------------------------------------------------------------------

#[proc_macro_derive(WireDeserialize, attributes(wire))]
pub fn derive_wire_deserialize(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_deserialize(&input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_deserialize(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data_struct) => {
            let (bindings, construct) = deserialize_fields(&data_struct.fields, quote! { Self })?;
            quote! {
                #bindings
                Ok(#construct)
            }
        }
        Data::Enum(data_enum) => match repr_type(&input.attrs) {
            Some(repr) if is_fieldless(data_enum) => quote! {
                let v = <#repr as vfuse_serde::WireDeserialize>::wire_deserialize(buf, offset)?;
                <#name #ty_generics as TryFrom<#repr>>::try_from(v)
                    .map_err(|_| vfuse_serde::WireError::InvalidEnumVariant {
                        enum_name: stringify!(#name),
                        value: v as u64,
                    })
            },
            _ => {
                let mut arms = Vec::new();
                for (pos, variant) in data_enum.variants.iter().enumerate() {
                    let tag = variant_tag(variant, pos)?;
                    let vname = &variant.ident;
                    let (bindings, construct) =
                        deserialize_fields(&variant.fields, quote! { Self::#vname })?;
                    arms.push(quote! {
                        #tag => {
                            #bindings
                            Ok(#construct)
                        }
                    });
                }
                quote! {
                    let tag = <u16 as vfuse_serde::WireDeserialize>::wire_deserialize(buf, offset)?;
                    match tag {
                        #(#arms)*
                        other => Err(vfuse_serde::WireError::InvalidEnumVariant {
                            enum_name: stringify!(#name),
                            value: other as u64,
                        }),
                    }
                }
            }
        },
        Data::Union(u) => {
            return Err(syn::Error::new_spanned(
                u.union_token,
                "WireDeserialize cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics vfuse_serde::WireDeserialize for #name #ty_generics #where_clause {
            fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, vfuse_serde::WireError> {
                #body
            }
        }
    })
}

/// Returns (binding_statements, constructor_expression).
fn deserialize_fields(
    fields: &Fields,
    path: proc_macro2::TokenStream,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let mut bindings = Vec::new();
    let mut vars = Vec::new();

    let members: Vec<&syn::Field> = match fields {
        Fields::Named(named) => named.named.iter().collect(),
        Fields::Unnamed(unnamed) => unnamed.unnamed.iter().collect(),
        Fields::Unit => Vec::new(),
    };

    for (i, f) in members.iter().enumerate() {
        // Prefixed so the bindings never shadow `buf`/`offset`.
        let var = format_ident!("__wire_field_{}", i);
        let attrs = WireFieldAttrs::from_field(f)?;
        if attrs.skip {
            let default_val = match attrs.default_expr {
                Some(expr) => quote! { #expr },
                None => quote! { Default::default() },
            };
            bindings.push(quote! { let #var = #default_val; });
        } else {
            bindings.push(quote! {
                let #var = vfuse_serde::WireDeserialize::wire_deserialize(buf, offset)?;
            });
        }
        vars.push(var);
    }

    let construct = match fields {
        Fields::Named(named) => {
            let idents = named.named.iter().map(|f| &f.ident);
            quote! { #path { #(#idents: #vars),* } }
        }
        Fields::Unnamed(_) => quote! { #path( #(#vars),* ) },
        Fields::Unit => quote! { #path },
    };

    Ok((quote! { #(#bindings)* }, construct))
}
