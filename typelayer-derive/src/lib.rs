//! `#[derive(Record)]` for typelayer record structs.
//!
//! The derive emits the declarative metadata the core consumes: a
//! `FieldValue` implementation, a `Record` implementation with a static
//! vtable, and one `RawField` per named field. All mapping semantics (tag
//! parsing, snake_case naming, embedding flattening) live in the core; the
//! derive only reflects the struct shape and forwards each field's raw
//! `#[record("...")]` tag string.
//!
//! ```ignore
//! #[derive(Record, Clone, Debug)]
//! struct User {
//!     #[record(",embed")]
//!     base: Base,
//!     name: String,
//!     #[record("age,index")]
//!     age: i64,
//!     #[record("-")]
//!     session: String,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derives `typelayer::reflect::Record` (and its `FieldValue` prerequisite)
/// for a struct with named fields.
///
/// Field attribute: `#[record("TAG")]`, where `TAG` is the comma-separated
/// mapping tag. The first token overrides the storage name, `-` skips the
/// field, and `index`/`embed` are flags. Fields without the attribute get
/// an empty tag.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record requires named fields",
        ));
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let name = &input.ident;
    let name_str = name.to_string();

    let mut zero_fields = Vec::new();
    let mut raw_fields = Vec::new();
    for field in &fields.named {
        let ident = field.ident.as_ref().expect("named field");
        let ident_str = ident.to_string();
        let ty = &field.ty;
        let tag = field_tag(field)?;

        zero_fields.push(quote! {
            #ident: <#ty as ::typelayer::reflect::FieldValue>::zero(),
        });
        raw_fields.push(quote! {
            ::typelayer::reflect::RawField {
                name: #ident_str,
                tag: #tag,
                kind: <#ty as ::typelayer::reflect::FieldValue>::field_kind(),
                get: |record| {
                    let record = record.downcast_ref::<#name>().expect("record type");
                    ::typelayer::reflect::FieldValue::to_value(&record.#ident)
                },
                set: |record, value| {
                    let record = record.downcast_mut::<#name>().expect("record type");
                    record.#ident = ::typelayer::reflect::FieldValue::from_value(value)?;
                    ::std::result::Result::Ok(())
                },
                borrow: |record| {
                    let record = record.downcast_ref::<#name>().expect("record type");
                    ::typelayer::reflect::FieldValue::as_record(&record.#ident)
                },
                borrow_mut: |record| {
                    let record = record.downcast_mut::<#name>().expect("record type");
                    ::typelayer::reflect::FieldValue::as_record_mut(&mut record.#ident)
                },
            },
        });
    }

    Ok(quote! {
        #[automatically_derived]
        impl ::typelayer::reflect::FieldValue for #name {
            fn field_kind() -> ::typelayer::reflect::FieldKind {
                ::typelayer::reflect::FieldKind::Struct(
                    <#name as ::typelayer::reflect::Record>::vtable(),
                )
            }

            fn zero() -> Self {
                Self { #(#zero_fields)* }
            }

            fn to_value(&self) -> ::typelayer::reflect::Value {
                ::typelayer::reflect::Value::Record(
                    ::std::boxed::Box::new(::std::clone::Clone::clone(self)),
                )
            }

            fn from_value(
                value: ::typelayer::reflect::Value,
            ) -> ::std::result::Result<Self, ::typelayer::error::CodecError> {
                ::typelayer::reflect::record_from_value(value)
            }

            fn as_record(&self) -> ::std::option::Option<&dyn ::std::any::Any> {
                ::std::option::Option::Some(self)
            }

            fn as_record_mut(
                &mut self,
            ) -> ::std::option::Option<&mut dyn ::std::any::Any> {
                ::std::option::Option::Some(self)
            }
        }

        #[automatically_derived]
        impl ::typelayer::reflect::Record for #name {
            fn record_name() -> &'static str {
                #name_str
            }

            fn raw_fields() -> &'static [::typelayer::reflect::RawField] {
                static FIELDS: ::std::sync::LazyLock<
                    ::std::vec::Vec<::typelayer::reflect::RawField>,
                > = ::std::sync::LazyLock::new(|| {
                    ::std::vec![#(#raw_fields)*]
                });
                &FIELDS
            }

            fn vtable() -> &'static ::typelayer::reflect::RecordVtable {
                static VTABLE: ::typelayer::reflect::RecordVtable =
                    ::typelayer::reflect::RecordVtable {
                        name: #name_str,
                        fields: <#name as ::typelayer::reflect::Record>::raw_fields,
                        new_boxed: || ::std::boxed::Box::new(
                            <#name as ::typelayer::reflect::FieldValue>::zero(),
                        ),
                        type_id: ::std::any::TypeId::of::<#name>,
                    };
                &VTABLE
            }
        }
    })
}

/// Extracts the raw tag string from a field's `#[record("...")]` attribute,
/// defaulting to the empty tag.
fn field_tag(field: &syn::Field) -> syn::Result<String> {
    let mut tag = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        if tag.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "duplicate #[record] attribute",
            ));
        }
        tag = Some(attr.parse_args::<LitStr>()?.value());
    }
    Ok(tag.unwrap_or_default())
}
