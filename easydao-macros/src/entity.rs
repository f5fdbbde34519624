use darling::ast::Data;
use darling::{FromDeriveInput, FromField, FromMeta};
use heck::ToShoutySnakeCase;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{DeriveInput, Meta, parse_macro_input};

#[derive(FromField)]
#[darling(forward_attrs(id, column, created_at, updated_at))]
pub(crate) struct EntityField {
    ident: Option<syn::Ident>,
    ty: syn::Type,
    attrs: Vec<syn::Attribute>,
}

#[derive(FromDeriveInput)]
#[darling(attributes(table), supports(struct_named))]
pub(crate) struct EntityInput {
    ident: syn::Ident,
    generics: syn::Generics,

    #[darling(default, rename = "crate")]
    crate_path: Option<syn::Path>,

    #[darling(default)]
    name: Option<String>,

    #[darling(default)]
    comment: Option<String>,

    data: Data<darling::util::Ignored, EntityField>,
}

/// Overrides accepted inside `#[id(..)]`, `#[column(..)]`,
/// `#[created_at(..)]` and `#[updated_at(..)]`.
#[derive(Default, FromMeta)]
#[darling(default)]
struct ColumnArgs {
    name: Option<String>,
    sql_type: Option<String>,
    nullable: Option<bool>,
    default: Option<String>,
    auto_increment: Option<bool>,
    unique: Option<bool>,
    index: Option<String>,
    comment: Option<String>,
}

impl ColumnArgs {
    fn from_attr(attr: &syn::Attribute) -> darling::Result<Self> {
        match &attr.meta {
            Meta::Path(_) => Ok(Self::default()),
            meta => Self::from_meta(meta),
        }
    }

    /// Later attributes override earlier ones key by key.
    fn merge(&mut self, other: Self) {
        self.name = other.name.or(self.name.take());
        self.sql_type = other.sql_type.or(self.sql_type.take());
        self.nullable = other.nullable.or(self.nullable);
        self.default = other.default.or(self.default.take());
        self.auto_increment = other.auto_increment.or(self.auto_increment);
        self.unique = other.unique.or(self.unique);
        self.index = other.index.or(self.index.take());
        self.comment = other.comment.or(self.comment.take());
    }

    fn builder_calls(&self, crate_path: &syn::Path) -> TokenStream2 {
        let mut calls = TokenStream2::new();
        if let Some(name) = &self.name {
            calls.extend(quote! { .name(#name) });
        }
        if let Some(sql_type) = &self.sql_type {
            calls.extend(quote! { .sql_type(#sql_type) });
        }
        if let Some(nullable) = self.nullable {
            calls.extend(quote! { .nullable(#nullable) });
        }
        if let Some(default) = &self.default {
            calls.extend(quote! { .default_value(#default) });
        }
        if let Some(auto_increment) = self.auto_increment {
            calls.extend(quote! { .auto_increment(#auto_increment) });
        }
        if let Some(unique) = self.unique {
            calls.extend(quote! { .unique(#unique) });
        }
        if let Some(index) = &self.index {
            calls.extend(quote! { .index(#crate_path::IndexKind::parse(#index)) });
        }
        if let Some(comment) = &self.comment {
            calls.extend(quote! { .comment(#comment) });
        }
        calls
    }
}

struct MappedField {
    ident: syn::Ident,
    ty: syn::Type,
    primary_key: bool,
    column: bool,
    created_at: bool,
    updated_at: bool,
    args: ColumnArgs,
}

fn mapped_field(field: &EntityField) -> darling::Result<Option<MappedField>> {
    if field.attrs.is_empty() {
        return Ok(None);
    }
    let Some(ident) = field.ident.clone() else {
        return Err(darling::Error::custom("Entity fields must be named"));
    };

    let mut mapped = MappedField {
        ident,
        ty: field.ty.clone(),
        primary_key: false,
        column: false,
        created_at: false,
        updated_at: false,
        args: ColumnArgs::default(),
    };
    let mut errors = darling::Error::accumulator();
    for attr in &field.attrs {
        let path = attr.path();
        if path.is_ident("id") {
            mapped.primary_key = true;
        } else if path.is_ident("column") {
            mapped.column = true;
        } else if path.is_ident("created_at") {
            mapped.created_at = true;
        } else if path.is_ident("updated_at") {
            mapped.updated_at = true;
        }
        if let Some(args) = errors.handle(ColumnArgs::from_attr(attr).map_err(|e| e.with_span(attr))) {
            mapped.args.merge(args);
        }
    }
    errors.finish_with(Some(mapped))
}

pub(crate) fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(&input).into()
}

pub(crate) fn derive_entity_impl(input: &DeriveInput) -> TokenStream2 {
    let entity = match EntityInput::from_derive_input(input) {
        Ok(e) => e,
        Err(e) => return e.write_errors(),
    };

    let ident = &entity.ident;
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();
    let crate_path: syn::Path = entity
        .crate_path
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::easydao::db));

    let fields = match &entity.data {
        Data::Struct(s) => &s.fields,
        Data::Enum(_) => {
            return syn::Error::new_spanned(ident, "Entity only supports structs with named fields")
                .into_compile_error();
        }
    };

    let mut errors = darling::Error::accumulator();
    let mapped: Vec<MappedField> = fields
        .iter()
        .filter_map(|f| errors.handle(mapped_field(f)).flatten())
        .collect();
    if let Err(e) = errors.finish() {
        return e.write_errors();
    }

    let keys: Vec<_> = mapped.iter().filter(|f| f.primary_key).collect();
    if keys.len() > 1 {
        return syn::Error::new_spanned(
            &keys[1].ident,
            "Entity may declare at most one #[id] field",
        )
        .into_compile_error();
    }

    let type_name = ident.to_string();
    let mut table_calls = TokenStream2::new();
    if let Some(name) = &entity.name {
        table_calls.extend(quote! { .table(#name) });
    }
    if let Some(comment) = &entity.comment {
        table_calls.extend(quote! { .comment(#comment) });
    }

    let mut field_infos = Vec::new();
    let mut read_arms = Vec::new();
    let mut write_arms = Vec::new();
    let mut tokens = Vec::new();

    for field in &mapped {
        let field_ident = &field.ident;
        let ty = &field.ty;
        let name = field_ident.unraw().to_string();

        let mut markers = TokenStream2::new();
        if field.primary_key {
            markers.extend(quote! { .primary_key() });
        }
        if field.column {
            markers.extend(quote! { .column() });
        }
        if field.created_at {
            markers.extend(quote! { .created_at() });
        }
        if field.updated_at {
            markers.extend(quote! { .updated_at() });
        }
        let overrides = field.args.builder_calls(&crate_path);

        field_infos.push(quote! {
            .field(
                #crate_path::FieldInfo::new(#name, <#ty as #crate_path::SqlField>::KIND)
                    #markers
                    #overrides
            )
        });
        read_arms.push(quote! {
            #name => ::core::option::Option::Some(#crate_path::SqlField::to_value(&self.#field_ident)),
        });
        write_arms.push(quote! {
            #name => {
                self.#field_ident = <#ty as #crate_path::SqlField>::from_value(value)
                    .map_err(|e| #crate_path::DbError::mapping(#name, e))?;
                ::core::result::Result::Ok(())
            }
        });

        let token = format_ident!("{}", name.to_shouty_snake_case());
        tokens.push(quote! {
            pub const #token: #crate_path::Column<Self> = #crate_path::Column::new(#name);
        });
    }

    quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#tokens)*
        }

        impl #impl_generics #crate_path::Entity for #ident #ty_generics #where_clause {
            fn entity_info() -> #crate_path::EntityInfo {
                #crate_path::EntityInfo::new(#type_name)
                    #table_calls
                    #(#field_infos)*
            }

            fn read_field(&self, field: &str) -> ::core::option::Option<#crate_path::Value> {
                match field {
                    #(#read_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn write_field(
                &mut self,
                field: &str,
                value: #crate_path::Value,
            ) -> ::core::result::Result<(), #crate_path::DbError> {
                match field {
                    #(#write_arms)*
                    other => ::core::result::Result::Err(#crate_path::DbError::Mapping {
                        field: ::std::string::ToString::to_string(other),
                        reason: ::std::string::ToString::to_string("no such mapped field"),
                    }),
                }
            }
        }
    }
}
