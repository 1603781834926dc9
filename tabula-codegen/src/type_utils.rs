use heck::{ToPascalCase, ToSnakeCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use tabula::schema::{ColumnKind, FieldDef, FieldKind};

/// PascalCase struct name for an entity.
/// e.g. "Author" -> "Author", "blog_post" -> "BlogPost"
pub fn entity_struct_name(entity_name: &str) -> String {
    entity_name.to_pascal_case()
}

pub fn entity_struct_ident(entity_name: &str) -> proc_macro2::Ident {
    format_ident!("{}", entity_struct_name(entity_name))
}

/// Rust type of a stored column, without the `Option` wrapper.
pub fn column_rust_type(kind: ColumnKind) -> TokenStream {
    match kind {
        ColumnKind::Text => quote! { String },
        ColumnKind::Integer => quote! { i64 },
        ColumnKind::Real => quote! { f64 },
        ColumnKind::Boolean => quote! { bool },
        ColumnKind::Blob => quote! { Vec<u8> },
    }
}

/// Rust type of a struct field. Every field is optional since entities may
/// leave any field unset; relationships hold the target's record struct.
pub fn field_rust_type(field: &FieldDef) -> TokenStream {
    let base = match field.kind() {
        FieldKind::Column(kind) => column_rust_type(*kind),
        FieldKind::ForeignKey(target) => {
            let ident = entity_struct_ident(target.name());
            quote! { #ident }
        }
    };
    quote! { Option<#base> }
}

/// Expression reading one field out of `entity` into the struct's type.
pub fn read_field_expr(field: &FieldDef) -> TokenStream {
    let name = field.name();
    match field.kind() {
        FieldKind::Column(ColumnKind::Text) => {
            quote! { entity.text(#name)?.map(str::to_owned) }
        }
        FieldKind::Column(ColumnKind::Integer) => quote! { entity.integer(#name)? },
        FieldKind::Column(ColumnKind::Real) => quote! { entity.real(#name)? },
        FieldKind::Column(ColumnKind::Boolean) => quote! { entity.boolean(#name)? },
        FieldKind::Column(ColumnKind::Blob) => {
            quote! { entity.blob(#name)?.map(<[u8]>::to_vec) }
        }
        FieldKind::ForeignKey(target) => {
            let ident = entity_struct_ident(target.name());
            quote! {
                entity
                    .related(#name)?
                    .map(<#ident as tabula::Record>::from_entity)
                    .transpose()?
            }
        }
    }
}

/// Statement writing one struct field into the mutable `entity`.
pub fn write_field_stmt(field: &FieldDef) -> TokenStream {
    let name = field.name();
    let ident = safe_field_ident(name);
    match field.kind() {
        FieldKind::Column(ColumnKind::Text) | FieldKind::Column(ColumnKind::Blob) => {
            quote! { entity.set(#name, self.#ident.clone())?; }
        }
        FieldKind::Column(_) => quote! { entity.set(#name, self.#ident)?; },
        FieldKind::ForeignKey(_) => quote! {
            if let Some(related) = &self.#ident {
                let target = schema.target(#name)?;
                entity.set(#name, tabula::Record::to_entity(related, target)?)?;
            }
        },
    }
}

/// Struct field identifier for a schema field name. Rust keywords become
/// raw identifiers.
pub fn safe_field_ident(name: &str) -> proc_macro2::Ident {
    match name {
        "type" | "struct" | "enum" | "fn" | "let" | "mut" | "ref" | "mod" | "use" | "pub"
        | "impl" | "trait" | "for" | "loop" | "while" | "if" | "else" | "match" | "return"
        | "break" | "continue" | "as" | "in" | "where" | "async" | "await" | "dyn" | "move"
        | "static" | "const" | "unsafe" | "extern" | "true" | "false" | "abstract"
        | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
        | "unsized" | "virtual" | "yield" | "try" | "gen" => format_ident!("r#{}", name),
        // Not allowed as raw identifiers.
        "self" | "super" | "crate" => format_ident!("{}_", name),
        _ => format_ident!("{}", name.to_snake_case()),
    }
}
