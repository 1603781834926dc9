use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashMap;
use tabula::schema::{EntitySchema, Registry};
use tabula::TabulaError;

use crate::type_utils::{entity_struct_ident, field_rust_type, safe_field_ident};

/// Generate one record struct per registered entity, in declaration order.
pub fn generate_structs(registry: &Registry) -> tabula::Result<TokenStream> {
    let mut tokens = TokenStream::new();
    for schema in registry.iter() {
        tokens.extend(generate_entity_struct(schema)?);
    }
    Ok(tokens)
}

/// Fail if two schema fields map to the same struct field (`firstName` and
/// `first_name`), or a field maps to the implicit `id`.
fn check_field_idents(schema: &EntitySchema) -> tabula::Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    seen.insert("id".to_string(), "id");
    for field in schema.fields() {
        let ident = safe_field_ident(field.name()).to_string();
        if let Some(previous) = seen.insert(ident.clone(), field.name()) {
            return Err(TabulaError::Schema(format!(
                "Fields '{}.{}' and '{}.{}' both map to struct field `{}`",
                schema.name(),
                previous,
                schema.name(),
                field.name(),
                ident
            )));
        }
    }
    Ok(())
}

fn generate_entity_struct(schema: &EntitySchema) -> tabula::Result<TokenStream> {
    check_field_idents(schema)?;

    let struct_ident = entity_struct_ident(schema.name());
    let doc_comment = format!(
        " A record of the `{}` entity, stored in table `{}`.",
        schema.name(),
        schema.table()
    );

    let field_tokens: Vec<_> = schema
        .fields()
        .iter()
        .map(|field| {
            let ident = safe_field_ident(field.name());
            let ty = field_rust_type(field);
            let name = field.name();
            let rename = (ident.to_string() != name).then(|| quote! { #[serde(rename = #name)] });
            quote! {
                #rename
                pub #ident: #ty,
            }
        })
        .collect();

    Ok(quote! {
        #[doc = #doc_comment]
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct #struct_ident {
            pub id: Option<i64>,
            #(#field_tokens)*
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula::schema::parse_schema_str;

    #[test]
    fn test_generate_entity_struct() {
        let registry = parse_schema_str(
            "entities:\n  Author:\n    name: text\n  Book:\n    title: text\n    author: { ref: Author }\n",
        )
        .unwrap();

        let code = generate_entity_struct(&registry.entity("Book").unwrap()).unwrap().to_string();
        assert!(code.contains("pub struct Book"));
        assert!(code.contains("pub id : Option < i64 >"));
        assert!(code.contains("pub title : Option < String >"));
        assert!(code.contains("pub author : Option < Author >"));
        assert!(code.contains("stored in table `book`"));
    }

    #[test]
    fn test_keyword_field_is_renamed_for_serde() {
        let registry = parse_schema_str("entities:\n  Event:\n    type: text\n").unwrap();

        let code = generate_entity_struct(&registry.entity("Event").unwrap()).unwrap().to_string();
        assert!(code.contains("pub r#type : Option < String >"));
        assert!(code.contains("rename = \"type\""));
    }

    #[test]
    fn test_colliding_field_idents_are_rejected() {
        let registry =
            parse_schema_str("entities:\n  Person:\n    firstName: text\n    first_name: text\n").unwrap();

        let err = generate_entity_struct(&registry.entity("Person").unwrap()).unwrap_err();
        assert!(matches!(err, TabulaError::Schema(_)));
        assert!(err.to_string().contains("first_name"), "{err}");
    }
}
