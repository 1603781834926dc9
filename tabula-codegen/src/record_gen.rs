use proc_macro2::TokenStream;
use quote::quote;
use tabula::schema::{EntitySchema, Registry};

use crate::type_utils::{entity_struct_ident, read_field_expr, safe_field_ident, write_field_stmt};

/// Generate `tabula::Record` impls for every entity struct.
pub fn generate_record_impls(registry: &Registry) -> TokenStream {
    let mut tokens = TokenStream::new();
    for schema in registry.iter() {
        tokens.extend(generate_record_impl(schema));
    }
    tokens
}

fn generate_record_impl(schema: &EntitySchema) -> TokenStream {
    let struct_ident = entity_struct_ident(schema.name());
    let entity_name = schema.name();

    let reads: Vec<_> = schema
        .fields()
        .iter()
        .map(|field| {
            let ident = safe_field_ident(field.name());
            let expr = read_field_expr(field);
            quote! { #ident: #expr, }
        })
        .collect();
    let writes: Vec<_> = schema.fields().iter().map(write_field_stmt).collect();

    quote! {
        impl tabula::Record for #struct_ident {
            const ENTITY: &'static str = #entity_name;

            fn from_entity(entity: &tabula::Entity) -> tabula::Result<Self> {
                tabula::expect_entity::<Self>(entity)?;
                Ok(#struct_ident {
                    id: entity.id(),
                    #(#reads)*
                })
            }

            fn to_entity(
                &self,
                schema: &std::sync::Arc<tabula::EntitySchema>,
            ) -> tabula::Result<tabula::Entity> {
                #[allow(unused_mut)]
                let mut entity =
                    tabula::Entity::new(schema, [("id", tabula::FieldValue::from(self.id))])?;
                tabula::expect_entity::<Self>(&entity)?;
                #(#writes)*
                Ok(entity)
            }
        }
    }
}

/// Generate the embedded schema source and a `registry()` constructor for it.
pub fn generate_registry_fn(schema_yaml: &str) -> TokenStream {
    quote! {
        /// The schema definition these records were generated from.
        pub const SCHEMA_YAML: &str = #schema_yaml;

        /// Build the registry of every entity declared in [`SCHEMA_YAML`].
        pub fn registry() -> tabula::Result<tabula::Registry> {
            tabula::schema::parse_schema_str(SCHEMA_YAML)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula::schema::parse_schema_str;

    #[test]
    fn test_generate_record_impl() {
        let registry = parse_schema_str(
            "entities:\n  Author:\n    name: text\n    photo: blob\n  Book:\n    title: text\n    author: { ref: Author }\n",
        )
        .unwrap();

        let code = generate_record_impl(&registry.entity("Book").unwrap()).to_string();
        assert!(code.contains("impl tabula :: Record for Book"));
        assert!(code.contains("const ENTITY"));
        assert!(code.contains("\"Book\""));
        assert!(code.contains("entity . text (\"title\")"));
        assert!(code.contains("< Author as tabula :: Record > :: from_entity"));
        assert!(code.contains("schema . target (\"author\")"));

        let code = generate_record_impl(&registry.entity("Author").unwrap()).to_string();
        assert!(code.contains("entity . blob (\"photo\")"));
    }

    #[test]
    fn test_generate_registry_fn_embeds_source() {
        let yaml = "entities:\n  Tag:\n    label: text\n";
        let code = generate_registry_fn(yaml).to_string();
        assert!(code.contains("pub const SCHEMA_YAML"));
        assert!(code.contains("Tag:"));
        assert!(code.contains("pub fn registry ()"));
    }
}
