use proc_macro2::TokenStream;
use quote::quote;
use tabula::schema::Registry;

use crate::record_gen::{generate_record_impls, generate_registry_fn};
use crate::struct_gen::generate_structs;

const HEADER: &str = "// @generated by tabula-codegen. Do not edit by hand.\n\n";

/// Assemble the complete generated module.
pub fn generate_all(registry: &Registry, schema_yaml: &str) -> tabula::Result<TokenStream> {
    let registry_fn = generate_registry_fn(schema_yaml);
    let structs = generate_structs(registry)?;
    let records = generate_record_impls(registry);

    Ok(quote! {
        #registry_fn
        #structs
        #records
    })
}

/// Pretty-print generated tokens as a Rust source file.
///
/// Falls back to the raw token string if the tokens do not form a valid file,
/// so the compiler reports the problem against the generated output.
pub fn format_token_stream(tokens: &TokenStream) -> String {
    let body = match syn::parse2::<syn::File>(tokens.clone()) {
        Ok(file) => prettyplease::unparse(&file),
        Err(_) => tokens.to_string(),
    };
    format!("{HEADER}{body}")
}
