//! Compile-time generation of typed records for tabula schema files.
//!
//! The main entry point is [`generate_from_schema`], which reads a schema
//! definition file and writes a Rust source file containing one struct per
//! entity, a `tabula::Record` impl for each, and a `registry()` function that
//! rebuilds the registry from the embedded schema.

mod generator;
mod record_gen;
mod struct_gen;
pub mod type_utils;

use std::path::Path;

/// Generate typed records from a schema file.
///
/// Intended to be called from a `build.rs` build script.
///
/// # Example
///
/// ```no_run
/// // In build.rs:
/// tabula_codegen::generate_from_schema("schema.yaml", "src/generated.rs").unwrap();
/// ```
pub fn generate_from_schema(
    schema_path: &str,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(Path::new(schema_path))?;
    let formatted = generate_from_schema_str(&content)?;
    std::fs::write(output_path, formatted)?;
    Ok(())
}

/// Like [`generate_from_schema`] but takes the schema content directly and
/// returns the generated source.
pub fn generate_from_schema_str(
    schema_yaml: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let registry = tabula::schema::parse_schema_str(schema_yaml)?;
    let tokens = generator::generate_all(&registry, schema_yaml)?;
    Ok(generator::format_token_stream(&tokens))
}
