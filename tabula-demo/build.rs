fn main() {
    println!("cargo:rerun-if-changed=schema.yaml");
    tabula_codegen::generate_from_schema(
        "schema.yaml",
        &format!("{}/records.rs", std::env::var("OUT_DIR").unwrap()),
    )
    .expect("Record generation failed");
}
