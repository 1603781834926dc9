mod parser;
mod registry;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use registry::Registry;
pub use types::{
    Column, ColumnKind, EntitySchema, EntitySchemaBuilder, FieldDef, FieldKind, ForeignKey,
    ID_COLUMN,
};
