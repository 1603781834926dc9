use crate::error::{Result, TabulaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Name of the implicit primary key column every entity carries.
pub const ID_COLUMN: &str = "id";

/// Scalar kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
}

impl ColumnKind {
    /// Storage type used in the table definition.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Boolean => "INTEGER",
            ColumnKind::Blob => "BLOB",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "real",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Blob => "blob",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnKind {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "str" | "string" => Ok(ColumnKind::Text),
            "integer" | "int" => Ok(ColumnKind::Integer),
            "real" | "float" => Ok(ColumnKind::Real),
            "boolean" | "bool" => Ok(ColumnKind::Boolean),
            "blob" | "bytes" => Ok(ColumnKind::Blob),
            other => Err(TabulaError::Schema(format!("Unsupported column kind '{other}'"))),
        }
    }
}

/// Scalar field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column(pub ColumnKind);

/// Relationship descriptor pointing at another registered entity.
#[derive(Debug, Clone)]
pub struct ForeignKey(pub Arc<EntitySchema>);

/// What a declared field holds
#[derive(Debug, Clone)]
pub enum FieldKind {
    Column(ColumnKind),
    ForeignKey(Arc<EntitySchema>),
}

impl From<Column> for FieldKind {
    fn from(column: Column) -> Self {
        FieldKind::Column(column.0)
    }
}

impl From<ForeignKey> for FieldKind {
    fn from(key: ForeignKey) -> Self {
        FieldKind::ForeignKey(key.0)
    }
}

impl From<ColumnKind> for FieldKind {
    fn from(kind: ColumnKind) -> Self {
        FieldKind::Column(kind)
    }
}

/// One declared field of an entity, in declaration order
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Storage column backing this field: the field name for scalars,
    /// `<field>_id` for relationships.
    pub fn column_name(&self) -> String {
        match self.kind {
            FieldKind::Column(_) => self.name.clone(),
            FieldKind::ForeignKey(_) => format!("{}_id", self.name),
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey(_))
    }

    pub fn column_kind(&self) -> Option<ColumnKind> {
        match self.kind {
            FieldKind::Column(kind) => Some(kind),
            FieldKind::ForeignKey(_) => None,
        }
    }

    pub fn target(&self) -> Option<&Arc<EntitySchema>> {
        match &self.kind {
            FieldKind::ForeignKey(target) => Some(target),
            FieldKind::Column(_) => None,
        }
    }

    /// Human-readable kind, used in error messages.
    pub fn describe_kind(&self) -> String {
        match &self.kind {
            FieldKind::Column(kind) => kind.to_string(),
            FieldKind::ForeignKey(target) => format!("reference to {}", target.name()),
        }
    }
}

/// Schema of one entity type: name, table and ordered fields.
/// The implicit `id` column is not listed in `fields`.
#[derive(Debug)]
pub struct EntitySchema {
    name: String,
    table: String,
    fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table identity: the lowercase entity name.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a declared field or fail with a schema error naming the entity.
    pub fn require_field(&self, name: &str) -> Result<(usize, &FieldDef)> {
        self.field_index(name)
            .map(|i| (i, &self.fields[i]))
            .ok_or_else(|| {
                TabulaError::Schema(format!("Entity '{}' has no field '{}'", self.name, name))
            })
    }

    /// Target schema of a relationship field.
    pub fn target(&self, field: &str) -> Result<&Arc<EntitySchema>> {
        let (_, def) = self.require_field(field)?;
        def.target().ok_or_else(|| {
            TabulaError::Schema(format!(
                "Field '{}.{}' is not a relationship",
                self.name, field
            ))
        })
    }

    /// Storage columns for the declared fields, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(FieldDef::column_name).collect()
    }
}

/// Collects fields in declaration order and validates them on `build`.
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntitySchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }

    pub fn column(self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.field(name, Column(kind))
    }

    pub fn foreign_key(self, name: impl Into<String>, target: &Arc<EntitySchema>) -> Self {
        self.field(name, ForeignKey(Arc::clone(target)))
    }

    pub fn build(self) -> Result<EntitySchema> {
        check_identifier("Entity", &self.name)?;

        let mut columns: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            check_identifier("Field", &field.name)?;
            if field.name.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(TabulaError::Schema(format!(
                    "Entity '{}' declares field 'id', which is implicit",
                    self.name
                )));
            }
            if self.fields.iter().filter(|f| f.name == field.name).count() > 1 {
                return Err(TabulaError::Schema(format!(
                    "Entity '{}' declares field '{}' more than once",
                    self.name, field.name
                )));
            }

            let column = field.column_name().to_ascii_lowercase();
            if column == ID_COLUMN || columns.contains(&column) {
                return Err(TabulaError::Schema(format!(
                    "Field '{}.{}' maps to column '{}', which is already taken",
                    self.name,
                    field.name,
                    field.column_name()
                )));
            }
            columns.push(column);
        }

        Ok(EntitySchema {
            table: self.name.to_lowercase(),
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Names end up unquoted in error messages and quoted in SQL; restrict them
/// to plain identifiers so neither needs escaping.
fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TabulaError::Schema(format!("{what} name '{name}' is not a valid identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::builder("Author")
                .column("name", ColumnKind::Text)
                .column("age", ColumnKind::Integer)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ColumnKind::Text.sql_type(), "TEXT");
        assert_eq!(ColumnKind::Integer.sql_type(), "INTEGER");
        assert_eq!(ColumnKind::Real.sql_type(), "REAL");
        assert_eq!(ColumnKind::Boolean.sql_type(), "INTEGER");
        assert_eq!(ColumnKind::Blob.sql_type(), "BLOB");
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("str".parse::<ColumnKind>().unwrap(), ColumnKind::Text);
        assert_eq!("INT".parse::<ColumnKind>().unwrap(), ColumnKind::Integer);
        assert_eq!("float".parse::<ColumnKind>().unwrap(), ColumnKind::Real);
        assert_eq!("bool".parse::<ColumnKind>().unwrap(), ColumnKind::Boolean);
        assert_eq!("bytes".parse::<ColumnKind>().unwrap(), ColumnKind::Blob);
    }

    #[test]
    fn test_unknown_kind_is_schema_error() {
        let err = "varchar".parse::<ColumnKind>().unwrap_err();
        assert!(matches!(err, TabulaError::Schema(_)));
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let author = author();
        let book = EntitySchema::builder("Book")
            .column("title", ColumnKind::Text)
            .column("published", ColumnKind::Boolean)
            .foreign_key("author", &author)
            .build()
            .unwrap();

        assert_eq!(book.table(), "book");
        assert_eq!(book.column_names(), vec!["title", "published", "author_id"]);
        assert!(book.field("author").unwrap().is_relationship());
        assert_eq!(book.target("author").unwrap().name(), "Author");
        assert_eq!(book.field_index("published"), Some(1));
    }

    #[test]
    fn test_table_name_is_lowercase() {
        let schema = EntitySchema::builder("BlogPost").build().unwrap();
        assert_eq!(schema.table(), "blogpost");
    }

    #[test]
    fn test_explicit_id_rejected() {
        let err = EntitySchema::builder("Thing")
            .column("id", ColumnKind::Integer)
            .build()
            .unwrap_err();
        assert!(matches!(err, TabulaError::Schema(_)));
    }

    #[test]
    fn test_column_collision_rejected() {
        let author = author();
        let err = EntitySchema::builder("Book")
            .foreign_key("author", &author)
            .column("author_id", ColumnKind::Integer)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("author_id"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = EntitySchema::builder("Book")
            .column("title", ColumnKind::Text)
            .column("title", ColumnKind::Text)
            .build()
            .unwrap_err();
        assert!(matches!(err, TabulaError::Schema(_)));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        assert!(EntitySchema::builder("my table").build().is_err());
        assert!(EntitySchema::builder("Book")
            .column("ti\"tle", ColumnKind::Text)
            .build()
            .is_err());
        assert!(EntitySchema::builder("9lives").build().is_err());
    }
}
