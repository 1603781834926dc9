//! Statement generation.
//!
//! Pure functions from schema metadata (and entity values) to SQL text plus
//! bound parameters. Nothing here touches a connection. Values are always
//! bound as `?N` parameters, never spliced into the text; identifiers are
//! restricted to plain names at registration and emitted double-quoted.

mod filter;

pub use filter::Filter;

use crate::entity::{check_value, Entity, FieldValue, Value};
use crate::error::{Result, TabulaError};
use crate::schema::{EntitySchema, FieldDef, FieldKind, ID_COLUMN};
use rusqlite::types::Value as SqlValue;

/// Lists user tables, skipping SQLite's internal `sqlite_*` bookkeeping tables.
pub const SELECT_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name";

/// SQL text with the parameters to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>) -> Self {
        Statement { sql, params }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn placeholders(count: usize) -> String {
    (1..=count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

/// `id` followed by every declared column, as the SELECT list.
fn select_list(schema: &EntitySchema) -> String {
    std::iter::once(quote(ID_COLUMN))
        .chain(schema.fields().iter().map(|f| quote(&f.column_name())))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Idempotent table definition.
pub fn create_table(schema: &EntitySchema) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(ID_COLUMN))];
    for field in schema.fields() {
        columns.push(match field.kind() {
            FieldKind::Column(kind) => {
                format!("{} {}", quote(field.name()), kind.sql_type())
            }
            FieldKind::ForeignKey(target) => format!(
                "{} INTEGER REFERENCES {} ({})",
                quote(&field.column_name()),
                quote(target.table()),
                quote(ID_COLUMN)
            ),
        });
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(schema.table()),
        columns.join(", ")
    )
}

/// INSERT for an unsaved entity. Fails before producing anything if the
/// entity already has an id or a relationship points at an unsaved entity.
pub fn insert(entity: &Entity) -> Result<Statement> {
    let schema = entity.schema();
    if let Some(id) = entity.id() {
        return Err(TabulaError::Validation(format!(
            "{} #{} is already saved; use update",
            schema.name(),
            id
        )));
    }

    let params = bind_fields(entity)?;
    let sql = if params.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote(schema.table()))
    } else {
        let columns: Vec<String> = schema.column_names().iter().map(|c| quote(c)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(schema.table()),
            columns.join(", "),
            placeholders(params.len())
        )
    };
    Ok(Statement::new(sql, params))
}

/// Every row, ascending by id.
pub fn select_all(schema: &EntitySchema) -> Statement {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        select_list(schema),
        quote(schema.table()),
        quote(ID_COLUMN)
    );
    Statement::new(sql, Vec::new())
}

/// First row matching every predicate of `filter`, lowest id first.
pub fn select_where(schema: &EntitySchema, filter: &Filter) -> Result<Statement> {
    let mut conditions = Vec::with_capacity(filter.terms().len());
    let mut params = Vec::new();

    for (field, value) in filter.terms() {
        let column = if field == ID_COLUMN {
            quote(ID_COLUMN)
        } else {
            quote(&schema.require_field(field)?.1.column_name())
        };

        match predicate_value(schema, field, value)? {
            SqlValue::Null => conditions.push(format!("{column} IS NULL")),
            bound => {
                params.push(bound);
                conditions.push(format!("{column} = ?{}", params.len()));
            }
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT 1",
        select_list(schema),
        quote(schema.table()),
        where_clause,
        quote(ID_COLUMN)
    );
    Ok(Statement::new(sql, params))
}

/// Full-row UPDATE keyed by id.
pub fn update(entity: &Entity) -> Result<Statement> {
    let schema = entity.schema();
    let id = require_id(entity, "update")?;

    let mut params = bind_fields(entity)?;
    let assignments = if params.is_empty() {
        // Nothing to rewrite; keep the statement so a missing row still shows up.
        format!("{0} = {0}", quote(ID_COLUMN))
    } else {
        schema
            .column_names()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
            .collect::<Vec<_>>()
            .join(", ")
    };
    params.push(SqlValue::Integer(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote(schema.table()),
        assignments,
        quote(ID_COLUMN),
        params.len()
    );
    Ok(Statement::new(sql, params))
}

/// DELETE of exactly the row with the entity's id. Never cascades.
pub fn delete(entity: &Entity) -> Result<Statement> {
    let id = require_id(entity, "delete")?;
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote(entity.schema().table()),
        quote(ID_COLUMN)
    );
    Ok(Statement::new(sql, vec![SqlValue::Integer(id)]))
}

fn require_id(entity: &Entity, operation: &str) -> Result<i64> {
    entity.id().ok_or_else(|| {
        TabulaError::Validation(format!(
            "Cannot {operation} an unsaved {} (id is not set)",
            entity.schema().name()
        ))
    })
}

/// Parameters for every declared field, in declaration order.
fn bind_fields(entity: &Entity) -> Result<Vec<SqlValue>> {
    entity
        .values()
        .map(|(def, value)| bind_field(entity.schema(), def, value))
        .collect()
}

fn bind_field(schema: &EntitySchema, def: &FieldDef, value: &FieldValue) -> Result<SqlValue> {
    match value {
        FieldValue::Null => Ok(SqlValue::Null),
        FieldValue::Scalar(v) => Ok(v.to_sql()),
        FieldValue::Entity(nested) => nested.id().map(SqlValue::Integer).ok_or_else(|| {
            TabulaError::Validation(format!(
                "Field '{}.{}' refers to an unsaved {}; save it first",
                schema.name(),
                def.name(),
                nested.schema().name()
            ))
        }),
    }
}

/// Bound value for one predicate. Relationship predicates accept a saved
/// entity of the target type or a bare integer id.
fn predicate_value(schema: &EntitySchema, field: &str, value: &FieldValue) -> Result<SqlValue> {
    if field == ID_COLUMN {
        return match value {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::Scalar(Value::Integer(id)) => Ok(SqlValue::Integer(*id)),
            other => Err(TabulaError::Schema(format!(
                "'{}.id' is compared with {}, expected integer",
                schema.name(),
                other.describe()
            ))),
        };
    }

    let (_, def) = schema.require_field(field)?;
    if let (FieldKind::ForeignKey(_), FieldValue::Scalar(Value::Integer(id))) = (def.kind(), value) {
        return Ok(SqlValue::Integer(*id));
    }
    let checked = check_value(schema, def, value.clone())?;
    bind_field(schema, def, &checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, Registry};
    use pretty_assertions::assert_eq;
    use sqlparser::dialect::SQLiteDialect;
    use sqlparser::parser::Parser;
    use std::sync::Arc;

    fn library() -> (Arc<EntitySchema>, Arc<EntitySchema>) {
        let mut registry = Registry::new();
        let author = registry
            .register(
                EntitySchema::builder("Author")
                    .column("name", ColumnKind::Text)
                    .column("age", ColumnKind::Integer)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let book = registry
            .register(
                EntitySchema::builder("Book")
                    .column("title", ColumnKind::Text)
                    .column("published", ColumnKind::Boolean)
                    .column("cover", ColumnKind::Blob)
                    .foreign_key("author", &author)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        (author, book)
    }

    fn saved_author(schema: &Arc<EntitySchema>, id: i64) -> Entity {
        let mut author = Entity::new(schema, [("name", "Ann")]).unwrap();
        author.assign_id(id);
        author
    }

    fn assert_parses(sql: &str) {
        if let Err(e) = Parser::parse_sql(&SQLiteDialect {}, sql) {
            panic!("Generated SQL does not parse: {e}\n{sql}");
        }
    }

    #[test]
    fn test_create_table() {
        let (author, book) = library();
        assert_eq!(
            create_table(&author),
            r#"CREATE TABLE IF NOT EXISTS "author" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "name" TEXT, "age" INTEGER)"#
        );
        assert_eq!(
            create_table(&book),
            r#"CREATE TABLE IF NOT EXISTS "book" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "title" TEXT, "published" INTEGER, "cover" BLOB, "author_id" INTEGER REFERENCES "author" ("id"))"#
        );
        assert_parses(&create_table(&book));
    }

    #[test]
    fn test_insert_binds_every_field() {
        let (author, book) = library();
        let mut entity = Entity::new(&book, [("title", "T")]).unwrap();
        entity.set("published", true).unwrap();
        entity.set("author", saved_author(&author, 5)).unwrap();

        let stmt = insert(&entity).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "book" ("title", "published", "cover", "author_id") VALUES (?1, ?2, ?3, ?4)"#
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("T".into()),
                SqlValue::Integer(1),
                SqlValue::Null,
                SqlValue::Integer(5),
            ]
        );
        assert_parses(&stmt.sql);
    }

    #[test]
    fn test_insert_never_interpolates_values() {
        let (author, _) = library();
        let entity = Entity::new(&author, [("name", "x'); DROP TABLE author; --")]).unwrap();
        let stmt = insert(&entity).unwrap();
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params[0], SqlValue::Text("x'); DROP TABLE author; --".into()));
    }

    #[test]
    fn test_insert_with_unsaved_target_fails() {
        let (author, book) = library();
        let mut entity = Entity::new(&book, [("title", "T")]).unwrap();
        entity.set("author", Entity::new(&author, [("name", "Ann")]).unwrap()).unwrap();

        let err = insert(&entity).unwrap_err();
        assert!(matches!(err, TabulaError::Validation(_)));
    }

    #[test]
    fn test_insert_of_saved_entity_fails() {
        let (author, _) = library();
        let entity = saved_author(&author, 1);
        assert!(matches!(insert(&entity), Err(TabulaError::Validation(_))));
    }

    #[test]
    fn test_insert_without_fields() {
        let schema = EntitySchema::builder("Marker").build().unwrap();
        let stmt = insert(&Entity::empty(&Arc::new(schema))).unwrap();
        assert_eq!(stmt.sql, r#"INSERT INTO "marker" DEFAULT VALUES"#);
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_all() {
        let (_, book) = library();
        let stmt = select_all(&book);
        assert_eq!(
            stmt.sql,
            r#"SELECT "id", "title", "published", "cover", "author_id" FROM "book" ORDER BY "id""#
        );
        assert!(stmt.params.is_empty());
        assert_parses(&stmt.sql);
    }

    #[test]
    fn test_select_where_conjunction() {
        let (author, book) = library();
        let filter = Filter::new()
            .eq("title", "T")
            .eq("author", saved_author(&author, 2))
            .eq("cover", None::<Vec<u8>>);

        let stmt = select_where(&book, &filter).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "id", "title", "published", "cover", "author_id" FROM "book" WHERE "title" = ?1 AND "author_id" = ?2 AND "cover" IS NULL ORDER BY "id" LIMIT 1"#
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("T".into()), SqlValue::Integer(2)]);
        assert_parses(&stmt.sql);
    }

    #[test]
    fn test_select_where_by_id_and_raw_foreign_id() {
        let (_, book) = library();
        let stmt = select_where(&book, &Filter::by_id(9).eq("author", 3)).unwrap();
        assert!(stmt.sql.contains(r#"WHERE "id" = ?1 AND "author_id" = ?2"#));
        assert_eq!(stmt.params, vec![SqlValue::Integer(9), SqlValue::Integer(3)]);
    }

    #[test]
    fn test_select_where_rejects_unknown_field_and_wrong_kind() {
        let (_, book) = library();
        assert!(matches!(
            select_where(&book, &Filter::new().eq("isbn", "1")),
            Err(TabulaError::Schema(_))
        ));
        assert!(matches!(
            select_where(&book, &Filter::new().eq("published", "yes")),
            Err(TabulaError::Schema(_))
        ));
        assert!(matches!(
            select_where(&book, &Filter::new().eq("id", "1")),
            Err(TabulaError::Schema(_))
        ));
    }

    #[test]
    fn test_select_where_with_unsaved_target_fails() {
        let (author, book) = library();
        let unsaved = Entity::new(&author, [("name", "Ann")]).unwrap();
        assert!(matches!(
            select_where(&book, &Filter::new().eq("author", unsaved)),
            Err(TabulaError::Validation(_))
        ));
    }

    #[test]
    fn test_select_where_without_terms() {
        let (author, _) = library();
        let stmt = select_where(&author, &Filter::new()).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "id", "name", "age" FROM "author" ORDER BY "id" LIMIT 1"#
        );
    }

    #[test]
    fn test_update_rewrites_full_row() {
        let (author, _) = library();
        let entity = saved_author(&author, 4);

        let stmt = update(&entity).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "author" SET "name" = ?1, "age" = ?2 WHERE "id" = ?3"#
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("Ann".into()), SqlValue::Null, SqlValue::Integer(4)]
        );
        assert_parses(&stmt.sql);
    }

    #[test]
    fn test_update_requires_id() {
        let (author, _) = library();
        let entity = Entity::new(&author, [("name", "Ann")]).unwrap();
        assert!(matches!(update(&entity), Err(TabulaError::Validation(_))));
    }

    #[test]
    fn test_update_with_unsaved_target_fails() {
        let (author, book) = library();
        let mut entity = Entity::new(&book, [("title", "T")]).unwrap();
        entity.assign_id(1);
        entity.set("author", Entity::empty(&author)).unwrap();
        assert!(matches!(update(&entity), Err(TabulaError::Validation(_))));
    }

    #[test]
    fn test_delete() {
        let (author, _) = library();
        let stmt = delete(&saved_author(&author, 8)).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "author" WHERE "id" = ?1"#);
        assert_eq!(stmt.params, vec![SqlValue::Integer(8)]);
        assert_parses(&stmt.sql);

        assert!(matches!(
            delete(&Entity::empty(&author)),
            Err(TabulaError::Validation(_))
        ));
    }
}
