use crate::config::DatabaseConfig;
use crate::entity::{Entity, FieldValue, Value};
use crate::error::{Result, TabulaError};
use crate::schema::{ColumnKind, EntitySchema, FieldDef, FieldKind};
use crate::sql::{self, Filter, Statement};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The single owner of a connection to one SQLite store.
///
/// Every operation is synchronous and runs one generated statement in
/// autocommit mode; reads additionally issue one lookup per set relationship
/// field while hydrating. The type is `Send` but not `Sync`: callers sharing
/// it between threads must serialize access themselves.
pub struct Database {
    conn: Option<Connection>,
    location: PathBuf,
}

impl Database {
    /// Open or create the store file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&DatabaseConfig::new(path.as_ref()))
    }

    /// Open a private in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with(&DatabaseConfig::in_memory())
    }

    pub fn open_with(config: &DatabaseConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(&config.path, open_flags(config))
        }
        .map_err(|e| {
            TabulaError::Connection(format!("Cannot open '{}': {e}", config.path.display()))
        })?;

        if let Some(timeout) = config.busy_timeout() {
            conn.busy_timeout(timeout)?;
        }

        // The file header is only read on first access; probe it so a
        // non-database file fails here rather than on the first query.
        // Busy or locked stores pass through unclassified.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase) => TabulaError::Connection(
                    format!("Cannot read '{}': {e}", config.path.display()),
                ),
                _ => TabulaError::from(e),
            })?;

        // Bundled SQLite enables enforcement by default, so always set it.
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;

        log::info!("Opened database at {}", config.path.display());
        Ok(Database {
            conn: Some(conn),
            location: config.path.clone(),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| {
            TabulaError::Connection(format!("Database at {} is closed", self.location.display()))
        })
    }

    // ── Schema ───────────────────────────────────────────────────────

    /// Create the entity's table unless it already exists.
    pub fn create(&self, schema: &EntitySchema) -> Result<()> {
        let conn = self.conn()?;
        let sql = sql::create_table(schema);
        log::debug!("{sql}");
        conn.execute(&sql, [])?;
        log::info!("Ensured table '{}'", schema.table());
        Ok(())
    }

    /// Table names as the store itself reports them, sorted. Compare with
    /// the registry to spot drift between declared and stored schema.
    pub fn tables(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql::SELECT_TABLES)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    // ── Records ──────────────────────────────────────────────────────

    /// Insert an unsaved entity and assign the generated id to it.
    pub fn save(&self, entity: &mut Entity) -> Result<i64> {
        let conn = self.conn()?;
        let stmt = sql::insert(entity)?;
        run(conn, &stmt)?;

        let id = conn.last_insert_rowid();
        entity.assign_id(id);
        Ok(id)
    }

    /// Every row of the entity's table, ascending by id, relationships hydrated.
    pub fn all(&self, schema: &Arc<EntitySchema>) -> Result<Vec<Entity>> {
        let conn = self.conn()?;
        let rows = fetch(conn, &sql::select_all(schema))?;
        rows.into_iter().map(|row| self.hydrate(schema, row)).collect()
    }

    /// The lowest-id row matching every predicate of `filter`.
    pub fn get(&self, schema: &Arc<EntitySchema>, filter: &Filter) -> Result<Entity> {
        let conn = self.conn()?;
        let stmt = sql::select_where(schema, filter)?;
        let row = fetch(conn, &stmt)?
            .into_iter()
            .next()
            .ok_or_else(|| TabulaError::RecordNotFound {
                table: schema.table().to_string(),
                criteria: filter.to_string(),
            })?;
        self.hydrate(schema, row)
    }

    /// Rewrite every field of a saved entity.
    pub fn update(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn()?;
        let stmt = sql::update(entity)?;
        if run(conn, &stmt)? == 0 {
            return Err(missing_row(entity));
        }
        Ok(())
    }

    /// Delete the entity's row. The in-memory entity keeps its id and is
    /// stale from here on; rows referencing it are left dangling.
    pub fn delete(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn()?;
        let stmt = sql::delete(entity)?;
        if run(conn, &stmt)? == 0 {
            return Err(missing_row(entity));
        }
        Ok(())
    }

    /// Release the connection. Closing twice is a no-op; every other
    /// operation fails with a connection error afterwards.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| TabulaError::from(e))?;
            log::info!("Closed database at {}", self.location.display());
        }
        Ok(())
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Turn a stored row (`id` first, then declared columns) into an entity,
    /// loading each referenced entity with its own lookup.
    fn hydrate(&self, schema: &Arc<EntitySchema>, row: Vec<SqlValue>) -> Result<Entity> {
        let mut cells = row.into_iter();
        let mut entity = Entity::empty(schema);

        match cells.next() {
            Some(SqlValue::Integer(id)) => entity.assign_id(id),
            other => {
                return Err(TabulaError::Schema(format!(
                    "Row of '{}' has no integer id (found {other:?})",
                    schema.table()
                )))
            }
        }

        for (index, def) in schema.fields().iter().enumerate() {
            let cell = cells.next().unwrap_or(SqlValue::Null);
            let value = match def.kind() {
                FieldKind::Column(kind) => decode(schema, def, *kind, cell)?,
                FieldKind::ForeignKey(target) => match cell {
                    SqlValue::Null => FieldValue::Null,
                    SqlValue::Integer(id) => {
                        let nested = self.get(target, &Filter::by_id(id))?;
                        FieldValue::Entity(Box::new(nested))
                    }
                    other => return Err(undecodable(schema, def, &other)),
                },
            };
            entity.put(index, value);
        }

        Ok(entity)
    }
}

fn open_flags(config: &DatabaseConfig) -> OpenFlags {
    let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if config.read_only {
        flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
    } else {
        flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
        if config.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
    }
    flags
}

fn run(conn: &Connection, stmt: &Statement) -> Result<usize> {
    log::debug!("{} [{} param(s)]", stmt.sql, stmt.params.len());
    Ok(conn.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?)
}

fn fetch(conn: &Connection, stmt: &Statement) -> Result<Vec<Vec<SqlValue>>> {
    log::debug!("{} [{} param(s)]", stmt.sql, stmt.params.len());
    let mut prepared = conn.prepare(&stmt.sql)?;
    let width = prepared.column_count();
    let rows = prepared.query_map(params_from_iter(stmt.params.iter()), |row| {
        (0..width)
            .map(|i| row.get::<_, SqlValue>(i))
            .collect::<rusqlite::Result<Vec<_>>>()
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Coerce a stored cell to the declared kind.
fn decode(
    schema: &EntitySchema,
    def: &FieldDef,
    kind: ColumnKind,
    cell: SqlValue,
) -> Result<FieldValue> {
    let value = match (kind, cell) {
        (_, SqlValue::Null) => return Ok(FieldValue::Null),
        (ColumnKind::Text, SqlValue::Text(s)) => Value::Text(s),
        (ColumnKind::Text, SqlValue::Integer(n)) => Value::Text(n.to_string()),
        (ColumnKind::Text, SqlValue::Real(f)) => Value::Text(f.to_string()),
        (ColumnKind::Integer, SqlValue::Integer(n)) => Value::Integer(n),
        (ColumnKind::Integer, SqlValue::Real(f)) if f.fract() == 0.0 => Value::Integer(f as i64),
        (ColumnKind::Real, SqlValue::Real(f)) => Value::Real(f),
        (ColumnKind::Real, SqlValue::Integer(n)) => Value::Real(n as f64),
        (ColumnKind::Boolean, SqlValue::Integer(n)) => Value::Boolean(n != 0),
        (ColumnKind::Blob, SqlValue::Blob(b)) => Value::Blob(b),
        (ColumnKind::Blob, SqlValue::Text(s)) => Value::Blob(s.into_bytes()),
        (_, other) => return Err(undecodable(schema, def, &other)),
    };
    Ok(FieldValue::Scalar(value))
}

fn undecodable(schema: &EntitySchema, def: &FieldDef, cell: &SqlValue) -> TabulaError {
    TabulaError::Schema(format!(
        "Column '{}.{}' holds {}, which does not decode as {}",
        schema.table(),
        def.column_name(),
        cell.data_type(),
        def.describe_kind()
    ))
}

fn missing_row(entity: &Entity) -> TabulaError {
    TabulaError::RecordNotFound {
        table: entity.schema().table().to_string(),
        criteria: format!("id = {}", entity.id().unwrap_or_default()),
    }
}
