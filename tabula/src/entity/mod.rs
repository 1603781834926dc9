// Entity values: one record of a registered schema, held as a tagged field store

mod value;

pub use value::{FieldValue, Value};

use crate::error::{Result, TabulaError};
use crate::schema::{EntitySchema, FieldDef, FieldKind, ID_COLUMN};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// One record of an entity type.
///
/// Field slots are indexed by the schema's declaration order. The entity is a
/// passive value: it performs no I/O and knows nothing about SQL. `id` stays
/// unset until the record is saved through a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    id: Option<i64>,
    values: Vec<FieldValue>,
}

impl Entity {
    /// An unsaved entity with every field unset.
    pub fn empty(schema: &Arc<EntitySchema>) -> Self {
        Entity {
            schema: Arc::clone(schema),
            id: None,
            values: vec![FieldValue::Null; schema.fields().len()],
        }
    }

    /// Build an entity from named values. Names must be declared fields or `id`;
    /// fields not mentioned stay unset.
    pub fn new<I, K, V>(schema: &Arc<EntitySchema>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut entity = Entity::empty(schema);
        for (name, value) in values {
            let name = name.as_ref();
            let value = value.into();
            if name == ID_COLUMN {
                entity.id = parse_id(schema, value)?;
            } else {
                entity.set(name, value)?;
            }
        }
        Ok(entity)
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn get(&self, field: &str) -> Result<&FieldValue> {
        let (index, _) = self.schema.require_field(field)?;
        Ok(&self.values[index])
    }

    /// Replace one field. The value must match the declared kind; relationship
    /// fields take an entity of the target type. Whether that entity has been
    /// saved is checked when this record is written, not here.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let (index, def) = self.schema.require_field(field)?;
        let value = check_value(&self.schema, def, value.into())?;
        self.values[index] = value;
        Ok(())
    }

    /// Store an already-checked value by slot index (used by hydration).
    pub(crate) fn put(&mut self, index: usize, value: FieldValue) {
        self.values[index] = value;
    }

    /// Iterate `(field, value)` pairs in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&FieldDef, &FieldValue)> {
        self.schema.fields().iter().zip(self.values.iter())
    }

    pub fn text(&self, field: &str) -> Result<Option<&str>> {
        match self.scalar(field)? {
            None => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s)),
            Some(other) => Err(self.kind_mismatch(field, "text", other)),
        }
    }

    pub fn integer(&self, field: &str) -> Result<Option<i64>> {
        match self.scalar(field)? {
            None => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(*n)),
            Some(other) => Err(self.kind_mismatch(field, "integer", other)),
        }
    }

    pub fn real(&self, field: &str) -> Result<Option<f64>> {
        match self.scalar(field)? {
            None => Ok(None),
            Some(Value::Real(f)) => Ok(Some(*f)),
            Some(other) => Err(self.kind_mismatch(field, "real", other)),
        }
    }

    pub fn boolean(&self, field: &str) -> Result<Option<bool>> {
        match self.scalar(field)? {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(self.kind_mismatch(field, "boolean", other)),
        }
    }

    pub fn blob(&self, field: &str) -> Result<Option<&[u8]>> {
        match self.scalar(field)? {
            None => Ok(None),
            Some(Value::Blob(b)) => Ok(Some(b)),
            Some(other) => Err(self.kind_mismatch(field, "blob", other)),
        }
    }

    /// The nested entity of a relationship field, if set. Never performs I/O.
    pub fn related(&self, field: &str) -> Result<Option<&Entity>> {
        self.schema.target(field)?;
        Ok(self.get(field)?.as_entity())
    }

    /// JSON rendering with `id` first, then fields in declaration order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn scalar(&self, field: &str) -> Result<Option<&Value>> {
        let (index, def) = self.schema.require_field(field)?;
        if def.is_relationship() {
            return Err(TabulaError::Schema(format!(
                "Field '{}.{}' is a relationship, not a scalar",
                self.schema.name(),
                field
            )));
        }
        Ok(self.values[index].as_scalar())
    }

    fn kind_mismatch(&self, field: &str, wanted: &str, found: &Value) -> TabulaError {
        TabulaError::Schema(format!(
            "Field '{}.{}' holds {}, not {}",
            self.schema.name(),
            field,
            found.kind(),
            wanted
        ))
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.id == other.id
            && self.values == other.values
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry(ID_COLUMN, &self.id)?;
        for (def, value) in self.values() {
            map.serialize_entry(def.name(), value)?;
        }
        map.end()
    }
}

/// Validate a value against its field definition, widening integers for real fields.
pub(crate) fn check_value(
    schema: &EntitySchema,
    def: &FieldDef,
    value: FieldValue,
) -> Result<FieldValue> {
    let described = value.describe();
    let accepted = match (def.kind(), value) {
        (_, FieldValue::Null) => Some(FieldValue::Null),
        (FieldKind::Column(kind), FieldValue::Scalar(v)) => v.conform(*kind).map(FieldValue::Scalar),
        (FieldKind::ForeignKey(target), FieldValue::Entity(e)) => {
            Arc::ptr_eq(e.schema(), target).then_some(FieldValue::Entity(e))
        }
        _ => None,
    };

    accepted.ok_or_else(|| {
        TabulaError::Schema(format!(
            "Field '{}.{}' expects {}, got {}",
            schema.name(),
            def.name(),
            def.describe_kind(),
            described
        ))
    })
}

fn parse_id(schema: &EntitySchema, value: FieldValue) -> Result<Option<i64>> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Scalar(Value::Integer(id)) if id > 0 => Ok(Some(id)),
        other => Err(TabulaError::Schema(format!(
            "'{}.id' must be a positive integer, got {}",
            schema.name(),
            other.describe()
        ))),
    }
}

/// A typed struct that converts to and from an [`Entity`].
///
/// Implementations are normally generated by `tabula-codegen` from a schema
/// definition file.
pub trait Record: Sized {
    /// Name of the registered entity this record mirrors.
    const ENTITY: &'static str;

    fn from_entity(entity: &Entity) -> Result<Self>;

    fn to_entity(&self, schema: &Arc<EntitySchema>) -> Result<Entity>;
}

/// Fail unless `entity` belongs to the entity type `R` mirrors.
pub fn expect_entity<R: Record>(entity: &Entity) -> Result<()> {
    if entity.schema().name() == R::ENTITY {
        Ok(())
    } else {
        Err(TabulaError::Schema(format!(
            "Expected a {} entity, got {}",
            R::ENTITY,
            entity.schema().name()
        )))
    }
}
