use super::types::{EntitySchema, FieldKind};
use crate::error::{Result, TabulaError};
use std::sync::Arc;

/// The set of entity schemas known to a program, in registration order.
///
/// Registration is the one point where cross-entity rules are checked: table
/// names must not collide and relationship targets must already be registered
/// here.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: Vec<Arc<EntitySchema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema and return the shared handle used by entities and the database.
    pub fn register(&mut self, schema: EntitySchema) -> Result<Arc<EntitySchema>> {
        if let Some(existing) = self.entities.iter().find(|e| e.table() == schema.table()) {
            return Err(TabulaError::Schema(format!(
                "Entity '{}' maps to table '{}', already used by '{}'",
                schema.name(),
                schema.table(),
                existing.name()
            )));
        }

        for field in schema.fields() {
            if let FieldKind::ForeignKey(target) = field.kind() {
                if !self.entities.iter().any(|e| Arc::ptr_eq(e, target)) {
                    return Err(TabulaError::Schema(format!(
                        "Field '{}.{}' references '{}', which is not registered",
                        schema.name(),
                        field.name(),
                        target.name()
                    )));
                }
            }
        }

        let schema = Arc::new(schema);
        self.entities.push(Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntitySchema>> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// Like [`Registry::get`] but a missing entity is a schema error.
    pub fn entity(&self, name: &str) -> Result<Arc<EntitySchema>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| TabulaError::Schema(format!("Entity '{name}' is not registered")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
