use super::registry::Registry;
use super::types::{ColumnKind, EntitySchema, ForeignKey};
use crate::error::{Result, TabulaError};
use serde::Deserialize;
use std::path::Path;

/// Top-level layout of a schema definition file.
///
/// `entities` is kept as a raw mapping because declaration order matters and
/// `serde_yaml::Mapping` preserves it.
#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    entities: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldSpec {
    Kind(String),
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
}

enum ParsedField {
    Column(String, ColumnKind),
    Ref(String, String),
}

struct ParsedEntity {
    name: String,
    fields: Vec<ParsedField>,
}

/// Parse a schema definition file into a populated registry
pub fn parse_schema(path: &Path) -> Result<Registry> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema definition string into a populated registry.
///
/// Entities may reference entities declared further down; they are registered
/// as soon as every target they name is available.
pub fn parse_schema_str(content: &str) -> Result<Registry> {
    let file: SchemaFile = serde_yaml::from_str(content)?;
    let mut pending = Vec::with_capacity(file.entities.len());
    for (key, value) in file.entities {
        pending.push(parse_entity(key, value)?);
    }

    let mut registry = Registry::new();
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();

        for entity in pending {
            let ready = entity.fields.iter().all(|f| match f {
                ParsedField::Column(..) => true,
                ParsedField::Ref(_, target) => registry.get(target).is_some(),
            });
            if ready {
                let schema = build_entity(&registry, entity)?;
                registry.register(schema)?;
            } else {
                deferred.push(entity);
            }
        }

        if deferred.len() == before {
            let unresolved: Vec<String> = deferred
                .iter()
                .flat_map(|e| {
                    e.fields.iter().filter_map(|f| match f {
                        ParsedField::Ref(field, target) if registry.get(target).is_none() => {
                            Some(format!("{}.{} -> {}", e.name, field, target))
                        }
                        _ => None,
                    })
                })
                .collect();
            return Err(TabulaError::Schema(format!(
                "Unresolvable references (unknown or cyclic targets): {}",
                unresolved.join(", ")
            )));
        }
        pending = deferred;
    }

    Ok(registry)
}

fn parse_entity(key: serde_yaml::Value, value: serde_yaml::Value) -> Result<ParsedEntity> {
    let name = key
        .as_str()
        .ok_or_else(|| TabulaError::Schema(format!("Entity name must be a string, got {key:?}")))?
        .to_string();

    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(TabulaError::Schema(format!(
                "Entity '{name}' must be a mapping of field names to kinds"
            )))
        }
    };

    let mut fields = Vec::with_capacity(mapping.len());
    for (field_key, field_value) in mapping {
        let field = field_key
            .as_str()
            .ok_or_else(|| {
                TabulaError::Schema(format!("Field names of '{name}' must be strings"))
            })?
            .to_string();

        let declared: FieldSpec = serde_yaml::from_value(field_value).map_err(|e| {
            TabulaError::Schema(format!("Field '{name}.{field}': {e}"))
        })?;
        fields.push(match declared {
            FieldSpec::Kind(kind) => ParsedField::Column(field, kind.parse()?),
            FieldSpec::Ref { target } => ParsedField::Ref(field, target),
        });
    }

    Ok(ParsedEntity { name, fields })
}

fn build_entity(registry: &Registry, entity: ParsedEntity) -> Result<EntitySchema> {
    let mut builder = EntitySchema::builder(entity.name);
    for field in entity.fields {
        builder = match field {
            ParsedField::Column(name, kind) => builder.column(name, kind),
            ParsedField::Ref(name, target) => {
                builder.field(name, ForeignKey(registry.entity(&target)?))
            }
        };
    }
    builder.build()
}
