use crate::entity::{FieldValue, Value};
use std::fmt;

/// A conjunction of `field = value` predicates.
///
/// Field names are declared field names (relationship fields by their field
/// name, not their `_id` column) or `id`. A `Null` value matches unset fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a lookup by primary key.
    pub fn by_id(id: i64) -> Self {
        Filter::new().eq("id", id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    pub fn terms(&self) -> &[(String, FieldValue)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (k, v)| filter.eq(k, v))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("(any)");
        }
        for (i, (field, value)) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            match value {
                FieldValue::Null => write!(f, "{field} IS NULL")?,
                FieldValue::Scalar(Value::Text(s)) => write!(f, "{field} = {s:?}")?,
                FieldValue::Scalar(Value::Integer(n)) => write!(f, "{field} = {n}")?,
                FieldValue::Scalar(Value::Real(r)) => write!(f, "{field} = {r}")?,
                FieldValue::Scalar(Value::Boolean(b)) => write!(f, "{field} = {b}")?,
                FieldValue::Scalar(Value::Blob(b)) => write!(f, "{field} = <{} bytes>", b.len())?,
                FieldValue::Entity(e) => match e.id() {
                    Some(id) => write!(f, "{field} = {}#{id}", e.schema().name())?,
                    None => write!(f, "{field} = unsaved {}", e.schema().name())?,
                },
            }
        }
        Ok(())
    }
}
