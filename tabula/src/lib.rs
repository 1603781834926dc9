//! A small schema-driven ORM over one embedded SQLite store.
//!
//! Entity types are declared once (in code or a YAML schema file) and
//! registered in a [`Registry`]. A [`Database`] then creates their tables and
//! persists [`Entity`] values, hydrating relationship fields into nested
//! entities on read.

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod schema;
pub mod sql;

pub use config::DatabaseConfig;
pub use database::Database;
pub use entity::{expect_entity, Entity, FieldValue, Record, Value};
pub use error::{Result, TabulaError};
pub use schema::{Column, ColumnKind, EntitySchema, ForeignKey, Registry};
pub use sql::Filter;
