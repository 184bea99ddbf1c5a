//! Core data model for denorm: a flat, normalized, relational store.
//!
//! A [`Store`] holds every model as a table of records keyed by [`RecordId`];
//! relations between records are expressed only as foreign-key references.
//! A [`Schema`] declares, per model, which fields are relations and of what
//! [`RelationKind`]. The selector engine in `denorm-select` consumes both to
//! derive hydrated, nested views.
//!
//! # Modules
//!
//! - [`id`]: RecordId and its falsiness discipline
//! - [`value`]: Value and Record, the field-level data model
//! - [`store`]: Store and Table containers
//! - [`schema`]: Schema, RelationDescriptor, RelationKind
//! - [`convert`]: JSON intake with numeric-id normalization
//! - [`error`]: ConvertError

pub mod convert;
pub mod error;
pub mod id;
pub mod schema;
pub mod store;
pub mod value;

// Re-export commonly used types
pub use convert::{record_from_json, schema_from_json, store_from_json, value_from_json};
pub use error::ConvertError;
pub use id::RecordId;
pub use schema::{RelationDescriptor, RelationKind, Schema};
pub use store::{Store, Table};
pub use value::{Record, Value, PK_FIELD};
