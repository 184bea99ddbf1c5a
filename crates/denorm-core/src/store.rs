//! The normalized store: model name -> id -> record.
//!
//! Tables are insertion-ordered, which is what gives reverse-relation scans
//! their deterministic "table-iteration order". The selector engine only
//! ever reads a `&Store`; the mutation helpers here exist for store
//! construction and tests.

use indexmap::IndexMap;

use crate::id::RecordId;
use crate::value::{Record, Value};

/// One model's table of records.
pub type Table = IndexMap<RecordId, Record>;

/// A flat, normalized, relational store.
///
/// Relation fields hold raw foreign-key references only; nested records
/// appear exclusively in hydrated output, never in a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    tables: IndexMap<String, Table>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Returns the table for `model`, if any records exist for it.
    pub fn table(&self, model: &str) -> Option<&Table> {
        self.tables.get(model)
    }

    /// Looks up one record.
    pub fn record(&self, model: &str, id: &RecordId) -> Option<&Record> {
        self.tables.get(model)?.get(id)
    }

    /// Looks up one field of one record.
    pub fn field(&self, model: &str, id: &RecordId, field: &str) -> Option<&Value> {
        self.record(model, id)?.get(field)
    }

    /// Inserts or replaces a record, creating the table on first use.
    pub fn insert(&mut self, model: impl Into<String>, id: impl Into<RecordId>, record: Record) {
        self.tables
            .entry(model.into())
            .or_default()
            .insert(id.into(), record);
    }

    /// Sets one field on an existing record; a missing record is created.
    pub fn set_field(
        &mut self,
        model: impl Into<String>,
        id: impl Into<RecordId>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.tables
            .entry(model.into())
            .or_default()
            .entry(id.into())
            .or_default()
            .set(field, value);
    }

    /// Removes a record, returning it if present.
    pub fn remove(&mut self, model: &str, id: &RecordId) -> Option<Record> {
        self.tables.get_mut(model)?.shift_remove(id)
    }

    /// Iterates model names in insertion order.
    pub fn models(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Store {
        let mut store = Store::new();
        store.insert("user", 1, Record::new().with("id", 1).with("name", "ada"));
        store.insert("user", 2, Record::new().with("id", 2).with("name", "lin"));
        store.insert("post", 10, Record::new().with("id", 10).with("author_id", 1));
        store
    }

    #[test]
    fn lookups() {
        let store = sample();
        assert_eq!(
            store.field("user", &RecordId::Int(1), "name"),
            Some(&Value::Str("ada".into()))
        );
        assert_eq!(store.record("user", &RecordId::Int(3)), None);
        assert_eq!(store.field("post", &RecordId::Int(10), "missing"), None);
        assert_eq!(store.table("comment"), None);
    }

    #[test]
    fn set_field_creates_missing_record() {
        let mut store = sample();
        store.set_field("user", 5, "name", "new");
        assert_eq!(
            store.field("user", &RecordId::Int(5), "name"),
            Some(&Value::Str("new".into()))
        );
    }

    #[test]
    fn table_iteration_is_insertion_ordered() {
        let store = sample();
        let ids: Vec<&RecordId> = store.table("user").unwrap().keys().collect();
        assert_eq!(ids, [&RecordId::Int(1), &RecordId::Int(2)]);
    }

    #[test]
    fn remove() {
        let mut store = sample();
        let removed = store.remove("post", &RecordId::Int(10));
        assert!(removed.is_some());
        assert_eq!(store.record("post", &RecordId::Int(10)), None);
    }
}
