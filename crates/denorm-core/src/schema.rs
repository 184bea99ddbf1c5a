//! Relation schema: which fields of which models point at which models.
//!
//! A [`Schema`] maps model name to field name to [`RelationDescriptor`].
//! The descriptor's kind is a closed set ([`RelationKind`]); unrecognized
//! kind tags in a schema document deserialize to [`RelationKind::Custom`],
//! which the automatic traversal skips. Schemas are immutable once handed
//! to a selector cache.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// The closed set of relation kinds.
///
/// `Parent` and `Friend` are single relations: the source record holds one
/// foreign id. `Friends` is a multi relation: the source holds an ordered
/// list of foreign ids. `Children` is a reverse relation: the *target*
/// records hold the foreign id pointing back, and membership is discovered
/// by scanning the target table. `Custom` covers everything else and is
/// only usable through the manual retriever API with a caller-supplied
/// selector creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Parent,
    Friend,
    Friends,
    Children,
    Custom,
}

impl RelationKind {
    /// Single relation: one foreign id on the source record.
    pub fn is_single(self) -> bool {
        matches!(self, RelationKind::Parent | RelationKind::Friend)
    }

    /// Multi relation: an ordered foreign-id list on the source record.
    pub fn is_multi(self) -> bool {
        self == RelationKind::Friends
    }

    /// Reverse relation: the target records point back at the source.
    pub fn is_reverse(self) -> bool {
        self == RelationKind::Children
    }
}

// Unknown kind tags become Custom rather than a deserialization error:
// the traversal must tolerate manually-handled relation kinds it does
// not recognize.
impl<'de> Deserialize<'de> for RelationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KindVisitor;

        impl Visitor<'_> for KindVisitor {
            type Value = RelationKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a relation kind string")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<RelationKind, E> {
                Ok(match s {
                    "parent" => RelationKind::Parent,
                    "friend" => RelationKind::Friend,
                    "friends" => RelationKind::Friends,
                    "children" => RelationKind::Children,
                    _ => RelationKind::Custom,
                })
            }
        }

        deserializer.deserialize_str(KindVisitor)
    }
}

/// One declared relation on a model.
///
/// In schema documents the fields are spelled `type`, `model`, and `field`,
/// matching the store-side vocabulary: `field` names the foreign-key field
/// and defaults to the declaring field's own name when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    #[serde(rename = "model")]
    pub target_model: String,
    #[serde(rename = "field", default, skip_serializing_if = "Option::is_none")]
    pub link_field: Option<String>,
}

impl RelationDescriptor {
    pub fn new(kind: RelationKind, target_model: impl Into<String>) -> Self {
        RelationDescriptor {
            kind,
            target_model: target_model.into(),
            link_field: None,
        }
    }

    /// Builder-style override of the foreign-key field name.
    pub fn link_field(mut self, field: impl Into<String>) -> Self {
        self.link_field = Some(field.into());
        self
    }
}

/// Declared relations for every model: model name -> field -> descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    models: IndexMap<String, IndexMap<String, RelationDescriptor>>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Declares one relation, creating the model entry on first use.
    pub fn declare(
        &mut self,
        model: impl Into<String>,
        field: impl Into<String>,
        descriptor: RelationDescriptor,
    ) {
        self.models
            .entry(model.into())
            .or_default()
            .insert(field.into(), descriptor);
    }

    /// Builder-style [`declare`](Self::declare).
    pub fn with(
        mut self,
        model: impl Into<String>,
        field: impl Into<String>,
        descriptor: RelationDescriptor,
    ) -> Self {
        self.declare(model, field, descriptor);
        self
    }

    /// Returns the declared relations of `model`, if the model is declared.
    pub fn model(&self, model: &str) -> Option<&IndexMap<String, RelationDescriptor>> {
        self.models.get(model)
    }

    pub fn contains_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &String> {
        self.models.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        assert!(RelationKind::Parent.is_single());
        assert!(RelationKind::Friend.is_single());
        assert!(RelationKind::Friends.is_multi());
        assert!(RelationKind::Children.is_reverse());
        assert!(!RelationKind::Custom.is_single());
        assert!(!RelationKind::Custom.is_multi());
        assert!(!RelationKind::Custom.is_reverse());
    }

    #[test]
    fn schema_document_parses() {
        let json = serde_json::json!({
            "article": {
                "author": { "type": "parent", "model": "user", "field": "author_id" },
                "tags": { "type": "friends", "model": "tag", "field": "tag_ids" },
                "comments": { "type": "children", "model": "comment", "field": "article_id" }
            }
        });
        let schema: Schema = serde_json::from_value(json).unwrap();
        let article = schema.model("article").unwrap();
        assert_eq!(article.len(), 3);
        assert_eq!(article["author"].kind, RelationKind::Parent);
        assert_eq!(article["author"].target_model, "user");
        assert_eq!(article["tags"].link_field.as_deref(), Some("tag_ids"));
        assert_eq!(article["comments"].kind, RelationKind::Children);
    }

    #[test]
    fn link_field_is_optional() {
        let json = serde_json::json!({
            "a": { "b_id": { "type": "parent", "model": "b" } }
        });
        let schema: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(schema.model("a").unwrap()["b_id"].link_field, None);
    }

    #[test]
    fn unknown_kind_becomes_custom() {
        let json = serde_json::json!({
            "a": { "extra": { "type": "computed", "model": "b" } }
        });
        let schema: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(schema.model("a").unwrap()["extra"].kind, RelationKind::Custom);
    }

    #[test]
    fn undeclared_model_lookup() {
        let schema = Schema::new();
        assert!(schema.model("ghost").is_none());
        assert!(!schema.contains_model("ghost"));
    }
}
