//! Cycle-safe schema traversal.
//!
//! [`build_root_creator`] walks the declared relation graph from a root
//! model, assembling each reached model's hydration selector creator via the
//! factory and recursing into related models. Two pieces of per-call state
//! are threaded explicitly through the recursion, never shared globally:
//!
//! - a **visited-pair set** of unordered `{source, target}` model pairs,
//!   cloned into each branch so a pair is traversed at most once per path
//!   from the root (the cycle guard);
//! - a **creator cache** keyed by model name, shared across the whole
//!   top-level call so branches reaching the same model reuse the identical
//!   creator.
//!
//! Both are discarded when the top-level call returns; independent calls
//! from different roots never interfere.

use std::collections::{HashMap, HashSet};

use denorm_core::{RelationKind, Schema};

use crate::factory::{model_selector_creator, BoundRelation, ModelRelations, Projection, SelectorCreator};
use crate::memo::CollectionPolicy;

/// Unordered model pair, stored in canonical order.
type PairSet = HashSet<(String, String)>;

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Builds the hydration selector creator for `root` against `schema`.
///
/// A model absent from the schema -- the root included -- builds a
/// relation-less base creator rather than faulting: schema validation is an
/// external collaborator's responsibility.
pub fn build_root_creator(root: &str, schema: &Schema, policy: CollectionPolicy) -> SelectorCreator {
    let mut creators = HashMap::new();
    build(
        root,
        schema,
        policy,
        HashSet::new(),
        &mut creators,
        Projection::none(),
    )
}

fn build(
    root: &str,
    schema: &Schema,
    policy: CollectionPolicy,
    mut followed: PairSet,
    creators: &mut HashMap<String, SelectorCreator>,
    projection: Projection,
) -> SelectorCreator {
    let mut relations = ModelRelations::default();
    // Partition in a fixed order: single kinds first, then multi, then
    // reverse. Pair marks accumulate across the passes, so the first kind
    // to reach a target model wins the branch.
    bind_relations(
        root,
        schema,
        policy,
        &mut followed,
        creators,
        RelationKind::is_single,
        &mut relations.single,
    );
    bind_relations(
        root,
        schema,
        policy,
        &mut followed,
        creators,
        RelationKind::is_multi,
        &mut relations.multi,
    );
    bind_relations(
        root,
        schema,
        policy,
        &mut followed,
        creators,
        RelationKind::is_reverse,
        &mut relations.reverse,
    );

    let creator = model_selector_creator(root, relations, projection, policy);
    creators.insert(root.to_string(), creator.clone());
    creator
}

fn bind_relations(
    root: &str,
    schema: &Schema,
    policy: CollectionPolicy,
    followed: &mut PairSet,
    creators: &mut HashMap<String, SelectorCreator>,
    wanted: fn(RelationKind) -> bool,
    bucket: &mut Vec<BoundRelation>,
) {
    let Some(fields) = schema.model(root) else {
        return;
    };
    for (field, descriptor) in fields {
        if !wanted(descriptor.kind) {
            continue;
        }
        let pair = pair_key(root, &descriptor.target_model);
        if followed.contains(&pair) {
            // Cycle break: this model pair was already traversed on the
            // current path, so the relation is dropped from this branch.
            continue;
        }
        followed.insert(pair);

        let link_field = descriptor
            .link_field
            .clone()
            .unwrap_or_else(|| field.clone());
        let creator = match creators.get(&descriptor.target_model) {
            Some(existing) => existing.clone(),
            None => build(
                &descriptor.target_model,
                schema,
                policy,
                followed.clone(),
                creators,
                // The child must not re-emit the field this relation
                // already encodes on its side of the link.
                Projection::exclude([link_field.clone()]),
            ),
        };
        bucket.push(BoundRelation {
            field: field.clone(),
            target_model: descriptor.target_model.clone(),
            link_field,
            projection: Projection::none(),
            creator: Some(creator),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use denorm_core::{Record, RelationDescriptor, Store, Value};

    fn parent(target: &str, link: &str) -> RelationDescriptor {
        RelationDescriptor::new(RelationKind::Parent, target).link_field(link)
    }

    fn children(target: &str, link: &str) -> RelationDescriptor {
        RelationDescriptor::new(RelationKind::Children, target).link_field(link)
    }

    #[test]
    fn cyclic_schema_builds_and_does_not_reembed() {
        let schema = Schema::new()
            .with("a", "b", parent("b", "b_id"))
            .with("b", "as", children("a", "b_id"));

        let mut store = Store::new();
        store.insert("a", 1, Record::new().with("id", 1).with("b_id", 2));
        store.insert("b", 2, Record::new().with("id", 2).with("name", "bee"));

        let creator = build_root_creator("a", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(1).unwrap();
        let value = selector.eval(&store);
        let nested = value
            .as_record()
            .unwrap()
            .get("b")
            .and_then(Value::as_record)
            .unwrap();
        assert_eq!(nested.get("name"), Some(&Value::Str("bee".into())));
        // The back-relation was dropped on this path.
        assert!(!nested.contains_field("as"));
    }

    #[test]
    fn child_branch_excludes_the_link_field() {
        let schema = Schema::new().with("a", "hs", children("h", "a_id"));

        let mut store = Store::new();
        store.insert("a", 1, Record::new().with("id", 1));
        store.insert("h", 10, Record::new().with("id", 10).with("a_id", 1).with("x", 7));

        let creator = build_root_creator("a", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(1).unwrap();
        let value = selector.eval(&store);
        let hs = value.as_record().unwrap().get("hs").unwrap();
        let first = hs.as_list().unwrap()[0].as_record().unwrap();
        assert_eq!(first.get("id"), Some(&Value::Int(10)));
        assert_eq!(first.get("x"), Some(&Value::Int(7)));
        assert!(!first.contains_field("a_id"));
    }

    #[test]
    fn custom_kind_is_not_auto_traversed() {
        let mut schema = Schema::new();
        schema.declare(
            "a",
            "extra",
            RelationDescriptor::new(RelationKind::Custom, "b"),
        );

        let mut store = Store::new();
        store.insert("a", 1, Record::new().with("id", 1).with("extra", 2));
        store.insert("b", 2, Record::new().with("id", 2));

        let creator = build_root_creator("a", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(1).unwrap();
        let value = selector.eval(&store);
        // The raw field is untouched: no hydration for custom kinds.
        assert_eq!(value.as_record().unwrap().get("extra"), Some(&Value::Int(2)));
    }

    #[test]
    fn undeclared_model_degrades_to_a_base_creator() {
        let schema = Schema::new();
        let mut store = Store::new();
        store.insert("ghost", 4, Record::new().with("id", 4).with("v", 1));

        let creator = build_root_creator("ghost", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(4).unwrap();
        let value = selector.eval(&store);
        assert_eq!(value.as_record().unwrap().get("v"), Some(&Value::Int(1)));
    }

    #[test]
    fn self_relation_terminates() {
        let schema = Schema::new().with("a", "parent", parent("a", "parent_id"));

        let mut store = Store::new();
        store.insert("a", 1, Record::new().with("id", 1).with("parent_id", 2));
        store.insert("a", 2, Record::new().with("id", 2).with("parent_id", 0));

        let creator = build_root_creator("a", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(1).unwrap();
        let value = selector.eval(&store);
        let nested = value
            .as_record()
            .unwrap()
            .get("parent")
            .and_then(Value::as_record)
            .unwrap();
        assert_eq!(nested.get("id"), Some(&Value::Int(2)));
        // The recursion stopped after one level: {a, a} is already followed.
        assert!(!nested.contains_field("parent"));
    }

    #[test]
    fn missing_related_record_resolves_to_empty_record() {
        let schema = Schema::new().with("a", "b", parent("b", "b_id"));

        let mut store = Store::new();
        store.insert("a", 1, Record::new().with("id", 1).with("b_id", 42));

        let creator = build_root_creator("a", &schema, CollectionPolicy::Unordered);
        let selector = creator.create(1).unwrap();
        let value = selector.eval(&store);
        let nested = value
            .as_record()
            .unwrap()
            .get("b")
            .and_then(Value::as_record)
            .unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested.get("id"), Some(&Value::Int(42)));
    }
}
