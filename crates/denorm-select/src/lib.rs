//! Relation-aware memoized selector composition over a normalized store.
//!
//! Given a [`Schema`](denorm_core::Schema) of declared relations and a
//! normalized [`Store`](denorm_core::Store), this crate derives hydrated,
//! nested views: a [`SelectorCache`] hands out per-model
//! [`SelectorCreator`]s, a creator turns a record id into a [`Selector`],
//! and evaluating the selector against a store yields the record with every
//! declared relation field replaced by its resolved, recursively hydrated
//! value.
//!
//! Everything is memoized through single-slot [`EquivalenceMemo`]s that
//! compare by value, never by reference: evaluating against an equal store
//! returns the same shared output and performs no recomputation, while
//! edits propagate only along the relations that can actually observe them.
//!
//! # Modules
//!
//! - [`memo`]: EquivalenceMemo, the single-slot value-equality memo
//! - [`factory`]: Selector construction and the hydrate combinator
//! - [`traverse`]: cycle-safe schema traversal building creator trees
//! - [`cache`]: per-root creator cache
//! - [`error`]: SelectError

pub mod cache;
pub mod error;
pub mod factory;
pub mod memo;
pub mod traverse;

// Re-export the working surface.
pub use cache::SelectorCache;
pub use error::SelectError;
pub use factory::{
    base_selector, model_selector_creator, multi_relation_selector, relation_retriever,
    reverse_relation_selector, single_relation_selector, BoundRelation, ModelRelations,
    Projection, Selector, SelectorCreator,
};
pub use memo::{set_eq, CollectionPolicy, Equivalence, EquivalenceMemo};
pub use traverse::build_root_creator;
