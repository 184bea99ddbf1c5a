//! Per-root selector creator cache.
//!
//! A [`SelectorCache`] owns one immutable schema and lazily builds one
//! selector creator per requested root model, caching it for the cache's
//! lifetime. Repeated requests for the same root return a
//! reference-identical creator, so callers can layer their own memoization
//! on creator identity.

use std::cell::RefCell;

use indexmap::IndexMap;

use denorm_core::Schema;

use crate::factory::SelectorCreator;
use crate::memo::CollectionPolicy;
use crate::traverse::build_root_creator;

/// Lazily built, monotonically growing map of root model to creator.
#[derive(Debug)]
pub struct SelectorCache {
    schema: Schema,
    policy: CollectionPolicy,
    creators: RefCell<IndexMap<String, SelectorCreator>>,
}

impl SelectorCache {
    /// Creates a cache over `schema` with the default (unordered)
    /// collection policy.
    pub fn new(schema: Schema) -> Self {
        SelectorCache::with_policy(schema, CollectionPolicy::default())
    }

    /// Creates a cache with an explicit multi/reverse comparison policy.
    pub fn with_policy(schema: Schema, policy: CollectionPolicy) -> Self {
        SelectorCache {
            schema,
            policy,
            creators: RefCell::new(IndexMap::new()),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the selector creator for `root`, building it on first
    /// request. Entries are immutable once inserted.
    pub fn selector(&self, root: &str) -> SelectorCreator {
        if let Some(creator) = self.creators.borrow().get(root) {
            return creator.clone();
        }
        let creator = build_root_creator(root, &self.schema, self.policy);
        self.creators
            .borrow_mut()
            .insert(root.to_string(), creator.clone());
        creator
    }

    /// Number of distinct roots requested so far.
    pub fn len(&self) -> usize {
        self.creators.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.borrow().is_empty()
    }
}
