//! Selector construction: base lookups, projections, relation selectors,
//! and the hydration combinator.
//!
//! A [`Selector`] is a pure function from `&Store` to a shared `Rc<Value>`,
//! memoized through one [`EquivalenceMemo`]. Selectors compose: a selector's
//! inputs are either raw extractions against the store or other selectors,
//! so referential stability established at a leaf carries all the way up a
//! hydration tree.
//!
//! The free functions here mirror the selector kinds a relation schema
//! needs: a base (record + projection) selector, single / multi / reverse
//! relation selectors, and [`model_selector_creator`] which ties them
//! together through the hydrate combinator.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::{smallvec, SmallVec};

use denorm_core::{Record, RecordId, Store, Value, PK_FIELD};

use crate::error::SelectError;
use crate::memo::{CollectionPolicy, Equivalence, EquivalenceMemo, Inputs};

/// A raw input extraction against the store. Runs on every evaluation; the
/// memo decides afterwards whether anything downstream recomputes.
type Extract = Box<dyn Fn(&Store) -> Rc<Value>>;

/// A combining step over already-gathered inputs.
type Combine = Box<dyn Fn(&[Rc<Value>]) -> Rc<Value>>;

enum Source {
    Extract(Extract),
    Chain(Selector),
}

struct Inner {
    sources: Vec<Source>,
    combine: Combine,
    memo: EquivalenceMemo,
}

/// A memoized, shareable selector: `&Store -> Rc<Value>`.
///
/// Cloning a `Selector` clones a handle; both handles share the same memo
/// slot and recomputation counter. Evaluation is single-threaded by
/// contract -- wrap in external synchronization for multithreaded hosts.
#[derive(Clone)]
pub struct Selector {
    inner: Rc<Inner>,
}

impl Selector {
    fn from_parts(
        sources: Vec<Source>,
        input_eq: SmallVec<[Equivalence; 4]>,
        output_eq: Equivalence,
        combine: Combine,
    ) -> Selector {
        Selector {
            inner: Rc::new(Inner {
                sources,
                combine,
                memo: EquivalenceMemo::new(input_eq, output_eq),
            }),
        }
    }

    /// A selector that always yields `value`.
    pub fn constant(value: Value) -> Selector {
        let shared = Rc::new(value);
        Selector::from_parts(
            Vec::new(),
            smallvec![],
            Equivalence::Value,
            Box::new(move |_| shared.clone()),
        )
    }

    /// Evaluates against a store. Idempotent for value-equal stores: the
    /// same `Rc` comes back and the recomputation counter does not move.
    pub fn eval(&self, store: &Store) -> Rc<Value> {
        let inputs: Inputs = self
            .inner
            .sources
            .iter()
            .map(|source| match source {
                Source::Extract(extract) => extract(store),
                Source::Chain(selector) => selector.eval(store),
            })
            .collect();
        self.inner.memo.call(inputs, |inputs| (self.inner.combine)(inputs))
    }

    /// How many times this selector's combining step has run.
    pub fn recomputations(&self) -> u64 {
        self.inner.memo.recomputations()
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("inputs", &self.inner.sources.len())
            .field("recomputations", &self.recomputations())
            .finish()
    }
}

/// An include XOR exclude field filter applied to a base record.
///
/// If both lists are given, include is applied first and exclude subtracts
/// from the result. The primary-key field survives any projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl Projection {
    /// The pass-through projection.
    pub fn none() -> Self {
        Projection::default()
    }

    pub fn include(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Projection {
            include: Some(fields.into_iter().map(Into::into).collect()),
            exclude: None,
        }
    }

    pub fn exclude(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Projection {
            include: None,
            exclude: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    /// Adds an excluded field to an existing projection.
    pub fn and_exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude.get_or_insert_with(Vec::new).push(field.into());
        self
    }

    pub fn is_passthrough(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Applies the filter, always retaining [`PK_FIELD`].
    pub fn apply(&self, record: &Record) -> Record {
        if self.is_passthrough() {
            return record.clone();
        }
        record
            .fields()
            .filter(|(name, _)| {
                if *name == PK_FIELD {
                    return true;
                }
                let included = self
                    .include
                    .as_ref()
                    .map_or(true, |fields| fields.contains(*name));
                let excluded = self
                    .exclude
                    .as_ref()
                    .map_or(false, |fields| fields.contains(*name));
                included && !excluded
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// A schema relation bound to a concrete target selector creator.
///
/// Produced by traversal for declared relations, or built manually for
/// custom relations fed to [`relation_retriever`].
#[derive(Clone, Debug)]
pub struct BoundRelation {
    /// The field on the source record that receives the hydrated value.
    pub field: String,
    /// The related model.
    pub target_model: String,
    /// The foreign-key field: on the source for single/multi relations, on
    /// the target for reverse relations.
    pub link_field: String,
    /// Projection for the default target lookup when no creator is given.
    pub projection: Projection,
    /// Selector creator for the target model. `None` falls back to a plain
    /// base+projection lookup.
    pub creator: Option<SelectorCreator>,
}

impl BoundRelation {
    pub fn new(
        field: impl Into<String>,
        target_model: impl Into<String>,
        link_field: impl Into<String>,
    ) -> Self {
        BoundRelation {
            field: field.into(),
            target_model: target_model.into(),
            link_field: link_field.into(),
            projection: Projection::none(),
            creator: None,
        }
    }

    pub fn with_creator(mut self, creator: SelectorCreator) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

/// `id -> Selector` for one model. Shareable; the selector cache relies on
/// handle identity ([`SelectorCreator::ptr_eq`]) for its own memoization.
#[derive(Clone)]
pub struct SelectorCreator {
    inner: Rc<dyn Fn(&RecordId) -> Result<Selector, SelectError>>,
}

impl SelectorCreator {
    pub fn new(f: impl Fn(&RecordId) -> Result<Selector, SelectError> + 'static) -> Self {
        SelectorCreator { inner: Rc::new(f) }
    }

    /// Builds a selector for one record id.
    ///
    /// # Errors
    ///
    /// [`SelectError::InvalidId`] if the id is falsy.
    pub fn create(&self, id: impl Into<RecordId>) -> Result<Selector, SelectError> {
        let id = id.into();
        (self.inner)(&id)
    }

    /// Returns true when both handles share the same underlying creator.
    #[allow(clippy::vtable_address_comparisons)]
    pub fn ptr_eq(a: &SelectorCreator, b: &SelectorCreator) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for SelectorCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectorCreator")
    }
}

/// Selects `store[model][id]` through a projection.
///
/// A missing record yields an empty record carrying only the synthetic
/// primary key -- never null -- so downstream hydration stays total.
pub fn base_selector(model: &str, id: &RecordId, projection: &Projection) -> Selector {
    let model = model.to_string();
    let id = id.clone();
    let projection = projection.clone();
    let extract: Extract = Box::new(move |store| {
        let record = match store.record(&model, &id) {
            Some(record) => projection.apply(record),
            None => Record::new().with(PK_FIELD, id.clone()),
        };
        Rc::new(Value::Record(record))
    });
    Selector::from_parts(
        vec![Source::Extract(extract)],
        smallvec![Equivalence::Value],
        Equivalence::Value,
        Box::new(|inputs| inputs[0].clone()),
    )
}

/// The manual retrieval entry point: resolves one related record.
///
/// A falsy or absent id is tolerated absence -- the result is a constant
/// null selector, not an error. Otherwise the relation's creator is used
/// when present, falling back to a base+projection lookup on the target.
pub fn relation_retriever(relation: &BoundRelation, id: Option<&RecordId>) -> Selector {
    let id = match id {
        Some(id) if !id.is_falsy() => id,
        _ => return Selector::constant(Value::Null),
    };
    match &relation.creator {
        Some(creator) => creator
            .create(id.clone())
            .unwrap_or_else(|_| Selector::constant(Value::Null)),
        None => base_selector(&relation.target_model, id, &relation.projection),
    }
}

/// Selector for a single (parent/friend) relation of one source record.
///
/// Memo inputs are the foreign-id value and the resolved target value, so
/// recomputation happens only when the foreign key or the (possibly nested)
/// target changes. The retriever is rebuilt only when the foreign key
/// changes; while it is stable, nested memoization is preserved.
pub fn single_relation_selector(
    source_model: &str,
    id: &RecordId,
    relation: &BoundRelation,
) -> Selector {
    let fk_extract: Extract = {
        let model = source_model.to_string();
        let id = id.clone();
        let link_field = relation.link_field.clone();
        Box::new(move |store| {
            Rc::new(
                store
                    .field(&model, &id, &link_field)
                    .cloned()
                    .unwrap_or(Value::Null),
            )
        })
    };

    let resolve: Extract = {
        let model = source_model.to_string();
        let id = id.clone();
        let relation = relation.clone();
        let retriever: RefCell<Option<(Value, Selector)>> = RefCell::new(None);
        Box::new(move |store| {
            let fk_value = store
                .field(&model, &id, &relation.link_field)
                .cloned()
                .unwrap_or(Value::Null);
            let mut cached = retriever.borrow_mut();
            match &*cached {
                Some((previous, selector)) if *previous == fk_value => selector.eval(store),
                _ => {
                    let fk_id = RecordId::from_value(&fk_value);
                    let selector = relation_retriever(&relation, fk_id.as_ref());
                    let resolved = selector.eval(store);
                    *cached = Some((fk_value, selector));
                    resolved
                }
            }
        })
    };

    Selector::from_parts(
        vec![Source::Extract(fk_extract), Source::Extract(resolve)],
        smallvec![Equivalence::Value, Equivalence::Value],
        Equivalence::Value,
        Box::new(|inputs| inputs[1].clone()),
    )
}

/// Selector for a multi (friends) relation of one source record.
///
/// The ordered id list is the first memo input: adds, removals, and
/// reorders all trigger recomputation. The materialized collection is the
/// second; its downstream comparison follows the configured
/// [`CollectionPolicy`], so reorderings with identical contents do not
/// propagate further when the policy is unordered.
pub fn multi_relation_selector(
    source_model: &str,
    id: &RecordId,
    relation: &BoundRelation,
    policy: CollectionPolicy,
) -> Selector {
    let ids_extract: Extract = {
        let model = source_model.to_string();
        let id = id.clone();
        let link_field = relation.link_field.clone();
        Box::new(move |store| Rc::new(Value::List(link_ids(store, &model, &id, &link_field))))
    };

    let resolve: Extract = {
        let model = source_model.to_string();
        let id = id.clone();
        let relation = relation.clone();
        let retrievers: RefCell<Option<(Value, Vec<Selector>)>> = RefCell::new(None);
        Box::new(move |store| {
            let ids = link_ids(store, &model, &id, &relation.link_field);
            Rc::new(Value::List(resolve_all(&relation, &retrievers, ids, store)))
        })
    };

    Selector::from_parts(
        vec![Source::Extract(ids_extract), Source::Extract(resolve)],
        smallvec![Equivalence::Value, Equivalence::Value],
        Equivalence::Collection(policy),
        Box::new(|inputs| inputs[1].clone()),
    )
}

/// Selector for a reverse (children) relation of one source record.
///
/// Scans the target table in iteration order for records whose link field
/// equals the source id. The matched id sequence is the first memo input:
/// records newly matching, ceasing to match, or changing while matching all
/// invalidate it, while edits to never-matching records change neither
/// input. Hydration and downstream comparison follow the multi-relation
/// rules.
pub fn reverse_relation_selector(
    relation: &BoundRelation,
    id: &RecordId,
    policy: CollectionPolicy,
) -> Selector {
    let ids_extract: Extract = {
        let relation = relation.clone();
        let id = id.clone();
        Box::new(move |store| Rc::new(Value::List(scan_ids(store, &relation, &id))))
    };

    let resolve: Extract = {
        let relation = relation.clone();
        let id = id.clone();
        let retrievers: RefCell<Option<(Value, Vec<Selector>)>> = RefCell::new(None);
        Box::new(move |store| {
            let ids = scan_ids(store, &relation, &id);
            Rc::new(Value::List(resolve_all(&relation, &retrievers, ids, store)))
        })
    };

    Selector::from_parts(
        vec![Source::Extract(ids_extract), Source::Extract(resolve)],
        smallvec![Equivalence::Value, Equivalence::Value],
        Equivalence::Collection(policy),
        Box::new(|inputs| inputs[1].clone()),
    )
}

/// Reads the ordered foreign-id list of a multi relation; a missing or
/// non-list field reads as empty.
fn link_ids(store: &Store, model: &str, id: &RecordId, link_field: &str) -> Vec<Value> {
    match store.field(model, id, link_field) {
        Some(Value::List(ids)) => ids.clone(),
        _ => Vec::new(),
    }
}

/// Scans the target table of a reverse relation for back-references to
/// `id`, in table-iteration order.
fn scan_ids(store: &Store, relation: &BoundRelation, id: &RecordId) -> Vec<Value> {
    match store.table(&relation.target_model) {
        Some(table) => table
            .iter()
            .filter(|(_, record)| {
                record
                    .get(&relation.link_field)
                    .is_some_and(|value| id.matches(value))
            })
            .map(|(matched_id, _)| Value::from(matched_id.clone()))
            .collect(),
        None => Vec::new(),
    }
}

/// Resolves a list of foreign-id values through per-id retrievers, reusing
/// the retriever set while the id list is unchanged so nested memo slots
/// survive across evaluations.
fn resolve_all(
    relation: &BoundRelation,
    retrievers: &RefCell<Option<(Value, Vec<Selector>)>>,
    ids: Vec<Value>,
    store: &Store,
) -> Vec<Value> {
    let key = Value::List(ids.clone());
    let mut cached = retrievers.borrow_mut();
    let stale = !matches!(&*cached, Some((previous, _)) if *previous == key);
    if stale {
        let selectors = ids
            .iter()
            .map(|id_value| relation_retriever(relation, RecordId::from_value(id_value).as_ref()))
            .collect();
        *cached = Some((key, selectors));
    }
    match &*cached {
        Some((_, selectors)) => selectors
            .iter()
            .map(|selector| (*selector.eval(store)).clone())
            .collect(),
        None => Vec::new(),
    }
}

/// The relation groups feeding one model's hydration selector.
#[derive(Clone, Debug, Default)]
pub struct ModelRelations {
    pub single: Vec<BoundRelation>,
    pub multi: Vec<BoundRelation>,
    pub reverse: Vec<BoundRelation>,
}

/// Builds the `id -> Selector` creator for one model.
///
/// The returned selector hydrates: its output is a copy of the projected
/// base record with every relation's field set to its resolved value. The
/// inputs never mutate; recomputation happens only when the base record or
/// a relation-array value changes.
pub fn model_selector_creator(
    model: &str,
    relations: ModelRelations,
    projection: Projection,
    policy: CollectionPolicy,
) -> SelectorCreator {
    let model = model.to_string();
    SelectorCreator::new(move |id| {
        if id.is_falsy() {
            return Err(SelectError::InvalidId { id: id.clone() });
        }

        let base = base_selector(&model, id, &projection);
        let single = relation_array_selector(
            relations
                .single
                .iter()
                .map(|relation| single_relation_selector(&model, id, relation))
                .collect(),
        );
        let multi = relation_array_selector(
            relations
                .multi
                .iter()
                .map(|relation| multi_relation_selector(&model, id, relation, policy))
                .collect(),
        );
        let reverse = relation_array_selector(
            relations
                .reverse
                .iter()
                .map(|relation| reverse_relation_selector(relation, id, policy))
                .collect(),
        );

        let field_groups: [Vec<String>; 3] = [
            relations.single.iter().map(|r| r.field.clone()).collect(),
            relations.multi.iter().map(|r| r.field.clone()).collect(),
            relations.reverse.iter().map(|r| r.field.clone()).collect(),
        ];
        Ok(hydrate_selector(base, single, multi, reverse, field_groups))
    })
}

/// Groups per-relation selectors into one array-valued selector so the
/// hydrate combinator sees a single input per relation kind.
fn relation_array_selector(children: Vec<Selector>) -> Selector {
    let count = children.len();
    Selector::from_parts(
        children.into_iter().map(Source::Chain).collect(),
        smallvec![Equivalence::Value; count],
        Equivalence::Value,
        Box::new(|inputs| {
            Rc::new(Value::List(
                inputs.iter().map(|value| (**value).clone()).collect(),
            ))
        }),
    )
}

/// The hydration combinator: copies the base record and sets each declared
/// relation field to its resolved value. Never mutates its inputs.
fn hydrate_selector(
    base: Selector,
    single: Selector,
    multi: Selector,
    reverse: Selector,
    field_groups: [Vec<String>; 3],
) -> Selector {
    Selector::from_parts(
        vec![
            Source::Chain(base),
            Source::Chain(single),
            Source::Chain(multi),
            Source::Chain(reverse),
        ],
        smallvec![Equivalence::Value; 4],
        Equivalence::Value,
        Box::new(move |inputs| {
            let mut record = match &*inputs[0] {
                Value::Record(record) => record.clone(),
                _ => Record::new(),
            };
            for (group, fields) in field_groups.iter().enumerate() {
                if let Value::List(values) = &*inputs[group + 1] {
                    for (field, value) in fields.iter().zip(values) {
                        record.set(field.clone(), value.clone());
                    }
                }
            }
            Rc::new(Value::Record(record))
        }),
    )
}
