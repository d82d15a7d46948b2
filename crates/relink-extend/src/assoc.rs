//! Association descriptors and the builder surface that produces them.
//!
//! ```text
//! ctx.link(ctx.own("id"))            // Link bound to the source key
//!    .to_many_of(&signs, "userId")   // Association { Many, id -> userId }
//!    .when(|| include_signs)         // optional condition
//!    .through(|v| ...)               // composed transform
//!    .unwrapped()                    // store the value without an envelope
//! ```
//!
//! Nothing is matched here; validation happens when the batch runs.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use relink_core::{Cardinality, ComputeFn, Item, JoinIndex, KeyRef, Record, Resolver, Transform, Value};

use crate::target::{Condition, Target};

/// One requested join.
#[derive(Clone)]
pub struct Association {
    cardinality: Cardinality,
    source_key: KeyRef,
    target: Target,
    target_key: KeyRef,
    condition: Option<Condition>,
    transform: Option<Transform>,
    envelope: bool,
}

impl Association {
    pub fn new(
        cardinality: Cardinality,
        source_key: impl Into<KeyRef>,
        target: impl Into<Target>,
        target_key: impl Into<KeyRef>,
    ) -> Self {
        Self {
            cardinality,
            source_key: source_key.into(),
            target: target.into(),
            target_key: target_key.into(),
            condition: None,
            transform: None,
            envelope: true,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn source_key(&self) -> &KeyRef {
        &self.source_key
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn target_key(&self) -> &KeyRef {
        &self.target_key
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.envelope
    }

    /// Store the result directly instead of inside `{value}` / `{values}`.
    pub fn unwrapped(mut self) -> Self {
        self.envelope = false;
        self
    }

    /// Only evaluate the association when `pred` holds. Replaces any
    /// earlier condition.
    pub fn when(mut self, pred: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Condition::new(pred));
        self
    }

    pub fn when_async<F, Fut>(mut self, pred: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.condition = Some(Condition::new_async(pred));
        self
    }

    /// Apply `f` after any transform already attached.
    pub fn through(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        let next: Transform = match self.transform.take() {
            None => Arc::new(f),
            Some(prev) => Arc::new(move |value| f(prev(value))),
        };
        self.transform = Some(next);
        self
    }

    pub(crate) fn resolver(&self, index: JoinIndex) -> Resolver {
        Resolver::Join {
            cardinality: self.cardinality,
            source_key: self.source_key.clone(),
            index,
            transform: self.transform.clone(),
            envelope: self.envelope,
        }
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("cardinality", &self.cardinality)
            .field("source_key", &self.source_key)
            .field("target", &self.target)
            .field("target_key", &self.target_key)
            .field("condition", &self.condition)
            .field("transform", &self.transform.is_some())
            .field("envelope", &self.envelope)
            .finish()
    }
}

/// Builder entry bound to one source key.
#[derive(Debug, Clone)]
pub struct Link {
    source_key: KeyRef,
}

impl Link {
    pub fn new(source_key: impl Into<KeyRef>) -> Self {
        Self {
            source_key: source_key.into(),
        }
    }

    pub fn to_one_of(&self, target: impl Into<Target>, target_key: impl Into<KeyRef>) -> Association {
        Association::new(Cardinality::ExactlyOne, &self.source_key, target, target_key)
    }

    pub fn to_one_or_none_of(
        &self,
        target: impl Into<Target>,
        target_key: impl Into<KeyRef>,
    ) -> Association {
        Association::new(Cardinality::AtMostOne, &self.source_key, target, target_key)
    }

    pub fn to_many_of(&self, target: impl Into<Target>, target_key: impl Into<KeyRef>) -> Association {
        Association::new(Cardinality::Many, &self.source_key, target, target_key)
    }
}

#[derive(Clone)]
pub enum Slot {
    Link(Association),
    /// Computed from the source record alone; no index involved.
    Computed(ComputeFn),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Link(assoc) => fmt::Debug::fmt(assoc, f),
            Slot::Computed(_) => f.write_str("Computed"),
        }
    }
}

impl From<Association> for Slot {
    fn from(assoc: Association) -> Self {
        Slot::Link(assoc)
    }
}

/// Named association slots, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Associations {
    slots: Vec<(String, Slot)>,
}

impl Associations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, name: impl Into<String>, assoc: Association) -> Self {
        self.insert(name, Slot::Link(assoc));
        self
    }

    pub fn computed(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.insert(name, Slot::Computed(Arc::new(compute)));
        self
    }

    /// Re-declaring a name replaces the earlier slot in place.
    pub fn insert(&mut self, name: impl Into<String>, slot: Slot) {
        let name = name.into();
        match self.slots.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = slot,
            None => self.slots.push((name, slot)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K: Into<String>, S: Into<Slot>> FromIterator<(K, S)> for Associations {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (name, slot) in iter {
            out.insert(name, slot.into());
        }
        out
    }
}

/// What the association declaration callback gets to work with.
#[derive(Debug, Clone)]
pub struct LinkContext {
    collection: Arc<[Item]>,
}

impl LinkContext {
    pub(crate) fn new(collection: Arc<[Item]>) -> Self {
        Self { collection }
    }

    /// Key-reference token for a field of the source items.
    pub fn own(&self, field: impl Into<KeyRef>) -> KeyRef {
        field.into()
    }

    /// Tokens for every field present on at least one source item.
    pub fn fields(&self) -> BTreeSet<KeyRef> {
        self.collection
            .iter()
            .flat_map(|item| item.field_names().map(KeyRef::new).collect::<Vec<_>>())
            .collect()
    }

    pub fn link(&self, source_key: impl Into<KeyRef>) -> Link {
        Link::new(source_key)
    }

    /// The resolved source collection, before augmentation.
    pub fn collection(&self) -> &[Item] {
        &self.collection
    }
}
