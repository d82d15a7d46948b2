//! JoinIndex: equality multi-map over one target collection.
//!
//! Built once per association per batch call so that attaching `n` source
//! items against `m` targets costs `O(n + m)` rather than `O(n * m)`.

use ahash::AHashMap;

use crate::key::{KeyRef, KeyValue};
use crate::value::Item;

#[derive(Debug, Clone)]
pub struct JoinIndex {
    key: KeyRef,
    /// `key value -> targets`, each list in target collection order.
    buckets: AHashMap<KeyValue, Vec<Item>>,
    target_count: usize,
}

impl JoinIndex {
    /// Index with no entries; every lookup misses.
    pub fn empty(key: KeyRef) -> Self {
        Self {
            key,
            buckets: AHashMap::new(),
            target_count: 0,
        }
    }

    pub fn build(key: KeyRef, targets: &[Item]) -> Self {
        let mut out = Self::empty(key);
        out.target_count = targets.len();

        for target in targets {
            // A target with several key values lands in several buckets.
            for value in out.key.values_in(target) {
                out.buckets.entry(value).or_default().push(target.clone());
            }
        }
        out
    }

    pub fn key(&self) -> &KeyRef {
        &self.key
    }

    /// Targets filed under one key value.
    pub fn get(&self, value: &KeyValue) -> &[Item] {
        self.buckets.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Concatenated matches for every value, in the order given.
    ///
    /// Overlapping values produce duplicate entries.
    pub fn matches(&self, values: &[KeyValue]) -> Vec<Item> {
        let mut out = Vec::new();
        for value in values {
            out.extend(self.get(value).iter().cloned());
        }
        out
    }

    /// Number of distinct key values.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Size of the collection the index was built from.
    pub fn target_count(&self) -> usize {
        self.target_count
    }
}
