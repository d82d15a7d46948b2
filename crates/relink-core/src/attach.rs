//! Attach engine: resolve associations for every item of a collection.
//!
//! An [`AttachPlan`] holds one resolver per association field. Resolution of
//! the whole collection happens before anything is written, so a cardinality
//! failure leaves the caller's items untouched.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::JoinIndex;
use crate::key::KeyRef;
use crate::value::{Item, Record, Value};

/// Post-processing applied to matched targets.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A field computed straight from the source record, without an index.
pub type ComputeFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

pub const ENVELOPE_VALUE: &str = "value";
pub const ENVELOPE_VALUES: &str = "values";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    ExactlyOne,
    AtMostOne,
    Many,
}

impl Cardinality {
    pub fn is_singular(self) -> bool {
        !matches!(self, Cardinality::Many)
    }

    /// Field name of the envelope record.
    pub fn envelope_field(self) -> &'static str {
        if self.is_singular() {
            ENVELOPE_VALUE
        } else {
            ENVELOPE_VALUES
        }
    }

    pub fn check(self, association: &str, found: usize) -> Result<(), CardinalityError> {
        let ok = match self {
            Cardinality::ExactlyOne => found == 1,
            Cardinality::AtMostOne => found <= 1,
            Cardinality::Many => true,
        };
        if ok {
            Ok(())
        } else {
            Err(CardinalityError {
                association: association.to_string(),
                cardinality: self,
                found,
            })
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::ExactlyOne => "exactly one",
            Cardinality::AtMostOne => "at most one",
            Cardinality::Many => "any number of",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {cardinality} target for association `{association}` but found {found}")]
pub struct CardinalityError {
    pub association: String,
    pub cardinality: Cardinality,
    pub found: usize,
}

/// How a plan writes into the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachMode {
    /// Shallow-copy every item, leaving the input untouched.
    #[default]
    Copy,
    /// Write into the items themselves (copy-on-write for shared `Arc`s).
    InPlace,
}

pub enum Resolver {
    Join {
        cardinality: Cardinality,
        source_key: KeyRef,
        index: JoinIndex,
        transform: Option<Transform>,
        envelope: bool,
    },
    Computed(ComputeFn),
}

impl Resolver {
    pub fn resolve(&self, association: &str, item: &Record) -> Result<Value, CardinalityError> {
        match self {
            Resolver::Computed(compute) => Ok(compute(item)),
            Resolver::Join {
                cardinality,
                source_key,
                index,
                transform,
                envelope,
            } => {
                let keys = source_key.values_in(item);
                let mut matched = index.matches(&keys);
                cardinality.check(association, matched.len())?;

                let raw = if cardinality.is_singular() {
                    matched.pop().map(Value::Record).unwrap_or(Value::Null)
                } else {
                    Value::List(matched.into_iter().map(Value::Record).collect())
                };
                let value = match transform {
                    Some(f) => f(raw),
                    None => raw,
                };

                if *envelope {
                    Ok(Record::new().with(cardinality.envelope_field(), value).into())
                } else {
                    Ok(value)
                }
            }
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Join {
                cardinality,
                source_key,
                index,
                transform,
                envelope,
            } => f
                .debug_struct("Join")
                .field("cardinality", cardinality)
                .field("source_key", source_key)
                .field("target_key", index.key())
                .field("keys", &index.len())
                .field("transform", &transform.is_some())
                .field("envelope", envelope)
                .finish(),
            Resolver::Computed(_) => f.write_str("Computed"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AttachPlan {
    resolvers: Vec<(String, Resolver)>,
}

impl AttachPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, association: impl Into<String>, resolver: Resolver) {
        self.resolvers.push((association.into(), resolver));
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn associations(&self) -> impl Iterator<Item = &str> {
        self.resolvers.iter().map(|(name, _)| name.as_str())
    }

    /// Association values for one item, in plan order.
    pub fn resolve_item(&self, item: &Record) -> Result<Vec<Value>, CardinalityError> {
        self.resolvers
            .iter()
            .map(|(name, resolver)| resolver.resolve(name, item))
            .collect()
    }

    /// Resolve every item, then write the results.
    pub fn apply(&self, items: &mut [Item], mode: AttachMode) -> Result<(), CardinalityError> {
        let staged = items
            .iter()
            .map(|item| self.resolve_item(item))
            .collect::<Result<Vec<_>, _>>()?;

        for (item, values) in items.iter_mut().zip(staged) {
            match mode {
                AttachMode::InPlace => self.write(Arc::make_mut(item), values),
                AttachMode::Copy => {
                    let mut record = Record::clone(item);
                    self.write(&mut record, values);
                    *item = Arc::new(record);
                }
            }
        }
        Ok(())
    }

    /// Copying variant of [`AttachPlan::apply`].
    pub fn attach(&self, items: &[Item]) -> Result<Vec<Item>, CardinalityError> {
        let staged = items
            .iter()
            .map(|item| self.resolve_item(item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items
            .iter()
            .zip(staged)
            .map(|(item, values)| {
                let mut record = Record::clone(item);
                self.write(&mut record, values);
                Arc::new(record)
            })
            .collect())
    }

    fn write(&self, record: &mut Record, values: Vec<Value>) {
        for ((name, _), value) in self.resolvers.iter().zip(values) {
            record.insert(name.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<Item> {
        vec![
            Record::new().with("id", 1).into_item(),
            Record::new().with("id", 2).into_item(),
        ]
    }

    fn ranks() -> Vec<Item> {
        vec![
            Record::new().with("userId", 1).with("rank", "Arch Lord").into_item(),
            Record::new().with("userId", 2).with("rank", "Herald").into_item(),
        ]
    }

    fn join(cardinality: Cardinality, targets: &[Item], envelope: bool) -> Resolver {
        Resolver::Join {
            cardinality,
            source_key: KeyRef::new("id"),
            index: JoinIndex::build(KeyRef::new("userId"), targets),
            transform: None,
            envelope,
        }
    }

    #[test]
    fn exactly_one_wraps_the_single_match() {
        let ranks = ranks();
        let mut plan = AttachPlan::new();
        plan.push("rank", join(Cardinality::ExactlyOne, &ranks, true));

        let out = plan.attach(&users()).unwrap();
        let value = out[1].get("rank").and_then(|r| r.get(ENVELOPE_VALUE)).unwrap();
        assert!(Arc::ptr_eq(value.as_record().unwrap(), &ranks[1]));
    }

    #[test]
    fn exactly_one_rejects_missing_match() {
        let ranks = vec![ranks().remove(0)];
        let mut plan = AttachPlan::new();
        plan.push("rank", join(Cardinality::ExactlyOne, &ranks, true));

        let err = plan.attach(&users()).unwrap_err();
        assert_eq!(err.association, "rank");
        assert_eq!(err.found, 0);
        assert_eq!(
            err.to_string(),
            "expected exactly one target for association `rank` but found 0"
        );
    }

    #[test]
    fn at_most_one_yields_null_for_no_match() {
        let ranks = vec![ranks().remove(0)];
        let mut plan = AttachPlan::new();
        plan.push("rank", join(Cardinality::AtMostOne, &ranks, true));

        let out = plan.attach(&users()).unwrap();
        let envelope = out[1].get("rank").and_then(Value::as_record).unwrap();
        assert_eq!(envelope.get(ENVELOPE_VALUE), Some(&Value::Null));
    }

    #[test]
    fn transform_sees_the_matched_list() {
        let mut ranks = ranks();
        ranks.push(Record::new().with("userId", 1).with("rank", "Underlord").into_item());
        let mut plan = AttachPlan::new();
        plan.push(
            "rankCount",
            Resolver::Join {
                cardinality: Cardinality::Many,
                source_key: KeyRef::new("id"),
                index: JoinIndex::build(KeyRef::new("userId"), &ranks),
                transform: Some(Arc::new(|v: Value| {
                    Value::Int(v.as_list().map_or(0, |l| l.len() as i64))
                })),
                envelope: false,
            },
        );

        let out = plan.attach(&users()).unwrap();
        assert_eq!(out[0].get("rankCount"), Some(&Value::Int(2)));
        assert_eq!(out[1].get("rankCount"), Some(&Value::Int(1)));
    }

    #[test]
    fn failed_in_place_apply_leaves_items_untouched() {
        let mut ranks = ranks();
        ranks.push(Record::new().with("userId", 2).with("rank", "Sage").into_item());
        let mut plan = AttachPlan::new();
        plan.push("rank", join(Cardinality::AtMostOne, &ranks, false));

        let mut items = users();
        let err = plan.apply(&mut items, AttachMode::InPlace).unwrap_err();
        assert_eq!(err.found, 2);
        assert!(items.iter().all(|item| !item.contains_field("rank")));
    }

    #[test]
    fn computed_resolver_reads_the_item() {
        let mut plan = AttachPlan::new();
        plan.push(
            "double",
            Resolver::Computed(Arc::new(|r: &Record| {
                Value::Int(r.get("id").and_then(Value::as_i64).unwrap_or(0) * 2)
            })),
        );
        let mut items = users();
        plan.apply(&mut items, AttachMode::InPlace).unwrap();
        assert_eq!(items[1].get("double"), Some(&Value::Int(4)));
    }
}
