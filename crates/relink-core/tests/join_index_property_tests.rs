use std::sync::Arc;

use proptest::prelude::*;
use relink_core::{
    AttachPlan, Cardinality, Item, JoinIndex, KeyRef, KeyValue, Record, Resolver, Value,
    ENVELOPE_VALUES,
};

#[derive(Debug, Clone)]
struct Rows {
    /// (id, key) pairs of the source side; `None` leaves the key missing.
    sources: Vec<(i64, Option<i64>)>,
    /// Target key values; a list entry means a multi-valued key.
    targets: Vec<Vec<i64>>,
}

fn rows_strategy() -> impl Strategy<Value = Rows> {
    let sources = prop::collection::vec((0i64..64, prop::option::of(0i64..6)), 0..=12);
    // Distinct values per target so each target sits in a bucket once.
    let key = prop::collection::btree_set(0i64..6, 1..=3)
        .prop_map(|k| k.into_iter().collect::<Vec<i64>>());
    let targets = prop::collection::vec(key, 0..=16);
    (sources, targets).prop_map(|(sources, targets)| Rows { sources, targets })
}

fn build_targets(keys: &[Vec<i64>]) -> Vec<Item> {
    keys.iter()
        .enumerate()
        .map(|(pos, key)| {
            let key = if key.len() == 1 {
                Value::Int(key[0])
            } else {
                Value::List(key.iter().copied().map(Value::Int).collect())
            };
            Record::new().with("pos", pos as i64).with("key", key).into_item()
        })
        .collect()
}

fn build_sources(rows: &[(i64, Option<i64>)]) -> Vec<Item> {
    rows.iter()
        .map(|(id, key)| {
            let mut record = Record::new().with("id", *id);
            if let Some(key) = key {
                record.insert("key", *key);
            }
            record.into_item()
        })
        .collect()
}

fn naive_matches(targets: &[Item], value: i64) -> Vec<Item> {
    targets
        .iter()
        .filter(|t| match t.get("key") {
            Some(Value::Int(k)) => *k == value,
            Some(Value::List(ks)) => ks.contains(&Value::Int(value)),
            _ => false,
        })
        .cloned()
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn index_lookups_match_naive_scan(rows in rows_strategy()) {
        let targets = build_targets(&rows.targets);
        let index = JoinIndex::build(KeyRef::new("key"), &targets);
        prop_assert_eq!(index.target_count(), targets.len());

        for value in 0i64..6 {
            let expected = naive_matches(&targets, value);
            let actual = index.get(&KeyValue::Int(value));
            prop_assert_eq!(actual.len(), expected.len());
            for (a, e) in actual.iter().zip(&expected) {
                prop_assert!(Arc::ptr_eq(a, e));
            }
        }
    }

    #[test]
    fn many_attaches_every_match_and_leaves_input_alone(rows in rows_strategy()) {
        let targets = build_targets(&rows.targets);
        let sources = build_sources(&rows.sources);
        let before: Vec<Record> = sources.iter().map(|s| Record::clone(s)).collect();

        let mut plan = AttachPlan::new();
        plan.push(
            "matches",
            Resolver::Join {
                cardinality: Cardinality::Many,
                source_key: KeyRef::new("key"),
                index: JoinIndex::build(KeyRef::new("key"), &targets),
                transform: None,
                envelope: true,
            },
        );
        let out = plan.attach(&sources).expect("many never fails");

        prop_assert_eq!(out.len(), sources.len());
        for ((row, item), original) in rows.sources.iter().zip(&out).zip(&before) {
            let values = item
                .get("matches")
                .and_then(|m| m.get(ENVELOPE_VALUES))
                .and_then(Value::as_list)
                .expect("envelope with values");
            let expected = row.1.map(|k| naive_matches(&targets, k).len()).unwrap_or(0);
            prop_assert_eq!(values.len(), expected);

            for (field, value) in original.fields() {
                prop_assert_eq!(item.get(field), Some(value));
            }
        }
        for (source, original) in sources.iter().zip(&before) {
            prop_assert_eq!(&**source, original);
        }
    }

    #[test]
    fn singular_cardinalities_agree_with_match_count(rows in rows_strategy()) {
        let targets = build_targets(&rows.targets);
        let sources = build_sources(&rows.sources);

        for cardinality in [Cardinality::ExactlyOne, Cardinality::AtMostOne] {
            let mut plan = AttachPlan::new();
            plan.push(
                "one",
                Resolver::Join {
                    cardinality,
                    source_key: KeyRef::new("key"),
                    index: JoinIndex::build(KeyRef::new("key"), &targets),
                    transform: None,
                    envelope: false,
                },
            );

            let counts: Vec<usize> = rows
                .sources
                .iter()
                .map(|(_, key)| key.map(|k| naive_matches(&targets, k).len()).unwrap_or(0))
                .collect();
            let ok = counts.iter().all(|&n| match cardinality {
                Cardinality::ExactlyOne => n == 1,
                _ => n <= 1,
            });

            match plan.attach(&sources) {
                Ok(out) => {
                    prop_assert!(ok);
                    for (item, n) in out.iter().zip(&counts) {
                        let value = item.get("one").expect("field written");
                        prop_assert_eq!(value.is_null(), *n == 0);
                    }
                }
                Err(err) => {
                    prop_assert!(!ok);
                    prop_assert_eq!(err.cardinality, cardinality);
                    prop_assert_eq!(err.association.as_str(), "one");
                }
            }
        }
    }
}
