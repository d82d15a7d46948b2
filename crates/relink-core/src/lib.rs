//! relink-core: in-memory join engine
//!
//! The pieces every batch call is assembled from:
//!
//! ```text
//!   targets ──► JoinIndex (key value -> [target])  ─┐
//!                                                   ├─► AttachPlan ──► augmented items
//!   source items ──► KeyRef::values_in ─────────────┘
//! ```
//!
//! - [`value`]: `Record` / `Value` / `Item`, plus the serde bridge
//! - [`key`]: `KeyRef` field tokens and hashable `KeyValue`s
//! - [`index`]: `JoinIndex`, one per association per call
//! - [`attach`]: cardinality checks, transforms, envelopes, and the
//!   all-or-nothing write into the collection
//!
//! Descriptors, deferred targets and the public batch driver live in
//! `relink-extend`.

pub mod attach;
pub mod index;
pub mod key;
pub mod value;

pub use attach::{
    AttachMode, AttachPlan, Cardinality, CardinalityError, ComputeFn, Resolver, Transform,
    ENVELOPE_VALUE, ENVELOPE_VALUES,
};
pub use index::JoinIndex;
pub use key::{KeyRef, KeyValue};
pub use value::{from_items, items_from_json, to_items, Item, Record, Value, ValueError};
