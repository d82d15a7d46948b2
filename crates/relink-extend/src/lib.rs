//! relink-extend: attach associations to collections of records
//!
//! ```text
//! ┌────────────┐  declare(ctx) ┌──────────────┐  conditions,  ┌────────────┐
//! │ source     │──────────────►│ Associations │──targets────► │ JoinIndex  │
//! │ Vec<Item>  │               └──────────────┘  (awaited)    │ per assoc  │
//! └─────┬──────┘                                              └─────┬──────┘
//!       │                                                           │
//!       └───────────────► AttachPlan::apply / attach ◄──────────────┘
//!                                  │
//!                                  ▼
//!                        augmented Vec<Item>
//! ```
//!
//! ## Example
//!
//! ```
//! use relink_extend::{extend, Associations, Record};
//!
//! let users = vec![Record::new().with("id", 1).into_item()];
//! let ranks = vec![Record::new().with("userId", 1).with("rank", "Herald").into_item()];
//!
//! let out = extend(users, |ctx| {
//!     Associations::new().link("rank", ctx.link(ctx.own("id")).to_one_of(&ranks, "userId"))
//! })
//! .unwrap();
//!
//! let rank = out[0].get("rank").and_then(|r| r.get("value")).and_then(|r| r.get("rank"));
//! assert_eq!(rank.and_then(|v| v.as_str()), Some("Herald"));
//! ```
//!
//! ## Modules
//!
//! - [`assoc`]: descriptors, the `Link` builder and the declaration context
//! - [`target`]: target collections, deferred producers, conditions
//! - [`extend`] / [`extend_async`]: the batch drivers
//! - [`fetch`]: concurrent named loads (`fetch_all`)
//! - [`logging`]: the injectable logger
//! - [`options`]: per-call settings

pub mod assoc;
pub mod error;
pub mod extend;
pub mod extend_async;
pub mod fetch;
pub mod logging;
pub mod options;
pub mod target;

pub use assoc::{Association, Associations, Link, LinkContext, Slot};
pub use error::{Error, ProducerError, Result};
pub use extend::{extend, Extender};
pub use extend_async::extend_async;
pub use fetch::{fetch_all, FetchSpec};
pub use logging::{
    DefaultLogger, LogEvent, LogLevel, Logger, NullLogger, TracingLogger, WriterLogger,
};
pub use options::ExtendOptions;
pub use target::{Condition, Deferred, IntoItems, Source, Target, TargetSource};

pub use relink_core::{
    from_items, items_from_json, to_items, Cardinality, CardinalityError, Item, KeyRef, Record,
    Value,
};
