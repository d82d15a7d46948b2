//! Synchronous batch driver.
//!
//! A call runs in three steps:
//! 1. the declaration callback turns a [`LinkContext`] into [`Associations`]
//! 2. every association that survives its condition gets a `JoinIndex`
//! 3. the resulting `AttachPlan` is applied to the whole collection
//!
//! Failures in step 2 or 3 are reported once through the injected
//! [`Logger`] and returned; the collection is never left half-augmented.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use relink_core::{AttachPlan, Item, JoinIndex, Resolver};

use crate::assoc::{Association, Associations, LinkContext, Slot};
use crate::error::{Error, Result};
use crate::logging::{default_logger, LogEvent, LogLevel, Logger};
use crate::options::ExtendOptions;
use crate::target::Target;

/// Batch driver configured with options and a logger.
#[derive(Clone)]
pub struct Extender {
    pub(crate) options: ExtendOptions,
    pub(crate) logger: Arc<dyn Logger>,
}

impl Default for Extender {
    fn default() -> Self {
        Self::new(ExtendOptions::default())
    }
}

impl fmt::Debug for Extender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extender")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Extender {
    pub fn new(options: ExtendOptions) -> Self {
        Self {
            options,
            logger: default_logger(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn options(&self) -> &ExtendOptions {
        &self.options
    }

    /// Augment `collection` with the associations returned by `declare`.
    ///
    /// With `mutate` off every item is a fresh shallow copy. With `mutate`
    /// on the same `Vec` comes back with its items written in place.
    pub fn extend<F>(&self, collection: Vec<Item>, declare: F) -> Result<Vec<Item>>
    where
        F: FnOnce(&LinkContext) -> Associations,
    {
        let assocs = declare(&LinkContext::new(collection.as_slice().into()));
        let plan = self.plan(&assocs)?;
        self.attach(&plan, collection)
    }

    /// Augment `items` in place regardless of the `mutate` option.
    pub fn extend_in_place<F>(&self, items: &mut [Item], declare: F) -> Result<()>
    where
        F: FnOnce(&LinkContext) -> Associations,
    {
        let assocs = declare(&LinkContext::new(Arc::from(&*items)));
        let plan = self.plan(&assocs)?;
        plan.apply(items, relink_core::AttachMode::InPlace)
            .map_err(|err| self.report(err.into()))
    }

    fn plan(&self, assocs: &Associations) -> Result<AttachPlan> {
        let mut loaded: HashMap<usize, Option<Arc<[Item]>>> = HashMap::new();
        let mut plan = AttachPlan::new();

        for (name, slot) in assocs.iter() {
            let assoc = match slot {
                Slot::Computed(compute) => {
                    plan.push(name, Resolver::Computed(compute.clone()));
                    continue;
                }
                Slot::Link(assoc) => assoc,
            };

            if let Some(condition) = assoc.condition() {
                match condition.evaluate_now() {
                    Some(true) => {}
                    Some(false) => {
                        self.skipped(name);
                        continue;
                    }
                    None => return Err(self.report(requires_async(name, "condition"))),
                }
            }

            let items = match assoc.target() {
                Target::Absent => None,
                Target::Items(items) => Some(items.clone()),
                Target::Deferred(deferred) => match loaded.get(&deferred.id()) {
                    Some(hit) => hit.clone(),
                    None => {
                        let result = deferred
                            .load_now()
                            .ok_or_else(|| self.report(requires_async(name, "target")))?;
                        let items = result
                            .map_err(|err| {
                                self.report(Error::Target {
                                    association: name.to_string(),
                                    source: err.into(),
                                })
                            })?
                            .map(Arc::<[Item]>::from);
                        loaded.insert(deferred.id(), items.clone());
                        items
                    }
                },
            };

            plan.push(name, assoc.resolver(self.index(name, assoc, items.as_deref())));
        }
        Ok(plan)
    }

    pub(crate) fn index(&self, name: &str, assoc: &Association, items: Option<&[Item]>) -> JoinIndex {
        let index = match items {
            Some(items) => JoinIndex::build(assoc.target_key().clone(), items),
            None => JoinIndex::empty(assoc.target_key().clone()),
        };
        let keys = index.len();
        let targets = index.target_count();
        self.logger.log(
            &LogEvent::new(LogLevel::Debug, "join index built")
                .association(name)
                .fields(&[("keys", &keys as &dyn fmt::Display), ("targets", &targets as &dyn fmt::Display)]),
        );
        index
    }

    pub(crate) fn attach(&self, plan: &AttachPlan, mut collection: Vec<Item>) -> Result<Vec<Item>> {
        let items = collection.len();
        let associations = plan.len();
        self.logger.log(
            &LogEvent::new(LogLevel::Debug, "attaching associations")
                .fields(&[
                    ("items", &items as &dyn fmt::Display),
                    ("associations", &associations as &dyn fmt::Display),
                ]),
        );

        if self.options.mutate {
            plan.apply(&mut collection, self.options.attach_mode())
                .map_err(|err| self.report(err.into()))?;
            Ok(collection)
        } else {
            plan.attach(&collection).map_err(|err| self.report(err.into()))
        }
    }

    pub(crate) fn skipped(&self, name: &str) {
        self.logger.log(
            &LogEvent::new(LogLevel::Debug, "association skipped by condition").association(name),
        );
    }

    /// Log `err` once and hand it back for propagation.
    pub(crate) fn report(&self, err: Error) -> Error {
        let mut event = LogEvent::new(LogLevel::Error, "extend failed").error(&err);
        if let Some(association) = err.association() {
            event = event.association(association);
        }
        self.logger.log(&event);
        err
    }
}

fn requires_async(name: &str, what: &'static str) -> Error {
    Error::RequiresAsync {
        association: name.to_string(),
        what,
    }
}

/// [`Extender::extend`] with default options and logger.
pub fn extend<F>(collection: Vec<Item>, declare: F) -> Result<Vec<Item>>
where
    F: FnOnce(&LinkContext) -> Associations,
{
    Extender::default().extend(collection, declare)
}
