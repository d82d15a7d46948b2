//! Asynchronous batch driver.
//!
//! Same contract as the sync driver, except that the source collection,
//! conditions and targets may all be awaited. Every association's index is
//! built concurrently; attaching starts only once all of them are ready.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use relink_core::{AttachPlan, Item, Resolver};

use crate::assoc::{Associations, LinkContext, Slot};
use crate::error::{Error, ProducerError, Result};
use crate::extend::Extender;
use crate::target::{Deferred, Source, Target};

type SharedLoad = Shared<BoxFuture<'static, Result<Option<Arc<[Item]>>, ProducerError>>>;

/// Call-scoped cache: one in-flight load per producer identity.
#[derive(Default)]
struct TargetMemo {
    loads: Mutex<HashMap<usize, SharedLoad>>,
}

impl TargetMemo {
    fn load(&self, deferred: &Deferred) -> SharedLoad {
        self.loads
            .lock()
            .entry(deferred.id())
            .or_insert_with(|| {
                deferred
                    .load()
                    .map(|loaded| {
                        loaded
                            .map(|items| items.map(Arc::<[Item]>::from))
                            .map_err(ProducerError::from)
                    })
                    .boxed()
                    .shared()
            })
            .clone()
    }
}

impl Extender {
    /// Resolve `source`, run `declare`, and augment the collection.
    ///
    /// A failing producer shared by several associations is logged once,
    /// under the first association declared against it.
    pub async fn extend_async<S, F, Fut>(&self, source: S, declare: F) -> Result<Vec<Item>>
    where
        S: Into<Source>,
        F: FnOnce(LinkContext) -> Fut,
        Fut: Future<Output = Associations>,
    {
        let collection = source
            .into()
            .resolve()
            .await
            .map_err(|err| self.report(Error::Source(err.into())))?
            .unwrap_or_default();

        let assocs = declare(LinkContext::new(collection.as_slice().into())).await;
        let plan = self.plan_async(&assocs).await?;
        self.attach(&plan, collection)
    }

    async fn plan_async(&self, assocs: &Associations) -> Result<AttachPlan> {
        let memo = TargetMemo::default();
        let built = join_all(
            assocs
                .iter()
                .map(|(name, slot)| self.resolver_async(name, slot, &memo)),
        )
        .await;

        let mut plan = AttachPlan::new();
        for (name, resolver) in assocs.names().zip(built) {
            // Only the first failure in declaration order is reported.
            if let Some(resolver) = resolver.map_err(|err| self.report(err))? {
                plan.push(name, resolver);
            }
        }
        Ok(plan)
    }

    async fn resolver_async(
        &self,
        name: &str,
        slot: &Slot,
        memo: &TargetMemo,
    ) -> Result<Option<Resolver>> {
        let assoc = match slot {
            Slot::Computed(compute) => return Ok(Some(Resolver::Computed(compute.clone()))),
            Slot::Link(assoc) => assoc,
        };

        if let Some(condition) = assoc.condition() {
            if !condition.evaluate().await {
                self.skipped(name);
                return Ok(None);
            }
        }

        let items = match assoc.target() {
            Target::Absent => None,
            Target::Items(items) => Some(items.clone()),
            Target::Deferred(deferred) => {
                memo.load(deferred)
                    .await
                    .map_err(|source| Error::Target {
                        association: name.to_string(),
                        source,
                    })?
            }
        };

        Ok(Some(
            assoc.resolver(self.index(name, assoc, items.as_deref())),
        ))
    }
}

/// [`Extender::extend_async`] with default options and logger.
pub async fn extend_async<S, F, Fut>(source: S, declare: F) -> Result<Vec<Item>>
where
    S: Into<Source>,
    F: FnOnce(LinkContext) -> Fut,
    Fut: Future<Output = Associations>,
{
    Extender::default().extend_async(source, declare).await
}
