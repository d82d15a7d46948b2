//! Target collections, deferred producers and inclusion conditions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use relink_core::Item;

/// Outcome of loading a target: `None` stands for an absent collection.
pub type Loaded = anyhow::Result<Option<Vec<Item>>>;

/// Loads a target collection from somewhere outside the process, e.g. a
/// data store. Adapt with [`Deferred::from_source`].
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn load(&self) -> Loaded;
}

/// Things a producer may hand back.
pub trait IntoItems {
    fn into_items(self) -> Option<Vec<Item>>;
}

impl IntoItems for Vec<Item> {
    fn into_items(self) -> Option<Vec<Item>> {
        Some(self)
    }
}

impl IntoItems for Option<Vec<Item>> {
    fn into_items(self) -> Option<Vec<Item>> {
        self
    }
}

impl IntoItems for Arc<[Item]> {
    fn into_items(self) -> Option<Vec<Item>> {
        Some(self.to_vec())
    }
}

struct FnSource<F>(F);

#[async_trait]
impl<F, Fut, T> TargetSource for FnSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: IntoItems + Send,
{
    async fn load(&self) -> Loaded {
        Ok((self.0)().await?.into_items())
    }
}

type SyncProducer = dyn Fn() -> Loaded + Send + Sync;

#[derive(Clone)]
enum Producer {
    Sync(Arc<SyncProducer>),
    Async(Arc<dyn TargetSource>),
}

/// A zero-argument producer of a collection.
///
/// Clones share identity: associations built from clones of one `Deferred`
/// invoke it once per batch call.
#[derive(Clone)]
pub struct Deferred {
    producer: Producer,
}

impl Deferred {
    pub fn new<F, T>(produce: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: IntoItems,
    {
        Self::try_new(move || Ok(produce()))
    }

    pub fn try_new<F, T>(produce: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
        T: IntoItems,
    {
        Self {
            producer: Producer::Sync(Arc::new(move || -> Loaded { Ok(produce()?.into_items()) })),
        }
    }

    /// Async producer; only usable from `extend_async`.
    pub fn future<F, Fut, T>(produce: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: IntoItems + Send + 'static,
    {
        Self::from_source(Arc::new(FnSource(produce)))
    }

    pub fn from_source(source: Arc<dyn TargetSource>) -> Self {
        Self {
            producer: Producer::Async(source),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.producer, Producer::Async(_))
    }

    /// Identity shared by every clone.
    pub(crate) fn id(&self) -> usize {
        match &self.producer {
            Producer::Sync(f) => Arc::as_ptr(f).cast::<()>() as usize,
            Producer::Async(s) => Arc::as_ptr(s).cast::<()>() as usize,
        }
    }

    /// Run a sync producer; `None` for async ones.
    pub(crate) fn load_now(&self) -> Option<Loaded> {
        match &self.producer {
            Producer::Sync(f) => Some(f()),
            Producer::Async(_) => None,
        }
    }

    pub(crate) fn load(&self) -> BoxFuture<'static, Loaded> {
        match &self.producer {
            Producer::Sync(f) => futures::future::ready(f()).boxed(),
            Producer::Async(source) => {
                let source = Arc::clone(source);
                async move { source.load().await }.boxed()
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("async", &self.is_async())
            .finish()
    }
}

/// Target side of an association.
#[derive(Clone, Default)]
pub enum Target {
    /// No collection at all; behaves as "no matches".
    #[default]
    Absent,
    Items(Arc<[Item]>),
    Deferred(Deferred),
}

impl Target {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Target::Deferred(_))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Absent => f.write_str("Absent"),
            Target::Items(items) => write!(f, "Items({})", items.len()),
            Target::Deferred(d) => fmt::Debug::fmt(d, f),
        }
    }
}

impl From<Vec<Item>> for Target {
    fn from(items: Vec<Item>) -> Self {
        Target::Items(items.into())
    }
}

impl From<&Vec<Item>> for Target {
    fn from(items: &Vec<Item>) -> Self {
        Target::Items(items.as_slice().into())
    }
}

impl From<&[Item]> for Target {
    fn from(items: &[Item]) -> Self {
        Target::Items(items.into())
    }
}

impl From<Arc<[Item]>> for Target {
    fn from(items: Arc<[Item]>) -> Self {
        Target::Items(items)
    }
}

impl<T: Into<Target>> From<Option<T>> for Target {
    fn from(items: Option<T>) -> Self {
        items.map(Into::into).unwrap_or(Target::Absent)
    }
}

impl From<Deferred> for Target {
    fn from(deferred: Deferred) -> Self {
        Target::Deferred(deferred)
    }
}

impl From<&Deferred> for Target {
    fn from(deferred: &Deferred) -> Self {
        Target::Deferred(deferred.clone())
    }
}

/// Decides whether an association is evaluated at all for one call.
#[derive(Clone)]
pub enum Condition {
    Sync(Arc<dyn Fn() -> bool + Send + Sync>),
    Async(Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>),
}

impl Condition {
    pub fn new(pred: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Condition::Sync(Arc::new(pred))
    }

    pub fn new_async<F, Fut>(pred: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Condition::Async(Arc::new(move || pred().boxed()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Condition::Async(_))
    }

    pub(crate) fn evaluate_now(&self) -> Option<bool> {
        match self {
            Condition::Sync(pred) => Some(pred()),
            Condition::Async(_) => None,
        }
    }

    pub(crate) async fn evaluate(&self) -> bool {
        match self {
            Condition::Sync(pred) => pred(),
            Condition::Async(pred) => pred().await,
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() {
            "Condition::Async"
        } else {
            "Condition::Sync"
        })
    }
}

/// Source collection of an async batch call.
#[derive(Debug, Clone)]
pub enum Source {
    Items(Vec<Item>),
    Deferred(Deferred),
}

impl Source {
    /// `Ok(None)` when a deferred source produced no collection.
    pub(crate) async fn resolve(self) -> Loaded {
        match self {
            Source::Items(items) => Ok(Some(items)),
            Source::Deferred(deferred) => deferred.load().await,
        }
    }
}

impl From<Vec<Item>> for Source {
    fn from(items: Vec<Item>) -> Self {
        Source::Items(items)
    }
}

impl From<Deferred> for Source {
    fn from(deferred: Deferred) -> Self {
        Source::Deferred(deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_core::Record;

    #[test]
    fn clones_share_identity() {
        let a = Deferred::new(|| vec![Record::new().into_item()]);
        let b = a.clone();
        let c = Deferred::new(|| vec![Record::new().into_item()]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn sync_producer_runs_now_async_does_not() {
        let sync = Deferred::new(|| None::<Vec<Item>>);
        assert!(matches!(sync.load_now(), Some(Ok(None))));

        let not_now = Deferred::future(|| async { Ok(Vec::<Item>::new()) });
        assert!(not_now.is_async());
        assert!(not_now.load_now().is_none());
    }

    #[test]
    fn optional_collections_map_to_absent() {
        let none: Option<Vec<Item>> = None;
        assert!(matches!(Target::from(none), Target::Absent));
        let some = Some(vec![Record::new().into_item()]);
        assert!(matches!(Target::from(some), Target::Items(items) if items.len() == 1));
    }
}
