//! Concurrent loading of named collections.
//!
//! `fetch_all` is the usual way to gather target collections from a data
//! store before handing them to `extend_async`:
//!
//! ```text
//! { "ranks": FetchSpec, "signs": FetchSpec.when(..) }  ──►  { "ranks": [..] }
//! ```
//!
//! Entries whose condition is false are left out of the result entirely.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::error::{Error, Result};
use crate::target::Condition;

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<T>>> + Send + Sync>;

pub struct FetchSpec<T> {
    fetch: FetchFn<T>,
    condition: Option<Condition>,
}

impl<T> Clone for FetchSpec<T> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
            condition: self.condition.clone(),
        }
    }
}

impl<T> fmt::Debug for FetchSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchSpec")
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> FetchSpec<T> {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move || fetch().boxed()),
            condition: None,
        }
    }

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
}

/// Run every entry concurrently and collect the results by name.
///
/// The first failing fetch (in iteration order) fails the whole call.
pub async fn fetch_all<T, K, I>(specs: I) -> Result<BTreeMap<String, Vec<T>>>
where
    I: IntoIterator<Item = (K, FetchSpec<T>)>,
    K: Into<String>,
{
    let pending = specs.into_iter().map(|(name, spec)| {
        let name = name.into();
        async move {
            if let Some(condition) = &spec.condition {
                if !condition.evaluate().await {
                    tracing::debug!(name = %name, "fetch skipped by condition");
                    return Ok(None);
                }
            }
            match (spec.fetch)().await {
                Ok(rows) => Ok(Some((name, rows))),
                Err(err) => {
                    tracing::error!(name = %name, error = %format!("{err:#}"), "fetch failed");
                    Err(Error::Fetch {
                        name,
                        source: err.into(),
                    })
                }
            }
        }
    });

    let mut out = BTreeMap::new();
    for fetched in join_all(pending).await {
        if let Some((name, rows)) = fetched? {
            out.insert(name, rows);
        }
    }
    Ok(out)
}
