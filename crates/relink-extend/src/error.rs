use std::fmt;
use std::sync::Arc;

use relink_core::{CardinalityError, ValueError};

/// Failure of a deferred producer or fetch.
///
/// Memoized producers hand one outcome to every association that shares
/// them, so the underlying `anyhow::Error` sits behind an `Arc`.
#[derive(Clone)]
pub struct ProducerError(Arc<anyhow::Error>);

impl ProducerError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for ProducerError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Debug for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

// Display already prints the whole cause chain.
impl std::error::Error for ProducerError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cardinality(#[from] CardinalityError),

    #[error("failed to resolve target of association `{association}`: {source}")]
    Target {
        association: String,
        #[source]
        source: ProducerError,
    },

    #[error("failed to resolve source collection: {0}")]
    Source(#[source] ProducerError),

    #[error("association `{association}` has an async {what}; use `extend_async`")]
    RequiresAsync {
        association: String,
        what: &'static str,
    },

    #[error("fetch `{name}` failed: {source}")]
    Fetch {
        name: String,
        #[source]
        source: ProducerError,
    },

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl Error {
    /// Association the error belongs to, when there is one.
    pub fn association(&self) -> Option<&str> {
        match self {
            Error::Cardinality(err) => Some(&err.association),
            Error::Target { association, .. } | Error::RequiresAsync { association, .. } => {
                Some(association)
            }
            Error::Source(_) | Error::Fetch { .. } | Error::Value(_) => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
