use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Anything that can scope per-subject timer state.
pub trait Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Chat user identifier used as the default scheduling key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(pub i64);

impl From<i64> for SubjectKey {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
