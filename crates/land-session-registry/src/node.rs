// SPDX-License-Identifier: Apache-2.0
//! The identity of a single process hosting Lands in a multi-node
//! deployment.

use std::fmt;
use std::sync::Arc;

/// A stable identifier for one node (process) in a multi-node deployment,
/// distinct from any of `land-state`'s per-session identity newtypes: a
/// node hosts many sessions, across many Lands.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Wrap a string-like value as a node identity.
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
