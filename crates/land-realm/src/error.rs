// SPDX-License-Identifier: Apache-2.0
//! Errors the Realm's operations can produce.

use thiserror::Error;

/// Failure modes for [`crate::Realm`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealmError {
    /// `register` was called for a `landType` that already has at least
    /// one live Land; re-registering a type's factory while Keepers of
    /// that type are running is forbidden.
    #[error("land type {0:?} already has live instances, cannot re-register")]
    TypeInUse(String),

    /// `route` named a `landType` with no registered factory.
    #[error("unknown land type {0:?}")]
    UnknownType(String),

    /// `route` named a specific, not-yet-created `LandID` whose type does
    /// not allow auto-create-on-join.
    #[error("land {0} does not exist and auto-create is disabled for its type")]
    AutoCreateDisallowed(String),

    /// `route` or `remove` named a `LandID` that is not currently live.
    #[error("land {0} not found")]
    NotFound(String),

    /// The Land is already draining (a `remove` is in progress); no new
    /// routes are accepted until eviction completes.
    #[error("land {0} is draining")]
    Draining(String),
}
