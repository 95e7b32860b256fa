// SPDX-License-Identifier: Apache-2.0
//! The Keeper's closed error taxonomy.

use land_wire::ErrorCode;
use thiserror::Error;

/// A resolver failure, wrapped with the failing resolver's name before
/// it bubbles to the handler (`resolverFailed(name, underlying)`).
#[derive(Debug, Error)]
#[error("resolver {name:?} failed: {source}")]
pub struct ResolverError {
    /// The name of the resolver that failed.
    pub name: String,
    /// The underlying failure.
    #[source]
    pub source: anyhow::Error,
}

impl ResolverError {
    /// Wrap an underlying error with the resolver's name.
    pub fn wrap(name: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Errors a handler (action or client-event) run may produce. Every
/// variant here becomes exactly one `error` frame to the command's
/// originator; the Keeper continues running.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// `type_identifier` has no registered handler.
    #[error("unknown action type {0:?}")]
    UnknownAction(String),
    /// The handler rejected the payload on validation grounds.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A declared resolver failed before the handler body ran.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// An unexpected internal failure inside the handler body.
    #[error("internal handler error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// The closed wire [`ErrorCode`] this failure maps to.
    ///
    /// `ErrorCode`'s seven variants were not designed with a one-to-one
    /// slot for every handler-category failure; `UnknownAction` has a
    /// dedicated code, and `Validation`/`Resolver`
    /// share `Internal` — this does **not** imply Land termination, unlike
    /// the `Fatal` category's use of the same code for an invariant
    /// violation. See `DESIGN.md` for this resolved ambiguity.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownAction(_) => ErrorCode::UnknownAction,
            Self::Validation(_) | Self::Resolver(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Failure to process a `join` command.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The requesting `PlayerID` already has a joined session on this Land.
    #[error("player already joined")]
    AlreadyJoined,
    /// The Land is at its configured `maxPlayers` capacity.
    #[error("land is at capacity")]
    LandFull,
    /// The Keeper's command channel is gone (it has terminated).
    #[error("keeper is shutting down")]
    ShuttingDown,
}

impl JoinError {
    /// The closed wire [`ErrorCode`] this failure maps to.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyJoined => ErrorCode::InvalidFrame,
            Self::LandFull => ErrorCode::LandFull,
            Self::ShuttingDown => ErrorCode::Internal,
        }
    }
}

/// Failure to process an `action` or `clientEvent` command, or to reach a
/// live Keeper at all.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The handler itself failed; see [`HandlerError`].
    #[error(transparent)]
    Handler(#[from] HandlerError),
    /// The Keeper's command channel is gone (it has terminated).
    #[error("keeper is shutting down")]
    ShuttingDown,
}

impl ActionError {
    /// The closed wire [`ErrorCode`] this failure maps to.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Handler(h) => h.code(),
            Self::ShuttingDown => ErrorCode::Internal,
        }
    }
}
