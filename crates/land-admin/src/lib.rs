// SPDX-License-Identifier: Apache-2.0
//! A read/drain-only HTTP surface over a live `land-realm::Realm`:
//! list Lands, read one Land's stats or full state, and drain a Land on
//! demand. Not part of the client-facing transport —
//! `land-server` mounts this under an operator-only path.

mod auth;
mod response;
mod router;

pub use auth::{require_admin, AdminAuthConfig, AdminIdentity};
pub use router::{router, AdminState};
