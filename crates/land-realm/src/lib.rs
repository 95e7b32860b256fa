// SPDX-License-Identifier: Apache-2.0
//! The process-wide multi-Land registry: per-type factories, routing with
//! auto-create-on-join, and the draining lifecycle a removed Land goes
//! through before eviction.

mod error;
mod factory;
mod realm;

pub use error::RealmError;
pub use factory::RegisteredType;
pub use realm::{LandStatus, Realm, RealmSummary};
