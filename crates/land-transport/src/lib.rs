// SPDX-License-Identifier: Apache-2.0
//! The Transport Adapter: per-connection protocol state machine, join
//! negotiation, and per-Land fan-out/send batching for LandKeeper.

mod fanout;
mod gateway;
mod session;

pub use fanout::{FanoutRegistry, LandFanout, OutboundItem, SessionOutbox};
pub use gateway::{router, GatewayState};
pub use session::{GuestFactory, HandleOutcome, Session, TransportConfig};
