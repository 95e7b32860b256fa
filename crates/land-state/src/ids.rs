// SPDX-License-Identifier: Apache-2.0
//! Identity newtypes shared across the workspace.
//!
//! `LandId`, `PlayerId`, `ClientId`, and `SessionId` are four disjoint
//! identity layers. They live here — below `land-sync`, `land-keeper`,
//! `land-realm`, and `land-transport` in the dependency graph — purely
//! for type-checking reasons: `land-keeper` calls into `land-sync` during
//! its tick, so the two cannot depend on each other, and both need these
//! types. Distinct newtypes (rather than passing `String`/`u64` around)
//! mean the type system rejects accidentally handing a `ClientId` where
//! a `PlayerId` is expected.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Stable identifier of form `landType:instanceId`. Parse is
/// total: a string with no `:` is a pure type with an empty instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LandId {
    land_type: Arc<str>,
    instance_id: Arc<str>,
}

impl LandId {
    /// Build a `LandId` from its two parts directly, without going
    /// through the `:`-joined wire form.
    pub fn new(land_type: impl Into<Arc<str>>, instance_id: impl Into<Arc<str>>) -> Self {
        Self {
            land_type: land_type.into(),
            instance_id: instance_id.into(),
        }
    }

    /// The room template this id names.
    #[must_use]
    pub fn land_type(&self) -> &str {
        &self.land_type
    }

    /// The concrete instance this id selects; empty for a pure-type id.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// `true` if this id carries no instance (a bare `landType`, used by
    /// `Realm::route` requests that ask for auto-allocation).
    #[must_use]
    pub fn has_no_instance(&self) -> bool {
        self.instance_id.is_empty()
    }

    /// Re-home this id at a newly allocated instance id, keeping the type.
    #[must_use]
    pub fn with_instance(&self, instance_id: impl Into<Arc<str>>) -> Self {
        Self::new(self.land_type.clone(), instance_id)
    }
}

impl FromStr for LandId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split_once(':').map_or_else(
            || Self::new(s, ""),
            |(land_type, instance_id)| Self::new(land_type, instance_id),
        ))
    }
}

impl fmt::Display for LandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.land_type, self.instance_id)
    }
}

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Wrap a string-like value as this identity type.
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(PlayerId, "Account-level identity; survives reconnects.");
string_id!(ClientId, "Device/client-installation identity.");

/// A live transport connection's identity. Unlike `PlayerId`/`ClientId`
/// (caller-supplied stable strings), this is a process-local monotonic
/// counter minted by the Transport Adapter on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw counter value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Monotonic [`SessionId`] allocator, one per Transport Adapter process.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    next: u64,
}

impl SessionIdAllocator {
    /// Start an allocator at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Mint the next id.
    pub fn allocate(&mut self) -> SessionId {
        let id = SessionId(self.next);
        self.next += 1;
        id
    }
}

/// A small dense integer assigned to a joined [`PlayerId`] within one Land,
/// reused after leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerSlot(u32);

impl PlayerSlot {
    /// Wrap a raw slot index.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// The raw slot index.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Smallest-unused-index allocator for [`PlayerSlot`]s: freed slots are
/// reused by the next join rather than leaving gaps.
#[derive(Debug, Default)]
pub struct PlayerSlotAllocator {
    next_fresh: u32,
    freed: Vec<PlayerSlot>,
}

impl PlayerSlotAllocator {
    /// Start an allocator with no slots in use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_fresh: 0,
            freed: Vec::new(),
        }
    }

    /// Allocate the smallest currently-unused slot.
    pub fn allocate(&mut self) -> PlayerSlot {
        if let Some(slot) = self.freed.pop() {
            return slot;
        }
        let slot = PlayerSlot(self.next_fresh);
        self.next_fresh += 1;
        slot
    }

    /// Return a slot to the free list for reuse by a later join.
    pub fn release(&mut self, slot: PlayerSlot) {
        self.freed.push(slot);
    }
}
