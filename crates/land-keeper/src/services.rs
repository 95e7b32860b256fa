// SPDX-License-Identifier: Apache-2.0
//! Non-deterministic collaborators injected into handlers and resolvers.
//!
//! A handler body must be a pure function of `(state, payload, resolved)` —
//! it may not read wall-clock time, a non-seeded RNG, or any other
//! uncontrolled external state directly, because a replay run must be able
//! to substitute its own recorded values and still produce the same
//! state hash chain. Every such input goes through [`Services`]
//! instead.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

/// A source of wall-clock-shaped time, swappable for a deterministic replay
/// stub.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Only relative differences are
    /// meaningful to handlers.
    fn now_ms(&self) -> u64;
}

/// A source of randomness, swappable for a seeded or recorded stream during
/// replay verification.
pub trait Rng {
    /// The next value in the stream.
    fn next_u64(&mut self) -> u64;
}

/// `Clock` backed by `std::time::SystemTime`, for live (non-replay)
/// Keepers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// `Rng` backed by a seeded `rand::rngs::StdRng`.
pub struct SeededRng(rand::rngs::StdRng);

impl SeededRng {
    /// Build a generator seeded with `seed`. Two Keepers built with the
    /// same seed and fed the same command sequence produce the same
    /// `next_u64` stream.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self(rand::rngs::StdRng::seed_from_u64(seed))
    }
}

impl Rng for SeededRng {
    fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.0.next_u64()
    }
}

/// The bag of non-state collaborators handed to a Land at construction time
/// and threaded through every [`crate::handler::HandlerCtx`] and
/// [`crate::handler::ResolverCtx`].
///
/// Carries the two canonical non-deterministic inputs (clock, rng) as named
/// fields, plus an open extension slot keyed by type for anything else a
/// Land needs injected (a cache client, a feature-flag source, ...).
pub struct Services {
    clock: Box<dyn Clock>,
    rng: RefCell<Box<dyn Rng>>,
    extensions: HashMap<TypeId, Box<dyn Any>>,
}

impl Services {
    /// Build a `Services` bag from an explicit clock and rng.
    #[must_use]
    pub fn new(clock: Box<dyn Clock>, rng: Box<dyn Rng>) -> Self {
        Self {
            clock,
            rng: RefCell::new(rng),
            extensions: HashMap::new(),
        }
    }

    /// A `Services` bag wired to live, non-deterministic sources. Not for
    /// use inside a replay verifier.
    #[must_use]
    pub fn live(seed: u64) -> Self {
        Self::new(Box::new(SystemClock), Box::new(SeededRng::new(seed)))
    }

    /// The current time per the injected [`Clock`].
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// The next value from the injected [`Rng`].
    #[must_use]
    pub fn next_random_u64(&self) -> u64 {
        self.rng.borrow_mut().next_u64()
    }

    /// Register an extension service, replacing any prior value of the
    /// same type.
    pub fn insert_extension<T: 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Fetch a previously registered extension service.
    #[must_use]
    pub fn extension<T: 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::{Rng, SeededRng, Services, SystemClock};

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut a = SeededRng::new(7);
        let mut b = SeededRng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn extension_roundtrips_by_type() {
        #[derive(PartialEq, Debug)]
        struct Widget(u32);

        let mut services = Services::new(Box::new(SystemClock), Box::new(SeededRng::new(1)));
        assert!(services.extension::<Widget>().is_none());
        services.insert_extension(Widget(42));
        assert_eq!(services.extension::<Widget>(), Some(&Widget(42)));
    }
}
