// SPDX-License-Identifier: Apache-2.0
//! Optional path-hash compression.
//!
//! A generic schema hash / codec / ops-catalog registry pattern,
//! specialized here to "per-`LandType` absolute-path ↔ 32-bit-hash
//! table", registered once at handshake time and shared verbatim by
//! both ends. The server builds the table at `Realm::register` time and
//! ships it to the client inside the `joinResponse` frame.

use std::collections::HashMap;

/// A stable 32-bit hash standing in for a full patch path on the wire.
pub type PathHash = u32;

/// A bidirectional path ↔ hash table, built once per `LandType` from its
/// declared field schema and shared with clients inside `joinResponse`.
#[derive(Debug, Default, Clone)]
pub struct PathTable {
    forward: HashMap<String, PathHash>,
    backward: HashMap<PathHash, String>,
}

impl PathTable {
    /// Build a table from a schema's full set of absolute paths.
    ///
    /// Collisions (two distinct paths hashing to the same 32 bits) are
    /// rejected at registration time rather than silently aliased, since a
    /// live collision would corrupt an in-flight session.
    pub fn build<I, S>(paths: I) -> Result<Self, PathCollision>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for path in paths {
            table.insert(path.into())?;
        }
        Ok(table)
    }

    fn insert(&mut self, path: String) -> Result<(), PathCollision> {
        let hash = stable_hash(&path);
        if let Some(existing) = self.backward.get(&hash) {
            if existing != &path {
                return Err(PathCollision {
                    path_a: existing.clone(),
                    path_b: path,
                    hash,
                });
            }
            return Ok(());
        }
        self.backward.insert(hash, path.clone());
        self.forward.insert(path, hash);
        Ok(())
    }

    /// Look up the hash for a path, if registered.
    #[must_use]
    pub fn hash_for(&self, path: &str) -> Option<PathHash> {
        self.forward.get(path).copied()
    }

    /// Look up the path for a hash, if registered.
    #[must_use]
    pub fn path_for(&self, hash: PathHash) -> Option<&str> {
        self.backward.get(&hash).map(String::as_str)
    }

    /// Export the table as `(hash, path)` pairs, e.g. for embedding in a
    /// `joinResponse` frame.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(PathHash, String)> {
        let mut pairs: Vec<_> = self
            .backward
            .iter()
            .map(|(h, p)| (*h, p.clone()))
            .collect();
        pairs.sort_by_key(|(h, _)| *h);
        pairs
    }

    /// Rebuild a table from `(hash, path)` pairs received from the peer
    /// that registered it, without recomputing any hashes.
    #[must_use]
    pub fn from_pairs(pairs: &[(PathHash, String)]) -> Self {
        let mut table = Self::default();
        for (hash, path) in pairs {
            table.forward.insert(path.clone(), *hash);
            table.backward.insert(*hash, path.clone());
        }
        table
    }
}

/// Two distinct paths hashed to the same 32-bit value during registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path hash collision between {path_a:?} and {path_b:?} (hash {hash})")]
pub struct PathCollision {
    /// First path registered at this hash.
    pub path_a: String,
    /// Second path, which collided.
    pub path_b: String,
    /// The colliding hash value.
    pub hash: PathHash,
}

/// FNV-1a, truncated to 32 bits. Stable across processes and platforms,
/// which is the only property this table depends on (unlike
/// [`std::collections::hash_map::DefaultHasher`], which is explicitly not
/// stable across Rust releases).
fn stable_hash(path: &str) -> PathHash {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for byte in path.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_always_hashes_the_same() {
        assert_eq!(stable_hash("/players/p1/score"), stable_hash("/players/p1/score"));
    }

    #[test]
    fn table_round_trips_through_pairs() {
        let table = PathTable::build(["/count", "/players/p1/score"]).expect("no collision");
        let pairs = table.to_pairs();
        let rebuilt = PathTable::from_pairs(&pairs);
        assert_eq!(rebuilt.hash_for("/count"), table.hash_for("/count"));
        assert_eq!(
            rebuilt.path_for(table.hash_for("/count").expect("present")),
            Some("/count")
        );
    }

    #[test]
    fn duplicate_identical_paths_are_idempotent() {
        let table = PathTable::build(["/count", "/count"]).expect("identical paths are fine");
        assert_eq!(table.to_pairs().len(), 1);
    }
}
