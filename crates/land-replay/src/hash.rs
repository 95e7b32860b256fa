// SPDX-License-Identifier: Apache-2.0
//! State hashing: canonicalize to deterministic bytes, then `blake3`.
//! Canonicalize first, hash second, over `land-wire`'s canonical byte
//! form.

use land_wire::{canonical_bytes, CanonicalError, SnapshotValue};

/// Hash a full state snapshot to its hex-encoded `blake3` digest.
pub fn hash_snapshot(value: &SnapshotValue) -> Result<String, CanonicalError> {
    let bytes = canonical_bytes(value)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_hash_identically() {
        let a = SnapshotValue::Int(7);
        let b = SnapshotValue::Int(7);
        assert_eq!(hash_snapshot(&a).expect("hash"), hash_snapshot(&b).expect("hash"));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = SnapshotValue::Int(7);
        let b = SnapshotValue::Int(8);
        assert_ne!(hash_snapshot(&a).expect("hash"), hash_snapshot(&b).expect("hash"));
    }

    #[test]
    fn nan_has_no_canonical_hash() {
        let value = SnapshotValue::Double(f64::NAN);
        assert!(hash_snapshot(&value).is_err());
    }
}
