// SPDX-License-Identifier: Apache-2.0
//! Deterministic canonical byte encoding of a [`SnapshotValue`], used by
//! `land-replay` to compute per-tick state hashes.
//!
//! Byte-identical state must always produce byte-identical output: map
//! keys are visited in sorted order (guaranteed by `SnapshotValue::Map`
//! being a `BTreeMap`), integers and floats use a single fixed-width
//! encoding (no "smallest width that round-trips" shortest-form choice —
//! unlike the wire codecs, the canonical form optimizes for determinism,
//! not size), and every variant has exactly one encoding. It is never
//! sent over the wire.

use crate::SnapshotValue;
use thiserror::Error;

/// Errors produced while canonicalizing a [`SnapshotValue`].
#[derive(Debug, Error, PartialEq)]
pub enum CanonicalError {
    /// A `Double` leaf was NaN, which has no canonical total order.
    #[error("NaN has no canonical encoding")]
    NaN,
}

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_MAP: u8 = 8;

/// Encode a [`SnapshotValue`] into its canonical byte form.
pub fn canonical_bytes(value: &SnapshotValue) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::new();
    encode(value, &mut out)?;
    Ok(out)
}

fn encode(value: &SnapshotValue, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        SnapshotValue::Null => out.push(TAG_NULL),
        SnapshotValue::Bool(false) => out.push(TAG_FALSE),
        SnapshotValue::Bool(true) => out.push(TAG_TRUE),
        SnapshotValue::Int(n) => {
            out.push(TAG_INT);
            out.extend_from_slice(&n.to_be_bytes());
        }
        SnapshotValue::Double(f) => {
            if f.is_nan() {
                return Err(CanonicalError::NaN);
            }
            out.push(TAG_DOUBLE);
            // +0.0 and -0.0 must hash identically: canonicalize the sign.
            let canon = if *f == 0.0 { 0.0 } else { *f };
            out.extend_from_slice(&canon.to_be_bytes());
        }
        SnapshotValue::Str(s) => {
            out.push(TAG_STR);
            out.extend_from_slice(&(s.len() as u64).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        SnapshotValue::Bytes(b) => {
            out.push(TAG_BYTES);
            out.extend_from_slice(&(b.len() as u64).to_be_bytes());
            out.extend_from_slice(b);
        }
        SnapshotValue::Array(items) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(items.len() as u64).to_be_bytes());
            for item in items {
                encode(item, out)?;
            }
        }
        SnapshotValue::Map(map) => {
            out.push(TAG_MAP);
            out.extend_from_slice(&(map.len() as u64).to_be_bytes());
            // BTreeMap iteration is already key-sorted.
            for (k, v) in map {
                out.extend_from_slice(&(k.len() as u64).to_be_bytes());
                out.extend_from_slice(k.as_bytes());
                encode(v, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn identical_values_hash_identically() {
        let a = SnapshotValue::map([("x", SnapshotValue::Int(1)), ("y", SnapshotValue::Int(2))]);
        let b = SnapshotValue::map([("y", SnapshotValue::Int(2)), ("x", SnapshotValue::Int(1))]);
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn different_values_hash_differently() {
        let a = SnapshotValue::Int(1);
        let b = SnapshotValue::Int(2);
        assert_ne!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn nan_is_rejected() {
        let v = SnapshotValue::Double(f64::NAN);
        assert_eq!(canonical_bytes(&v), Err(CanonicalError::NaN));
    }

    #[test]
    fn negative_and_positive_zero_are_equal() {
        let a = SnapshotValue::Double(0.0);
        let b = SnapshotValue::Double(-0.0);
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn empty_map_differs_from_null() {
        let a = SnapshotValue::Map(BTreeMap::new());
        let b = SnapshotValue::Null;
        assert_ne!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }
}
