// SPDX-License-Identifier: Apache-2.0
//! The closed [`SnapshotValue`] sum type.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{Error as DeError, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The single-entry map key a [`SnapshotValue::Bytes`] leaf serializes
/// under, so it cannot be confused with a JSON array (which `Array` also
/// produces) or an ordinary state map keyed by player/field name.
const BYTES_TAG: &str = "$bin";

/// A fully-materialized, encoding-agnostic state value.
///
/// Every leaf type that may appear in a Land's state tree declares a total
/// conversion into this type; containers recurse. `Map` uses a `BTreeMap`
/// rather than a `HashMap` so canonical (deterministic) encoding — used by
/// the replay hash chain — falls out of the type rather than needing a
/// separate sort pass at every call site.
///
/// `Serialize`/`Deserialize` are hand-written rather than derived: a derived
/// `#[serde(untagged)]` enum would try `Bytes(Vec<u8>)` before `Array`, so
/// every JSON array — including `[]` — would decode back as `Bytes` instead
/// of `Array`. The hand-written form instead gives every other variant its
/// conventional JSON shape (`null`, bool, number, string, array, object) and
/// reserves `Bytes` for the one shape none of those produce: a single-key
/// `{"$bin": "<base64>"}` object.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    /// Absence of a value.
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// 64-bit signed integer leaf.
    Int(i64),
    /// Double-precision float leaf.
    Double(f64),
    /// UTF-8 string leaf.
    Str(String),
    /// Opaque byte string leaf.
    Bytes(Vec<u8>),
    /// Ordered array of snapshot values.
    Array(Vec<SnapshotValue>),
    /// Ordered (by key) map from string to snapshot value.
    Map(BTreeMap<String, SnapshotValue>),
}

impl Serialize for SnapshotValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Double(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(b) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BYTES_TAG, &BASE64.encode(b))?;
                map.end()
            }
            Self::Array(items) => items.serialize(serializer),
            Self::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SnapshotValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SnapshotValueVisitor)
    }
}

struct SnapshotValueVisitor;

impl<'de> Visitor<'de> for SnapshotValueVisitor {
    type Value = SnapshotValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a LandKeeper snapshot value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        i64::try_from(v)
            .map(SnapshotValue::Int)
            .map_err(|_| E::custom(format!("integer {v} out of range for a 64-bit signed leaf")))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Double(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Str(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(SnapshotValue::Str(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(SnapshotValue::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, SnapshotValue>()? {
            entries.insert(key, value);
        }
        if entries.len() == 1 {
            if let Some(SnapshotValue::Str(encoded)) = entries.get(BYTES_TAG) {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|err| A::Error::custom(format!("invalid {BYTES_TAG} payload: {err}")))?;
                return Ok(SnapshotValue::Bytes(bytes));
            }
        }
        Ok(SnapshotValue::Map(entries))
    }
}

impl SnapshotValue {
    /// Convenience constructor for a map from an iterator of pairs.
    pub fn map<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, SnapshotValue)>,
        K: Into<String>,
    {
        Self::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `true` if this value is [`SnapshotValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for SnapshotValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SnapshotValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SnapshotValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for SnapshotValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for SnapshotValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<u8>> for SnapshotValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Total conversion of a leaf type into a [`SnapshotValue`].
///
/// Unlike [`TryInto`]-style fallible conversions, every leaf type in a
/// Land's state tree must implement this; containers recurse over it.
/// Implementations that can fail internally (e.g. a foreign numeric type
/// that cannot be represented) must fall back to `SnapshotValue::Null`
/// rather than panic — the caller (the reactive container) is responsible
/// for recording that fallback as a patch and logging it.
pub trait ToSnapshotValue {
    /// Convert `self` into its canonical snapshot representation.
    fn to_snapshot_value(&self) -> SnapshotValue;
}

impl ToSnapshotValue for bool {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Bool(*self)
    }
}

impl ToSnapshotValue for i64 {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Int(*self)
    }
}

impl ToSnapshotValue for i32 {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Int(i64::from(*self))
    }
}

impl ToSnapshotValue for u32 {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Int(i64::from(*self))
    }
}

impl ToSnapshotValue for f64 {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Double(*self)
    }
}

impl ToSnapshotValue for String {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Str(self.clone())
    }
}

impl ToSnapshotValue for str {
    fn to_snapshot_value(&self) -> SnapshotValue {
        SnapshotValue::Str(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_stay_sorted() {
        let v = SnapshotValue::map([("b", SnapshotValue::Int(2)), ("a", SnapshotValue::Int(1))]);
        let SnapshotValue::Map(m) = v else {
            panic!("expected map");
        };
        let keys: Vec<_> = m.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn json_round_trips_a_mixed_map() {
        let v = SnapshotValue::map([
            ("count", SnapshotValue::Int(2)),
            ("name", SnapshotValue::Str("room".into())),
        ]);
        let s = serde_json::to_string(&v).expect("serialize");
        let back: SnapshotValue = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(v, back);
    }

    #[test]
    fn array_round_trips_as_array_not_bytes() {
        let v = SnapshotValue::Array(vec![SnapshotValue::Int(1), SnapshotValue::Int(2)]);
        let s = serde_json::to_string(&v).expect("serialize");
        assert_eq!(s, "[1,2]");
        let back: SnapshotValue = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(back, v);
    }

    #[test]
    fn empty_array_round_trips_as_array_not_bytes() {
        let v = SnapshotValue::Array(Vec::new());
        let s = serde_json::to_string(&v).expect("serialize");
        let back: SnapshotValue = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(back, v);
    }

    #[test]
    fn bytes_round_trip_through_the_base64_tag() {
        use base64::engine::general_purpose::STANDARD as B64;
        use base64::Engine as _;

        let v = SnapshotValue::Bytes(vec![1, 2, 3, 255]);
        let s = serde_json::to_string(&v).expect("serialize");
        let expected = format!(r#"{{"$bin":"{}"}}"#, B64.encode([1u8, 2, 3, 255]));
        assert_eq!(s, expected);
        let back: SnapshotValue = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(back, v);
    }

    #[test]
    fn empty_bytes_round_trip_and_differ_from_empty_array() {
        let bytes = SnapshotValue::Bytes(Vec::new());
        let array = SnapshotValue::Array(Vec::new());
        let bytes_json = serde_json::to_string(&bytes).expect("serialize");
        let array_json = serde_json::to_string(&array).expect("serialize");
        assert_ne!(bytes_json, array_json);
        let back: SnapshotValue = serde_json::from_str(&bytes_json).expect("deserialize");
        assert_eq!(back, bytes);
    }

    #[test]
    fn msgpack_round_trips_array_and_bytes_distinctly() {
        let array = SnapshotValue::Array(vec![SnapshotValue::Int(1), SnapshotValue::Int(2)]);
        let bytes = SnapshotValue::Bytes(vec![1, 2]);
        let array_bytes = rmp_serde::to_vec(&array).expect("serialize array");
        let bytes_bytes = rmp_serde::to_vec(&bytes).expect("serialize bytes");
        let array_back: SnapshotValue = rmp_serde::from_slice(&array_bytes).expect("deserialize array");
        let bytes_back: SnapshotValue = rmp_serde::from_slice(&bytes_bytes).expect("deserialize bytes");
        assert_eq!(array_back, array);
        assert_eq!(bytes_back, bytes);
    }
}
