//! # Canonical Serialization — JCS Byte Production for Mandate Hashing
//!
//! Defines `CanonicalBytes`, the sole construction path for bytes used in
//! mandate digest computation.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is `CanonicalBytes::new()`, which rejects floats and then
//! serializes via RFC 8785 (JSON Canonicalization Scheme): sorted keys,
//! compact separators, deterministic byte sequence.
//!
//! This makes the "wrong serialization path" defect class structurally
//! impossible: any function that hashes or signs mandate contents must
//! accept `&CanonicalBytes`, and the only way to produce one is through
//! the correct pipeline. Two logically equal contents objects — same keys
//! and values, any field insertion order, any source encoding — always
//! produce identical bytes.
//!
//! ## Number Policy
//!
//! Monetary values are decimal strings, never floats. Floats have
//! non-deterministic canonical-number edge cases across implementations,
//! so any float anywhere in the value tree is rejected outright with
//! `CanonicalizationError::FloatRejected`. Integers (counters, quantities)
//! pass through unchanged.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with the mandate
/// stack's float-rejection rule applied first.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - No float ever survives into the canonical form; amounts are decimal
///   strings or integers.
/// - Object keys are sorted, separators compact (RFC 8785).
/// - Timestamps serialize as UTC ISO8601 with Z suffix, seconds precision
///   (enforced by the [`crate::Timestamp`] type at the serde boundary).
///
/// These invariants are enforced by the constructor and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. All mandate
    /// digest computation in the stack must flow through this constructor.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains
    /// float numbers anywhere in its tree, or
    /// `CanonicalizationError::SerializationFailed` if JCS serialization
    /// fails (e.g., a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest or signature computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively reject float values in a JSON tree.
///
/// `null`, `bool`, `string`, and integer numbers pass; objects and arrays
/// are recursed. A number that is not representable as `i64`/`u64` is a
/// float and fails the whole canonicalization.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(arr) => arr.iter().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_object_sorted_compact() {
        let data = serde_json::json!({"currency": "JPY", "value": "4950", "b": 1});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"b":1,"currency":"JPY","value":"4950"}"#);
    }

    #[test]
    fn key_order_is_irrelevant() {
        let a = serde_json::json!({"merchant_id": "m-1", "total": {"value": "100", "currency": "USD"}});
        let b = serde_json::json!({"total": {"currency": "USD", "value": "100"}, "merchant_id": "m-1"});
        let ca = CanonicalBytes::new(&a).unwrap();
        let cb = CanonicalBytes::new(&b).unwrap();
        assert_eq!(ca, cb);
    }

    #[test]
    fn nested_objects_sorted() {
        let data = serde_json::json!({
            "outer": {"b": 2, "a": 1},
            "items": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"items":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn float_amount_rejected() {
        let data = serde_json::json!({"amount": 49.50});
        match CanonicalBytes::new(&data).unwrap_err() {
            CanonicalizationError::FloatRejected(f) => assert_eq!(f, 49.50),
            other => panic!("expected FloatRejected, got: {other}"),
        }
    }

    #[test]
    fn deeply_nested_float_rejected() {
        let data = serde_json::json!({"a": {"line_items": [{"unit_price": 3.14}]}});
        assert!(CanonicalBytes::new(&data).is_err());
    }

    #[test]
    fn integers_and_scalars_pass() {
        let data = serde_json::json!({"quantity": 2, "sku": "A-1", "gift": false, "note": null});
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"gift":false,"note":null,"quantity":2,"sku":"A-1"}"#);
    }

    #[test]
    fn empty_object_and_array() {
        assert_eq!(CanonicalBytes::new(&serde_json::json!({})).unwrap().as_bytes(), b"{}");
        assert_eq!(CanonicalBytes::new(&serde_json::json!([])).unwrap().as_bytes(), b"[]");
    }

    #[test]
    fn unicode_passes_through_as_utf8() {
        let data = serde_json::json!({"shipping_address": "東京都"});
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert!(s.contains("東京都"));
    }

    #[test]
    fn negative_and_large_integers() {
        let data = serde_json::json!({"counter": 9999999999i64, "delta": -42});
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"counter":9999999999,"delta":-42}"#);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for JSON-compatible values without floats — the domain
    /// mandate contents live in.
    fn json_value_no_floats() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,50}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,10}", inner, 0..8).prop_map(|m| {
                    let map: serde_json::Map<String, Value> = m.into_iter().collect();
                    Value::Object(map)
                }),
            ]
        })
    }

    proptest! {
        /// Canonicalization never fails for float-free values.
        #[test]
        fn never_fails_without_floats(value in json_value_no_floats()) {
            prop_assert!(CanonicalBytes::new(&value).is_ok());
        }

        /// Same input always produces the same bytes.
        #[test]
        fn deterministic(value in json_value_no_floats()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Canonical output is valid JSON with lexicographically sorted keys.
        #[test]
        fn sorted_keys(keys in prop::collection::btree_set("[a-z]{1,8}", 2..6)) {
            let map: serde_json::Map<String, Value> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), serde_json::json!(i)))
                .collect();
            let cb = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let parsed: serde_json::Map<String, Value> =
                serde_json::from_slice(cb.as_bytes()).unwrap();
            let output_keys: Vec<&String> = parsed.keys().collect();
            let mut sorted = output_keys.clone();
            sorted.sort();
            prop_assert_eq!(output_keys, sorted);
        }

        /// Any value containing a non-integer float is rejected.
        #[test]
        fn floats_always_rejected(f in any::<f64>().prop_filter("not integer", |f| {
            f.fract() != 0.0 && f.is_finite()
        })) {
            let value = serde_json::json!({"val": f});
            prop_assert!(CanonicalBytes::new(&value).is_err());
        }
    }
}
