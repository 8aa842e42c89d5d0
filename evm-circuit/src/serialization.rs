//! Serialization of field elements for the JSON witness format.
//!
//! Every field element is written as a `0x`-prefixed, big-endian hexadecimal
//! string. Use the adapter with [serde_with], e.g.
//! `#[serde_as(as = "crate::serialization::FieldHex")]`, or on containers
//! `#[serde_as(as = "Vec<FieldHex>")]`.

use crate::util::{FieldHelpers, Fr};
use ark_ff::PrimeField;
use num_bigint::BigUint;
use serde::Deserialize;
use serde_with::{DeserializeAs, SerializeAs};

/// Hexadecimal encoding of a scalar field element.
pub struct FieldHex;

impl SerializeAs<Fr> for FieldHex {
    fn serialize_as<S>(val: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&val.to_hex_string())
    }
}

impl<'de> DeserializeAs<'de, Fr> for FieldHex {
    fn deserialize_as<D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_field_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Parses a `0x`-prefixed (or bare) hexadecimal string into a field element,
/// rejecting values that are not canonical representatives.
pub fn parse_field_hex(s: &str) -> Result<Fr, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err(format!("empty field element `{s}`"));
    }
    let value = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| format!("invalid hexadecimal field element `{s}`"))?;
    let modulus: BigUint = Fr::MODULUS.into();
    if value >= modulus {
        return Err(format!("{s} is not a canonical field element"));
    }
    Ok(Fr::from_biguint(&value))
}
