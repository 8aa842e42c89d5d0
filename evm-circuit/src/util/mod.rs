//! Field helpers and the integer encodings shared by every part of the
//! circuit model.

pub mod arithmetic;
pub mod constraint_system;
pub mod hash;
pub mod param;

pub use arithmetic::{Expression, Word};
pub use ark_bn254::Fr;

use ark_ff::{BigInteger, Field, PrimeField};
use num_bigint::BigUint;

/// Field element helpers
pub trait FieldHelpers: Sized {
    /// Interpret the canonical representative as an unsigned integer
    fn to_biguint(&self) -> BigUint;

    /// Reduce an unsigned integer into the field
    fn from_biguint(value: &BigUint) -> Self;

    /// Returns the value as `u64` if the canonical representative fits
    fn to_u64(&self) -> Option<u64>;

    /// Serialize the canonical representative to little-endian bytes, without
    /// trailing zeros
    fn to_le_bytes_trimmed(&self) -> Vec<u8>;

    /// `2^power` as a field element
    fn two_pow(power: u64) -> Self;

    /// Lowercase hexadecimal rendering with `0x` prefix
    fn to_hex_string(&self) -> String {
        format!("{:#x}", self.to_biguint())
    }
}

impl FieldHelpers for Fr {
    fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.into_bigint().to_bytes_le())
    }

    fn from_biguint(value: &BigUint) -> Self {
        Fr::from_le_bytes_mod_order(&value.to_bytes_le())
    }

    fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.to_biguint()).ok()
    }

    fn to_le_bytes_trimmed(&self) -> Vec<u8> {
        let mut bytes = self.into_bigint().to_bytes_le();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    fn two_pow(power: u64) -> Self {
        Fr::from(2u64).pow([power])
    }
}

/// Hexadecimal rendering used in error messages and serialized witnesses.
pub fn field_hex(value: &Fr) -> String {
    value.to_hex_string()
}

/// Converts a signed integer into the field, mapping negative values to their
/// additive inverse.
pub fn i64_to_field(value: i64) -> Fr {
    if value >= 0 {
        Fr::from(value as u64)
    } else {
        -Fr::from(value.unsigned_abs())
    }
}

/// Field representation of a boolean.
pub fn bool_to_field(value: bool) -> Fr {
    Fr::from(value as u64)
}
