//! Conditional constraint checking for the row-based circuits.
//!
//! A [`ConstraintSystem`] carries the product of the enclosing conditions.
//! Every constraint is multiplied by it, so a constraint under a false
//! condition holds trivially.

use crate::{
    error::{ConstraintError, Result},
    util::{
        arithmetic::{mul_add_words, MulAddWords},
        FieldHelpers, Fr, Word,
    },
};
use ark_ff::{Field, One, Zero};
use std::panic::Location;

pub struct ConstraintSystem {
    condition: Fr,
}

impl Default for ConstraintSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSystem {
    pub fn new() -> Self {
        Self {
            condition: Fr::one(),
        }
    }

    pub fn condition(&self) -> Fr {
        self.condition
    }

    /// Runs `constrain` with `condition` multiplied into the current one.
    pub fn with_condition<T>(
        &mut self,
        condition: Fr,
        constrain: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let outer = self.condition;
        self.condition = outer * condition;
        let result = constrain(self);
        self.condition = outer;
        result
    }

    #[track_caller]
    pub fn constrain_zero(&self, value: Fr) -> Result<()> {
        self.constrain_equal(value, Fr::zero())
    }

    #[track_caller]
    pub fn constrain_equal(&self, lhs: Fr, rhs: Fr) -> Result<()> {
        if (self.condition * (lhs - rhs)).is_zero() {
            Ok(())
        } else {
            Err(ConstraintError::Unsat {
                location: Location::caller(),
                lhs,
                rhs,
            })
        }
    }

    #[track_caller]
    pub fn constrain_equal_word(&self, lhs: &Word, rhs: &Word) -> Result<()> {
        self.constrain_equal(lhs.lo, rhs.lo)?;
        self.constrain_equal(lhs.hi, rhs.hi)
    }

    #[track_caller]
    pub fn constrain_bool(&self, value: Fr) -> Result<()> {
        self.constrain_equal(value * (Fr::one() - value), Fr::zero())
    }

    /// Checks that `value` is below `256^n_bytes`.
    #[track_caller]
    pub fn range_check(&self, value: Fr, n_bytes: usize) -> Result<()> {
        if self.condition.is_zero() || value.to_le_bytes_trimmed().len() <= n_bytes {
            Ok(())
        } else {
            Err(ConstraintError::OutOfRange {
                location: Location::caller(),
                value: value.to_hex_string(),
                n_bytes,
            })
        }
    }

    /// `1` if `value` is zero, `0` otherwise.
    pub fn is_zero(&self, value: Fr) -> Fr {
        let inverse = value.inverse().unwrap_or_else(Fr::zero);
        Fr::one() - value * inverse
    }

    /// Constrains `a * b + c == d (mod 2^256)` and returns the overflow.
    #[track_caller]
    pub fn mul_add_words(&self, a: &Word, b: &Word, c: &Word, d: &Word) -> Result<Word> {
        let MulAddWords {
            overflow,
            carry_lo,
            carry_hi,
            constraints,
        } = mul_add_words(a, b, c, d)?;
        self.range_check(carry_lo, 9)?;
        self.range_check(carry_hi, 9)?;
        for (lhs, rhs) in constraints {
            self.constrain_equal(lhs, rhs)?;
        }
        Ok(overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_false_condition_disables_constraints() {
        let mut cs = ConstraintSystem::new();
        assert!(cs.constrain_equal(Fr::from(1u64), Fr::from(2u64)).is_err());
        cs.with_condition(Fr::zero(), |cs| {
            cs.constrain_equal(Fr::from(1u64), Fr::from(2u64))?;
            cs.range_check(Fr::two_pow(100), 1)
        })
        .unwrap();
        assert_eq!(cs.condition(), Fr::one());
    }

    #[test]
    fn test_unsat_reports_caller_location() {
        let cs = ConstraintSystem::new();
        let line = line!() + 1;
        let err = cs.constrain_bool(Fr::from(2u64)).unwrap_err();
        match err {
            ConstraintError::Unsat { location, .. } => assert_eq!(location.line(), line),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_range_check() {
        let cs = ConstraintSystem::new();
        cs.range_check(Fr::from(0xffffu64), 2).unwrap();
        assert!(matches!(
            cs.range_check(Fr::from(0x10000u64), 2),
            Err(ConstraintError::OutOfRange { n_bytes: 2, .. })
        ));
        assert!(cs.range_check(-Fr::one(), 31).is_err());
    }

    #[test]
    fn test_mul_add_words_overflow() {
        let cs = ConstraintSystem::new();
        let max = Word::from_be_bytes(&[0xff; 32]);
        // (2^256 - 1)^2 = (2^256 - 2) * 2^256 + 1
        let overflow = cs
            .mul_add_words(&max, &max, &Word::zero(), &Word::from(1u64))
            .unwrap();
        let mut expected = [0xff; 32];
        expected[31] = 0xfe;
        assert_eq!(overflow, Word::from_be_bytes(&expected));
        assert!(cs
            .mul_add_words(&max, &max, &Word::zero(), &Word::from(2u64))
            .is_err());
    }
}
