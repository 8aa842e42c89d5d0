//! The exponentiation circuit backing the exp table.
//!
//! `base^exponent` is computed top-down: each row multiplies two powers of
//! the base, and the exponent of the next row is the current one halved when
//! even or decremented when odd, until the last row squares the base.

use crate::{
    error::{ConstraintError, Result},
    evm::table::ExpTableRow,
    util::{constraint_system::ConstraintSystem, FieldHelpers, Fr, Word},
};
use ark_ff::One;
use log::debug;
use num_bigint::BigUint;
use num_integer::Integer;

/// One multiplication `a * b + c == d (mod 2^256)` of the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpCircuitRow {
    pub identifier: Fr,
    pub is_last: Fr,
    pub base: Word,
    pub intermediate_exponent: Word,
    /// `base^intermediate_exponent`, equal to `d`.
    pub intermediate_exponentiation: Word,
    pub a: Word,
    pub b: Word,
    pub c: Word,
    pub d: Word,
    pub quotient: Word,
    /// Parity of the intermediate exponent.
    pub remainder: Fr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpCircuit {
    pub rows: Vec<ExpCircuitRow>,
}

impl ExpCircuit {
    /// Circuit of a single exponentiation.
    pub fn new(identifier: Fr, base: &Word, exponent: &Word) -> Result<Self> {
        let mut circuit = Self::default();
        circuit.add_event(identifier, base, exponent)?;
        Ok(circuit)
    }

    /// Appends the rows of `base^exponent`. Exponents below 2 take no
    /// multiplication and are rejected.
    pub fn add_event(&mut self, identifier: Fr, base: &Word, exponent: &Word) -> Result<()> {
        let two = BigUint::from(2u64);
        let mut exponent = exponent.to_biguint();
        if exponent < two {
            return Err(ConstraintError::Witness(format!(
                "exponent {exponent} has no multiplication step"
            )));
        }
        let modulus = BigUint::one() << 256u32;
        let base_int = base.to_biguint();
        let pow = |exponent: &BigUint| base_int.modpow(exponent, &modulus);

        loop {
            let (quotient, remainder) = exponent.div_rem(&two);
            let is_last = exponent == two;
            let next_exponent = if is_last {
                None
            } else if remainder.is_one() {
                Some(&exponent - 1u64)
            } else {
                Some(quotient.clone())
            };
            let (a, b) = match &next_exponent {
                None => (base_int.clone(), base_int.clone()),
                Some(next) if remainder.is_one() => (pow(next), base_int.clone()),
                Some(next) => (pow(next), pow(next)),
            };
            let d = Word::from_biguint(&pow(&exponent));
            self.rows.push(ExpCircuitRow {
                identifier,
                is_last: Fr::from(is_last),
                base: *base,
                intermediate_exponent: Word::from_biguint(&exponent),
                intermediate_exponentiation: d,
                a: Word::from_biguint(&a),
                b: Word::from_biguint(&b),
                c: Word::zero(),
                d,
                quotient: Word::from_biguint(&quotient),
                remainder: Fr::from_biguint(&remainder),
            });
            match next_exponent {
                Some(next) => exponent = next,
                None => break,
            }
        }
        Ok(())
    }

    /// The rows of the exp table, one per multiplication.
    pub fn table_rows(&self) -> Vec<ExpTableRow> {
        self.rows
            .iter()
            .map(|row| ExpTableRow {
                identifier: row.identifier,
                is_last: row.is_last,
                base: row.base,
                exponent: row.intermediate_exponent,
                exponentiation: row.intermediate_exponentiation,
            })
            .collect()
    }
}

fn verify_row(
    cs: &mut ConstraintSystem,
    curr: &ExpCircuitRow,
    next: Option<&ExpCircuitRow>,
) -> Result<()> {
    cs.mul_add_words(&curr.a, &curr.b, &curr.c, &curr.d)?;
    cs.constrain_equal_word(&curr.intermediate_exponentiation, &curr.d)?;
    cs.constrain_zero(curr.c.expr())?;
    cs.constrain_bool(curr.remainder)?;
    cs.constrain_bool(curr.is_last)?;
    cs.mul_add_words(
        &curr.quotient,
        &Word::from(2u64),
        &Word::from(curr.remainder),
        &curr.intermediate_exponent,
    )?;

    // The last row squares the base.
    cs.with_condition(curr.is_last, |cs| {
        cs.constrain_equal_word(&curr.a, &curr.base)?;
        cs.constrain_equal_word(&curr.b, &curr.base)?;
        cs.constrain_equal_word(&curr.intermediate_exponent, &Word::from(2u64))
    })?;

    if curr.is_last.is_one() {
        return Ok(());
    }
    let next = next.ok_or_else(|| {
        ConstraintError::Witness("exponentiation chain ends before its last row".to_string())
    })?;
    cs.constrain_equal(curr.identifier, next.identifier)?;
    cs.constrain_equal_word(&curr.base, &next.base)?;
    cs.constrain_equal_word(&curr.a, &next.d)?;

    let (curr_lo, curr_hi) = (curr.intermediate_exponent.lo, curr.intermediate_exponent.hi);
    let (next_lo, next_hi) = (next.intermediate_exponent.lo, next.intermediate_exponent.hi);
    // Odd: one more multiplication by the base.
    cs.with_condition(curr.remainder, |cs| {
        cs.constrain_equal_word(&curr.b, &curr.base)?;
        cs.constrain_equal(next_lo, curr_lo - Fr::one())?;
        cs.constrain_equal(next_hi, curr_hi)
    })?;
    // Even: a squaring. The low bit of the high limb moves to the top of
    // the low limb.
    cs.with_condition(Fr::one() - curr.remainder, |cs| {
        cs.constrain_equal_word(&curr.b, &curr.a)?;
        let two = Fr::from(2u64);
        let carry = curr_hi - two * next_hi;
        cs.constrain_bool(carry)?;
        cs.constrain_equal(two * next_lo, curr_lo + carry * Fr::two_pow(128))
    })
}

/// Checks every row of the circuit against the next one of its chain.
pub fn verify_exp_circuit(circuit: &ExpCircuit) -> Result<()> {
    let mut cs = ConstraintSystem::new();
    for (index, row) in circuit.rows.iter().enumerate() {
        verify_row(&mut cs, row, circuit.rows.get(index + 1)).map_err(|err| {
            debug!("exp circuit row {} rejected: {}", index, err);
            err
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn exponents(circuit: &ExpCircuit) -> Vec<u64> {
        circuit
            .rows
            .iter()
            .map(|row| row.intermediate_exponent.expr().to_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_exp_chain() {
        let circuit = ExpCircuit::new(Fr::one(), &Word::from(3u64), &Word::from(13u64)).unwrap();
        assert_eq!(exponents(&circuit), vec![13, 12, 6, 3, 2]);
        assert_eq!(circuit.rows[0].d, Word::from(1_594_323u64));
        verify_exp_circuit(&circuit).unwrap();

        let table = circuit.table_rows();
        assert_eq!(table.len(), 5);
        assert_eq!(table.iter().filter(|row| row.is_last.is_one()).count(), 1);
    }

    #[test]
    fn test_exp_wraps_around() {
        let base = Word::from_biguint(&(BigUint::one() << 255u32));
        let circuit = ExpCircuit::new(Fr::one(), &base, &Word::from(2u64)).unwrap();
        assert_eq!(circuit.rows.len(), 1);
        assert_eq!(circuit.rows[0].d, Word::zero());
        verify_exp_circuit(&circuit).unwrap();
    }

    #[test]
    fn test_exp_rejects_tampered_row() {
        let mut circuit =
            ExpCircuit::new(Fr::one(), &Word::from(7u64), &Word::from(10u64)).unwrap();
        circuit.rows[1].d = Word::from(1u64);
        assert!(verify_exp_circuit(&circuit).is_err());

        let mut truncated =
            ExpCircuit::new(Fr::one(), &Word::from(7u64), &Word::from(10u64)).unwrap();
        truncated.rows.pop();
        assert!(matches!(
            verify_exp_circuit(&truncated),
            Err(ConstraintError::Witness(_))
        ));
    }

    #[test]
    fn test_exp_halves_across_limbs() {
        let exponent = Word::from_biguint(&(BigUint::one() << 128u32));
        let circuit = ExpCircuit::new(Fr::from(9u64), &Word::from(3u64), &exponent).unwrap();
        assert_eq!(circuit.rows.len(), 128);
        verify_exp_circuit(&circuit).unwrap();
    }

    proptest! {
        #[test]
        fn test_exp_matches_modpow(base in any::<u64>(), exponent in 2u64..5000) {
            let circuit =
                ExpCircuit::new(Fr::one(), &Word::from(base), &Word::from(exponent)).unwrap();
            let expected = BigUint::from(base).modpow(&BigUint::from(exponent), &(BigUint::one() << 256u32));
            prop_assert_eq!(circuit.rows[0].d.to_biguint(), expected);
            prop_assert!(verify_exp_circuit(&circuit).is_ok());
        }
    }
}
