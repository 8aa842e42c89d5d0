//! The elliptic curve circuit backing the ecc table: BN254 G1 additions and
//! scalar multiplications, as used by the precompiles.
//!
//! Coordinates are 256-bit words. A point is valid when both coordinates
//! are canonical base field elements and the point is on the curve, `(0, 0)`
//! standing for the point at infinity. An operation on an invalid point is
//! recorded as invalid with a zero output.

use crate::{
    error::{ConstraintError, Result},
    evm::table::{EccOpTag, EccTableRow},
    util::{constraint_system::ConstraintSystem, Fr, Word},
};
use ark_bn254::{Fq, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{One, PrimeField, Zero};
use log::debug;
use num_bigint::BigUint;
use once_cell::sync::Lazy;

static FQ_MODULUS: Lazy<BigUint> = Lazy::new(|| Fq::MODULUS.into());

fn word_to_fq(word: &Word) -> Option<Fq> {
    let value = word.to_biguint();
    (value < *FQ_MODULUS).then(|| Fq::from_le_bytes_mod_order(&value.to_bytes_le()))
}

fn fq_to_word(value: &Fq) -> Word {
    Word::from_biguint(&value.into_bigint().into())
}

/// The point of the coordinates, if they are those of a valid point.
pub fn point_from_words(x: &Word, y: &Word) -> Option<G1Affine> {
    let (x, y) = (word_to_fq(x)?, word_to_fq(y)?);
    if x.is_zero() && y.is_zero() {
        return Some(G1Affine::zero());
    }
    let point = G1Affine::new_unchecked(x, y);
    point.is_on_curve().then_some(point)
}

/// Coordinates of the point, `(0, 0)` for the point at infinity.
pub fn point_to_words(point: &G1Affine) -> (Word, Word) {
    if point.infinity {
        (Word::zero(), Word::zero())
    } else {
        (fq_to_word(&point.x), fq_to_word(&point.y))
    }
}

/// Operations of one run, within a capacity per kind of operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EccCircuit {
    pub max_add_ops: usize,
    pub max_mul_ops: usize,
    pub rows: Vec<EccTableRow>,
}

impl EccCircuit {
    pub fn new(max_add_ops: usize, max_mul_ops: usize) -> Self {
        Self {
            max_add_ops,
            max_mul_ops,
            rows: vec![],
        }
    }

    fn count(&self, op_type: EccOpTag) -> usize {
        self.rows.iter().filter(|row| row.op_type == op_type).count()
    }

    fn check_capacity(&self, op_type: EccOpTag) -> Result<()> {
        let capacity = match op_type {
            EccOpTag::Add => self.max_add_ops,
            EccOpTag::Mul => self.max_mul_ops,
            EccOpTag::Pairing => 0,
        };
        if self.count(op_type) < capacity {
            Ok(())
        } else {
            Err(ConstraintError::Witness(format!(
                "no room left for another {op_type} operation"
            )))
        }
    }

    /// Records `p + q` and returns its row.
    pub fn add(&mut self, p: (Word, Word), q: (Word, Word)) -> Result<&EccTableRow> {
        self.check_capacity(EccOpTag::Add)?;
        let (out, is_valid) = add_output(&p, &q);
        self.rows.push(EccTableRow {
            op_type: EccOpTag::Add,
            px: p.0,
            py: p.1,
            qx: q.0,
            qy: q.1,
            scalar: Word::zero(),
            out_x: out.0,
            out_y: out.1,
            is_valid,
        });
        Ok(&self.rows[self.rows.len() - 1])
    }

    /// Records `scalar * p` and returns its row.
    pub fn mul(&mut self, p: (Word, Word), scalar: Word) -> Result<&EccTableRow> {
        self.check_capacity(EccOpTag::Mul)?;
        let (out, is_valid) = mul_output(&p, &scalar);
        self.rows.push(EccTableRow {
            op_type: EccOpTag::Mul,
            px: p.0,
            py: p.1,
            qx: Word::zero(),
            qy: Word::zero(),
            scalar,
            out_x: out.0,
            out_y: out.1,
            is_valid,
        });
        Ok(&self.rows[self.rows.len() - 1])
    }

    pub fn table_rows(&self) -> Vec<EccTableRow> {
        self.rows.clone()
    }
}

fn invalid() -> ((Word, Word), Fr) {
    ((Word::zero(), Word::zero()), Fr::zero())
}

fn add_output(p: &(Word, Word), q: &(Word, Word)) -> ((Word, Word), Fr) {
    match (point_from_words(&p.0, &p.1), point_from_words(&q.0, &q.1)) {
        (Some(p), Some(q)) => (point_to_words(&(p + q).into_affine()), Fr::one()),
        _ => invalid(),
    }
}

fn mul_output(p: &(Word, Word), scalar: &Word) -> ((Word, Word), Fr) {
    match point_from_words(&p.0, &p.1) {
        Some(p) => {
            let product = p.mul_bigint(scalar.to_biguint().to_u64_digits());
            (point_to_words(&product.into_affine()), Fr::one())
        }
        None => invalid(),
    }
}

fn verify_row(row: &EccTableRow) -> Result<()> {
    let (expected, is_valid) = match row.op_type {
        EccOpTag::Add => {
            if !row.scalar.is_zero() {
                return Err(ConstraintError::Witness(
                    "an addition takes no scalar".to_string(),
                ));
            }
            add_output(&(row.px, row.py), &(row.qx, row.qy))
        }
        EccOpTag::Mul => mul_output(&(row.px, row.py), &row.scalar),
        EccOpTag::Pairing => {
            return Err(ConstraintError::Witness(
                "pairings are not supported".to_string(),
            ))
        }
    };
    let cs = ConstraintSystem::new();
    cs.constrain_equal(row.is_valid, is_valid)?;
    cs.constrain_equal_word(&row.out_x, &expected.0)?;
    cs.constrain_equal_word(&row.out_y, &expected.1)
}

/// Checks the capacities and every operation against the curve arithmetic.
pub fn verify_ecc_circuit(circuit: &EccCircuit) -> Result<()> {
    for (op_type, capacity) in [
        (EccOpTag::Add, circuit.max_add_ops),
        (EccOpTag::Mul, circuit.max_mul_ops),
    ] {
        let count = circuit.count(op_type);
        if count > capacity {
            return Err(ConstraintError::Witness(format!(
                "{count} {op_type} operations exceed the capacity of {capacity}"
            )));
        }
    }
    for (index, row) in circuit.rows.iter().enumerate() {
        verify_row(row).map_err(|err| {
            debug!("ecc circuit row {} rejected: {}", index, err);
            err
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(hex: &str) -> Word {
        Word::from_biguint(&BigUint::parse_bytes(hex.as_bytes(), 16).unwrap())
    }

    fn generator() -> (Word, Word) {
        (Word::from(1u64), Word::from(2u64))
    }

    #[test]
    fn test_add_doubles_generator() {
        let mut circuit = EccCircuit::new(2, 0);
        let row = circuit.add(generator(), generator()).unwrap().clone();
        assert_eq!(row.is_valid, Fr::one());
        assert_eq!(
            row.out_x,
            word("030644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd3")
        );
        assert_eq!(
            row.out_y,
            word("15ed738c0e0a7c92e7845f96b2ae9c0a68a6a449e3538fc7ff3ebf7a5a18a2c4")
        );
        verify_ecc_circuit(&circuit).unwrap();
    }

    #[test]
    fn test_add_with_infinity() {
        let mut circuit = EccCircuit::new(1, 0);
        let row = circuit
            .add(generator(), (Word::zero(), Word::zero()))
            .unwrap();
        assert_eq!((row.out_x, row.out_y), generator());
    }

    #[test]
    fn test_point_off_curve_is_invalid() {
        let mut circuit = EccCircuit::new(1, 0);
        let row = circuit
            .add((Word::from(2u64), Word::from(3u64)), generator())
            .unwrap();
        assert_eq!(row.is_valid, Fr::zero());
        assert_eq!((row.out_x, row.out_y), (Word::zero(), Word::zero()));
        verify_ecc_circuit(&circuit).unwrap();
    }

    #[test]
    fn test_mul_matches_add() {
        let mut circuit = EccCircuit::new(1, 1);
        let doubled = circuit.mul(generator(), Word::from(2u64)).unwrap().clone();
        let added = circuit.add(generator(), generator()).unwrap().clone();
        assert_eq!((doubled.out_x, doubled.out_y), (added.out_x, added.out_y));
        verify_ecc_circuit(&circuit).unwrap();
    }

    #[test]
    fn test_capacity_and_tampering() {
        let mut circuit = EccCircuit::new(1, 0);
        circuit.add(generator(), generator()).unwrap();
        assert!(circuit.add(generator(), generator()).is_err());
        assert!(circuit.mul(generator(), Word::from(3u64)).is_err());

        circuit.rows[0].out_y = Word::from(7u64);
        assert!(matches!(
            verify_ecc_circuit(&circuit),
            Err(ConstraintError::Unsat { .. })
        ));
    }

    #[test]
    fn test_claimed_validity_is_checked() {
        let mut circuit = EccCircuit::new(1, 0);
        circuit.add((Word::from(1u64), Word::from(1u64)), generator()).unwrap();
        assert_eq!(circuit.rows[0].is_valid, Fr::zero());
        verify_ecc_circuit(&circuit).unwrap();

        circuit.rows[0].is_valid = Fr::one();
        assert!(matches!(
            verify_ecc_circuit(&circuit),
            Err(ConstraintError::Unsat { .. })
        ));
    }
}
