//! SHR and SAR.
//!
//! The operand is split into four 64-bit limbs and each limb into the bits
//! shifted out (`lo`, below `2^shf_mod64`) and the bits kept (`hi`). A result
//! limb is the `hi` part of one source limb joined with the `lo` part of the
//! next one, the source limb being picked by `shf_div64`. Only the low byte of
//! the shift moves bits; any higher byte set means a shift of 256 or more.

use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        step::Transition,
    },
    util::{param::N_BYTES_U64, FieldHelpers, Fr, Word},
};
use ark_ff::{One, Zero};
use num_bigint::BigUint;

pub fn shr(instruction: &mut Instruction) -> Result<()> {
    shift_right(instruction, false)
}

pub fn sar(instruction: &mut Instruction) -> Result<()> {
    shift_right(instruction, true)
}

/// Witness of the limb decomposition.
struct ShiftWitness {
    a64s: [Fr; 4],
    a64s_lo: [Fr; 4],
    a64s_hi: [Fr; 4],
    b64s: [Fr; 4],
    shf_div64: Fr,
    shf_mod64: Fr,
    /// `2^shf_mod64`
    p_lo: Fr,
    /// `2^(64 - shf_mod64)`
    p_hi: Fr,
}

impl ShiftWitness {
    fn new(a: &Word, shift: u8, is_neg: bool) -> Result<Self> {
        let shf_mod64 = (shift % 64) as u32;
        let p_lo = 1u64 << shf_mod64;

        let limbs = u64_limbs(&a.to_biguint());
        let a64s_lo = limbs.map(|limb| Fr::from(limb % p_lo));
        let a64s_hi = limbs.map(|limb| Fr::from(limb / p_lo));

        // The limbs are shifted by the low byte only; the constraints mask
        // them out for longer shifts.
        let mask = (BigUint::one() << 256u32) - BigUint::one();
        let shifted = if is_neg {
            let inverted = &mask ^ a.to_biguint();
            &mask ^ (inverted >> shift as u32)
        } else {
            a.to_biguint() >> shift as u32
        };

        Ok(Self {
            a64s: a.to_64s()?,
            a64s_lo,
            a64s_hi,
            b64s: u64_limbs(&shifted).map(Fr::from),
            shf_div64: Fr::from((shift / 64) as u64),
            shf_mod64: Fr::from(shf_mod64 as u64),
            p_lo: Fr::from(p_lo),
            p_hi: Fr::from(1u128 << (64 - shf_mod64)),
        })
    }
}

fn u64_limbs(value: &BigUint) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (limb, digit) in limbs.iter_mut().zip(value.iter_u64_digits()) {
        *limb = digit;
    }
    limbs
}

fn shift_right(instruction: &mut Instruction, is_signed: bool) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.responsible_opcode_lookup(opcode)?;

    let shift = instruction.stack_pop()?;
    let a = instruction.stack_pop()?;
    let b = instruction.stack_push()?;

    let a_is_neg = if is_signed {
        instruction.word_is_neg(&a)?
    } else {
        Fr::zero()
    };
    let a_bytes = instruction.word_to_bytes(&a)?;
    let b_bytes = instruction.word_to_bytes(&b)?;
    let shift_bytes = instruction.word_to_bytes(&shift)?;
    let witness = ShiftWitness::new(&a, shift_bytes[0], a_is_neg.is_one())?;
    let ShiftWitness {
        a64s,
        a64s_lo,
        a64s_hi,
        b64s,
        shf_div64,
        shf_mod64,
        p_lo,
        p_hi,
    } = witness;

    let high_bytes: Vec<Fr> = shift_bytes[1..]
        .iter()
        .map(|b| Fr::from(*b as u64))
        .collect();
    let shf_lt256 = instruction.is_zero(instruction.sum(&high_bytes));
    let limb_max = Fr::from(u64::MAX);

    for idx in 0..4 {
        let offset = idx * N_BYTES_U64;
        instruction.constrain_equal(
            a64s[idx],
            instruction.bytes_to_fq(&a_bytes[offset..offset + N_BYTES_U64])?,
        )?;
        instruction.constrain_equal(a64s[idx], a64s_lo[idx] + a64s_hi[idx] * p_lo)?;
        let (lo_lt_p_lo, _) = instruction.compare(a64s_lo[idx], p_lo, N_BYTES_U64)?;
        instruction.constrain_equal(lo_lt_p_lo, Fr::one())?;

        // A shift of 256 or more leaves only the sign.
        instruction.constrain_equal(
            b64s[idx] * shf_lt256 + a_is_neg * (Fr::one() - shf_lt256) * limb_max,
            instruction.bytes_to_fq(&b_bytes[offset..offset + N_BYTES_U64])?,
        )?;
    }

    if is_signed {
        let b_is_neg = instruction.word_is_neg(&b)?;
        instruction.constrain_equal(a_is_neg, b_is_neg)?;
    }

    // Bits shifted into the top limb: the sign, `shf_mod64` times.
    let hi_hi = a_is_neg * (limb_max - p_hi + Fr::one());
    let sources = [
        a64s_hi[0] + a64s_lo[1] * p_hi,
        a64s_hi[1] + a64s_lo[2] * p_hi,
        a64s_hi[2] + a64s_lo[3] * p_hi,
        a64s_hi[3] + hi_hi,
    ];
    let shf_div64_eq = [
        instruction.is_zero(shf_div64),
        instruction.is_equal(shf_div64, Fr::one()),
        instruction.is_equal(shf_div64, Fr::from(2u64)),
        instruction.is_equal(shf_div64, Fr::from(3u64)),
    ];
    for (idx, b64) in b64s.iter().enumerate() {
        let selectors = &shf_div64_eq[..4 - idx];
        let merged: Fr = selectors
            .iter()
            .zip(&sources[idx..])
            .map(|(selector, source)| *selector * source)
            .sum();
        let fill = a_is_neg * limb_max * (Fr::one() - instruction.sum(selectors));
        instruction.constrain_equal(*b64, merged + fill)?;
    }

    instruction.constrain_equal(
        Fr::from(shift_bytes[0] as u64),
        shf_mod64 + shf_div64 * Fr::from(64u64),
    )?;
    instruction.range_lookup(shf_mod64, 64)?;
    instruction.constrain_equal(p_lo, instruction.pow2_lookup(shf_mod64)?.expr())?;
    instruction.constrain_equal(
        p_hi,
        instruction.pow2_lookup(Fr::from(64u64) - shf_mod64)?.expr(),
    )?;

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(3),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(1),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_sar(a: &BigUint, shift: u32) -> BigUint {
        let mask = (BigUint::one() << 256u32) - BigUint::one();
        if a.bit(255) {
            &mask ^ ((&mask ^ a) >> shift)
        } else {
            a >> shift
        }
    }

    #[test]
    fn test_shift_witness_limbs() {
        let a = Word::from(256u64);
        let witness = ShiftWitness::new(&a, 4, false).unwrap();
        assert_eq!(witness.b64s[0], Fr::from(16u64));
        assert_eq!(witness.a64s_hi[0], Fr::from(16u64));
        assert_eq!(witness.a64s_lo[0], Fr::zero());
        assert_eq!(witness.p_lo, Fr::from(16u64));
        assert_eq!(witness.p_hi, Fr::from(1u64 << 60));
    }

    #[test]
    fn test_shift_witness_sign_extends() {
        let minus_two = Word::from_biguint(&((BigUint::one() << 256u32) - BigUint::from(2u64)));
        let witness = ShiftWitness::new(&minus_two, 1, true).unwrap();
        assert!(witness.b64s.iter().all(|limb| *limb == Fr::from(u64::MAX)));
    }

    proptest! {
        #[test]
        fn test_shift_witness_matches_shift(bytes in any::<[u8; 32]>(), shift in any::<u8>()) {
            let a = Word::from_be_bytes(&bytes);
            let a_int = a.to_biguint();
            let witness = ShiftWitness::new(&a, shift, a_int.bit(255)).unwrap();
            let expected = u64_limbs(&reference_sar(&a_int, shift as u32)).map(Fr::from);
            prop_assert_eq!(witness.b64s, expected);
            for idx in 0..4 {
                prop_assert_eq!(witness.a64s[idx], witness.a64s_lo[idx] + witness.a64s_hi[idx] * witness.p_lo);
            }
        }
    }
}
