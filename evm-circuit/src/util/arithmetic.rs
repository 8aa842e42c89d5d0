//! 256-bit word encodings over the scalar field.
//!
//! A [`Word`] holds an EVM word as two 128-bit limbs so that it always fits
//! in two field elements. Byte strings that are too long for a pair of limbs
//! (keccak inputs, copied memory) are folded into a single field element with
//! a random linear combination.

use crate::{
    error::{ConstraintError, Result},
    serialization::FieldHex,
    util::{param::MAX_N_BYTES, FieldHelpers, Fr},
};
use ark_ff::{Field, One, Zero};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::fmt::{Display, Formatter};

static TWO_64: Lazy<Fr> = Lazy::new(|| Fr::two_pow(64));
static TWO_128: Lazy<Fr> = Lazy::new(|| Fr::two_pow(128));
static TWO_128_INV: Lazy<Fr> = Lazy::new(|| {
    TWO_128
        .inverse()
        .expect("2^128 is invertible in a field larger than 2^128")
});

/// A 256-bit word stored as its lowest and highest 128 bits.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    #[serde_as(as = "FieldHex")]
    pub lo: Fr,
    #[serde_as(as = "FieldHex")]
    pub hi: Fr,
}

impl Word {
    pub fn new(lo: Fr, hi: Fr) -> Self {
        Self { lo, hi }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds a word from an integer, reduced modulo `2^256`.
    pub fn from_biguint(value: &BigUint) -> Self {
        let mask = (BigUint::one() << 128u32) - BigUint::one();
        let lo = value & &mask;
        let hi = (value >> 128u32) & &mask;
        Self::new(Fr::from_biguint(&lo), Fr::from_biguint(&hi))
    }

    /// Builds a word from at most 32 little-endian bytes.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Self::from_biguint(&BigUint::from_bytes_le(bytes))
    }

    /// Builds a word from at most 32 big-endian bytes.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self::from_biguint(&BigUint::from_bytes_be(bytes))
    }

    /// Integer value `lo + hi * 2^128`. Only meaningful for well-formed words.
    pub fn to_biguint(&self) -> BigUint {
        self.lo.to_biguint() + (self.hi.to_biguint() << 128u32)
    }

    /// The word as a single field element, `lo + hi * 2^128`. Lossy for
    /// values above the field modulus.
    pub fn expr(&self) -> Fr {
        self.lo + self.hi * *TWO_128
    }

    /// Decomposes the word into 32 little-endian bytes; fails when a limb
    /// exceeds 128 bits.
    pub fn to_le_bytes(&self) -> Result<[u8; 32]> {
        let lo = fq_to_le_bytes(&self.lo, 16)?;
        let hi = fq_to_le_bytes(&self.hi, 16)?;
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&lo);
        bytes[16..].copy_from_slice(&hi);
        Ok(bytes)
    }

    pub fn to_be_bytes(&self) -> Result<[u8; 32]> {
        let mut bytes = self.to_le_bytes()?;
        bytes.reverse();
        Ok(bytes)
    }

    /// Both limbs multiplied by `selector`.
    pub fn select(&self, selector: Fr) -> Self {
        Self::new(self.lo * selector, self.hi * selector)
    }

    pub fn to_64s(&self) -> Result<[Fr; 4]> {
        lo_hi_to_64s(&self.lo, &self.hi)
    }

    pub fn is_zero(&self) -> bool {
        self.lo.is_zero() && self.hi.is_zero()
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self::new(Fr::from(value), Fr::zero())
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        Self::from(value as u64)
    }
}

impl From<Fr> for Word {
    fn from(value: Fr) -> Self {
        Self::from_biguint(&value.to_biguint())
    }
}

impl From<&BigUint> for Word {
    fn from(value: &BigUint) -> Self {
        Self::from_biguint(value)
    }
}

impl Display for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.lo.to_biguint().bits() > 128 || self.hi.to_biguint().bits() > 128 {
            write!(
                f,
                "Word(lo={}, hi={})",
                self.lo.to_hex_string(),
                self.hi.to_hex_string()
            )
        } else {
            write!(f, "Word({:#x})", self.to_biguint())
        }
    }
}

/// A value the constraints compare: either a single field element or a
/// 256-bit word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expression {
    Value(Fr),
    Word(Word),
}

impl Expression {
    /// The expression folded into one field element.
    pub fn expr(&self) -> Fr {
        match self {
            Expression::Value(value) => *value,
            Expression::Word(word) => word.expr(),
        }
    }

    /// The expression as a word; field values are split into their limbs.
    pub fn to_word(&self) -> Word {
        match self {
            Expression::Value(value) => Word::from(*value),
            Expression::Word(word) => *word,
        }
    }
}

impl From<Fr> for Expression {
    fn from(value: Fr) -> Self {
        Expression::Value(value)
    }
}

impl From<Word> for Expression {
    fn from(word: Word) -> Self {
        Expression::Word(word)
    }
}

impl From<u64> for Expression {
    fn from(value: u64) -> Self {
        Expression::Value(Fr::from(value))
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::Value(Fr::from(value as u64))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Value(value) => write!(f, "{}", value.to_hex_string()),
            Expression::Word(word) => write!(f, "{word}"),
        }
    }
}

/// Little-endian decomposition of a field element into exactly `n_bytes`.
pub fn fq_to_le_bytes(value: &Fr, n_bytes: usize) -> Result<Vec<u8>> {
    let mut bytes = value.to_le_bytes_trimmed();
    if bytes.len() > n_bytes {
        return Err(ConstraintError::Shape {
            value: value.to_hex_string(),
            n_bytes,
        });
    }
    bytes.resize(n_bytes, 0);
    Ok(bytes)
}

/// Recomposes little-endian bytes into a field element.
pub fn bytes_to_fq(bytes: &[u8]) -> Result<Fr> {
    if bytes.len() > MAX_N_BYTES {
        return Err(ConstraintError::Shape {
            value: format!("0x{}", hex::encode(bytes.iter().rev().copied().collect::<Vec<u8>>())),
            n_bytes: MAX_N_BYTES,
        });
    }
    Ok(linear_combine_bytes(bytes, Fr::from(256u64)))
}

/// `Σ bytes[i] * base^i`. With a random `base` this commits to the sequence;
/// with base 256 it recomposes a little-endian integer.
pub fn linear_combine_bytes(bytes: &[u8], base: Fr) -> Fr {
    bytes
        .iter()
        .rev()
        .fold(Fr::zero(), |acc, byte| acc * base + Fr::from(*byte as u64))
}

/// Random linear combination of a byte string in reading order: the first
/// byte carries the highest power. This is how keccak inputs and copied byte
/// ranges are accumulated.
pub fn rlc_encode_bytes(bytes: &[u8], randomness: Fr) -> Fr {
    bytes
        .iter()
        .fold(Fr::zero(), |acc, byte| acc * randomness + Fr::from(*byte as u64))
}

pub fn word_to_lo_hi(word: &Word) -> (Fr, Fr) {
    (word.lo, word.hi)
}

pub fn word_to_64s(word: &Word) -> Result<[Fr; 4]> {
    word.to_64s()
}

/// Splits the two 128-bit limbs into four 64-bit limbs, least significant
/// first.
pub fn lo_hi_to_64s(lo: &Fr, hi: &Fr) -> Result<[Fr; 4]> {
    let lo = fq_to_le_bytes(lo, 16)?;
    let hi = fq_to_le_bytes(hi, 16)?;
    Ok([
        bytes_to_fq(&lo[..8])?,
        bytes_to_fq(&lo[8..])?,
        bytes_to_fq(&hi[..8])?,
        bytes_to_fq(&hi[8..])?,
    ])
}

/// Number of significant bytes of the word.
pub fn byte_size(word: &Word) -> Result<usize> {
    let bytes = word.to_le_bytes()?;
    Ok(bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1))
}

/// Adds words limb by limb, returning the sum modulo `2^256` and the carry
/// out of the high limb, so that `Σ addends = sum + carry * 2^256`.
pub fn add_words(addends: &[Word]) -> Result<(Word, Fr)> {
    let mut sum_lo = BigUint::zero();
    let mut sum_hi = BigUint::zero();
    for addend in addends {
        addend.to_le_bytes()?;
        sum_lo += addend.lo.to_biguint();
        sum_hi += addend.hi.to_biguint();
    }
    let carry_lo = &sum_lo >> 128u32;
    sum_hi += carry_lo;
    let carry_hi = &sum_hi >> 128u32;
    let mask = (BigUint::one() << 128u32) - BigUint::one();
    let sum = Word::new(
        Fr::from_biguint(&(sum_lo & &mask)),
        Fr::from_biguint(&(sum_hi & &mask)),
    );
    Ok((sum, Fr::from_biguint(&carry_hi)))
}

/// Multiplies a word by a 64-bit integer, returning the product modulo
/// `2^256` and the overflow.
pub fn mul_word_by_u64(word: &Word, factor: u64) -> Result<(Word, Fr)> {
    word.to_le_bytes()?;
    let product = word.to_biguint() * BigUint::from(factor);
    Ok((
        Word::from_biguint(&product),
        Fr::from_biguint(&(product >> 256u32)),
    ))
}

/// Witness of the relation `a * b + c == d (mod 2^256)`.
#[derive(Clone, Debug, PartialEq)]
pub struct MulAddWords {
    /// `⌊(a * b + c) / 2^256⌋` when the relation holds.
    pub overflow: Word,
    pub carry_lo: Fr,
    pub carry_hi: Fr,
    /// Pairs of field elements that must be equal for the relation to hold.
    /// They are only sound together with a range check of the carries.
    pub constraints: [(Fr, Fr); 2],
}

/// Decomposes `a` and `b` into 64-bit limbs and derives the two carries of
/// `a * b + c == d`. Callers range-check both carries to 9 bytes.
pub fn mul_add_words(a: &Word, b: &Word, c: &Word, d: &Word) -> Result<MulAddWords> {
    let a64s = a.to_64s()?;
    let b64s = b.to_64s()?;
    c.to_le_bytes()?;
    d.to_le_bytes()?;

    let two_64 = *TWO_64;
    let two_128 = *TWO_128;

    let t0 = a64s[0] * b64s[0];
    let t1 = a64s[0] * b64s[1] + a64s[1] * b64s[0];
    let t2 = a64s[0] * b64s[2] + a64s[1] * b64s[1] + a64s[2] * b64s[0];
    let t3 = a64s[0] * b64s[3] + a64s[1] * b64s[2] + a64s[2] * b64s[1] + a64s[3] * b64s[0];

    let carry_lo = (t0 + t1 * two_64 + c.lo - d.lo) * *TWO_128_INV;
    let carry_hi = (t2 + t3 * two_64 + c.hi + carry_lo - d.hi) * *TWO_128_INV;

    let limb = |x: &Fr| x.to_biguint();
    let overflow = limb(&carry_hi)
        + limb(&(a64s[1] * b64s[3] + a64s[2] * b64s[2] + a64s[3] * b64s[1]))
        + (limb(&(a64s[2] * b64s[3] + a64s[3] * b64s[2])) << 64u32)
        + (limb(&(a64s[3] * b64s[3])) << 128u32);

    Ok(MulAddWords {
        overflow: Word::from_biguint(&overflow),
        carry_lo,
        carry_hi,
        constraints: [
            (t0 + t1 * two_64 + c.lo, d.lo + carry_lo * two_128),
            (t2 + t3 * two_64 + c.hi + carry_lo, d.hi + carry_hi * two_128),
        ],
    })
}

/// Whether a 256-bit two's complement integer is negative.
pub fn int_is_neg(value: &BigUint) -> bool {
    value.bit(255)
}

/// Two's complement negation modulo `2^256`.
pub fn get_int_neg(value: &BigUint) -> BigUint {
    if value.is_zero() {
        BigUint::zero()
    } else {
        (BigUint::one() << 256u32) - value
    }
}

pub fn get_int_abs(value: &BigUint) -> BigUint {
    if int_is_neg(value) {
        get_int_neg(value)
    } else {
        value.clone()
    }
}
