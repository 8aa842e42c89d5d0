//! Tags and row layouts of the lookup tables.
//!
//! Every row type flattens into the fixed-width tuple of field elements a
//! lookup matches against; 256-bit values take two columns (lo, hi).

use crate::{
    lookups::{Table, TableRow},
    serialization::FieldHex,
    util::{bool_to_field, Fr, Word},
};
use ark_ff::Zero;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use strum_macros::{Display, EnumIter};

macro_rules! impl_tag_into_field {
    ($($tag:ty),* $(,)?) => {
        $(
            impl From<$tag> for Fr {
                fn from(tag: $tag) -> Fr {
                    Fr::from(tag as u64)
                }
            }
        )*
    };
}

/// Tag of the fixed table, whose rows are `(tag, value1, value2, value3)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum FixedTableTag {
    /// value, 0, 0
    Range5 = 1,
    Range16,
    Range32,
    Range64,
    Range128,
    Range256,
    Range512,
    Range1024,
    /// exponent, 2^exponent lo, 2^exponent hi
    Pow2,
    /// opcode, 0, 0
    InvalidOpcode,
    /// opcode, 0, 0
    StateWriteOpcode,
    /// opcode, stack_pointer, 0
    StackOverflow,
    /// opcode, stack_pointer, 0
    StackUnderflow,
    /// opcode, gas_left, 0
    OOGConstant,
    /// execution_state, opcode, 0
    ResponsibleOpcode,
    /// execution_state, precompile address, base gas
    PrecompileInfo,
}

impl FixedTableTag {
    /// The tag checking `value < range`, if there is one.
    pub fn range(range: u64) -> Option<Self> {
        Some(match range {
            5 => Self::Range5,
            16 => Self::Range16,
            32 => Self::Range32,
            64 => Self::Range64,
            128 => Self::Range128,
            256 => Self::Range256,
            512 => Self::Range512,
            1024 => Self::Range1024,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum BlockContextFieldTag {
    Coinbase = 1,
    GasLimit,
    Number,
    Timestamp,
    PrevRandao,
    BaseFee,
    ChainId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum TxContextFieldTag {
    Nonce = 1,
    Gas,
    GasPrice,
    CallerAddress,
    CalleeAddress,
    IsCreate,
    Value,
    CallDataLength,
    CallDataGasCost,
    /// One row per byte, indexed by the byte offset.
    CallData,
}

/// Tag of the read/write table, telling which part of the state a row
/// accesses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum RwTableTag {
    TxAccessListAccount = 1,
    TxAccessListAccountStorage,
    TxRefund,
    Account,
    AccountStorage,
    AccountDestructed,
    CallContext,
    Stack,
    Memory,
}

impl RwTableTag {
    /// Writes that can affect the rest of the execution before the call ends,
    /// so a failing call must undo them with a reversal write.
    pub fn write_with_reversion(&self) -> bool {
        matches!(
            self,
            Self::TxAccessListAccount
                | Self::TxAccessListAccountStorage
                | Self::Account
                | Self::AccountStorage
        )
    }

    /// Writes that only matter once the transaction is over. They are only
    /// issued when the call is persistent.
    pub fn write_only_persistent(&self) -> bool {
        matches!(self, Self::TxRefund | Self::AccountDestructed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum AccountFieldTag {
    Nonce = 1,
    Balance,
    CodeHash,
}

/// Field of a call context, addressed by `(call_id, tag)` in the read/write
/// table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum CallContextFieldTag {
    RwCounterEndOfReversion = 1,
    CallerId,
    TxId,
    Depth,
    CallerAddress,
    CalleeAddress,
    CallDataOffset,
    CallDataLength,
    ReturnDataOffset,
    ReturnDataLength,
    Value,
    IsSuccess,
    IsPersistent,
    IsStatic,

    // Saved by a caller before it dives into a callee, read back when the
    // callee returns.
    IsRoot,
    IsCreate,
    CodeHash,
    ProgramCounter,
    StackPointer,
    GasLeft,
    MemorySize,
    ReversibleWriteCounter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum CopyDataTypeTag {
    Memory = 1,
    Bytecode,
    TxCalldata,
    TxLog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum EccOpTag {
    Add = 1,
    Mul,
    Pairing,
}

impl_tag_into_field!(
    FixedTableTag,
    BlockContextFieldTag,
    TxContextFieldTag,
    RwTableTag,
    AccountFieldTag,
    CallContextFieldTag,
    CopyDataTypeTag,
    EccOpTag,
);

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTableRow {
    pub tag: FixedTableTag,
    #[serde_as(as = "FieldHex")]
    pub value1: Fr,
    #[serde_as(as = "FieldHex")]
    pub value2: Fr,
    #[serde_as(as = "FieldHex")]
    pub value3: Fr,
}

impl FixedTableRow {
    pub fn new(
        tag: FixedTableTag,
        value1: impl Into<Fr>,
        value2: impl Into<Fr>,
        value3: impl Into<Fr>,
    ) -> Self {
        Self {
            tag,
            value1: value1.into(),
            value2: value2.into(),
            value3: value3.into(),
        }
    }
}

impl TableRow for FixedTableRow {
    const TABLE: Table = Table::Fixed;

    fn entries(&self) -> Vec<Fr> {
        vec![self.tag.into(), self.value1, self.value2, self.value3]
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTableRow {
    pub field_tag: BlockContextFieldTag,
    #[serde_as(as = "FieldHex")]
    pub block_number: Fr,
    pub value: Word,
}

impl TableRow for BlockTableRow {
    const TABLE: Table = Table::Block;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.field_tag.into(),
            self.block_number,
            self.value.lo,
            self.value.hi,
        ]
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTableRow {
    #[serde_as(as = "FieldHex")]
    pub tx_id: Fr,
    pub field_tag: TxContextFieldTag,
    /// Byte offset for [`TxContextFieldTag::CallData`], zero otherwise.
    #[serde_as(as = "FieldHex")]
    pub index: Fr,
    pub value: Word,
}

impl TableRow for TxTableRow {
    const TABLE: Table = Table::Tx;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.tx_id,
            self.field_tag.into(),
            self.index,
            self.value.lo,
            self.value.hi,
        ]
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeTableRow {
    pub code_hash: Word,
    #[serde_as(as = "FieldHex")]
    pub index: Fr,
    #[serde_as(as = "FieldHex")]
    pub byte: Fr,
    /// Zero for push data.
    #[serde_as(as = "FieldHex")]
    pub is_code: Fr,
}

impl TableRow for BytecodeTableRow {
    const TABLE: Table = Table::Bytecode;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.code_hash.lo,
            self.code_hash.hi,
            self.index,
            self.byte,
            self.is_code,
        ]
    }
}

/// One access to the state. The columns `id`, `address`, `field_tag` and
/// `storage_key` form the key; their meaning depends on the tag:
///
/// | tag                        | id      | address | field_tag | storage_key |
/// |----------------------------|---------|---------|-----------|-------------|
/// | TxAccessListAccount        | tx_id   | account |           |             |
/// | TxAccessListAccountStorage | tx_id   | account |           | slot        |
/// | TxRefund                   | tx_id   |         |           |             |
/// | Account                    |         | account | field     |             |
/// | AccountStorage             | tx_id   | account |           | slot        |
/// | AccountDestructed          |         | account |           |             |
/// | CallContext                | call_id |         | field     |             |
/// | Stack                      | call_id | pointer |           |             |
/// | Memory                     | call_id | address |           |             |
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RwTableRow {
    #[serde_as(as = "FieldHex")]
    pub rw_counter: Fr,
    pub is_write: bool,
    pub tag: RwTableTag,
    #[serde_as(as = "FieldHex")]
    pub id: Fr,
    #[serde_as(as = "FieldHex")]
    pub address: Fr,
    #[serde_as(as = "FieldHex")]
    pub field_tag: Fr,
    pub storage_key: Word,
    pub value: Word,
    pub value_prev: Word,
    /// Value of the slot at the start of the transaction, for
    /// [`RwTableTag::AccountStorage`].
    pub committed_value: Word,
}

impl RwTableRow {
    pub fn new(rw_counter: u64, is_write: bool, tag: RwTableTag) -> Self {
        Self {
            rw_counter: Fr::from(rw_counter),
            is_write,
            tag,
            id: Fr::zero(),
            address: Fr::zero(),
            field_tag: Fr::zero(),
            storage_key: Word::zero(),
            value: Word::zero(),
            value_prev: Word::zero(),
            committed_value: Word::zero(),
        }
    }
}

impl TableRow for RwTableRow {
    const TABLE: Table = Table::Rw;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.rw_counter,
            bool_to_field(self.is_write),
            self.tag.into(),
            self.id,
            self.address,
            self.field_tag,
            self.storage_key.lo,
            self.storage_key.hi,
            self.value.lo,
            self.value.hi,
            self.value_prev.lo,
            self.value_prev.hi,
            self.committed_value.lo,
            self.committed_value.hi,
        ]
    }
}

/// A copy of `length` bytes from `[src_addr, src_addr_end)` of the source to
/// `dst_addr` of the destination. `rlc_acc` accumulates the copied bytes in
/// reading order and `rwc_inc` is the number of read/write rows the copy
/// consumes, starting at `rw_counter`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyTableRow {
    pub src_id: Word,
    pub src_type: CopyDataTypeTag,
    pub dst_id: Word,
    pub dst_type: CopyDataTypeTag,
    #[serde_as(as = "FieldHex")]
    pub src_addr: Fr,
    #[serde_as(as = "FieldHex")]
    pub src_addr_end: Fr,
    #[serde_as(as = "FieldHex")]
    pub dst_addr: Fr,
    #[serde_as(as = "FieldHex")]
    pub length: Fr,
    #[serde_as(as = "FieldHex")]
    pub rlc_acc: Fr,
    #[serde_as(as = "FieldHex")]
    pub rw_counter: Fr,
    #[serde_as(as = "FieldHex")]
    pub rwc_inc: Fr,
}

impl TableRow for CopyTableRow {
    const TABLE: Table = Table::Copy;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.src_id.lo,
            self.src_id.hi,
            self.src_type.into(),
            self.dst_id.lo,
            self.dst_id.hi,
            self.dst_type.into(),
            self.src_addr,
            self.src_addr_end,
            self.dst_addr,
            self.length,
            self.rlc_acc,
            self.rw_counter,
            self.rwc_inc,
        ]
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeccakTableRow {
    /// Input bytes accumulated in reading order.
    #[serde_as(as = "FieldHex")]
    pub input_rlc: Fr,
    #[serde_as(as = "FieldHex")]
    pub length: Fr,
    /// Digest read as a big-endian integer.
    pub output: Word,
}

impl TableRow for KeccakTableRow {
    const TABLE: Table = Table::Keccak;

    fn entries(&self) -> Vec<Fr> {
        vec![self.input_rlc, self.length, self.output.lo, self.output.hi]
    }
}

/// One step of the exponentiation by squaring of `base` to `exponent`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpTableRow {
    #[serde_as(as = "FieldHex")]
    pub identifier: Fr,
    #[serde_as(as = "FieldHex")]
    pub is_last: Fr,
    pub base: Word,
    pub exponent: Word,
    pub exponentiation: Word,
}

impl TableRow for ExpTableRow {
    const TABLE: Table = Table::Exp;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.identifier,
            self.is_last,
            self.base.lo,
            self.base.hi,
            self.exponent.lo,
            self.exponent.hi,
            self.exponentiation.lo,
            self.exponentiation.hi,
        ]
    }
}

/// An ECDSA public key recovery over secp256k1. `sig_v` is the recovery id
/// (0 or 1).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigTableRow {
    pub msg_hash: Word,
    #[serde_as(as = "FieldHex")]
    pub sig_v: Fr,
    pub sig_r: Word,
    pub sig_s: Word,
    #[serde_as(as = "FieldHex")]
    pub recovered_addr: Fr,
    #[serde_as(as = "FieldHex")]
    pub is_valid: Fr,
}

impl TableRow for SigTableRow {
    const TABLE: Table = Table::Sig;

    fn entries(&self) -> Vec<Fr> {
        vec![
            self.msg_hash.lo,
            self.msg_hash.hi,
            self.sig_v,
            self.sig_r.lo,
            self.sig_r.hi,
            self.sig_s.lo,
            self.sig_s.hi,
            self.recovered_addr,
            self.is_valid,
        ]
    }
}

/// A BN254 G1 operation. Unused inputs are zero: `q` for a multiplication,
/// `scalar` for an addition.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccTableRow {
    pub op_type: EccOpTag,
    pub px: Word,
    pub py: Word,
    pub qx: Word,
    pub qy: Word,
    pub scalar: Word,
    pub out_x: Word,
    pub out_y: Word,
    #[serde_as(as = "FieldHex")]
    pub is_valid: Fr,
}

impl TableRow for EccTableRow {
    const TABLE: Table = Table::Ecc;

    fn entries(&self) -> Vec<Fr> {
        let mut entries = vec![self.op_type.into()];
        for word in [
            &self.px,
            &self.py,
            &self.qx,
            &self.qy,
            &self.scalar,
            &self.out_x,
            &self.out_y,
        ] {
            entries.push(word.lo);
            entries.push(word.hi);
        }
        entries.push(self.is_valid);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_widths() {
        assert_eq!(RwTableRow::new(1, true, RwTableTag::Stack).entries().len(), 14);
        let ecc = EccTableRow {
            op_type: EccOpTag::Add,
            px: Word::zero(),
            py: Word::zero(),
            qx: Word::zero(),
            qy: Word::zero(),
            scalar: Word::zero(),
            out_x: Word::zero(),
            out_y: Word::zero(),
            is_valid: Fr::from(1u64),
        };
        assert_eq!(ecc.entries().len(), 16);
        assert_eq!(ecc.entries()[0], Fr::from(1u64));
    }

    #[test]
    fn test_reversible_tags() {
        assert!(RwTableTag::Account.write_with_reversion());
        assert!(!RwTableTag::TxRefund.write_with_reversion());
        assert!(RwTableTag::TxRefund.write_only_persistent());
        assert!(!RwTableTag::Stack.write_only_persistent());
    }
}
