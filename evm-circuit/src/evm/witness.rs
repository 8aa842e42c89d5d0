//! Builders of the table rows and steps a prover hands to the verifier. They
//! compute what the constraints only look up: code hashes, calldata costs,
//! the ordering of the read/write rows and their reversals.

use crate::{
    evm::{opcode::Opcode, step::StepState, table::*},
    lookups::TableWitness,
    serialization::FieldHex,
    util::{
        arithmetic::rlc_encode_bytes,
        hash::keccak256_word,
        param::{GAS_COST_TX_CALL_DATA_PER_NON_ZERO_BYTE, GAS_COST_TX_CALL_DATA_PER_ZERO_BYTE},
        Fr, Word,
    },
};
use ark_ff::Zero;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// A transaction, flattened into the rows of the transaction table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: u64,
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: Word,
    pub caller_address: Fr,
    /// For a creation, the address of the created contract.
    pub callee_address: Fr,
    pub is_create: bool,
    pub value: Word,
    pub call_data: Vec<u8>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            id: 1,
            nonce: 0,
            gas: 21000,
            gas_price: Word::from(2_000_000_000u64),
            caller_address: Fr::zero(),
            callee_address: Fr::zero(),
            is_create: false,
            value: Word::zero(),
            call_data: vec![],
        }
    }
}

impl Transaction {
    /// Intrinsic gas of the calldata: 4 per zero byte, 16 per other byte.
    pub fn call_data_gas_cost(&self) -> u64 {
        self.call_data
            .iter()
            .map(|byte| match byte {
                0 => GAS_COST_TX_CALL_DATA_PER_ZERO_BYTE,
                _ => GAS_COST_TX_CALL_DATA_PER_NON_ZERO_BYTE,
            })
            .sum()
    }

    pub fn table_rows(&self) -> Vec<TxTableRow> {
        let tx_id = Fr::from(self.id);
        let row = |field_tag, index: u64, value: Word| TxTableRow {
            tx_id,
            field_tag,
            index: Fr::from(index),
            value,
        };
        let mut rows = vec![
            row(TxContextFieldTag::Nonce, 0, Word::from(self.nonce)),
            row(TxContextFieldTag::Gas, 0, Word::from(self.gas)),
            row(TxContextFieldTag::GasPrice, 0, self.gas_price),
            row(TxContextFieldTag::CallerAddress, 0, Word::from(self.caller_address)),
            row(TxContextFieldTag::CalleeAddress, 0, Word::from(self.callee_address)),
            row(TxContextFieldTag::IsCreate, 0, Word::from(self.is_create)),
            row(TxContextFieldTag::Value, 0, self.value),
            row(
                TxContextFieldTag::CallDataLength,
                0,
                Word::from(self.call_data.len() as u64),
            ),
            row(
                TxContextFieldTag::CallDataGasCost,
                0,
                Word::from(self.call_data_gas_cost()),
            ),
        ];
        rows.extend(self.call_data.iter().enumerate().map(|(index, byte)| {
            row(TxContextFieldTag::CallData, index as u64, Word::from(*byte as u64))
        }));
        rows
    }
}

/// The block context, flattened into the rows of the block table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub coinbase: Fr,
    pub gas_limit: u64,
    pub number: u64,
    pub timestamp: u64,
    pub prev_randao: Word,
    pub base_fee: Word,
    pub chain_id: u64,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            coinbase: Fr::from(0x10u64),
            gas_limit: 30_000_000,
            number: 1,
            timestamp: 0,
            prev_randao: Word::zero(),
            base_fee: Word::from(1_000_000_000u64),
            chain_id: 1,
        }
    }
}

impl Block {
    pub fn table_rows(&self) -> Vec<BlockTableRow> {
        [
            (BlockContextFieldTag::Coinbase, Word::from(self.coinbase)),
            (BlockContextFieldTag::GasLimit, Word::from(self.gas_limit)),
            (BlockContextFieldTag::Number, Word::from(self.number)),
            (BlockContextFieldTag::Timestamp, Word::from(self.timestamp)),
            (BlockContextFieldTag::PrevRandao, self.prev_randao),
            (BlockContextFieldTag::BaseFee, self.base_fee),
            (BlockContextFieldTag::ChainId, Word::from(self.chain_id)),
        ]
        .into_iter()
        .map(|(field_tag, value)| BlockTableRow {
            field_tag,
            block_number: Fr::zero(),
            value,
        })
        .collect()
    }
}

/// Code under construction. Push data is tracked so that the bytecode table
/// tells code from data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bytecode {
    code: Vec<u8>,
    is_code: Vec<bool>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses raw code, marking the data of every push.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bytecode = Self::new();
        let mut push_data_left = 0;
        for byte in bytes {
            let is_code = push_data_left == 0;
            push_data_left = if is_code {
                Opcode(*byte).push_size()
            } else {
                push_data_left - 1
            };
            bytecode.code.push(*byte);
            bytecode.is_code.push(is_code);
        }
        bytecode
    }

    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.code.push(opcode.0);
        self.is_code.push(true);
        self
    }

    /// `PUSHn` of big-endian `bytes`, with `n` the number of bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.op(Opcode::push(bytes.len() as u8));
        for byte in bytes {
            self.code.push(*byte);
            self.is_code.push(false);
        }
        self
    }

    /// Pushes `value` with as few bytes as possible.
    pub fn push(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let start = bytes
            .iter()
            .position(|byte| *byte != 0)
            .unwrap_or(bytes.len() - 1);
        self.push_bytes(&bytes[start..])
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn hash(&self) -> Word {
        keccak256_word(&self.code)
    }

    pub fn table_rows(&self) -> Vec<BytecodeTableRow> {
        let code_hash = self.hash();
        self.code
            .iter()
            .zip(&self.is_code)
            .enumerate()
            .map(|(index, (byte, is_code))| BytecodeTableRow {
                code_hash,
                index: Fr::from(index as u64),
                byte: Fr::from(*byte as u64),
                is_code: Fr::from(*is_code),
            })
            .collect()
    }
}

/// An account and its code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub address: Fr,
    pub nonce: u64,
    pub balance: Word,
    pub code: Bytecode,
}

impl Account {
    pub fn code_hash(&self) -> Word {
        self.code.hash()
    }
}

/// Read/write rows in counter order. Every access takes the next counter; a
/// reversible write may also give the counter of its reversal, which is then
/// recorded with the value and the previous value swapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RwDictionary {
    rw_counter: u64,
    rows: Vec<RwTableRow>,
}

impl Default for RwDictionary {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RwDictionary {
    pub fn new(rw_counter: u64) -> Self {
        Self {
            rw_counter,
            rows: vec![],
        }
    }

    /// The counter the next access takes.
    pub fn rw_counter(&self) -> u64 {
        self.rw_counter
    }

    pub fn rows(&self) -> &[RwTableRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RwTableRow> {
        self.rows
    }

    /// Records `row` at the next counter, and its reversal at
    /// `rw_counter_of_reversion` if given.
    pub fn push(&mut self, mut row: RwTableRow, rw_counter_of_reversion: Option<u64>) -> &mut Self {
        row.rw_counter = Fr::from(self.rw_counter);
        self.rw_counter += 1;
        if let Some(rw_counter) = rw_counter_of_reversion {
            let reversal = RwTableRow {
                rw_counter: Fr::from(rw_counter),
                value: row.value_prev,
                value_prev: row.value,
                ..row.clone()
            };
            self.rows.push(reversal);
        }
        self.rows.push(row);
        self
    }

    /// Skips counters taken by rows recorded elsewhere.
    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.rw_counter += n;
        self
    }

    fn stack(&mut self, is_write: bool, call_id: Fr, stack_pointer: u64, value: Word) -> &mut Self {
        let row = RwTableRow {
            id: call_id,
            address: Fr::from(stack_pointer),
            value,
            ..RwTableRow::new(0, is_write, RwTableTag::Stack)
        };
        self.push(row, None)
    }

    pub fn stack_read(&mut self, call_id: Fr, stack_pointer: u64, value: Word) -> &mut Self {
        self.stack(false, call_id, stack_pointer, value)
    }

    pub fn stack_write(&mut self, call_id: Fr, stack_pointer: u64, value: Word) -> &mut Self {
        self.stack(true, call_id, stack_pointer, value)
    }

    pub fn memory_read(&mut self, call_id: Fr, address: u64, byte: u8) -> &mut Self {
        let row = RwTableRow {
            id: call_id,
            address: Fr::from(address),
            value: Word::from(byte as u64),
            ..RwTableRow::new(0, false, RwTableTag::Memory)
        };
        self.push(row, None)
    }

    fn call_context(
        &mut self,
        is_write: bool,
        call_id: Fr,
        field_tag: CallContextFieldTag,
        value: impl Into<Word>,
    ) -> &mut Self {
        let row = RwTableRow {
            id: call_id,
            field_tag: field_tag.into(),
            value: value.into(),
            ..RwTableRow::new(0, is_write, RwTableTag::CallContext)
        };
        self.push(row, None)
    }

    pub fn call_context_read(
        &mut self,
        call_id: Fr,
        field_tag: CallContextFieldTag,
        value: impl Into<Word>,
    ) -> &mut Self {
        self.call_context(false, call_id, field_tag, value)
    }

    pub fn call_context_write(
        &mut self,
        call_id: Fr,
        field_tag: CallContextFieldTag,
        value: impl Into<Word>,
    ) -> &mut Self {
        self.call_context(true, call_id, field_tag, value)
    }

    pub fn account_read(
        &mut self,
        address: Fr,
        field_tag: AccountFieldTag,
        value: impl Into<Word>,
    ) -> &mut Self {
        let value = value.into();
        let row = RwTableRow {
            address,
            field_tag: field_tag.into(),
            value,
            value_prev: value,
            ..RwTableRow::new(0, false, RwTableTag::Account)
        };
        self.push(row, None)
    }

    pub fn account_write(
        &mut self,
        address: Fr,
        field_tag: AccountFieldTag,
        value: impl Into<Word>,
        value_prev: impl Into<Word>,
        rw_counter_of_reversion: Option<u64>,
    ) -> &mut Self {
        let row = RwTableRow {
            address,
            field_tag: field_tag.into(),
            value: value.into(),
            value_prev: value_prev.into(),
            ..RwTableRow::new(0, true, RwTableTag::Account)
        };
        self.push(row, rw_counter_of_reversion)
    }

    pub fn account_storage_read(
        &mut self,
        tx_id: Fr,
        address: Fr,
        storage_key: Word,
        value: Word,
        committed_value: Word,
    ) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            address,
            storage_key,
            value,
            value_prev: value,
            committed_value,
            ..RwTableRow::new(0, false, RwTableTag::AccountStorage)
        };
        self.push(row, None)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn account_storage_write(
        &mut self,
        tx_id: Fr,
        address: Fr,
        storage_key: Word,
        value: Word,
        value_prev: Word,
        committed_value: Word,
        rw_counter_of_reversion: Option<u64>,
    ) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            address,
            storage_key,
            value,
            value_prev,
            committed_value,
            ..RwTableRow::new(0, true, RwTableTag::AccountStorage)
        };
        self.push(row, rw_counter_of_reversion)
    }

    pub fn tx_access_list_account_read(&mut self, tx_id: Fr, address: Fr, is_warm: bool) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            address,
            value: Word::from(is_warm),
            value_prev: Word::from(is_warm),
            ..RwTableRow::new(0, false, RwTableTag::TxAccessListAccount)
        };
        self.push(row, None)
    }

    /// Warms the account up; `is_warm_prev` tells whether it already was.
    pub fn tx_access_list_account_write(
        &mut self,
        tx_id: Fr,
        address: Fr,
        is_warm_prev: bool,
        rw_counter_of_reversion: Option<u64>,
    ) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            address,
            value: Word::from(true),
            value_prev: Word::from(is_warm_prev),
            ..RwTableRow::new(0, true, RwTableTag::TxAccessListAccount)
        };
        self.push(row, rw_counter_of_reversion)
    }

    pub fn tx_access_list_account_storage_write(
        &mut self,
        tx_id: Fr,
        address: Fr,
        storage_key: Word,
        is_warm_prev: bool,
        rw_counter_of_reversion: Option<u64>,
    ) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            address,
            storage_key,
            value: Word::from(true),
            value_prev: Word::from(is_warm_prev),
            ..RwTableRow::new(0, true, RwTableTag::TxAccessListAccountStorage)
        };
        self.push(row, rw_counter_of_reversion)
    }

    pub fn tx_refund_read(&mut self, tx_id: Fr, value: u64) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            value: Word::from(value),
            value_prev: Word::from(value),
            ..RwTableRow::new(0, false, RwTableTag::TxRefund)
        };
        self.push(row, None)
    }

    pub fn tx_refund_write(&mut self, tx_id: Fr, value: u64, value_prev: u64) -> &mut Self {
        let row = RwTableRow {
            id: tx_id,
            value: Word::from(value),
            value_prev: Word::from(value_prev),
            ..RwTableRow::new(0, true, RwTableTag::TxRefund)
        };
        self.push(row, None)
    }
}

/// Copy events, with the read/write rows they consume.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyCircuit {
    pub rows: Vec<CopyTableRow>,
}

impl CopyCircuit {
    /// Copies `code` out of the memory of `call_id` at `src_addr` into a
    /// bytecode region named after its hash. One memory read per byte is
    /// recorded in `rw`.
    pub fn copy_memory_to_bytecode(
        &mut self,
        rw: &mut RwDictionary,
        call_id: Fr,
        src_addr: u64,
        code: &[u8],
        randomness: Fr,
    ) -> &CopyTableRow {
        let rw_counter = rw.rw_counter();
        for (offset, byte) in code.iter().enumerate() {
            rw.memory_read(call_id, src_addr + offset as u64, *byte);
        }
        let length = code.len() as u64;
        self.rows.push(CopyTableRow {
            src_id: Word::from(call_id),
            src_type: CopyDataTypeTag::Memory,
            dst_id: keccak256_word(code),
            dst_type: CopyDataTypeTag::Bytecode,
            src_addr: Fr::from(src_addr),
            src_addr_end: Fr::from(src_addr + length),
            dst_addr: Fr::zero(),
            length: Fr::from(length),
            rlc_acc: rlc_encode_bytes(code, randomness),
            rw_counter: Fr::from(rw_counter),
            rwc_inc: Fr::from(length),
        });
        &self.rows[self.rows.len() - 1]
    }
}

impl KeccakTableRow {
    /// The digest of `bytes`, keyed by their linear combination.
    pub fn from_bytes(bytes: &[u8], randomness: Fr) -> Self {
        Self {
            input_rlc: rlc_encode_bytes(bytes, randomness),
            length: Fr::from(bytes.len() as u64),
            output: keccak256_word(bytes),
        }
    }
}

/// Everything the verifier reads: the randomness of the linear combinations,
/// the witness-dependent tables and the steps.
#[serde_as]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Witness {
    #[serde_as(as = "FieldHex")]
    pub randomness: Fr,
    pub tables: TableWitness,
    pub steps: Vec<StepState>,
}

impl Witness {
    pub fn new(randomness: Fr, tables: TableWitness, steps: Vec<StepState>) -> Self {
        Self {
            randomness,
            tables,
            steps,
        }
    }
}
