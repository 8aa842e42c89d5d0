//! The constraint engine shared by every execution state.
//!
//! An [`Instruction`] wraps one pair of consecutive steps. The rules compose
//! its primitives: arithmetic with carry proofs, byte decompositions, lookups
//! into the tables and the assertions on the shape of the next step. The
//! offsets it keeps (read/write counter, program counter, stack pointer) only
//! live for the verification of one step.

use crate::{
    error::{ConstraintError, Result},
    evm::{
        execution_state::ExecutionState,
        opcode::Opcode,
        step::{StateTransition, StepState, Transition},
        table::*,
    },
    lookups::{Query, Tables},
    util::{
        arithmetic::{add_words, bytes_to_fq, fq_to_le_bytes, rlc_encode_bytes},
        constraint_system::ConstraintSystem,
        hash::{create2_preimage, rlp_encode_create_preimage},
        param::*,
        FieldHelpers, Fr, Word,
    },
};
use ark_ff::{Field, One, Zero};
use std::panic::Location;

/// Reversion bookkeeping of a call: where its reversal writes go and how
/// many reversible writes it has issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReversionInfo {
    rw_counter_end_of_reversion: Fr,
    is_persistent: Fr,
    reversible_write_counter: Fr,
}

impl ReversionInfo {
    pub fn new(
        rw_counter_end_of_reversion: Fr,
        is_persistent: Fr,
        reversible_write_counter: Fr,
    ) -> Self {
        Self {
            rw_counter_end_of_reversion,
            is_persistent,
            reversible_write_counter,
        }
    }

    /// Read/write counter of the reversal of the next reversible write. The
    /// reversals of a call are laid out backwards from its end of reversion.
    pub fn rw_counter_of_reversion(&mut self) -> Fr {
        let rw_counter = self.rw_counter_end_of_reversion - self.reversible_write_counter;
        self.reversible_write_counter += Fr::one();
        rw_counter
    }

    pub fn rw_counter_end_of_reversion(&self) -> Fr {
        self.rw_counter_end_of_reversion
    }

    pub fn is_persistent(&self) -> Fr {
        self.is_persistent
    }

    pub fn reversible_write_counter(&self) -> Fr {
        self.reversible_write_counter
    }
}

/// Key and values of a read/write table lookup. Key columns that a tag does
/// not use stay zero; `None` values are looked up.
#[derive(Clone, Debug, Default)]
pub struct RwQuery {
    pub id: Fr,
    pub address: Fr,
    pub field_tag: Fr,
    pub storage_key: Word,
    pub value: Option<Word>,
    pub value_prev: Option<Word>,
    pub committed_value: Option<Word>,
}

/// Transition of an opcode that stays in the current call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameContextTransition {
    pub rw_counter: Transition,
    pub program_counter: Transition,
    pub stack_pointer: Transition,
    pub memory_word_size: Transition,
    pub reversible_write_counter: Transition,
    pub dynamic_gas_cost: Fr,
}

/// Transition into a fresh call context.
#[derive(Clone, Copy, Debug, Default)]
pub struct NewContextTransition {
    pub rw_counter: Transition,
    pub call_id: Transition,
    pub is_root: Transition,
    pub is_create: Transition,
    pub code_hash: Transition,
    pub gas_left: Transition,
    pub reversible_write_counter: Transition,
}

/// Return from the current call to its caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct RestoredContextTransition {
    /// Read/write rows skipped on top of the ones looked up by the step.
    pub rw_counter_delta: Fr,
    pub return_data_offset: Fr,
    pub return_data_length: Fr,
    /// Gas handed back to the caller.
    pub gas_left: Fr,
    pub is_success: Fr,
}

pub struct Instruction<'a> {
    pub tables: &'a Tables,
    pub curr: &'a StepState,
    pub next: &'a StepState,
    /// Randomness of the linear combinations of byte strings.
    pub randomness: Fr,
    pub is_first_step: bool,
    pub is_last_step: bool,

    rw_counter_offset: u64,
    program_counter_offset: u64,
    stack_pointer_offset: i64,
}

impl<'a> Instruction<'a> {
    pub fn new(
        tables: &'a Tables,
        curr: &'a StepState,
        next: &'a StepState,
        randomness: Fr,
        is_first_step: bool,
        is_last_step: bool,
    ) -> Self {
        Self {
            tables,
            curr,
            next,
            randomness,
            is_first_step,
            is_last_step,
            rw_counter_offset: 0,
            program_counter_offset: 0,
            stack_pointer_offset: 0,
        }
    }

    /// Number of read/write rows looked up so far.
    pub fn rw_counter_offset(&self) -> u64 {
        self.rw_counter_offset
    }

    // Constraints

    #[track_caller]
    pub fn constrain_zero(&self, value: Fr) -> Result<()> {
        self.constrain_equal(value, Fr::zero())
    }

    #[track_caller]
    pub fn constrain_equal(&self, lhs: Fr, rhs: Fr) -> Result<()> {
        if lhs == rhs {
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
        self.constrain_zero(value * (Fr::one() - value))
    }

    #[track_caller]
    pub fn constrain_not_zero(&self, value: Fr) -> Result<()> {
        self.constrain_zero(self.is_zero(value))
    }

    /// Checks that `value < 256^n_bytes`.
    #[track_caller]
    pub fn range_check(&self, value: Fr, n_bytes: usize) -> Result<()> {
        if value.to_le_bytes_trimmed().len() <= n_bytes {
            Ok(())
        } else {
            Err(ConstraintError::OutOfRange {
                location: Location::caller(),
                value: value.to_hex_string(),
                n_bytes,
            })
        }
    }

    /// Constrains `a * b + c == d (mod 2^256)` and returns the overflow.
    #[track_caller]
    pub fn mul_add_words(&self, a: &Word, b: &Word, c: &Word, d: &Word) -> Result<Word> {
        ConstraintSystem::new().mul_add_words(a, b, c, d)
    }

    /// `a + b` modulo `2^256`, with the carry out of the high limb.
    pub fn add_words(&self, addends: &[Word]) -> Result<(Word, Fr)> {
        add_words(addends)
    }

    // Boolean and arithmetic gadgets

    pub fn is_zero(&self, value: Fr) -> Fr {
        let inverse = value.inverse().unwrap_or_else(Fr::zero);
        Fr::one() - value * inverse
    }

    pub fn is_equal(&self, lhs: Fr, rhs: Fr) -> Fr {
        self.is_zero(lhs - rhs)
    }

    pub fn is_zero_word(&self, word: &Word) -> Fr {
        self.is_zero(word.lo) * self.is_zero(word.hi)
    }

    pub fn is_equal_word(&self, lhs: &Word, rhs: &Word) -> Fr {
        self.is_equal(lhs.lo, rhs.lo) * self.is_equal(lhs.hi, rhs.hi)
    }

    /// `when_true` if `condition` is one, `when_false` if it is zero.
    pub fn select(&self, condition: Fr, when_true: Fr, when_false: Fr) -> Fr {
        condition * (when_true - when_false) + when_false
    }

    pub fn select_word(&self, condition: Fr, when_true: &Word, when_false: &Word) -> Word {
        Word::new(
            self.select(condition, when_true.lo, when_false.lo),
            self.select(condition, when_true.hi, when_false.hi),
        )
    }

    /// Indicators of `value == lhs` and `value == rhs`; `value` must be one of
    /// them.
    #[track_caller]
    pub fn pair_select(&self, value: Fr, lhs: Fr, rhs: Fr) -> Result<(Fr, Fr)> {
        let is_lhs = self.is_equal(value, lhs);
        let is_rhs = self.is_equal(value, rhs);
        self.constrain_equal(is_lhs + is_rhs, Fr::one())?;
        Ok((is_lhs, is_rhs))
    }

    /// Indicators of `value == options[i]`; exactly one of them is set.
    #[track_caller]
    pub fn multiple_select(&self, value: Fr, options: &[Fr]) -> Result<Vec<Fr>> {
        let selectors: Vec<Fr> = options
            .iter()
            .map(|option| self.is_equal(value, *option))
            .collect();
        self.constrain_equal(self.sum(&selectors), Fr::one())?;
        Ok(selectors)
    }

    pub fn sum(&self, values: &[Fr]) -> Fr {
        values.iter().sum()
    }

    /// `(lhs < rhs, lhs == rhs)` for values of at most `n_bytes` bytes.
    #[track_caller]
    pub fn compare(&self, lhs: Fr, rhs: Fr, n_bytes: usize) -> Result<(Fr, Fr)> {
        if n_bytes > MAX_N_BYTES {
            return Err(ConstraintError::Witness(format!(
                "cannot compare values of {n_bytes} bytes in the field"
            )));
        }
        let lt = Fr::from(lhs.to_biguint() < rhs.to_biguint());
        let diff = lhs - rhs + lt * Fr::two_pow(8 * n_bytes as u64);
        self.range_check(diff, n_bytes)?;
        Ok((lt, self.is_zero(diff)))
    }

    #[track_caller]
    pub fn compare_word(&self, lhs: &Word, rhs: &Word) -> Result<(Fr, Fr)> {
        let (hi_lt, hi_eq) = self.compare(lhs.hi, rhs.hi, 16)?;
        let (lo_lt, lo_eq) = self.compare(lhs.lo, rhs.lo, 16)?;
        Ok((hi_lt + hi_eq * lo_lt, hi_eq * lo_eq))
    }

    #[track_caller]
    pub fn min(&self, lhs: Fr, rhs: Fr, n_bytes: usize) -> Result<Fr> {
        let (lt, _) = self.compare(lhs, rhs, n_bytes)?;
        Ok(self.select(lt, lhs, rhs))
    }

    #[track_caller]
    pub fn max(&self, lhs: Fr, rhs: Fr, n_bytes: usize) -> Result<Fr> {
        let (lt, _) = self.compare(lhs, rhs, n_bytes)?;
        Ok(self.select(lt, rhs, lhs))
    }

    /// Quotient and remainder of the division by a constant; the quotient
    /// must fit `n_bytes`.
    #[track_caller]
    pub fn constant_divmod(
        &self,
        numerator: Fr,
        denominator: u64,
        n_bytes: usize,
    ) -> Result<(Fr, Fr)> {
        let value = numerator.to_biguint();
        let quotient = Fr::from_biguint(&(&value / denominator));
        let remainder = Fr::from_biguint(&(&value % denominator));
        self.range_check(quotient, n_bytes)?;
        let (remainder_lt, _) = self.compare(remainder, Fr::from(denominator), N_BYTES_U64)?;
        self.constrain_equal(remainder_lt, Fr::one())?;
        self.constrain_equal(numerator, quotient * Fr::from(denominator) + remainder)?;
        Ok((quotient, remainder))
    }

    /// `1` if the word is negative as a two's complement integer.
    #[track_caller]
    pub fn word_is_neg(&self, word: &Word) -> Result<Fr> {
        let bytes = word.to_le_bytes()?;
        let (is_neg, _) = self.compare(Fr::from(127u64), Fr::from(bytes[31] as u64), 1)?;
        Ok(is_neg)
    }

    /// Little-endian bytes of the word.
    pub fn word_to_bytes(&self, word: &Word) -> Result<[u8; 32]> {
        word.to_le_bytes()
    }

    pub fn bytes_to_fq(&self, bytes: &[u8]) -> Result<Fr> {
        bytes_to_fq(bytes)
    }

    /// The word as a field element, requiring it to fit `n_bytes`.
    pub fn word_to_fq(&self, word: &Word, n_bytes: usize) -> Result<Fr> {
        let bytes = word.to_le_bytes()?;
        if n_bytes > MAX_N_BYTES || bytes[n_bytes.min(32)..].iter().any(|b| *b != 0) {
            return Err(ConstraintError::Shape {
                value: word.to_string(),
                n_bytes,
            });
        }
        bytes_to_fq(&bytes[..n_bytes])
    }

    /// The low 20 bytes of the word, as the EVM truncates stack addresses.
    pub fn word_to_address(&self, word: &Word) -> Result<Fr> {
        let bytes = word.to_le_bytes()?;
        bytes_to_fq(&bytes[..N_BYTES_ACCOUNT_ADDRESS])
    }

    /// Field value as a `u64`, for witness values used as offsets.
    pub fn field_to_u64(&self, value: Fr, what: &str) -> Result<u64> {
        value
            .to_u64()
            .ok_or_else(|| ConstraintError::Witness(format!("{what} {} is not a u64", value.to_hex_string())))
    }

    // Fixed table lookups

    pub fn fixed_lookup(
        &self,
        tag: FixedTableTag,
        value1: Fr,
        value2: Option<Fr>,
        value3: Option<Fr>,
    ) -> Result<&'a FixedTableRow> {
        let tables: &'a Tables = self.tables;
        tables.fixed_lookup(
            &Query::new()
                .value(tag)
                .value(value1)
                .maybe_value(value2)
                .maybe_value(value3),
        )
    }

    /// Checks that `value < range` for one of the range tables.
    pub fn range_lookup(&self, value: Fr, range: u64) -> Result<()> {
        let tag = FixedTableTag::range(range)
            .ok_or_else(|| ConstraintError::Witness(format!("no range table for {range}")))?;
        self.fixed_lookup(tag, value, Some(Fr::zero()), Some(Fr::zero()))
            .map(|_| ())
    }

    pub fn byte_range_lookup(&self, value: Fr) -> Result<()> {
        self.range_lookup(value, 256)
    }

    /// `2^exponent` for `exponent < 256`.
    pub fn pow2_lookup(&self, exponent: Fr) -> Result<Word> {
        let row = self.fixed_lookup(FixedTableTag::Pow2, exponent, None, None)?;
        Ok(Word::new(row.value2, row.value3))
    }

    /// Checks that the opcode is handled by the current execution state.
    pub fn responsible_opcode_lookup(&self, opcode: Fr) -> Result<()> {
        self.fixed_lookup(
            FixedTableTag::ResponsibleOpcode,
            self.curr.execution_state.into(),
            Some(opcode),
            Some(Fr::zero()),
        )
        .map(|_| ())
    }

    // Code and context lookups

    /// The byte at the program counter, advancing an internal offset.
    pub fn opcode_lookup(&mut self, is_code: bool) -> Result<Fr> {
        let index = self.curr.program_counter + Fr::from(self.program_counter_offset);
        self.program_counter_offset += 1;
        self.opcode_lookup_at(index, is_code)
    }

    /// The byte at `index` of the executed code. A root creation call runs
    /// the init code from the calldata of its transaction.
    pub fn opcode_lookup_at(&self, index: Fr, is_code: bool) -> Result<Fr> {
        if !self.curr.is_root.is_zero() && !self.curr.is_create.is_zero() {
            self.tx_calldata_lookup(self.curr.code_hash.lo, index)
        } else {
            self.bytecode_lookup(&self.curr.code_hash, index, Some(is_code))
        }
    }

    pub fn bytecode_lookup(&self, code_hash: &Word, index: Fr, is_code: Option<bool>) -> Result<Fr> {
        let tables: &'a Tables = self.tables;
        let row = tables.bytecode_lookup(
            &Query::new()
                .word(code_hash)
                .value(index)
                .any()
                .maybe_value(is_code.map(Fr::from)),
        )?;
        Ok(row.byte)
    }

    pub fn tx_context_lookup(&self, tx_id: Fr, field_tag: TxContextFieldTag) -> Result<Word> {
        let tables: &'a Tables = self.tables;
        let row = tables.tx_lookup(
            &Query::new()
                .value(tx_id)
                .value(field_tag)
                .value(0u64)
                .any_word(),
        )?;
        Ok(row.value)
    }

    pub fn tx_calldata_lookup(&self, tx_id: Fr, index: Fr) -> Result<Fr> {
        let tables: &'a Tables = self.tables;
        let row = tables.tx_lookup(
            &Query::new()
                .value(tx_id)
                .value(TxContextFieldTag::CallData)
                .value(index)
                .any_word(),
        )?;
        Ok(row.value.lo)
    }

    /// A field of the current block.
    pub fn block_context_lookup(&self, field_tag: BlockContextFieldTag) -> Result<Word> {
        let tables: &'a Tables = self.tables;
        let row = tables.block_lookup(
            &Query::new()
                .value(field_tag)
                .value(0u64)
                .any_word(),
        )?;
        Ok(row.value)
    }

    // Read/write table lookups

    /// Looks up a read/write row, at the next read/write counter of the step
    /// unless `rw_counter` is given.
    pub fn rw_lookup(
        &mut self,
        is_write: bool,
        tag: RwTableTag,
        query: &RwQuery,
        rw_counter: Option<Fr>,
    ) -> Result<&'a RwTableRow> {
        let rw_counter = match rw_counter {
            Some(rw_counter) => rw_counter,
            None => {
                let rw_counter = self.curr.rw_counter + Fr::from(self.rw_counter_offset);
                self.rw_counter_offset += 1;
                rw_counter
            }
        };
        let tables: &'a Tables = self.tables;
        tables.rw_lookup(
            &Query::new()
                .value(rw_counter)
                .value(is_write)
                .value(tag)
                .value(query.id)
                .value(query.address)
                .value(query.field_tag)
                .word(&query.storage_key)
                .maybe_word(query.value.as_ref())
                .maybe_word(query.value_prev.as_ref())
                .maybe_word(query.committed_value.as_ref()),
        )
    }

    /// Writes a piece of state. With reversion info, a reversible write
    /// consumes a reversal slot, and a call that is not persistent also gets
    /// the write undone there.
    pub fn state_write(
        &mut self,
        tag: RwTableTag,
        query: RwQuery,
        reversion_info: Option<&mut ReversionInfo>,
    ) -> Result<&'a RwTableRow> {
        let row = self.rw_lookup(true, tag, &query, None)?;
        if let Some(reversion_info) = reversion_info {
            if tag.write_with_reversion() {
                let rw_counter = reversion_info.rw_counter_of_reversion();
                if reversion_info.is_persistent().is_zero() {
                    let reversal = RwQuery {
                        value: Some(row.value_prev),
                        value_prev: Some(row.value),
                        committed_value: Some(row.committed_value),
                        ..query
                    };
                    self.rw_lookup(true, tag, &reversal, Some(rw_counter))?;
                }
            }
        }
        Ok(row)
    }

    /// Reversion info of the current call, or of `call_id` with a fresh
    /// write counter.
    pub fn reversion_info(&mut self, call_id: Option<Fr>) -> Result<ReversionInfo> {
        let rw_counter_end_of_reversion = self.call_context_lookup(
            CallContextFieldTag::RwCounterEndOfReversion,
            false,
            call_id,
        )?;
        let is_persistent =
            self.call_context_lookup(CallContextFieldTag::IsPersistent, false, call_id)?;
        let reversible_write_counter = match call_id {
            None => self.curr.reversible_write_counter,
            Some(_) => Fr::zero(),
        };
        Ok(ReversionInfo::new(
            rw_counter_end_of_reversion,
            is_persistent,
            reversible_write_counter,
        ))
    }

    pub fn call_context_lookup(
        &mut self,
        field_tag: CallContextFieldTag,
        is_write: bool,
        call_id: Option<Fr>,
    ) -> Result<Fr> {
        Ok(self
            .call_context_lookup_word(field_tag, is_write, call_id)?
            .expr())
    }

    pub fn call_context_lookup_word(
        &mut self,
        field_tag: CallContextFieldTag,
        is_write: bool,
        call_id: Option<Fr>,
    ) -> Result<Word> {
        let query = RwQuery {
            id: call_id.unwrap_or(self.curr.call_id),
            field_tag: field_tag.into(),
            ..Default::default()
        };
        Ok(self
            .rw_lookup(is_write, RwTableTag::CallContext, &query, None)?
            .value)
    }

    /// Pops the top of the stack. Successive pops read deeper items.
    pub fn stack_pop(&mut self) -> Result<Word> {
        let offset = self.stack_pointer_offset;
        self.stack_pointer_offset += 1;
        self.stack_lookup(false, offset)
    }

    pub fn stack_push(&mut self) -> Result<Word> {
        self.stack_pointer_offset -= 1;
        self.stack_lookup(true, self.stack_pointer_offset)
    }

    pub fn stack_lookup(&mut self, is_write: bool, stack_pointer_offset: i64) -> Result<Word> {
        let query = RwQuery {
            id: self.curr.call_id,
            address: self.curr.stack_pointer + crate::util::i64_to_field(stack_pointer_offset),
            ..Default::default()
        };
        Ok(self
            .rw_lookup(is_write, RwTableTag::Stack, &query, None)?
            .value)
    }

    pub fn account_read(&mut self, address: Fr, field_tag: AccountFieldTag) -> Result<Word> {
        let query = RwQuery {
            address,
            field_tag: field_tag.into(),
            ..Default::default()
        };
        Ok(self.rw_lookup(false, RwTableTag::Account, &query, None)?.value)
    }

    /// Returns the new and the previous value of the field.
    pub fn account_write(
        &mut self,
        address: Fr,
        field_tag: AccountFieldTag,
        reversion_info: Option<&mut ReversionInfo>,
    ) -> Result<(Word, Word)> {
        let query = RwQuery {
            address,
            field_tag: field_tag.into(),
            ..Default::default()
        };
        let row = self.state_write(RwTableTag::Account, query, reversion_info)?;
        Ok((row.value, row.value_prev))
    }

    /// Returns the value of the slot and its value at the start of the
    /// transaction.
    pub fn account_storage_read(
        &mut self,
        address: Fr,
        storage_key: &Word,
        tx_id: Fr,
    ) -> Result<(Word, Word)> {
        let query = RwQuery {
            id: tx_id,
            address,
            storage_key: *storage_key,
            ..Default::default()
        };
        let row = self.rw_lookup(false, RwTableTag::AccountStorage, &query, None)?;
        Ok((row.value, row.committed_value))
    }

    /// Returns the new, previous and committed values of the slot.
    pub fn account_storage_write(
        &mut self,
        address: Fr,
        storage_key: &Word,
        tx_id: Fr,
        reversion_info: Option<&mut ReversionInfo>,
    ) -> Result<(Word, Word, Word)> {
        let query = RwQuery {
            id: tx_id,
            address,
            storage_key: *storage_key,
            ..Default::default()
        };
        let row = self.state_write(RwTableTag::AccountStorage, query, reversion_info)?;
        Ok((row.value, row.value_prev, row.committed_value))
    }

    pub fn tx_refund_read(&mut self, tx_id: Fr) -> Result<Fr> {
        let query = RwQuery {
            id: tx_id,
            ..Default::default()
        };
        Ok(self
            .rw_lookup(false, RwTableTag::TxRefund, &query, None)?
            .value
            .expr())
    }

    /// Returns the new and previous refund, or `None` when the call is not
    /// persistent and the write is skipped.
    pub fn tx_refund_write(
        &mut self,
        tx_id: Fr,
        reversion_info: &ReversionInfo,
    ) -> Result<Option<(Fr, Fr)>> {
        if reversion_info.is_persistent().is_zero() {
            return Ok(None);
        }
        let query = RwQuery {
            id: tx_id,
            ..Default::default()
        };
        let row = self.rw_lookup(true, RwTableTag::TxRefund, &query, None)?;
        Ok(Some((row.value.expr(), row.value_prev.expr())))
    }

    /// Warms the account up and returns `1` if it was cold.
    #[track_caller]
    pub fn add_account_to_access_list(
        &mut self,
        tx_id: Fr,
        address: Fr,
        reversion_info: Option<&mut ReversionInfo>,
    ) -> Result<Fr> {
        let query = RwQuery {
            id: tx_id,
            address,
            ..Default::default()
        };
        let row = self.state_write(RwTableTag::TxAccessListAccount, query, reversion_info)?;
        self.constrain_access_list_write(row)
    }

    /// Warms the storage slot up and returns `1` if it was cold.
    #[track_caller]
    pub fn add_storage_slot_to_access_list(
        &mut self,
        tx_id: Fr,
        address: Fr,
        storage_key: &Word,
        reversion_info: Option<&mut ReversionInfo>,
    ) -> Result<Fr> {
        let query = RwQuery {
            id: tx_id,
            address,
            storage_key: *storage_key,
            ..Default::default()
        };
        let row = self.state_write(
            RwTableTag::TxAccessListAccountStorage,
            query,
            reversion_info,
        )?;
        self.constrain_access_list_write(row)
    }

    #[track_caller]
    fn constrain_access_list_write(&self, row: &RwTableRow) -> Result<Fr> {
        self.constrain_equal_word(&row.value, &Word::from(1u64))?;
        let is_cold = row.value.lo - row.value_prev.lo;
        self.constrain_bool(is_cold)?;
        Ok(is_cold)
    }

    /// `1` if the account is warm.
    pub fn read_account_from_access_list(&mut self, tx_id: Fr, address: Fr) -> Result<Fr> {
        let query = RwQuery {
            id: tx_id,
            address,
            ..Default::default()
        };
        Ok(self
            .rw_lookup(false, RwTableTag::TxAccessListAccount, &query, None)?
            .value
            .lo)
    }

    /// Moves `value` from the sender to the receiver balance.
    #[track_caller]
    pub fn transfer(
        &mut self,
        sender: Fr,
        receiver: Fr,
        value: &Word,
        reversion_info: &mut ReversionInfo,
    ) -> Result<()> {
        let (sender_balance, sender_balance_prev) =
            self.account_write(sender, AccountFieldTag::Balance, Some(&mut *reversion_info))?;
        let (sum, carry) = add_words(&[*value, sender_balance])?;
        self.constrain_equal_word(&sum, &sender_balance_prev)?;
        self.constrain_zero(carry)?;

        let (receiver_balance, receiver_balance_prev) =
            self.account_write(receiver, AccountFieldTag::Balance, Some(reversion_info))?;
        let (sum, carry) = add_words(&[*value, receiver_balance_prev])?;
        self.constrain_equal_word(&sum, &receiver_balance)?;
        self.constrain_zero(carry)
    }

    /// Charges the gas fee to the sender, which is never reverted, then
    /// transfers `value`.
    #[track_caller]
    pub fn transfer_with_gas_fee(
        &mut self,
        sender: Fr,
        receiver: Fr,
        value: &Word,
        gas_fee: &Word,
        reversion_info: &mut ReversionInfo,
    ) -> Result<()> {
        let (sender_balance, sender_balance_prev) =
            self.account_write(sender, AccountFieldTag::Balance, None)?;
        let (sum, carry) = add_words(&[*gas_fee, sender_balance])?;
        self.constrain_equal_word(&sum, &sender_balance_prev)?;
        self.constrain_zero(carry)?;
        self.transfer(sender, receiver, value, reversion_info)
    }

    // Memory

    /// Memory offset and length as field elements. The offset is ignored
    /// when the length is zero.
    pub fn memory_offset_and_length(&self, offset: &Word, length: &Word) -> Result<(Fr, Fr)> {
        let length = self.word_to_fq(length, N_BYTES_MEMORY_ADDRESS)?;
        if self.is_zero(length).is_one() {
            return Ok((Fr::zero(), Fr::zero()));
        }
        let offset = self.word_to_fq(offset, N_BYTES_MEMORY_ADDRESS)?;
        Ok((offset, length))
    }

    /// Memory size in words after accessing every `(offset, length)` range,
    /// and the gas cost of the expansion.
    #[track_caller]
    pub fn memory_expansion(&self, ranges: &[(Fr, Fr)]) -> Result<(Fr, Fr)> {
        let curr_memory_word_size = self.curr.memory_word_size;
        let mut next_memory_word_size = curr_memory_word_size;
        for (offset, length) in ranges {
            if length.is_zero() {
                continue;
            }
            let (memory_word_size, _) = self.constant_divmod(
                *offset + *length + Fr::from(31u64),
                32,
                N_BYTES_MEMORY_ADDRESS,
            )?;
            next_memory_word_size =
                self.max(next_memory_word_size, memory_word_size, N_BYTES_MEMORY_ADDRESS)?;
        }
        let gas_cost = self.memory_gas_cost(next_memory_word_size)?
            - self.memory_gas_cost(curr_memory_word_size)?;
        Ok((next_memory_word_size, gas_cost))
    }

    #[track_caller]
    fn memory_gas_cost(&self, memory_word_size: Fr) -> Result<Fr> {
        let (quadratic_cost, _) = self.constant_divmod(
            memory_word_size.square(),
            MEMORY_EXPANSION_QUAD_DENOMINATOR,
            N_BYTES_GAS,
        )?;
        Ok(quadratic_cost + memory_word_size * Fr::from(MEMORY_EXPANSION_LINEAR_COEFF))
    }

    /// Gas of copying `length` bytes at `gas_per_word`, on top of the memory
    /// expansion.
    #[track_caller]
    pub fn memory_copier_gas_cost(
        &self,
        length: Fr,
        memory_expansion_gas_cost: Fr,
        gas_per_word: u64,
    ) -> Result<Fr> {
        let (word_size, _) =
            self.constant_divmod(length + Fr::from(31u64), 32, N_BYTES_MEMORY_ADDRESS)?;
        Ok(word_size * Fr::from(gas_per_word) + memory_expansion_gas_cost)
    }

    // Lookups into the auxiliary circuits

    /// Looks a copy up at the next read/write counter and skips the rows it
    /// consumes. `dst_id` is looked up when `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_lookup(
        &mut self,
        src_id: &Word,
        src_type: CopyDataTypeTag,
        dst_id: Option<&Word>,
        dst_type: CopyDataTypeTag,
        src_addr: Fr,
        src_addr_end: Fr,
        dst_addr: Fr,
        length: Fr,
    ) -> Result<&'a CopyTableRow> {
        let rw_counter = self.curr.rw_counter + Fr::from(self.rw_counter_offset);
        let tables: &'a Tables = self.tables;
        let row = tables.copy_lookup(
            &Query::new()
                .word(src_id)
                .value(src_type)
                .maybe_word(dst_id)
                .value(dst_type)
                .value(src_addr)
                .value(src_addr_end)
                .value(dst_addr)
                .value(length)
                .any()
                .value(rw_counter)
                .any(),
        )?;
        self.rw_counter_offset += self.field_to_u64(row.rwc_inc, "copy rwc_inc")?;
        Ok(row)
    }

    /// Digest of `length` bytes accumulated into `input_rlc`.
    pub fn keccak_lookup(&self, length: Fr, input_rlc: Fr) -> Result<Word> {
        let tables: &'a Tables = self.tables;
        let row = tables.keccak_lookup(&Query::new().value(input_rlc).value(length).any_word())?;
        Ok(row.output)
    }

    pub fn sig_lookup(
        &self,
        msg_hash: &Word,
        sig_v: Fr,
        sig_r: &Word,
        sig_s: &Word,
        recovered_addr: Fr,
        is_valid: Fr,
    ) -> Result<()> {
        let tables: &'a Tables = self.tables;
        tables
            .sig_lookup(
                &Query::new()
                    .word(msg_hash)
                    .value(sig_v)
                    .word(sig_r)
                    .word(sig_s)
                    .value(recovered_addr)
                    .value(is_valid),
            )
            .map(|_| ())
    }

    /// Returns whether the operation is valid for these inputs and output.
    pub fn ecc_lookup(
        &self,
        op_type: EccOpTag,
        p: (&Word, &Word),
        q: (&Word, &Word),
        scalar: &Word,
        out: (&Word, &Word),
    ) -> Result<Fr> {
        let tables: &'a Tables = self.tables;
        let row = tables.ecc_lookup(
            &Query::new()
                .value(op_type)
                .word(p.0)
                .word(p.1)
                .word(q.0)
                .word(q.1)
                .word(scalar)
                .word(out.0)
                .word(out.1)
                .any(),
        )?;
        Ok(row.is_valid)
    }

    pub fn exp_lookup(
        &self,
        identifier: Fr,
        is_last: Fr,
        base: &Word,
        exponent: &Word,
        exponentiation: &Word,
    ) -> Result<()> {
        let tables: &'a Tables = self.tables;
        tables
            .exp_lookup(
                &Query::new()
                    .value(identifier)
                    .value(is_last)
                    .word(base)
                    .word(exponent)
                    .word(exponentiation),
            )
            .map(|_| ())
    }

    /// Address of a contract created by `sender` at `nonce`, from the keccak
    /// table digest of the RLP encoded preimage.
    pub fn create_contract_address(&self, sender: Fr, nonce: Fr) -> Result<Fr> {
        let preimage = rlp_encode_create_preimage(
            &self.address_to_be_bytes(sender)?,
            self.field_to_u64(nonce, "nonce")?,
        );
        self.contract_address_from_preimage(&preimage)
    }

    /// Address of a contract created by `sender` with CREATE2.
    pub fn create2_contract_address(
        &self,
        sender: Fr,
        salt: &Word,
        init_code_hash: &Word,
    ) -> Result<Fr> {
        let preimage = create2_preimage(
            &self.address_to_be_bytes(sender)?,
            &salt.to_be_bytes()?,
            &init_code_hash.to_be_bytes()?,
        );
        self.contract_address_from_preimage(&preimage)
    }

    fn contract_address_from_preimage(&self, preimage: &[u8]) -> Result<Fr> {
        let input_rlc = rlc_encode_bytes(preimage, self.randomness);
        let digest = self.keccak_lookup(Fr::from(preimage.len() as u64), input_rlc)?;
        self.word_to_address(&digest)
    }

    fn address_to_be_bytes(&self, address: Fr) -> Result<[u8; N_BYTES_ACCOUNT_ADDRESS]> {
        let mut bytes = [0u8; N_BYTES_ACCOUNT_ADDRESS];
        for (byte, le_byte) in bytes
            .iter_mut()
            .rev()
            .zip(fq_to_le_bytes(&address, N_BYTES_ACCOUNT_ADDRESS)?)
        {
            *byte = le_byte;
        }
        Ok(bytes)
    }

    // Step state transitions

    pub fn constrain_state_transition(&self, transition: StateTransition) -> Result<()> {
        let (curr, next) = (self.curr, self.next);
        let fields = [
            ("rw_counter", curr.rw_counter, next.rw_counter, transition.rw_counter),
            ("call_id", curr.call_id, next.call_id, transition.call_id),
            ("is_root", curr.is_root, next.is_root, transition.is_root),
            ("is_create", curr.is_create, next.is_create, transition.is_create),
            (
                "program_counter",
                curr.program_counter,
                next.program_counter,
                transition.program_counter,
            ),
            (
                "stack_pointer",
                curr.stack_pointer,
                next.stack_pointer,
                transition.stack_pointer,
            ),
            ("gas_left", curr.gas_left, next.gas_left, transition.gas_left),
            (
                "memory_word_size",
                curr.memory_word_size,
                next.memory_word_size,
                transition.memory_word_size,
            ),
            (
                "reversible_write_counter",
                curr.reversible_write_counter,
                next.reversible_write_counter,
                transition.reversible_write_counter,
            ),
            (
                "last_callee_id",
                curr.last_callee_id,
                next.last_callee_id,
                transition.last_callee_id,
            ),
            (
                "last_callee_return_data_offset",
                curr.last_callee_return_data_offset,
                next.last_callee_return_data_offset,
                transition.last_callee_return_data_offset,
            ),
            (
                "last_callee_return_data_length",
                curr.last_callee_return_data_length,
                next.last_callee_return_data_length,
                transition.last_callee_return_data_length,
            ),
        ];
        for (field, curr, next, transition) in fields {
            let expected = match transition {
                Transition::Same => curr,
                Transition::Delta(delta) => curr + delta,
                Transition::To(value) => value.expr(),
                Transition::Any => continue,
            };
            if next != expected {
                return Err(ConstraintError::Transition {
                    field,
                    expected: expected.to_hex_string(),
                    actual: next.to_hex_string(),
                });
            }
        }

        let expected_code_hash = match transition.code_hash {
            Transition::Same => Some(curr.code_hash),
            Transition::To(value) => Some(value.to_word()),
            Transition::Any => None,
            Transition::Delta(_) => {
                return Err(ConstraintError::Witness(
                    "code_hash cannot transit by a delta".to_string(),
                ))
            }
        };
        match expected_code_hash {
            Some(expected) if expected != next.code_hash => Err(ConstraintError::Transition {
                field: "code_hash",
                expected: expected.to_string(),
                actual: next.code_hash.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Transition of an opcode staying in the current call. The gas left
    /// decreases by the constant cost of `opcode` plus the dynamic cost and
    /// must stay non-negative.
    #[track_caller]
    pub fn constrain_same_context_state_transition(
        &self,
        opcode: Fr,
        transition: SameContextTransition,
    ) -> Result<()> {
        let opcode = self.opcode_from_field(opcode)?;
        let gas_cost = Fr::from(opcode.constant_gas_cost()) + transition.dynamic_gas_cost;
        self.range_check(self.curr.gas_left - gas_cost, N_BYTES_GAS)?;

        self.constrain_state_transition(StateTransition {
            rw_counter: transition.rw_counter,
            program_counter: transition.program_counter,
            stack_pointer: transition.stack_pointer,
            gas_left: Transition::Delta(-gas_cost),
            memory_word_size: transition.memory_word_size,
            reversible_write_counter: transition.reversible_write_counter,
            ..Default::default()
        })
    }

    /// Transition into a fresh call: empty stack and memory, program counter
    /// at zero and no last callee.
    pub fn constrain_new_context_state_transition(
        &self,
        transition: NewContextTransition,
    ) -> Result<()> {
        self.constrain_state_transition(StateTransition {
            rw_counter: transition.rw_counter,
            call_id: transition.call_id,
            is_root: transition.is_root,
            is_create: transition.is_create,
            code_hash: transition.code_hash,
            gas_left: transition.gas_left,
            reversible_write_counter: transition.reversible_write_counter,
            program_counter: Transition::to(0u64),
            stack_pointer: Transition::to(STACK_CAPACITY),
            memory_word_size: Transition::to(0u64),
            last_callee_id: Transition::to(0u64),
            last_callee_return_data_offset: Transition::to(0u64),
            last_callee_return_data_length: Transition::to(0u64),
        })
    }

    /// Returns to the caller, restoring the context it saved before the call.
    pub fn constrain_restored_context_state_transition(
        &mut self,
        transition: RestoredContextTransition,
    ) -> Result<()> {
        let caller_id = self.call_context_lookup(CallContextFieldTag::CallerId, false, None)?;
        let caller = Some(caller_id);
        let caller_is_root = self.call_context_lookup(CallContextFieldTag::IsRoot, false, caller)?;
        let caller_is_create =
            self.call_context_lookup(CallContextFieldTag::IsCreate, false, caller)?;
        let caller_code_hash =
            self.call_context_lookup_word(CallContextFieldTag::CodeHash, false, caller)?;
        let caller_program_counter =
            self.call_context_lookup(CallContextFieldTag::ProgramCounter, false, caller)?;
        let caller_stack_pointer =
            self.call_context_lookup(CallContextFieldTag::StackPointer, false, caller)?;
        let caller_gas_left =
            self.call_context_lookup(CallContextFieldTag::GasLeft, false, caller)?;
        let caller_memory_word_size =
            self.call_context_lookup(CallContextFieldTag::MemorySize, false, caller)?;
        let caller_reversible_write_counter = self.call_context_lookup(
            CallContextFieldTag::ReversibleWriteCounter,
            false,
            caller,
        )?;

        // A successful callee's writes are reverted with the caller, so the
        // caller takes over its reversal slots.
        let reversible_write_counter = caller_reversible_write_counter
            + transition.is_success * self.curr.reversible_write_counter;

        self.constrain_state_transition(StateTransition {
            rw_counter: Transition::Delta(
                Fr::from(self.rw_counter_offset) + transition.rw_counter_delta,
            ),
            call_id: Transition::to(caller_id),
            is_root: Transition::to(caller_is_root),
            is_create: Transition::to(caller_is_create),
            code_hash: Transition::to(caller_code_hash),
            program_counter: Transition::to(caller_program_counter),
            stack_pointer: Transition::to(caller_stack_pointer),
            gas_left: Transition::to(caller_gas_left + transition.gas_left),
            memory_word_size: Transition::to(caller_memory_word_size),
            reversible_write_counter: Transition::to(reversible_write_counter),
            last_callee_id: Transition::to(self.curr.call_id),
            last_callee_return_data_offset: Transition::to(transition.return_data_offset),
            last_callee_return_data_length: Transition::to(transition.return_data_length),
        })
    }

    /// The current call fails: it consumes all of its gas and its reversible
    /// writes are undone by the reversal rows following the step.
    pub fn constrain_error_state(&mut self) -> Result<()> {
        let is_success = self.call_context_lookup(CallContextFieldTag::IsSuccess, false, None)?;
        self.constrain_zero(is_success)?;

        let is_to_end_tx = self.is_equal(
            self.next.execution_state.into(),
            ExecutionState::EndTx.into(),
        );
        self.constrain_equal(is_to_end_tx, self.curr.is_root)?;

        if self.curr.is_root.is_one() {
            self.constrain_state_transition(StateTransition {
                rw_counter: Transition::Delta(
                    Fr::from(self.rw_counter_offset) + self.curr.reversible_write_counter,
                ),
                call_id: Transition::Same,
                gas_left: Transition::to(0u64),
                ..StateTransition::any()
            })
        } else {
            self.constrain_restored_context_state_transition(RestoredContextTransition {
                rw_counter_delta: self.curr.reversible_write_counter,
                return_data_offset: Fr::zero(),
                return_data_length: Fr::zero(),
                gas_left: Fr::zero(),
                is_success: Fr::zero(),
            })
        }
    }

    fn opcode_from_field(&self, opcode: Fr) -> Result<Opcode> {
        opcode
            .to_u64()
            .and_then(|byte| u8::try_from(byte).ok())
            .map(Opcode)
            .filter(Opcode::is_valid)
            .ok_or_else(|| {
                ConstraintError::Witness(format!("{} is not a valid opcode", opcode.to_hex_string()))
            })
    }
}
