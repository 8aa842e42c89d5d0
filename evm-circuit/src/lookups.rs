//! Instantiation of the lookup tables of the EVM circuit.
//!
//! A lookup is a [`Query`] with some columns fixed and the others free. It
//! must match exactly one row of its table: the matched row is returned, so
//! the free columns act as the looked-up witness values.

use crate::{
    error::{ConstraintError, Result},
    evm::{
        execution_state::ExecutionState,
        opcode::{
            invalid_opcodes, oog_constant_pairs, stack_overflow_pairs, stack_underflow_pairs,
            state_write_opcodes,
        },
        table::*,
    },
    util::{FieldHelpers, Fr, Word},
};
use ark_ff::Zero;
use log::trace;
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter},
};
use strum::IntoEnumIterator;
use strum_macros::{Display as DisplayMacro, EnumIter};

/// All of the lookup tables the execution steps read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, DisplayMacro, EnumIter)]
pub enum Table {
    /// Range checks, powers of two and the opcode classifications.
    Fixed,
    Block,
    Tx,
    Bytecode,
    /// Every access to the state, ordered by read/write counter.
    Rw,
    Copy,
    Keccak,
    Exp,
    /// ECDSA recoveries.
    Sig,
    /// BN254 curve operations.
    Ecc,
}

/// A row of one of the [`Table`]s.
pub trait TableRow: Clone + Send + Sync {
    const TABLE: Table;

    /// The row flattened into its columns.
    fn entries(&self) -> Vec<Fr>;
}

/// Partially specified tuple matched against the rows of a table. `None`
/// columns match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query(pub Vec<Option<Fr>>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<Fr>) -> Self {
        self.0.push(Some(value.into()));
        self
    }

    pub fn word(mut self, word: &Word) -> Self {
        self.0.push(Some(word.lo));
        self.0.push(Some(word.hi));
        self
    }

    pub fn any(mut self) -> Self {
        self.0.push(None);
        self
    }

    pub fn any_word(self) -> Self {
        self.any().any()
    }

    pub fn maybe_value(mut self, value: Option<Fr>) -> Self {
        self.0.push(value);
        self
    }

    pub fn maybe_word(mut self, word: Option<&Word>) -> Self {
        self.0.push(word.map(|w| w.lo));
        self.0.push(word.map(|w| w.hi));
        self
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn matches(&self, entries: &[Fr]) -> bool {
        self.0.len() == entries.len()
            && self
                .0
                .iter()
                .zip(entries)
                .all(|(query, entry)| query.map_or(true, |value| value == *entry))
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<String> = self
            .0
            .iter()
            .map(|column| column.map_or("*".to_string(), |value| value.to_hex_string()))
            .collect();
        write!(f, "[{}]", columns.join(", "))
    }
}

/// An immutable set of rows, indexed for full and partial queries.
#[derive(Clone, Debug)]
pub struct LookupTable<R> {
    rows: Vec<R>,
    entries: Vec<Vec<Fr>>,
    index: HashMap<Vec<Fr>, usize>,
    by_first_column: HashMap<Fr, Vec<usize>>,
}

impl<R: TableRow> Default for LookupTable<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: TableRow> LookupTable<R> {
    /// Builds the table, keeping one copy of duplicated rows.
    pub fn new(rows: impl IntoIterator<Item = R>) -> Self {
        let mut table = Self {
            rows: Vec::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            by_first_column: HashMap::new(),
        };
        for row in rows {
            let entries = row.entries();
            if table.index.contains_key(&entries) {
                continue;
            }
            let position = table.rows.len();
            if let Some(first) = entries.first() {
                table
                    .by_first_column
                    .entry(*first)
                    .or_default()
                    .push(position);
            }
            table.index.insert(entries.clone(), position);
            table.entries.push(entries);
            table.rows.push(row);
        }
        table
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: &R) -> bool {
        self.index.contains_key(&row.entries())
    }

    /// Returns the unique row matching the query.
    pub fn lookup(&self, query: &Query) -> Result<&R> {
        trace!("{} lookup {}", R::TABLE, query);
        if query.is_complete() {
            let entries: Vec<Fr> = query.0.iter().flatten().copied().collect();
            return self
                .index
                .get(&entries)
                .map(|position| &self.rows[*position])
                .ok_or_else(|| ConstraintError::LookupUnsat {
                    table: R::TABLE,
                    query: query.to_string(),
                });
        }

        let candidates: Box<dyn Iterator<Item = usize> + '_> = match query.0.first() {
            Some(Some(first)) => Box::new(
                self.by_first_column
                    .get(first)
                    .into_iter()
                    .flatten()
                    .copied(),
            ),
            _ => Box::new(0..self.rows.len()),
        };
        let matched: Vec<usize> = candidates
            .filter(|position| query.matches(&self.entries[*position]))
            .collect();
        match matched.as_slice() {
            [position] => Ok(&self.rows[*position]),
            [] => Err(ConstraintError::LookupUnsat {
                table: R::TABLE,
                query: query.to_string(),
            }),
            _ => Err(ConstraintError::LookupAmbiguous {
                table: R::TABLE,
                query: query.to_string(),
                count: matched.len(),
            }),
        }
    }
}

impl LookupTable<RwTableRow> {
    /// Checks that the accesses to each state key form one history. The
    /// counters are unique, a read sees the value of the latest write before
    /// it and a write starts from that value. The first access of a key sets
    /// its initial value.
    pub fn check_consistency(&self) -> Result<()> {
        let mut counters = HashSet::new();
        let mut histories: HashMap<(Fr, Fr, Fr, Fr, Word), Vec<&RwTableRow>> = HashMap::new();
        for row in &self.rows {
            if !counters.insert(row.rw_counter) {
                return Err(rw_history_error(row, "another access has the same counter"));
            }
            let key = (
                Fr::from(row.tag),
                row.id,
                row.address,
                row.field_tag,
                row.storage_key,
            );
            histories.entry(key).or_default().push(row);
        }

        let mut histories: Vec<Vec<&RwTableRow>> = histories.into_values().collect();
        for history in histories.iter_mut() {
            history.sort_by_key(|row| row.rw_counter);
        }
        histories.sort_by_key(|history| history.first().map(|row| row.rw_counter));

        for history in &histories {
            let Some(first) = history.first() else {
                continue;
            };
            let mut value = if first.is_write {
                first.value_prev
            } else {
                first.value
            };
            for row in history {
                if row.is_write {
                    if row.value_prev != value {
                        return Err(rw_history_error(
                            row,
                            "the write does not start from the latest value",
                        ));
                    }
                    value = row.value;
                } else if row.value != value {
                    return Err(rw_history_error(row, "the read misses the latest write"));
                }
                if row.tag == RwTableTag::AccountStorage
                    && row.committed_value != first.committed_value
                {
                    return Err(rw_history_error(row, "the committed value changed"));
                }
            }
        }
        Ok(())
    }
}

fn rw_history_error(row: &RwTableRow, reason: &'static str) -> ConstraintError {
    ConstraintError::RwHistory {
        rw_counter: row.rw_counter.to_hex_string(),
        tag: row.tag,
        reason,
    }
}

/// Trait that creates the fixed lookup table of the EVM circuit
pub trait FixedLookupTables {
    /// Returns the rows `(Range{range}, value, 0, 0)` for `value < range`
    fn table_range(tag: FixedTableTag, range: u64) -> Vec<FixedTableRow>;
    /// Returns the rows `(Pow2, i, 2^i lo, 2^i hi)` for `i < 256`
    fn table_pow2() -> Vec<FixedTableRow>;
    /// Returns the opcode classification rows
    fn table_opcodes() -> Vec<FixedTableRow>;
    /// Returns the rows mapping each execution state to its opcodes
    fn table_responsible_opcodes() -> Vec<FixedTableRow>;
    /// Returns the rows with the address and base gas of each precompile
    /// state
    fn table_precompile_info() -> Vec<FixedTableRow>;
    /// Returns the whole fixed table
    fn get_all_tables() -> Self;
}

impl FixedLookupTables for LookupTable<FixedTableRow> {
    fn table_range(tag: FixedTableTag, range: u64) -> Vec<FixedTableRow> {
        (0..range)
            .map(|value| FixedTableRow::new(tag, value, 0u64, 0u64))
            .collect()
    }

    fn table_pow2() -> Vec<FixedTableRow> {
        (0..256u64)
            .map(|exponent| {
                let value = Word::from_biguint(&(BigUint::from(1u64) << exponent));
                FixedTableRow::new(FixedTableTag::Pow2, exponent, value.lo, value.hi)
            })
            .collect()
    }

    fn table_opcodes() -> Vec<FixedTableRow> {
        let zero = Fr::zero();
        let mut rows: Vec<FixedTableRow> = invalid_opcodes()
            .into_iter()
            .map(|op| FixedTableRow::new(FixedTableTag::InvalidOpcode, op, zero, zero))
            .collect();
        rows.extend(
            state_write_opcodes()
                .into_iter()
                .map(|op| FixedTableRow::new(FixedTableTag::StateWriteOpcode, op, zero, zero)),
        );
        rows.extend(stack_underflow_pairs().into_iter().map(|(op, sp)| {
            FixedTableRow::new(FixedTableTag::StackUnderflow, op, sp, zero)
        }));
        rows.extend(stack_overflow_pairs().into_iter().map(|(op, sp)| {
            FixedTableRow::new(FixedTableTag::StackOverflow, op, sp, zero)
        }));
        rows.extend(
            oog_constant_pairs()
                .into_iter()
                .map(|(op, gas)| FixedTableRow::new(FixedTableTag::OOGConstant, op, gas, zero)),
        );
        rows
    }

    fn table_responsible_opcodes() -> Vec<FixedTableRow> {
        ExecutionState::iter()
            .flat_map(|state| {
                state.responsible_opcodes().into_iter().map(move |op| {
                    FixedTableRow::new(FixedTableTag::ResponsibleOpcode, state, op, 0u64)
                })
            })
            .collect()
    }

    fn table_precompile_info() -> Vec<FixedTableRow> {
        ExecutionState::iter()
            .filter_map(|state| state.precompile().map(|precompile| (state, precompile)))
            .map(|(state, precompile)| {
                FixedTableRow::new(
                    FixedTableTag::PrecompileInfo,
                    state,
                    precompile.address(),
                    precompile.base_gas_cost(),
                )
            })
            .collect()
    }

    fn get_all_tables() -> Self {
        let ranges = RANGES
            .into_iter()
            .flat_map(|(tag, range)| Self::table_range(tag, range));
        LookupTable::new(
            ranges
                .chain(Self::table_pow2())
                .chain(Self::table_opcodes())
                .chain(Self::table_responsible_opcodes())
                .chain(Self::table_precompile_info()),
        )
    }
}

const RANGES: [(FixedTableTag, u64); 8] = [
    (FixedTableTag::Range5, 5),
    (FixedTableTag::Range16, 16),
    (FixedTableTag::Range32, 32),
    (FixedTableTag::Range64, 64),
    (FixedTableTag::Range128, 128),
    (FixedTableTag::Range256, 256),
    (FixedTableTag::Range512, 512),
    (FixedTableTag::Range1024, 1024),
];

/// The fixed table does not depend on the witness and is built once.
pub static FIXED_TABLE: Lazy<LookupTable<FixedTableRow>> =
    Lazy::new(LookupTable::<FixedTableRow>::get_all_tables);

/// The witness-dependent tables, as supplied by the prover.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableWitness {
    pub block: Vec<BlockTableRow>,
    pub tx: Vec<TxTableRow>,
    pub bytecode: Vec<BytecodeTableRow>,
    pub rw: Vec<RwTableRow>,
    pub copy: Vec<CopyTableRow>,
    pub keccak: Vec<KeccakTableRow>,
    pub exp: Vec<ExpTableRow>,
    pub sig: Vec<SigTableRow>,
    pub ecc: Vec<EccTableRow>,
}

/// A collection of lookup tables used in the EVM circuit.
#[derive(Clone, Debug)]
pub struct Tables {
    pub fixed: &'static LookupTable<FixedTableRow>,
    pub block: LookupTable<BlockTableRow>,
    pub tx: LookupTable<TxTableRow>,
    pub bytecode: LookupTable<BytecodeTableRow>,
    pub rw: LookupTable<RwTableRow>,
    pub copy: LookupTable<CopyTableRow>,
    pub keccak: LookupTable<KeccakTableRow>,
    pub exp: LookupTable<ExpTableRow>,
    pub sig: LookupTable<SigTableRow>,
    pub ecc: LookupTable<EccTableRow>,
}

impl Default for Tables {
    fn default() -> Self {
        Self::new(TableWitness::default())
    }
}

impl Tables {
    pub fn new(witness: TableWitness) -> Self {
        Self {
            fixed: &FIXED_TABLE,
            block: LookupTable::new(witness.block),
            tx: LookupTable::new(witness.tx),
            bytecode: LookupTable::new(witness.bytecode),
            rw: LookupTable::new(witness.rw),
            copy: LookupTable::new(witness.copy),
            keccak: LookupTable::new(witness.keccak),
            exp: LookupTable::new(witness.exp),
            sig: LookupTable::new(witness.sig),
            ecc: LookupTable::new(witness.ecc),
        }
    }

    pub fn fixed_lookup(&self, query: &Query) -> Result<&FixedTableRow> {
        self.fixed.lookup(query)
    }

    pub fn block_lookup(&self, query: &Query) -> Result<&BlockTableRow> {
        self.block.lookup(query)
    }

    pub fn tx_lookup(&self, query: &Query) -> Result<&TxTableRow> {
        self.tx.lookup(query)
    }

    pub fn bytecode_lookup(&self, query: &Query) -> Result<&BytecodeTableRow> {
        self.bytecode.lookup(query)
    }

    pub fn rw_lookup(&self, query: &Query) -> Result<&RwTableRow> {
        self.rw.lookup(query)
    }

    pub fn copy_lookup(&self, query: &Query) -> Result<&CopyTableRow> {
        self.copy.lookup(query)
    }

    pub fn keccak_lookup(&self, query: &Query) -> Result<&KeccakTableRow> {
        self.keccak.lookup(query)
    }

    pub fn exp_lookup(&self, query: &Query) -> Result<&ExpTableRow> {
        self.exp.lookup(query)
    }

    pub fn sig_lookup(&self, query: &Query) -> Result<&SigTableRow> {
        self.sig.lookup(query)
    }

    pub fn ecc_lookup(&self, query: &Query) -> Result<&EccTableRow> {
        self.ecc.lookup(query)
    }
}
