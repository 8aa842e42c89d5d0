//! Precompiled contracts. A precompile runs as a single step in the callee
//! context and returns to its caller right away.

mod bn254_add;
mod ecrecover;

pub use bn254_add::bn254_add;
pub use ecrecover::ecrecover;

use crate::{
    error::Result,
    evm::{
        instruction::Instruction,
        table::{CallContextFieldTag, FixedTableTag},
    },
    util::Fr,
};

/// Checks that the callee is the precompile of the current state and
/// returns its base gas cost.
fn precompile_info_lookup(instruction: &mut Instruction, base_gas_cost: u64) -> Result<Fr> {
    let callee_address =
        instruction.call_context_lookup_word(CallContextFieldTag::CalleeAddress, false, None)?;
    let callee_address = instruction.word_to_address(&callee_address)?;
    instruction.fixed_lookup(
        FixedTableTag::PrecompileInfo,
        instruction.curr.execution_state.into(),
        Some(callee_address),
        Some(Fr::from(base_gas_cost)),
    )?;
    Ok(Fr::from(base_gas_cost))
}
