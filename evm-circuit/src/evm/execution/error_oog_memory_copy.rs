use crate::{
    error::Result,
    evm::{instruction::Instruction, opcode::Opcode, table::CallContextFieldTag},
    util::{param::*, Fr},
};
use ark_ff::One;

/// A memory copy opcode without enough gas for its constant cost, the memory
/// expansion and the copy itself.
pub fn error_oog_memory_copy(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    let selectors = instruction.multiple_select(
        opcode,
        &[
            Opcode::CALLDATACOPY.into(),
            Opcode::CODECOPY.into(),
            Opcode::EXTCODECOPY.into(),
            Opcode::RETURNDATACOPY.into(),
        ],
    )?;
    let is_extcodecopy = selectors[2];

    // EXTCODECOPY takes the account address on top of the usual operands.
    let stack_offset = if is_extcodecopy.is_one() { 1 } else { 0 };
    let external_address = if is_extcodecopy.is_one() {
        let address = instruction.stack_lookup(false, 0)?;
        Some(instruction.word_to_address(&address)?)
    } else {
        None
    };
    let memory_offset = instruction.stack_lookup(false, stack_offset)?;
    let copy_size = instruction.stack_lookup(false, stack_offset + 2)?;

    let constant_gas_cost = match external_address {
        Some(address) => {
            let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
            let is_warm = instruction.read_account_from_access_list(tx_id, address)?;
            instruction.select(
                is_warm,
                Fr::from(GAS_COST_WARM_ACCESS),
                Fr::from(GAS_COST_ACCOUNT_COLD_ACCESS),
            )
        }
        None => Fr::from(GAS_COST_FASTEST),
    };

    let (memory_offset, copy_size) =
        instruction.memory_offset_and_length(&memory_offset, &copy_size)?;
    let (_, memory_expansion_gas_cost) =
        instruction.memory_expansion(&[(memory_offset, copy_size)])?;
    let memory_copier_gas_cost =
        instruction.memory_copier_gas_cost(copy_size, memory_expansion_gas_cost, GAS_COST_COPY)?;

    let (is_insufficient, _) = instruction.compare(
        instruction.curr.gas_left,
        constant_gas_cost + memory_copier_gas_cost,
        MAX_N_BYTES,
    )?;
    instruction.constrain_equal(is_insufficient, Fr::one())?;

    instruction.constrain_error_state()
}
