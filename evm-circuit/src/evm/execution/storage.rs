//! SLOAD and SSTORE, with the EIP-2929 access list costs, the EIP-2200 gas
//! sentry and the EIP-3529 refunds.

use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
        table::CallContextFieldTag,
    },
    util::{param::*, Fr},
};
use ark_ff::One;

pub fn sload(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::SLOAD.into())?;

    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
    let mut reversion_info = instruction.reversion_info(None)?;
    let callee_address =
        instruction.call_context_lookup(CallContextFieldTag::CalleeAddress, false, None)?;

    let key = instruction.stack_pop()?;
    let (value, _) = instruction.account_storage_read(callee_address, &key, tx_id)?;
    let is_cold = instruction.add_storage_slot_to_access_list(
        tx_id,
        callee_address,
        &key,
        Some(&mut reversion_info),
    )?;
    let pushed = instruction.stack_push()?;
    instruction.constrain_equal_word(&pushed, &value)?;

    let dynamic_gas_cost = instruction.select(
        is_cold,
        Fr::from(GAS_COST_SLOAD_COLD),
        Fr::from(GAS_COST_WARM_ACCESS),
    );
    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::Same,
            reversible_write_counter: Transition::delta(1),
            dynamic_gas_cost,
            ..Default::default()
        },
    )
}

pub fn sstore(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::SSTORE.into())?;

    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
    let is_static = instruction.call_context_lookup(CallContextFieldTag::IsStatic, false, None)?;
    instruction.constrain_zero(is_static)?;
    let mut reversion_info = instruction.reversion_info(None)?;
    let callee_address =
        instruction.call_context_lookup(CallContextFieldTag::CalleeAddress, false, None)?;

    let key = instruction.stack_pop()?;
    let value = instruction.stack_pop()?;

    let (stored, value_prev, committed_value) = instruction.account_storage_write(
        callee_address,
        &key,
        tx_id,
        Some(&mut reversion_info),
    )?;
    instruction.constrain_equal_word(&stored, &value)?;
    let is_cold = instruction.add_storage_slot_to_access_list(
        tx_id,
        callee_address,
        &key,
        Some(&mut reversion_info),
    )?;

    // EIP-2200: SSTORE is not allowed with the call stipend left.
    let (is_above_stipend, _) = instruction.compare(
        Fr::from(GAS_STIPEND_CALL),
        instruction.curr.gas_left,
        N_BYTES_GAS,
    )?;
    instruction.constrain_equal(is_above_stipend, Fr::one())?;

    let is_noop = instruction.is_equal_word(&value, &value_prev);
    let is_clean = instruction.is_equal_word(&committed_value, &value_prev);
    let is_committed_zero = instruction.is_zero_word(&committed_value);
    let is_prev_zero = instruction.is_zero_word(&value_prev);
    let is_value_zero = instruction.is_zero_word(&value);
    let is_restored = instruction.is_equal_word(&value, &committed_value);

    let clean_cost = instruction.select(
        is_committed_zero,
        Fr::from(GAS_COST_SSTORE_SET),
        Fr::from(GAS_COST_SSTORE_RESET),
    );
    let warm_cost = instruction.select(
        is_noop,
        Fr::from(GAS_COST_WARM_ACCESS),
        instruction.select(is_clean, clean_cost, Fr::from(GAS_COST_WARM_ACCESS)),
    );
    let dynamic_gas_cost = warm_cost + is_cold * Fr::from(GAS_COST_SLOAD_COLD);

    let clears = Fr::from(GAS_REFUND_SSTORE_CLEARS);
    let clean_refund = (Fr::one() - is_committed_zero) * is_value_zero * clears;
    let restored_refund = instruction.select(
        is_committed_zero,
        Fr::from(GAS_COST_SSTORE_SET - GAS_COST_WARM_ACCESS),
        Fr::from(GAS_COST_SSTORE_RESET - GAS_COST_WARM_ACCESS),
    );
    let dirty_refund = (Fr::one() - is_committed_zero) * (is_value_zero - is_prev_zero) * clears
        + is_restored * restored_refund;
    let refund_delta =
        (Fr::one() - is_noop) * instruction.select(is_clean, clean_refund, dirty_refund);
    if let Some((refund, refund_prev)) = instruction.tx_refund_write(tx_id, &reversion_info)? {
        instruction.constrain_equal(refund, refund_prev + refund_delta)?;
    }

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(2),
            reversible_write_counter: Transition::delta(2),
            dynamic_gas_cost,
            ..Default::default()
        },
    )
}
