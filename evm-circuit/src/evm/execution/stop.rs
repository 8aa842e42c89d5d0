use crate::{
    error::Result,
    evm::{
        execution_state::ExecutionState,
        instruction::{Instruction, RestoredContextTransition},
        opcode::Opcode,
        step::{StateTransition, Transition},
        table::CallContextFieldTag,
    },
    util::Fr,
};
use ark_ff::{One, Zero};

/// STOP ends the current call successfully. A root call hands over to
/// EndTx, any other call returns to its caller with no return data.
pub fn stop(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::STOP.into())?;

    let is_success = instruction.call_context_lookup(CallContextFieldTag::IsSuccess, false, None)?;
    instruction.constrain_equal(is_success, Fr::one())?;

    if instruction.curr.is_root.is_one() {
        let is_to_end_tx = instruction.is_equal(
            instruction.next.execution_state.into(),
            ExecutionState::EndTx.into(),
        );
        instruction.constrain_equal(is_to_end_tx, Fr::one())?;
        instruction.constrain_state_transition(StateTransition {
            rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
            call_id: Transition::Same,
            gas_left: Transition::Same,
            ..StateTransition::any()
        })
    } else {
        instruction.constrain_restored_context_state_transition(RestoredContextTransition {
            rw_counter_delta: Fr::zero(),
            return_data_offset: Fr::zero(),
            return_data_length: Fr::zero(),
            gas_left: instruction.curr.gas_left,
            is_success: Fr::one(),
        })
    }
}
