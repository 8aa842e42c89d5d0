use crate::{
    error::Result,
    evm::{execution_state::ExecutionState, instruction::Instruction, step::StateTransition},
    util::Fr,
};
use ark_ff::One;

/// Padding after the last transaction: every following step is an EndBlock
/// with the same state.
pub fn end_block(instruction: &mut Instruction) -> Result<()> {
    if instruction.is_last_step {
        return Ok(());
    }
    let is_to_end_block = instruction.is_equal(
        instruction.next.execution_state.into(),
        ExecutionState::EndBlock.into(),
    );
    instruction.constrain_equal(is_to_end_block, Fr::one())?;
    instruction.constrain_state_transition(StateTransition::default())
}
