use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
        table::BlockContextFieldTag,
    },
    util::param::N_BYTES_ACCOUNT_ADDRESS,
};

pub fn coinbase(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::COINBASE.into())?;

    let coinbase = instruction.block_context_lookup(BlockContextFieldTag::Coinbase)?;
    instruction.word_to_fq(&coinbase, N_BYTES_ACCOUNT_ADDRESS)?;
    let pushed = instruction.stack_push()?;
    instruction.constrain_equal_word(&pushed, &coinbase)?;

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(1),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(-1),
            ..Default::default()
        },
    )
}
