use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
        table::CallContextFieldTag,
    },
    util::{param::N_BYTES_U64, Word},
};

pub fn calldatasize(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::CALLDATASIZE.into())?;

    let call_data_length =
        instruction.call_context_lookup(CallContextFieldTag::CallDataLength, false, None)?;
    instruction.range_check(call_data_length, N_BYTES_U64)?;
    let pushed = instruction.stack_push()?;
    instruction.constrain_equal_word(&pushed, &Word::from(call_data_length))?;

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(2),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(-1),
            ..Default::default()
        },
    )
}
