use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
    },
};

/// Bytecode is shorter than `2^24`, so a valid destination fits three bytes.
const N_BYTES_PROGRAM_COUNTER: usize = 3;

pub fn jump(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::JUMP.into())?;

    let destination = instruction.stack_pop()?;
    let destination = instruction.word_to_fq(&destination, N_BYTES_PROGRAM_COUNTER)?;

    // The destination must be a JUMPDEST, not push data.
    let target = instruction.opcode_lookup_at(destination, true)?;
    instruction.constrain_equal(target, Opcode::JUMPDEST.into())?;

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(1),
            program_counter: Transition::to(destination),
            stack_pointer: Transition::delta(1),
            ..Default::default()
        },
    )
}
