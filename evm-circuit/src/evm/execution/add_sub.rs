use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
    },
};

/// ADD and SUB. SUB is checked as the addition `c + b == a`.
pub fn add_sub(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    let (_, is_sub) =
        instruction.pair_select(opcode, Opcode::ADD.into(), Opcode::SUB.into())?;

    let a = instruction.stack_pop()?;
    let b = instruction.stack_pop()?;
    let c = instruction.stack_push()?;

    let augend = instruction.select_word(is_sub, &c, &a);
    let result = instruction.select_word(is_sub, &a, &c);
    // The carry is the wrap-around of the 256-bit addition.
    let (sum, _) = instruction.add_words(&[augend, b])?;
    instruction.constrain_equal_word(&sum, &result)?;

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(3),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(1),
            ..Default::default()
        },
    )
}
