use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
    },
    util::Fr,
};
use ark_ff::Zero;

pub fn byte(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::BYTE.into())?;

    let index = instruction.stack_pop()?;
    let value = instruction.stack_pop()?;
    let result = instruction.stack_push()?;

    let index = instruction.word_to_bytes(&index)?;
    let value = instruction.word_to_bytes(&value)?;
    let result = instruction.word_to_bytes(&result)?;

    // Any index of 256 or more selects nothing.
    let high_bytes: Vec<Fr> = index[1..].iter().map(|b| Fr::from(*b as u64)).collect();
    let is_index_lt_256 = instruction.is_zero(instruction.sum(&high_bytes));

    // Byte `i` counts from the most significant end.
    let mut selected = Fr::zero();
    for (position, byte) in value.iter().enumerate() {
        let is_selected =
            instruction.is_equal(Fr::from(index[0] as u64), Fr::from(31 - position as u64));
        selected += Fr::from(*byte as u64) * is_selected * is_index_lt_256;
    }
    instruction.constrain_equal(Fr::from(result[0] as u64), selected)?;
    for byte in &result[1..] {
        instruction.constrain_zero(Fr::from(*byte as u64))?;
    }

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
