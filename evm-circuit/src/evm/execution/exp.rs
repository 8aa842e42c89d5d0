use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
    },
    util::{arithmetic::byte_size, param::GAS_COST_EXP_PER_BYTE, Fr, Word},
};
use ark_ff::One;

pub fn exp(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::EXP.into())?;

    let base = instruction.stack_pop()?;
    let exponent = instruction.stack_pop()?;
    let exponentiation = instruction.stack_push()?;

    // The exponent has exactly `exponent_byte_size` significant bytes.
    let exponent_bytes = instruction.word_to_bytes(&exponent)?;
    let exponent_byte_size = byte_size(&exponent)?;
    for byte in &exponent_bytes[exponent_byte_size..] {
        instruction.constrain_zero(Fr::from(*byte as u64))?;
    }
    if exponent_byte_size > 0 {
        instruction.constrain_not_zero(Fr::from(exponent_bytes[exponent_byte_size - 1] as u64))?;
    }

    let is_exponent_zero = instruction.is_zero_word(&exponent);
    let is_exponent_one = instruction.is_equal_word(&exponent, &Word::from(1u64));
    if is_exponent_zero.is_one() {
        instruction.constrain_equal_word(&exponentiation, &Word::from(1u64))?;
    } else if is_exponent_one.is_one() {
        instruction.constrain_equal_word(&exponentiation, &base)?;
    } else {
        // The first row of the squaring chain, identified by the read/write
        // counter of the step.
        let identifier =
            instruction.curr.rw_counter + Fr::from(instruction.rw_counter_offset());
        let is_last = instruction.is_equal_word(&exponent, &Word::from(2u64));
        instruction.exp_lookup(identifier, is_last, &base, &exponent, &exponentiation)?;
    }

    let dynamic_gas_cost = Fr::from(GAS_COST_EXP_PER_BYTE * exponent_byte_size as u64);

    instruction.constrain_same_context_state_transition(
        opcode,
        SameContextTransition {
            rw_counter: Transition::delta(3),
            program_counter: Transition::delta(1),
            stack_pointer: Transition::delta(1),
            dynamic_gas_cost,
            ..Default::default()
        },
    )
}
