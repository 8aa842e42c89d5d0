use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, SameContextTransition},
        opcode::Opcode,
        step::Transition,
        table::{AccountFieldTag, CallContextFieldTag},
    },
    util::{param::EXTRA_GAS_COST_ACCOUNT_COLD_ACCESS, Fr, Word},
};

pub fn balance(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    instruction.constrain_equal(opcode, Opcode::BALANCE.into())?;

    let address = instruction.stack_pop()?;
    let address = instruction.word_to_address(&address)?;

    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
    let mut reversion_info = instruction.reversion_info(None)?;
    let is_cold =
        instruction.add_account_to_access_list(tx_id, address, Some(&mut reversion_info))?;

    let balance = instruction.account_read(address, AccountFieldTag::Balance)?;
    let code_hash = instruction.account_read(address, AccountFieldTag::CodeHash)?;
    // A non-existing account has no code hash and a zero balance.
    let is_non_existing = instruction.is_zero_word(&code_hash);
    let expected = instruction.select_word(is_non_existing, &Word::zero(), &balance);

    let pushed = instruction.stack_push()?;
    instruction.constrain_equal_word(&pushed, &expected)?;

    let dynamic_gas_cost = is_cold * Fr::from(EXTRA_GAS_COST_ACCOUNT_COLD_ACCESS);
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
