//! First step of every transaction: the nonce bump, the purchase of the gas,
//! the value transfer and the setup of the root call.

use crate::{
    error::Result,
    evm::{
        execution_state::ExecutionState,
        instruction::{Instruction, NewContextTransition},
        step::{StateTransition, Transition},
        table::{AccountFieldTag, CallContextFieldTag, TxContextFieldTag},
    },
    util::{arithmetic::mul_word_by_u64, hash::empty_code_hash_word, param::*, Fr, Word},
};
use ark_ff::One;

pub fn begin_tx(instruction: &mut Instruction) -> Result<()> {
    // The root call is identified by the read/write counter it starts at.
    let call_id = instruction.curr.rw_counter;
    instruction.constrain_equal(instruction.curr.call_id, call_id)?;

    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
    if instruction.is_first_step {
        instruction.constrain_equal(instruction.curr.rw_counter, Fr::one())?;
        instruction.constrain_equal(tx_id, Fr::one())?;
    }

    let mut reversion_info = instruction.reversion_info(None)?;
    let is_success = instruction.call_context_lookup(CallContextFieldTag::IsSuccess, false, None)?;
    instruction.constrain_equal(is_success, reversion_info.is_persistent())?;

    let tx_nonce = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::Nonce)?
        .expr();
    let tx_gas = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::Gas)?
        .expr();
    let tx_gas_price = instruction.tx_context_lookup(tx_id, TxContextFieldTag::GasPrice)?;
    let tx_caller_address = instruction.tx_context_lookup(tx_id, TxContextFieldTag::CallerAddress)?;
    let tx_caller_address = instruction.word_to_address(&tx_caller_address)?;
    let tx_callee_address = instruction.tx_context_lookup(tx_id, TxContextFieldTag::CalleeAddress)?;
    let tx_callee_address = instruction.word_to_address(&tx_callee_address)?;
    let tx_is_create = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::IsCreate)?
        .expr();
    instruction.constrain_bool(tx_is_create)?;
    let tx_value = instruction.tx_context_lookup(tx_id, TxContextFieldTag::Value)?;
    let tx_call_data_length = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::CallDataLength)?
        .expr();
    let tx_call_data_gas_cost = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::CallDataGasCost)?
        .expr();

    // The nonce is bumped whatever the outcome of the transaction.
    let (nonce, nonce_prev) =
        instruction.account_write(tx_caller_address, AccountFieldTag::Nonce, None)?;
    let (nonce, nonce_prev) = (nonce.expr(), nonce_prev.expr());
    instruction.constrain_equal(nonce_prev, tx_nonce)?;
    instruction.constrain_equal(nonce, nonce_prev + Fr::one())?;

    let intrinsic_gas_cost = instruction.select(
        tx_is_create,
        Fr::from(GAS_COST_CREATION_TX),
        Fr::from(GAS_COST_TX),
    ) + tx_call_data_gas_cost;
    let gas_left = tx_gas - intrinsic_gas_cost;
    instruction.range_check(gas_left, N_BYTES_GAS)?;

    // EIP-2929: the caller and the callee start warm.
    instruction.add_account_to_access_list(tx_id, tx_caller_address, None)?;
    instruction.add_account_to_access_list(tx_id, tx_callee_address, None)?;

    let (gas_fee, carry) =
        mul_word_by_u64(&tx_gas_price, instruction.field_to_u64(tx_gas, "tx gas")?)?;
    instruction.constrain_zero(carry)?;
    instruction.transfer_with_gas_fee(
        tx_caller_address,
        tx_callee_address,
        &tx_value,
        &gas_fee,
        &mut reversion_info,
    )?;

    let code_hash = if tx_is_create.is_one() {
        let contract_address = instruction.create_contract_address(tx_caller_address, nonce_prev)?;
        instruction.constrain_equal(tx_callee_address, contract_address)?;
        // The init code is the calldata of the transaction.
        Word::from(tx_id)
    } else {
        let code_hash = instruction.account_read(tx_callee_address, AccountFieldTag::CodeHash)?;
        let is_empty_code =
            instruction.is_equal_word(&code_hash, &empty_code_hash_word());
        if is_empty_code.is_one() {
            // Nothing to execute: the transaction ends right away.
            let is_to_end_tx = instruction.is_equal(
                instruction.next.execution_state.into(),
                ExecutionState::EndTx.into(),
            );
            instruction.constrain_equal(is_to_end_tx, Fr::one())?;
            return instruction.constrain_state_transition(StateTransition {
                rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
                call_id: Transition::Same,
                gas_left: Transition::to(gas_left),
                reversible_write_counter: Transition::to(
                    reversion_info.reversible_write_counter(),
                ),
                ..StateTransition::any()
            });
        }
        code_hash
    };

    let expected_call_context = [
        (CallContextFieldTag::Depth, Word::from(1u64)),
        (CallContextFieldTag::CallerId, Word::zero()),
        (CallContextFieldTag::CallerAddress, Word::from(tx_caller_address)),
        (CallContextFieldTag::CalleeAddress, Word::from(tx_callee_address)),
        (CallContextFieldTag::CallDataOffset, Word::zero()),
        (CallContextFieldTag::CallDataLength, Word::from(tx_call_data_length)),
        (CallContextFieldTag::Value, tx_value),
        (CallContextFieldTag::IsStatic, Word::zero()),
        (CallContextFieldTag::IsRoot, Word::from(1u64)),
        (CallContextFieldTag::IsCreate, Word::from(tx_is_create)),
        (CallContextFieldTag::CodeHash, code_hash),
    ];
    for (field_tag, expected) in expected_call_context {
        let value = instruction.call_context_lookup_word(field_tag, false, None)?;
        instruction.constrain_equal_word(&value, &expected)?;
    }

    instruction.constrain_new_context_state_transition(NewContextTransition {
        rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
        call_id: Transition::Same,
        is_root: Transition::to(1u64),
        is_create: Transition::to(tx_is_create),
        code_hash: Transition::to(code_hash),
        gas_left: Transition::to(gas_left),
        reversible_write_counter: Transition::to(reversion_info.reversible_write_counter()),
    })
}

