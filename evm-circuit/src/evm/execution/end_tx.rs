use crate::{
    error::Result,
    evm::{
        execution_state::ExecutionState,
        instruction::{Instruction, RwQuery},
        step::{StateTransition, Transition},
        table::{
            AccountFieldTag, BlockContextFieldTag, CallContextFieldTag, RwTableTag,
            TxContextFieldTag,
        },
    },
    util::{arithmetic::mul_word_by_u64, param::*, Fr, Word},
};
use ark_ff::One;

/// Settles the fees of the transaction: the unused gas and the capped refund
/// go back to the caller, the priority fee of the gas charged net of the
/// refund to the coinbase.
pub fn end_tx(instruction: &mut Instruction) -> Result<()> {
    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;

    let tx_gas = instruction
        .tx_context_lookup(tx_id, TxContextFieldTag::Gas)?
        .expr();
    let gas_used = tx_gas - instruction.curr.gas_left;
    instruction.range_check(gas_used, N_BYTES_GAS)?;

    // EIP-3529: the refund is capped at a fifth of the gas used.
    let (max_refund, _) =
        instruction.constant_divmod(gas_used, MAX_REFUND_QUOTIENT_OF_GAS_USED, N_BYTES_GAS)?;
    let refund = instruction.tx_refund_read(tx_id)?;
    let effective_refund = instruction.min(max_refund, refund, N_BYTES_GAS)?;

    let gas_price = instruction.tx_context_lookup(tx_id, TxContextFieldTag::GasPrice)?;
    let caller_address = instruction.tx_context_lookup(tx_id, TxContextFieldTag::CallerAddress)?;
    let caller_address = instruction.word_to_address(&caller_address)?;

    let refund_gas = instruction.field_to_u64(
        instruction.curr.gas_left + effective_refund,
        "refunded gas",
    )?;
    let (refund_value, carry) = mul_word_by_u64(&gas_price, refund_gas)?;
    instruction.constrain_zero(carry)?;
    let (caller_balance, caller_balance_prev) =
        instruction.account_write(caller_address, AccountFieldTag::Balance, None)?;
    let (sum, carry) = instruction.add_words(&[caller_balance_prev, refund_value])?;
    instruction.constrain_equal_word(&sum, &caller_balance)?;
    instruction.constrain_zero(carry)?;

    // The base fee is burnt; the coinbase receives the rest of the price.
    let base_fee = instruction.block_context_lookup(BlockContextFieldTag::BaseFee)?;
    let (is_price_below_base_fee, _) = instruction.compare_word(&gas_price, &base_fee)?;
    instruction.constrain_zero(is_price_below_base_fee)?;
    let effective_tip = Word::from_biguint(&(gas_price.to_biguint() - base_fee.to_biguint()));
    let (sum, carry) = instruction.add_words(&[effective_tip, base_fee])?;
    instruction.constrain_equal_word(&sum, &gas_price)?;
    instruction.constrain_zero(carry)?;

    let coinbase = instruction.block_context_lookup(BlockContextFieldTag::Coinbase)?;
    let coinbase = instruction.word_to_address(&coinbase)?;
    // The refunded gas is not paid to the coinbase.
    let charged_gas = instruction.field_to_u64(gas_used - effective_refund, "charged gas")?;
    let (reward, carry) = mul_word_by_u64(&effective_tip, charged_gas)?;
    instruction.constrain_zero(carry)?;
    let (coinbase_balance, coinbase_balance_prev) =
        instruction.account_write(coinbase, AccountFieldTag::Balance, None)?;
    let (sum, carry) = instruction.add_words(&[coinbase_balance_prev, reward])?;
    instruction.constrain_equal_word(&sum, &coinbase_balance)?;
    instruction.constrain_zero(carry)?;

    let selectors = instruction.multiple_select(
        instruction.next.execution_state.into(),
        &[
            ExecutionState::BeginTx.into(),
            ExecutionState::EndBlock.into(),
        ],
    )?;
    if selectors[0].is_one() {
        // The next transaction's call is identified by its first read/write
        // counter, where it reads its transaction id.
        let next_rw_counter = instruction.next.rw_counter;
        let query = RwQuery {
            id: next_rw_counter,
            field_tag: CallContextFieldTag::TxId.into(),
            value: Some(Word::from(tx_id + Fr::one())),
            ..Default::default()
        };
        instruction.rw_lookup(false, RwTableTag::CallContext, &query, Some(next_rw_counter))?;
    }

    instruction.constrain_state_transition(StateTransition {
        rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
        ..StateTransition::any()
    })
}
