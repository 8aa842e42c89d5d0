mod common;

use common::*;
use evm_circuit::{
    error::{ConstraintError, StepError, VerifyError},
    evm::{
        execution_state::ExecutionState,
        opcode::Opcode,
        step::StepState,
        table::{AccountFieldTag, CallContextFieldTag},
        verify_steps, verify_steps_parallel,
        witness::{Block, Bytecode, RwDictionary, Transaction, Witness},
    },
    lookups::{TableWitness, Tables},
    util::{Fr, Word},
};

const CALLER: u64 = 0xc0;
const CALLEE: u64 = 0xca;
const BALANCE: u64 = 1_000_000_000_000_000_000;

fn transaction() -> Transaction {
    Transaction {
        gas: 30000,
        caller_address: Fr::from(CALLER),
        callee_address: Fr::from(CALLEE),
        value: Word::from(5u64),
        ..Default::default()
    }
}

/// A transfer to a contract that stops right away, followed by the end of
/// the block.
fn transfer_witness() -> Witness {
    let tx = transaction();
    let block = Block::default();
    let mut code = Bytecode::new();
    code.op(Opcode::STOP);

    let (call_id, tx_id) = (Fr::from(CALL_ID), Fr::from(tx.id));
    let (caller, callee) = (tx.caller_address, tx.callee_address);
    let gas_fee = 30000 * 2_000_000_000u64;
    let balance_after_fee = BALANCE - gas_fee;
    let balance_after_transfer = balance_after_fee - 5;

    let mut rw = RwDictionary::default();
    // BeginTx
    rw.call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .call_context_read(call_id, CallContextFieldTag::RwCounterEndOfReversion, 0u64)
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, 1u64)
        .call_context_read(call_id, CallContextFieldTag::IsSuccess, 1u64)
        .account_write(caller, AccountFieldTag::Nonce, 1u64, 0u64, None)
        .tx_access_list_account_write(tx_id, caller, false, None)
        .tx_access_list_account_write(tx_id, callee, false, None)
        .account_write(caller, AccountFieldTag::Balance, balance_after_fee, BALANCE, None)
        .account_write(
            caller,
            AccountFieldTag::Balance,
            balance_after_transfer,
            balance_after_fee,
            None,
        )
        .account_write(callee, AccountFieldTag::Balance, 5u64, 0u64, None)
        .account_read(callee, AccountFieldTag::CodeHash, code.hash())
        .call_context_read(call_id, CallContextFieldTag::Depth, 1u64)
        .call_context_read(call_id, CallContextFieldTag::CallerId, 0u64)
        .call_context_read(call_id, CallContextFieldTag::CallerAddress, caller)
        .call_context_read(call_id, CallContextFieldTag::CalleeAddress, callee)
        .call_context_read(call_id, CallContextFieldTag::CallDataOffset, 0u64)
        .call_context_read(call_id, CallContextFieldTag::CallDataLength, 0u64)
        .call_context_read(call_id, CallContextFieldTag::Value, 5u64)
        .call_context_read(call_id, CallContextFieldTag::IsStatic, 0u64)
        .call_context_read(call_id, CallContextFieldTag::IsRoot, 1u64)
        .call_context_read(call_id, CallContextFieldTag::IsCreate, 0u64)
        .call_context_read(call_id, CallContextFieldTag::CodeHash, code.hash());
    let stop_rw_counter = rw.rw_counter();
    rw.call_context_read(call_id, CallContextFieldTag::IsSuccess, 1u64);
    let end_tx_rw_counter = rw.rw_counter();
    // 9000 gas left at 2 gwei back to the caller, 21000 gas used at a 1 gwei
    // tip to the coinbase.
    rw.call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .tx_refund_read(tx_id, 0)
        .account_write(
            caller,
            AccountFieldTag::Balance,
            balance_after_transfer + 9000 * 2_000_000_000,
            balance_after_transfer,
            None,
        )
        .account_write(
            block.coinbase,
            AccountFieldTag::Balance,
            21000 * 1_000_000_000u64,
            0u64,
            None,
        );
    let end_block_rw_counter = rw.rw_counter();

    let begin_tx = StepState {
        rw_counter: Fr::from(1u64),
        call_id,
        ..StepState::new(ExecutionState::BeginTx)
    };
    let stop = StepState {
        rw_counter: Fr::from(stop_rw_counter),
        call_id,
        is_root: Fr::from(1u64),
        code_hash: code.hash(),
        gas_left: Fr::from(9000u64),
        reversible_write_counter: Fr::from(2u64),
        ..StepState::new(ExecutionState::STOP)
    };
    let end_tx = StepState {
        execution_state: ExecutionState::EndTx,
        rw_counter: Fr::from(end_tx_rw_counter),
        ..stop.clone()
    };
    let end_block = StepState {
        rw_counter: Fr::from(end_block_rw_counter),
        ..StepState::new(ExecutionState::EndBlock)
    };

    let tables = TableWitness {
        block: block.table_rows(),
        tx: tx.table_rows(),
        bytecode: code.table_rows(),
        rw: rw.into_rows(),
        ..Default::default()
    };
    Witness::new(
        randomness(),
        tables,
        vec![begin_tx, stop, end_tx, end_block.clone(), end_block.clone(), end_block],
    )
}

fn verify_witness(witness: &Witness, parallel: bool) -> Result<(), VerifyError> {
    let tables = Tables::new(witness.tables.clone());
    let verify = if parallel {
        verify_steps_parallel
    } else {
        verify_steps
    };
    verify(&tables, &witness.steps, witness.randomness, true, true)
}

fn step_error(err: VerifyError) -> StepError {
    match err {
        VerifyError::Step(err) => err,
        VerifyError::RwTable(err) => panic!("unexpected rw table error: {err}"),
    }
}

#[test]
fn test_transfer_to_contract() {
    let witness = transfer_witness();
    verify_witness(&witness, false).unwrap();
    verify_witness(&witness, true).unwrap();
}

#[test]
fn test_witness_json_round_trip() {
    let witness = transfer_witness();
    let json = serde_json::to_string(&witness).unwrap();
    let parsed: Witness = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.steps, witness.steps);
    verify_witness(&parsed, false).unwrap();
}

#[test]
fn test_first_failure_is_reported() {
    let mut witness = transfer_witness();
    // STOP starts with less gas than BeginTx left, and the padding moves.
    witness.steps[1].gas_left = Fr::from(8999u64);
    witness.steps[4].rw_counter += Fr::from(1u64);

    for parallel in [false, true] {
        let err = step_error(verify_witness(&witness, parallel).unwrap_err());
        assert_eq!(err.index, 0);
        assert_eq!(err.execution_state, ExecutionState::BeginTx);
        assert!(matches!(
            err.source,
            ConstraintError::Transition {
                field: "gas_left",
                ..
            }
        ));
    }
}

#[test]
fn test_first_step_reads_first_counter() {
    let mut witness = transfer_witness();
    let tables = Tables::new(witness.tables.clone());
    witness.steps[0].rw_counter = Fr::from(2u64);
    witness.steps[0].call_id = Fr::from(2u64);
    let err = verify_steps(&tables, &witness.steps, witness.randomness, true, true).unwrap_err();
    let err = step_error(err);
    assert_eq!(err.index, 0);
}

#[test]
fn test_end_block_padding_is_unchanged() {
    let mut witness = transfer_witness();
    witness.steps[4].gas_left = Fr::from(1u64);
    let err = step_error(verify_witness(&witness, false).unwrap_err());
    assert_eq!(err.index, 3);
    assert_eq!(err.execution_state, ExecutionState::EndBlock);

    // The last step only closes the previous window.
    let mut witness = transfer_witness();
    witness.steps[5].gas_left = Fr::from(1u64);
    verify_witness(&witness, false).unwrap();
}

#[test]
fn test_single_step_has_nothing_to_verify() {
    let witness = transfer_witness();
    let tables = Tables::new(witness.tables.clone());
    verify_steps(&tables, &witness.steps[..1], witness.randomness, true, true).unwrap();
    verify_steps(&tables, &[], witness.randomness, true, true).unwrap();
}

#[test]
fn test_balance_history_is_checked_first() {
    let mut witness = transfer_witness();
    // The transfer starts from a balance other than the one left after the
    // fee.
    let transfer_write = witness
        .tables
        .rw
        .iter_mut()
        .find(|row| row.rw_counter == Fr::from(9u64))
        .unwrap();
    transfer_write.value_prev = Word::from(BALANCE - 30000 * 2_000_000_000 + 1);
    for parallel in [false, true] {
        assert!(matches!(
            verify_witness(&witness, parallel),
            Err(VerifyError::RwTable(ConstraintError::RwHistory { .. }))
        ));
    }
}

/// An EndTx step settling `refund` on top of the 9000 gas left, followed by
/// the end of the block. The caller receives `caller_gas` and the coinbase
/// `coinbase_gas` worth of fees.
fn run_end_tx(refund: u64, caller_gas: u64, coinbase_gas: u64) -> Result<(), VerifyError> {
    let tx = transaction();
    let block = Block::default();
    let (call_id, tx_id) = (Fr::from(CALL_ID), Fr::from(tx.id));
    let mut rw = RwDictionary::new(30);
    rw.call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .tx_refund_read(tx_id, refund)
        .account_write(
            tx.caller_address,
            AccountFieldTag::Balance,
            BALANCE + caller_gas * 2_000_000_000,
            BALANCE,
            None,
        )
        .account_write(
            block.coinbase,
            AccountFieldTag::Balance,
            coinbase_gas * 1_000_000_000,
            0u64,
            None,
        );
    let end_tx = StepState {
        rw_counter: Fr::from(30u64),
        call_id,
        is_root: Fr::from(1u64),
        gas_left: Fr::from(9000u64),
        ..StepState::new(ExecutionState::EndTx)
    };
    let end_block = StepState {
        rw_counter: Fr::from(rw.rw_counter()),
        ..StepState::new(ExecutionState::EndBlock)
    };
    let tables = Tables::new(TableWitness {
        block: block.table_rows(),
        tx: tx.table_rows(),
        rw: rw.into_rows(),
        ..Default::default()
    });
    verify_steps(&tables, &[end_tx, end_block], randomness(), false, false)
}

#[test]
fn test_end_tx_refund_is_not_paid_to_coinbase() {
    // 21000 gas used, 1000 of it refunded.
    run_end_tx(1000, 10000, 20000).unwrap();
    let err = step_error(run_end_tx(1000, 10000, 21000).unwrap_err());
    assert_eq!(err.execution_state, ExecutionState::EndTx);
    assert!(matches!(err.source, ConstraintError::Unsat { .. }));
}

#[test]
fn test_end_tx_refund_is_capped() {
    // At most a fifth of the 21000 gas used comes back.
    run_end_tx(5000, 13200, 16800).unwrap();
    assert!(run_end_tx(5000, 14000, 16000).is_err());
}
