mod common;

use common::*;
use evm_circuit::{
    error::ConstraintError,
    evm::{
        execution_state::ExecutionState,
        opcode::Opcode,
        step::StepState,
        table::{AccountFieldTag, CallContextFieldTag, RwTableRow, RwTableTag},
        witness::{Bytecode, RwDictionary},
    },
    lookups::TableWitness,
    util::{hash::empty_code_hash_word, Fr, Word},
};

const CALLEE: u64 = 0xca;
const END_OF_REVERSION: u64 = 100;

/// Slot values of one SSTORE: `committed` at the start of the transaction,
/// `prev` before the write.
struct SstoreCase {
    committed: u64,
    prev: u64,
    value: u64,
    is_warm: bool,
    is_persistent: bool,
    refund_prev: u64,
    refund: u64,
    gas_cost: u64,
}

fn sstore_witness(case: &SstoreCase) -> (TableWitness, StepState, StepState) {
    let mut code = Bytecode::new();
    code.op(Opcode::SSTORE).op(Opcode::STOP);
    let (call_id, tx_id, callee) = (Fr::from(CALL_ID), Fr::from(TX_ID), Fr::from(CALLEE));
    let key = Word::from(0x1234u64);
    let reversal = |index: u64| (!case.is_persistent).then_some(END_OF_REVERSION - index);

    let mut rw = RwDictionary::default();
    rw.call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .call_context_read(call_id, CallContextFieldTag::IsStatic, 0u64)
        .call_context_read(
            call_id,
            CallContextFieldTag::RwCounterEndOfReversion,
            END_OF_REVERSION,
        )
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, case.is_persistent)
        .call_context_read(call_id, CallContextFieldTag::CalleeAddress, callee)
        .stack_read(call_id, 1022, key)
        .stack_read(call_id, 1023, Word::from(case.value))
        .account_storage_write(
            tx_id,
            callee,
            key,
            Word::from(case.value),
            Word::from(case.prev),
            Word::from(case.committed),
            reversal(0),
        )
        .tx_access_list_account_storage_write(tx_id, callee, key, case.is_warm, reversal(1));
    if case.is_persistent {
        rw.tx_refund_write(tx_id, case.refund, case.refund_prev);
    }
    let rw_counter = rw.rw_counter();

    let curr = opcode_step(ExecutionState::SSTORE, &code, 1, 2, 30000);
    let next = StepState {
        execution_state: ExecutionState::STOP,
        rw_counter: Fr::from(rw_counter),
        program_counter: Fr::from(1u64),
        stack_pointer: Fr::from(1024u64),
        gas_left: Fr::from(30000 - case.gas_cost),
        reversible_write_counter: Fr::from(2u64),
        ..curr.clone()
    };
    (tables(rw, &code), curr, next)
}

fn run_sstore(case: &SstoreCase) -> evm_circuit::Result<()> {
    let (witness, curr, next) = sstore_witness(case);
    verify(witness, &curr, &next)
}

fn row_at(rows: &mut [RwTableRow], rw_counter: u64) -> &mut RwTableRow {
    rows.iter_mut()
        .find(|row| row.rw_counter == Fr::from(rw_counter))
        .unwrap()
}

fn cold_set() -> SstoreCase {
    SstoreCase {
        committed: 0,
        prev: 0,
        value: 1,
        is_warm: false,
        is_persistent: true,
        refund_prev: 0,
        refund: 0,
        gas_cost: 22100,
    }
}

#[test]
fn test_sstore_cold_set() {
    run_sstore(&cold_set()).unwrap();
}

#[test]
fn test_sstore_cold_set_undercharged() {
    let case = SstoreCase {
        gas_cost: 20000,
        ..cold_set()
    };
    assert!(matches!(
        run_sstore(&case),
        Err(ConstraintError::Transition {
            field: "gas_left",
            ..
        })
    ));
}

#[test]
fn test_sstore_warm_clear_refunds() {
    let case = SstoreCase {
        committed: 5,
        prev: 5,
        value: 0,
        is_warm: true,
        is_persistent: true,
        refund_prev: 0,
        refund: 4800,
        gas_cost: 2900,
    };
    run_sstore(&case).unwrap();
}

#[test]
fn test_sstore_dirty_restore_refunds() {
    // Slot set from 0 to 3 earlier in the transaction, then back to 0.
    let case = SstoreCase {
        committed: 0,
        prev: 3,
        value: 0,
        is_warm: true,
        is_persistent: true,
        refund_prev: 0,
        refund: 19900,
        gas_cost: 100,
    };
    run_sstore(&case).unwrap();
}

#[test]
fn test_sstore_noop() {
    let case = SstoreCase {
        committed: 7,
        prev: 7,
        value: 7,
        is_warm: true,
        is_persistent: true,
        refund_prev: 10,
        refund: 10,
        gas_cost: 100,
    };
    run_sstore(&case).unwrap();
}

fn reverted_cold_set() -> SstoreCase {
    SstoreCase {
        is_persistent: false,
        ..cold_set()
    }
}

#[test]
fn test_sstore_reverted_call() {
    // The writes get their reversals and the refund is left alone.
    let (mut witness, curr, next) = sstore_witness(&reverted_cold_set());

    // The first reversible write is undone last.
    let slot = row_at(&mut witness.rw, END_OF_REVERSION).clone();
    assert_eq!(slot.tag, RwTableTag::AccountStorage);
    assert_eq!((slot.value, slot.value_prev), (Word::zero(), Word::from(1u64)));
    let access = row_at(&mut witness.rw, END_OF_REVERSION - 1).clone();
    assert_eq!(access.tag, RwTableTag::TxAccessListAccountStorage);
    assert_eq!((access.value, access.value_prev), (Word::zero(), Word::from(1u64)));

    verify(witness, &curr, &next).unwrap();
}

#[test]
fn test_sstore_reverted_call_needs_its_reversals() {
    let tampered: [fn(&mut Vec<RwTableRow>); 4] = [
        // Missing reversal of the slot write.
        |rows| rows.retain(|row| row.rw_counter != Fr::from(END_OF_REVERSION)),
        // Missing reversal of the access list write.
        |rows| rows.retain(|row| row.rw_counter != Fr::from(END_OF_REVERSION - 1)),
        // Reversals undone in write order.
        |rows| {
            row_at(rows, END_OF_REVERSION).rw_counter = Fr::from(0u64);
            row_at(rows, END_OF_REVERSION - 1).rw_counter = Fr::from(END_OF_REVERSION);
            row_at(rows, 0).rw_counter = Fr::from(END_OF_REVERSION - 1);
        },
        // The slot is restored to the wrong value.
        |rows| row_at(rows, END_OF_REVERSION).value = Word::from(2u64),
    ];
    for tamper in tampered {
        let (mut witness, curr, next) = sstore_witness(&reverted_cold_set());
        tamper(&mut witness.rw);
        assert!(matches!(
            verify(witness, &curr, &next),
            Err(ConstraintError::LookupUnsat { .. })
        ));
    }
}

#[test]
fn test_sstore_below_stipend() {
    let mut code = Bytecode::new();
    code.op(Opcode::SSTORE);
    let call_id = Fr::from(CALL_ID);
    let mut rw = RwDictionary::default();
    rw.call_context_read(call_id, CallContextFieldTag::TxId, TX_ID)
        .call_context_read(call_id, CallContextFieldTag::IsStatic, 0u64)
        .call_context_read(call_id, CallContextFieldTag::RwCounterEndOfReversion, 0u64)
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, 1u64)
        .call_context_read(call_id, CallContextFieldTag::CalleeAddress, CALLEE)
        .stack_read(call_id, 1022, Word::zero())
        .stack_read(call_id, 1023, Word::zero())
        .account_storage_write(
            Fr::from(TX_ID),
            Fr::from(CALLEE),
            Word::zero(),
            Word::zero(),
            Word::zero(),
            Word::zero(),
            None,
        )
        .tx_access_list_account_storage_write(
            Fr::from(TX_ID),
            Fr::from(CALLEE),
            Word::zero(),
            true,
            None,
        );
    let curr = opcode_step(ExecutionState::SSTORE, &code, 1, 2, 2300);
    let result = verify(tables(rw, &code), &curr, &curr);
    assert!(matches!(result, Err(ConstraintError::Unsat { .. })));
}

#[test]
fn test_sstore_in_static_call() {
    let mut code = Bytecode::new();
    code.op(Opcode::SSTORE);
    let call_id = Fr::from(CALL_ID);
    let mut rw = RwDictionary::default();
    rw.call_context_read(call_id, CallContextFieldTag::TxId, TX_ID)
        .call_context_read(call_id, CallContextFieldTag::IsStatic, 1u64);
    let curr = opcode_step(ExecutionState::SSTORE, &code, 1, 2, 30000);
    assert!(verify(tables(rw, &code), &curr, &curr).is_err());
}

#[test]
fn test_sload_cold() {
    let mut code = Bytecode::new();
    code.op(Opcode::SLOAD);
    let (call_id, tx_id, callee) = (Fr::from(CALL_ID), Fr::from(TX_ID), Fr::from(CALLEE));
    let key = Word::from(9u64);
    let value = Word::from(0xbeefu64);

    let mut rw = RwDictionary::default();
    rw.call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .call_context_read(call_id, CallContextFieldTag::RwCounterEndOfReversion, 0u64)
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, 1u64)
        .call_context_read(call_id, CallContextFieldTag::CalleeAddress, callee)
        .stack_read(call_id, 1023, key)
        .account_storage_read(tx_id, callee, key, value, Word::zero())
        .tx_access_list_account_storage_write(tx_id, callee, key, false, None)
        .stack_write(call_id, 1023, value);

    let curr = opcode_step(ExecutionState::SLOAD, &code, 1, 1, 5000);
    let next = StepState {
        rw_counter: Fr::from(9u64),
        program_counter: Fr::from(1u64),
        gas_left: Fr::from(2900u64),
        reversible_write_counter: Fr::from(1u64),
        ..curr.clone()
    };
    verify(tables(rw, &code), &curr, &next).unwrap();
}

fn run_balance(
    address: Word,
    is_warm: bool,
    balance: Word,
    code_hash: Word,
    pushed: Word,
) -> evm_circuit::Result<()> {
    let mut code = Bytecode::new();
    code.op(Opcode::BALANCE);
    let (call_id, tx_id) = (Fr::from(CALL_ID), Fr::from(TX_ID));
    let account = Fr::from(0xaau64);

    let mut rw = RwDictionary::default();
    rw.stack_read(call_id, 1023, address)
        .call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .call_context_read(call_id, CallContextFieldTag::RwCounterEndOfReversion, 0u64)
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, 1u64)
        .tx_access_list_account_write(tx_id, account, is_warm, None)
        .account_read(account, AccountFieldTag::Balance, balance)
        .account_read(account, AccountFieldTag::CodeHash, code_hash)
        .stack_write(call_id, 1023, pushed);

    let gas_cost = if is_warm { 100 } else { 2600 };
    let curr = opcode_step(ExecutionState::BALANCE, &code, 1, 1, 3000);
    let next = StepState {
        rw_counter: Fr::from(9u64),
        program_counter: Fr::from(1u64),
        gas_left: Fr::from(3000 - gas_cost),
        reversible_write_counter: Fr::from(1u64),
        ..curr.clone()
    };
    verify(tables(rw, &code), &curr, &next)
}

#[test]
fn test_balance_cold_and_warm() {
    let balance = Word::from(1_000_000u64);
    for is_warm in [false, true] {
        run_balance(Word::from(0xaau64), is_warm, balance, empty_code_hash_word(), balance)
            .unwrap();
    }
}

#[test]
fn test_balance_truncates_address() {
    // Only the low 20 bytes of the stack item address the account.
    let address = Word::new(Fr::from(0xaau64), Fr::from(0xffff_ffffu64) * Fr::from(1u128 << 64));
    let balance = Word::from(7u64);
    run_balance(address, false, balance, empty_code_hash_word(), balance).unwrap();
}

#[test]
fn test_balance_of_non_existing_account() {
    run_balance(Word::from(0xaau64), false, Word::zero(), Word::zero(), Word::zero()).unwrap();
    let result = run_balance(
        Word::from(0xaau64),
        false,
        Word::from(5u64),
        Word::zero(),
        Word::from(5u64),
    );
    assert!(matches!(result, Err(ConstraintError::Unsat { .. })));
}

/// A cold BALANCE in a call that is reverted later on.
fn balance_in_reverted_call() -> (TableWitness, StepState, StepState) {
    let mut code = Bytecode::new();
    code.op(Opcode::BALANCE);
    let (call_id, tx_id) = (Fr::from(CALL_ID), Fr::from(TX_ID));
    let account = Fr::from(0xaau64);
    let balance = Word::from(3u64);

    let mut rw = RwDictionary::default();
    rw.stack_read(call_id, 1023, Word::from(account))
        .call_context_read(call_id, CallContextFieldTag::TxId, tx_id)
        .call_context_read(
            call_id,
            CallContextFieldTag::RwCounterEndOfReversion,
            END_OF_REVERSION,
        )
        .call_context_read(call_id, CallContextFieldTag::IsPersistent, 0u64)
        .tx_access_list_account_write(tx_id, account, false, Some(END_OF_REVERSION))
        .account_read(account, AccountFieldTag::Balance, balance)
        .account_read(account, AccountFieldTag::CodeHash, empty_code_hash_word())
        .stack_write(call_id, 1023, balance);

    let curr = opcode_step(ExecutionState::BALANCE, &code, 1, 1, 3000);
    let next = StepState {
        rw_counter: Fr::from(9u64),
        program_counter: Fr::from(1u64),
        gas_left: Fr::from(400u64),
        reversible_write_counter: Fr::from(1u64),
        ..curr.clone()
    };
    (tables(rw, &code), curr, next)
}

#[test]
fn test_balance_in_reverted_call() {
    let (witness, curr, next) = balance_in_reverted_call();
    verify(witness, &curr, &next).unwrap();

    let (mut witness, curr, next) = balance_in_reverted_call();
    witness
        .rw
        .retain(|row| row.rw_counter != Fr::from(END_OF_REVERSION));
    assert!(matches!(
        verify(witness, &curr, &next),
        Err(ConstraintError::LookupUnsat { .. })
    ));

    // The account would stay warm after the revert.
    let (mut witness, curr, next) = balance_in_reverted_call();
    row_at(&mut witness.rw, END_OF_REVERSION).value = Word::from(1u64);
    assert!(matches!(
        verify(witness, &curr, &next),
        Err(ConstraintError::LookupUnsat { .. })
    ));
}
