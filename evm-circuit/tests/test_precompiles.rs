mod common;

use common::*;
use evm_circuit::{
    ecc_circuit::EccCircuit,
    error::ConstraintError,
    evm::{
        execution_state::{ExecutionState, Precompile},
        opcode::Opcode,
        step::{AuxData, StepState},
        table::{CallContextFieldTag, SigTableRow},
        witness::{Bytecode, RwDictionary},
    },
    lookups::TableWitness,
    util::{arithmetic::rlc_encode_bytes, Fr, Word},
};
use num_bigint::BigUint;

const CALLEE_ID: u64 = 2;
const CALLER_GAS_LEFT: u64 = 100;
const CALLER_PC: u64 = 14;
const CALLER_SP: u64 = 1023;
const CALLER_RWC: u64 = 3;

/// STATICCALL of the precompile at address 1 with 128 bytes of calldata.
fn caller_code() -> Bytecode {
    let mut code = Bytecode::new();
    code.push(32)
        .push(0)
        .push(0x80)
        .push(0)
        .push(1)
        .push(0xffff)
        .op(Opcode::STATICCALL);
    code
}

/// Rows of a precompile call returning to a root caller.
fn precompile_rows(precompile: Precompile, is_success: bool) -> RwDictionary {
    let (callee_id, caller_id) = (Fr::from(CALLEE_ID), Fr::from(CALL_ID));
    let mut rw = RwDictionary::default();
    rw.call_context_read(callee_id, CallContextFieldTag::IsSuccess, is_success)
        .call_context_read(callee_id, CallContextFieldTag::CalleeAddress, precompile.address())
        .call_context_read(callee_id, CallContextFieldTag::CallerId, caller_id)
        .call_context_read(caller_id, CallContextFieldTag::IsRoot, 1u64)
        .call_context_read(caller_id, CallContextFieldTag::IsCreate, 0u64)
        .call_context_read(caller_id, CallContextFieldTag::CodeHash, caller_code().hash())
        .call_context_read(caller_id, CallContextFieldTag::ProgramCounter, CALLER_PC)
        .call_context_read(caller_id, CallContextFieldTag::StackPointer, CALLER_SP)
        .call_context_read(caller_id, CallContextFieldTag::GasLeft, CALLER_GAS_LEFT)
        .call_context_read(caller_id, CallContextFieldTag::MemorySize, 2u64)
        .call_context_read(caller_id, CallContextFieldTag::ReversibleWriteCounter, CALLER_RWC);
    rw
}

fn precompile_step(execution_state: ExecutionState, gas_left: u64, aux_data: AuxData) -> StepState {
    StepState {
        rw_counter: Fr::from(1u64),
        call_id: Fr::from(CALLEE_ID),
        gas_left: Fr::from(gas_left),
        aux_data: Some(aux_data),
        ..StepState::new(execution_state)
    }
}

/// The caller resuming with `gas_returned` more gas and `return_data_length`
/// bytes of return data.
fn resumed_caller(gas_returned: u64, return_data_length: u64) -> StepState {
    StepState {
        execution_state: ExecutionState::STOP,
        rw_counter: Fr::from(12u64),
        call_id: Fr::from(CALL_ID),
        is_root: Fr::from(1u64),
        code_hash: caller_code().hash(),
        program_counter: Fr::from(CALLER_PC),
        stack_pointer: Fr::from(CALLER_SP),
        gas_left: Fr::from(CALLER_GAS_LEFT + gas_returned),
        memory_word_size: Fr::from(2u64),
        reversible_write_counter: Fr::from(CALLER_RWC),
        last_callee_id: Fr::from(CALLEE_ID),
        last_callee_return_data_length: Fr::from(return_data_length),
        ..Default::default()
    }
}

fn word(hex: &str) -> Word {
    Word::from_biguint(&BigUint::parse_bytes(hex.as_bytes(), 16).unwrap())
}

struct Signature {
    msg_hash: Word,
    v: Word,
    r: Word,
    s: Word,
}

fn signature(v: u64) -> Signature {
    Signature {
        msg_hash: word("456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3"),
        v: Word::from(v),
        r: word("9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608"),
        s: word("4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"),
    }
}

fn ecrecover_aux_data(sig: &Signature, recovered_addr: Fr) -> AuxData {
    let mut input = vec![];
    for word in [&sig.msg_hash, &sig.v, &sig.r, &sig.s] {
        input.extend_from_slice(&word.to_be_bytes().unwrap());
    }
    let output_rlc = if recovered_addr == Fr::from(0u64) {
        Fr::from(0u64)
    } else {
        rlc_encode_bytes(&Word::from(recovered_addr).to_be_bytes().unwrap(), randomness())
    };
    AuxData::Ecrecover {
        msg_hash: sig.msg_hash,
        sig_v: sig.v,
        sig_r: sig.r,
        sig_s: sig.s,
        recovered_addr,
        input_rlc: rlc_encode_bytes(&input, randomness()),
        output_rlc,
    }
}

fn precompile_tables(rw: RwDictionary) -> TableWitness {
    TableWitness {
        rw: rw.into_rows(),
        ..Default::default()
    }
}

fn recovered_tables(sig: &Signature, recovered_addr: Fr) -> TableWitness {
    let mut tables = precompile_tables(precompile_rows(Precompile::EcRecover, true));
    tables.sig = vec![SigTableRow {
        msg_hash: sig.msg_hash,
        sig_v: Fr::from(1u64),
        sig_r: sig.r,
        sig_s: sig.s,
        recovered_addr,
        is_valid: Fr::from(1u64),
    }];
    tables
}

#[test]
fn test_ecrecover_recovers() {
    let sig = signature(28);
    let recovered_addr = word("7156526fbd7a3c72969b54f64e42c10fbb768c8a").expr();
    let curr = precompile_step(
        ExecutionState::EcRecover,
        5000,
        ecrecover_aux_data(&sig, recovered_addr),
    );
    verify(recovered_tables(&sig, recovered_addr), &curr, &resumed_caller(2000, 32)).unwrap();
}

#[test]
fn test_ecrecover_input_rlc_is_in_calldata_order() {
    let sig = signature(28);
    let recovered_addr = word("7156526fbd7a3c72969b54f64e42c10fbb768c8a").expr();
    let mut aux_data = ecrecover_aux_data(&sig, recovered_addr);
    if let AuxData::Ecrecover { input_rlc, .. } = &mut aux_data {
        let mut reversed = vec![];
        for word in [&sig.msg_hash, &sig.v, &sig.r, &sig.s] {
            reversed.extend_from_slice(&word.to_be_bytes().unwrap());
        }
        reversed.reverse();
        *input_rlc = rlc_encode_bytes(&reversed, randomness());
    }
    let curr = precompile_step(ExecutionState::EcRecover, 5000, aux_data);
    assert!(matches!(
        verify(recovered_tables(&sig, recovered_addr), &curr, &resumed_caller(2000, 32)),
        Err(ConstraintError::Unsat { .. })
    ));
}

#[test]
fn test_ecrecover_invalid_v_recovers_nothing() {
    // No signature row exists: the lookup must not be issued.
    let sig = signature(29);
    let tables = precompile_tables(precompile_rows(Precompile::EcRecover, true));
    let curr = precompile_step(
        ExecutionState::EcRecover,
        5000,
        ecrecover_aux_data(&sig, Fr::from(0u64)),
    );
    verify(tables.clone(), &curr, &resumed_caller(2000, 0)).unwrap();

    let claimed = precompile_step(
        ExecutionState::EcRecover,
        5000,
        ecrecover_aux_data(&sig, Fr::from(0xabu64)),
    );
    assert!(matches!(
        verify(tables, &claimed, &resumed_caller(2000, 32)),
        Err(ConstraintError::Unsat { .. })
    ));
}

#[test]
fn test_ecrecover_out_of_gas() {
    let sig = signature(29);
    let tables = precompile_tables(precompile_rows(Precompile::EcRecover, true));
    let curr = precompile_step(
        ExecutionState::EcRecover,
        2999,
        ecrecover_aux_data(&sig, Fr::from(0u64)),
    );
    assert!(matches!(
        verify(tables, &curr, &resumed_caller(0, 0)),
        Err(ConstraintError::OutOfRange { .. })
    ));
}

#[test]
fn test_ecrecover_at_wrong_address() {
    let sig = signature(29);
    let tables = precompile_tables(precompile_rows(Precompile::Bn254Add, true));
    let curr = precompile_step(
        ExecutionState::EcRecover,
        5000,
        ecrecover_aux_data(&sig, Fr::from(0u64)),
    );
    assert!(matches!(
        verify(tables, &curr, &resumed_caller(2000, 0)),
        Err(ConstraintError::LookupUnsat { .. })
    ));
}

fn bn254_add_step(ecc: &mut EccCircuit, p: (Word, Word), q: (Word, Word)) -> StepState {
    let row = ecc.add(p, q).unwrap().clone();
    precompile_step(
        ExecutionState::Bn254Add,
        1000,
        AuxData::Bn254Add {
            p_x: row.px,
            p_y: row.py,
            q_x: row.qx,
            q_y: row.qy,
            out_x: row.out_x,
            out_y: row.out_y,
        },
    )
}

#[test]
fn test_bn254_add() {
    let generator = (Word::from(1u64), Word::from(2u64));
    let mut ecc = EccCircuit::new(1, 0);
    let curr = bn254_add_step(&mut ecc, generator, generator);
    let mut tables = precompile_tables(precompile_rows(Precompile::Bn254Add, true));
    tables.ecc = ecc.table_rows();
    verify(tables, &curr, &resumed_caller(850, 64)).unwrap();
}

#[test]
fn test_bn254_add_invalid_point_consumes_gas() {
    let generator = (Word::from(1u64), Word::from(2u64));
    let off_curve = (Word::from(2u64), Word::from(3u64));
    let mut ecc = EccCircuit::new(1, 0);
    let curr = bn254_add_step(&mut ecc, off_curve, generator);

    let mut tables = precompile_tables(precompile_rows(Precompile::Bn254Add, false));
    tables.ecc = ecc.table_rows();
    verify(tables.clone(), &curr, &resumed_caller(0, 0)).unwrap();

    // A failed call cannot claim success.
    tables.rw = precompile_rows(Precompile::Bn254Add, true).into_rows();
    assert!(verify(tables, &curr, &resumed_caller(850, 64)).is_err());
}
