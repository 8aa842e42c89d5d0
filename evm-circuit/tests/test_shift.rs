mod common;

use common::*;
use evm_circuit::{
    error::ConstraintError,
    evm::{
        execution_state::ExecutionState,
        opcode::Opcode,
        step::StepState,
        witness::{Bytecode, RwDictionary},
    },
    util::{Fr, Word},
};
use num_bigint::BigUint;

fn minus(value: u64) -> Word {
    Word::from_biguint(&((BigUint::from(1u64) << 256u32) - BigUint::from(value)))
}

/// Runs `opcode` with `shift` on top of `a`, pushing `b`.
fn run_shift(opcode: Opcode, a: Word, shift: Word, b: Word) -> evm_circuit::Result<()> {
    let execution_state = if opcode == Opcode::SHR {
        ExecutionState::SHR
    } else {
        ExecutionState::SAR
    };
    let mut code = Bytecode::new();
    code.op(opcode).op(Opcode::STOP);
    let call_id = Fr::from(CALL_ID);

    let mut rw = RwDictionary::default();
    rw.stack_read(call_id, 1022, shift)
        .stack_read(call_id, 1023, a)
        .stack_write(call_id, 1023, b);

    let curr = opcode_step(execution_state, &code, 1, 2, 100);
    let next = StepState {
        execution_state: ExecutionState::STOP,
        rw_counter: Fr::from(4u64),
        program_counter: Fr::from(1u64),
        stack_pointer: Fr::from(1023u64),
        gas_left: Fr::from(97u64),
        ..curr.clone()
    };
    verify(tables(rw, &code), &curr, &next)
}

#[test]
fn test_shr_by_four() {
    run_shift(Opcode::SHR, Word::from(256u64), Word::from(4u64), Word::from(16u64)).unwrap();
}

#[test]
fn test_shr_across_limbs() {
    let a = Word::from_biguint(&(BigUint::from(0xabcdu64) << 120u32));
    let b = Word::from_biguint(&(BigUint::from(0xabcdu64) << 50u32));
    run_shift(Opcode::SHR, a, Word::from(70u64), b).unwrap();
}

#[test]
fn test_shr_by_256_or_more_clears() {
    run_shift(Opcode::SHR, minus(1), Word::from(256u64), Word::zero()).unwrap();
    run_shift(
        Opcode::SHR,
        minus(1),
        Word::new(Fr::from(1u64), Fr::from(1u64)),
        Word::zero(),
    )
    .unwrap();
}

#[test]
fn test_shr_wrong_result() {
    let result = run_shift(Opcode::SHR, Word::from(256u64), Word::from(4u64), Word::from(8u64));
    assert!(matches!(result, Err(ConstraintError::Unsat { .. })));
}

#[test]
fn test_sar_sign_extends() {
    run_shift(Opcode::SAR, minus(2), Word::from(1u64), minus(1)).unwrap();
    run_shift(Opcode::SAR, minus(256), Word::from(4u64), minus(16)).unwrap();
    run_shift(Opcode::SAR, minus(5), Word::from(300u64), minus(1)).unwrap();
}

#[test]
fn test_sar_of_positive_is_shr() {
    run_shift(Opcode::SAR, Word::from(256u64), Word::from(4u64), Word::from(16u64)).unwrap();
    run_shift(Opcode::SAR, Word::from(256u64), Word::from(512u64), Word::zero()).unwrap();
}

#[test]
fn test_sar_keeps_sign() {
    // A logical shift of a negative value is not an arithmetic one.
    let logical = Word::from_biguint(&(minus(2).to_biguint() >> 1u32));
    assert!(run_shift(Opcode::SAR, minus(2), Word::from(1u64), logical).is_err());
}
