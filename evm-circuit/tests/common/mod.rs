use evm_circuit::{
    evm::{
        execution_state::ExecutionState,
        step::StepState,
        verify_step,
        witness::{Bytecode, RwDictionary},
    },
    lookups::{TableWitness, Tables},
    util::{param::STACK_CAPACITY, Fr},
    Result,
};

pub const CALL_ID: u64 = 1;
pub const TX_ID: u64 = 1;

pub fn randomness() -> Fr {
    Fr::from(0x100u64)
}

/// A step of the call [`CALL_ID`] executing the first byte of `code`, with
/// `stack_depth` items on the stack.
pub fn opcode_step(
    execution_state: ExecutionState,
    code: &Bytecode,
    rw_counter: u64,
    stack_depth: u64,
    gas_left: u64,
) -> StepState {
    StepState {
        rw_counter: Fr::from(rw_counter),
        call_id: Fr::from(CALL_ID),
        is_root: Fr::from(1u64),
        code_hash: code.hash(),
        stack_pointer: Fr::from(STACK_CAPACITY - stack_depth),
        gas_left: Fr::from(gas_left),
        ..StepState::new(execution_state)
    }
}

pub fn tables(rw: RwDictionary, code: &Bytecode) -> TableWitness {
    TableWitness {
        rw: rw.into_rows(),
        bytecode: code.table_rows(),
        ..Default::default()
    }
}

pub fn verify(tables: TableWitness, curr: &StepState, next: &StepState) -> Result<()> {
    verify_step(&Tables::new(tables), curr, next, randomness(), false, false)
}
