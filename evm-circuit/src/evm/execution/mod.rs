//! One rule per execution state. A rule reads the current step through the
//! [`Instruction`] and fails on the first unsatisfied constraint.

mod add_sub;
mod balance;
mod begin_tx;
mod byte;
mod calldatasize;
mod coinbase;
mod create;
mod end_block;
mod end_tx;
mod error_oog_memory_copy;
mod exp;
mod jump;
mod shift;
mod stop;
mod storage;

pub mod precompiles;

pub use add_sub::add_sub;
pub use balance::balance;
pub use begin_tx::begin_tx;
pub use byte::byte;
pub use calldatasize::calldatasize;
pub use coinbase::coinbase;
pub use create::create;
pub use end_block::end_block;
pub use end_tx::end_tx;
pub use error_oog_memory_copy::error_oog_memory_copy;
pub use exp::exp;
pub use jump::jump;
pub use shift::{sar, shr};
pub use stop::stop;
pub use storage::{sload, sstore};

use crate::{
    error::Result,
    evm::{execution_state::ExecutionState, instruction::Instruction},
};

/// Runs the rule of the current execution state.
pub fn execute(instruction: &mut Instruction) -> Result<()> {
    match instruction.curr.execution_state {
        ExecutionState::BeginTx => begin_tx(instruction),
        ExecutionState::EndTx => end_tx(instruction),
        ExecutionState::EndBlock => end_block(instruction),
        ExecutionState::STOP => stop(instruction),
        ExecutionState::ADD => add_sub(instruction),
        ExecutionState::BYTE => byte(instruction),
        ExecutionState::SHR => shr(instruction),
        ExecutionState::SAR => sar(instruction),
        ExecutionState::EXP => exp(instruction),
        ExecutionState::CALLDATASIZE => calldatasize(instruction),
        ExecutionState::COINBASE => coinbase(instruction),
        ExecutionState::BALANCE => balance(instruction),
        ExecutionState::JUMP => jump(instruction),
        ExecutionState::SLOAD => sload(instruction),
        ExecutionState::SSTORE => sstore(instruction),
        ExecutionState::CREATE => create(instruction),
        ExecutionState::ErrorOutOfGasMemoryCopy => error_oog_memory_copy(instruction),
        ExecutionState::EcRecover => precompiles::ecrecover(instruction),
        ExecutionState::Bn254Add => precompiles::bn254_add(instruction),
    }
}
