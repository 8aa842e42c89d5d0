//! The EVM execution circuit: the step witness, the tables it is checked
//! against and one constraint rule per execution state.

pub mod execution;
pub mod execution_state;
pub mod instruction;
pub mod opcode;
pub mod step;
pub mod table;
pub mod witness;

use crate::{
    error::{Result, StepError, VerifyError},
    evm::{instruction::Instruction, step::StepState},
    lookups::Tables,
    util::Fr,
};
use log::debug;
use rayon::prelude::*;

/// Verifies the step `curr` followed by `next`.
pub fn verify_step(
    tables: &Tables,
    curr: &StepState,
    next: &StepState,
    randomness: Fr,
    is_first_step: bool,
    is_last_step: bool,
) -> Result<()> {
    let mut instruction =
        Instruction::new(tables, curr, next, randomness, is_first_step, is_last_step);
    execution::execute(&mut instruction)
}

fn verify_window(
    tables: &Tables,
    steps: &[StepState],
    index: usize,
    randomness: Fr,
    begin_with_first_step: bool,
    end_with_last_step: bool,
) -> std::result::Result<(), StepError> {
    let (curr, next) = (&steps[index], &steps[index + 1]);
    let is_first_step = begin_with_first_step && index == 0;
    let is_last_step = end_with_last_step && index + 2 == steps.len();
    debug!(
        "verifying step {} ({}), rw_counter {}",
        index, curr.execution_state, curr.rw_counter
    );
    verify_step(tables, curr, next, randomness, is_first_step, is_last_step).map_err(|source| {
        debug!("step {} ({}) rejected: {}", index, curr.execution_state, source);
        StepError {
            index,
            execution_state: curr.execution_state,
            source,
        }
    })
}

fn check_rw_table(tables: &Tables) -> std::result::Result<(), VerifyError> {
    tables.rw.check_consistency().map_err(|err| {
        debug!("rw table rejected: {}", err);
        VerifyError::RwTable(err)
    })
}

/// Checks the read/write history, then verifies every pair of consecutive
/// steps, stopping at the first failure. The last step only serves as the
/// `next` of the one before it.
pub fn verify_steps(
    tables: &Tables,
    steps: &[StepState],
    randomness: Fr,
    begin_with_first_step: bool,
    end_with_last_step: bool,
) -> std::result::Result<(), VerifyError> {
    check_rw_table(tables)?;
    for index in 0..steps.len().saturating_sub(1) {
        verify_window(
            tables,
            steps,
            index,
            randomness,
            begin_with_first_step,
            end_with_last_step,
        )?;
    }
    Ok(())
}

/// Same as [`verify_steps`], checking the steps in parallel. The reported
/// failure is the first one in step order.
pub fn verify_steps_parallel(
    tables: &Tables,
    steps: &[StepState],
    randomness: Fr,
    begin_with_first_step: bool,
    end_with_last_step: bool,
) -> std::result::Result<(), VerifyError> {
    check_rw_table(tables)?;
    let failures: Vec<StepError> = (0..steps.len().saturating_sub(1))
        .into_par_iter()
        .filter_map(|index| {
            verify_window(
                tables,
                steps,
                index,
                randomness,
                begin_with_first_step,
                end_with_last_step,
            )
            .err()
        })
        .collect();
    match failures.into_iter().min_by_key(|failure| failure.index) {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}
