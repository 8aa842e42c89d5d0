//! This module implements the [`ConstraintError`] type raised when a witness
//! does not satisfy the execution constraints.

use crate::{
    evm::{execution_state::ExecutionState, table::RwTableTag},
    lookups::Table,
    util::{field_hex, Fr},
};
use std::panic::Location;
use thiserror::Error;

/// Errors raised while checking a witness against the constraints. All of
/// them are fatal: the step, and the whole sequence with it, is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("the lookup failed to find a match in the {table} table: {query}")]
    LookupUnsat { table: Table, query: String },

    #[error("the lookup in the {table} table does not determine a row ({count} rows match): {query}")]
    LookupAmbiguous {
        table: Table,
        query: String,
        count: usize,
    },

    #[error("the constraint at {location} is not satisfied: {} != {}", field_hex(.lhs), field_hex(.rhs))]
    Unsat {
        location: &'static Location<'static>,
        lhs: Fr,
        rhs: Fr,
    },

    #[error("the range check at {location} failed: {value} does not fit in {n_bytes} bytes")]
    OutOfRange {
        location: &'static Location<'static>,
        value: String,
        n_bytes: usize,
    },

    #[error("state {field} should transit to {expected}, but got {actual}")]
    Transition {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("the {tag} access at rw counter {rw_counter} breaks its history: {reason}")]
    RwHistory {
        rw_counter: String,
        tag: RwTableTag,
        reason: &'static str,
    },

    #[error("{value} is too many bytes to fit {n_bytes} bytes")]
    Shape { value: String, n_bytes: usize },

    #[error("malformed witness: {0}")]
    Witness(String),
}

/// The first step of a sequence that failed to verify.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("step {index} ({execution_state}) is invalid: {source}")]
pub struct StepError {
    pub index: usize,
    pub execution_state: ExecutionState,
    #[source]
    pub source: ConstraintError,
}

/// Why a witness was rejected by [`crate::evm::verify_steps`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("the rw table is inconsistent: {0}")]
    RwTable(#[source] ConstraintError),

    #[error(transparent)]
    Step(#[from] StepError),
}

pub type Result<T> = std::result::Result<T, ConstraintError>;
