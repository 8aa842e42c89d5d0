/// Command line interface of the verifier.
pub mod cli;

/// The error raised when a witness does not satisfy the constraints.
pub mod error;

/// Execution steps, their constraint rules and the witness builders.
pub mod evm;

/// The lookup tables the steps are checked against.
pub mod lookups;

/// Serde helpers for field elements.
pub mod serialization;

/// Field, word and hashing helpers.
pub mod util;

/// The exponentiation circuit.
pub mod exp_circuit;

/// The elliptic curve circuit.
pub mod ecc_circuit;

pub use error::{ConstraintError, Result, StepError, VerifyError};
