//! The execution context snapshot carried from one step to the next.

use crate::{
    evm::execution_state::ExecutionState,
    serialization::FieldHex,
    util::{i64_to_field, param::STACK_CAPACITY, Expression, Fr, Word},
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Per-step witness of the execution context. The constraints only read the
/// current step and assert the shape of the next one.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepState {
    pub execution_state: ExecutionState,
    #[serde_as(as = "FieldHex")]
    pub rw_counter: Fr,
    #[serde_as(as = "FieldHex")]
    pub call_id: Fr,
    #[serde_as(as = "FieldHex")]
    pub is_root: Fr,
    #[serde_as(as = "FieldHex")]
    pub is_create: Fr,
    /// Hash of the executed code. For a root creation call, the id of the
    /// transaction whose calldata holds the init code.
    pub code_hash: Word,
    #[serde_as(as = "FieldHex")]
    pub program_counter: Fr,
    #[serde_as(as = "FieldHex")]
    pub stack_pointer: Fr,
    #[serde_as(as = "FieldHex")]
    pub gas_left: Fr,
    /// Memory size in 32-byte words.
    #[serde_as(as = "FieldHex")]
    pub memory_word_size: Fr,
    /// Number of reversible writes issued so far by the current call.
    #[serde_as(as = "FieldHex")]
    pub reversible_write_counter: Fr,
    #[serde_as(as = "FieldHex")]
    pub last_callee_id: Fr,
    #[serde_as(as = "FieldHex")]
    pub last_callee_return_data_offset: Fr,
    #[serde_as(as = "FieldHex")]
    pub last_callee_return_data_length: Fr,
    pub aux_data: Option<AuxData>,
}

impl StepState {
    /// A step in `execution_state` with an empty stack and every other field
    /// zero.
    pub fn new(execution_state: ExecutionState) -> Self {
        Self {
            execution_state,
            stack_pointer: Fr::from(STACK_CAPACITY),
            ..Default::default()
        }
    }
}

/// Opcode-specific witness values that are not part of any table.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuxData {
    Ecrecover {
        msg_hash: Word,
        sig_v: Word,
        sig_r: Word,
        sig_s: Word,
        #[serde_as(as = "FieldHex")]
        recovered_addr: Fr,
        /// Calldata accumulated in reading order.
        #[serde_as(as = "FieldHex")]
        input_rlc: Fr,
        /// Return data accumulated in reading order.
        #[serde_as(as = "FieldHex")]
        output_rlc: Fr,
    },
    Bn254Add {
        p_x: Word,
        p_y: Word,
        q_x: Word,
        q_y: Word,
        out_x: Word,
        out_y: Word,
    },
}

/// Expected value of a step-state field in the next step, relative to the
/// current one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Transition {
    /// Unchanged.
    #[default]
    Same,
    /// Changed by the given amount.
    Delta(Fr),
    /// Set to the given value.
    To(Expression),
    /// Unconstrained: the next step starts a context of its own and checks
    /// the field itself.
    Any,
}

impl Transition {
    pub fn delta(delta: i64) -> Self {
        Transition::Delta(i64_to_field(delta))
    }

    pub fn to(value: impl Into<Expression>) -> Self {
        Transition::To(value.into())
    }
}

/// Transitions of every tracked field; unnamed fields stay the same.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateTransition {
    pub rw_counter: Transition,
    pub call_id: Transition,
    pub is_root: Transition,
    pub is_create: Transition,
    pub code_hash: Transition,
    pub program_counter: Transition,
    pub stack_pointer: Transition,
    pub gas_left: Transition,
    pub memory_word_size: Transition,
    pub reversible_write_counter: Transition,
    pub last_callee_id: Transition,
    pub last_callee_return_data_offset: Transition,
    pub last_callee_return_data_length: Transition,
}

impl StateTransition {
    /// Every field unconstrained.
    pub fn any() -> Self {
        Self {
            rw_counter: Transition::Any,
            call_id: Transition::Any,
            is_root: Transition::Any,
            is_create: Transition::Any,
            code_hash: Transition::Any,
            program_counter: Transition::Any,
            stack_pointer: Transition::Any,
            gas_left: Transition::Any,
            memory_word_size: Transition::Any,
            reversible_write_counter: Transition::Any,
            last_callee_id: Transition::Any,
            last_callee_return_data_offset: Transition::Any,
            last_callee_return_data_length: Transition::Any,
        }
    }
}
