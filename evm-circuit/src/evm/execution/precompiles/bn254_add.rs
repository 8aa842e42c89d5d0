use super::precompile_info_lookup;
use crate::{
    error::{ConstraintError, Result},
    evm::{
        instruction::{Instruction, RestoredContextTransition},
        step::AuxData,
        table::{CallContextFieldTag, EccOpTag},
    },
    util::{
        param::{BN254_ADD_GAS, N_BYTES_GAS},
        Fr, Word,
    },
};
use ark_ff::Zero;

/// BN254 point addition. An invalid input point fails the call, which then
/// consumes all of its gas.
pub fn bn254_add(instruction: &mut Instruction) -> Result<()> {
    let is_success = instruction.call_context_lookup(CallContextFieldTag::IsSuccess, false, None)?;
    instruction.constrain_bool(is_success)?;
    let gas_cost = precompile_info_lookup(instruction, BN254_ADD_GAS)?;

    let Some(AuxData::Bn254Add {
        p_x,
        p_y,
        q_x,
        q_y,
        out_x,
        out_y,
    }) = instruction.curr.aux_data.clone()
    else {
        return Err(ConstraintError::Witness(
            "BN254 addition step without point data".to_string(),
        ));
    };

    let is_valid = instruction.ecc_lookup(
        EccOpTag::Add,
        (&p_x, &p_y),
        (&q_x, &q_y),
        &Word::zero(),
        (&out_x, &out_y),
    )?;
    instruction.constrain_equal(is_success, is_valid)?;

    let gas_left = instruction.select(is_success, instruction.curr.gas_left - gas_cost, Fr::zero());
    instruction.range_check(gas_left, N_BYTES_GAS)?;
    instruction.constrain_restored_context_state_transition(RestoredContextTransition {
        rw_counter_delta: Fr::zero(),
        return_data_offset: Fr::zero(),
        return_data_length: is_success * Fr::from(64u64),
        gas_left,
        is_success,
    })
}
