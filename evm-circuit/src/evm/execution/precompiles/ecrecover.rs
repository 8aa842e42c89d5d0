use super::precompile_info_lookup;
use crate::{
    error::{ConstraintError, Result},
    evm::{
        instruction::{Instruction, RestoredContextTransition},
        step::AuxData,
        table::CallContextFieldTag,
    },
    util::{arithmetic::rlc_encode_bytes, param::*, Fr, Word},
};
use ark_ff::{One, Zero};

/// Order of the secp256k1 group.
fn secp256k1_n() -> Word {
    Word::new(
        Fr::from(0xbaaedce6af48a03bbfd25e8cd0364141u128),
        Fr::from(0xfffffffffffffffffffffffffffffffeu128),
    )
}

/// ecRecover. The recovery itself is a signature table lookup, issued only
/// when the signature components are in range; otherwise nothing is
/// recovered.
pub fn ecrecover(instruction: &mut Instruction) -> Result<()> {
    let is_success = instruction.call_context_lookup(CallContextFieldTag::IsSuccess, false, None)?;
    instruction.constrain_equal(is_success, Fr::one())?;
    let gas_cost = precompile_info_lookup(instruction, ECRECOVER_GAS)?;

    let Some(AuxData::Ecrecover {
        msg_hash,
        sig_v,
        sig_r,
        sig_s,
        recovered_addr,
        input_rlc,
        output_rlc,
    }) = instruction.curr.aux_data.clone()
    else {
        return Err(ConstraintError::Witness(
            "ecRecover step without ecRecover data".to_string(),
        ));
    };

    // The calldata is hash, v, r and s, each a 32-byte big-endian word. Both
    // RLCs run over the bytes in calldata order, the first byte carrying the
    // highest power, as the copy and keccak tables accumulate them.
    let mut input = Vec::with_capacity(4 * N_BYTES_WORD);
    for word in [&msg_hash, &sig_v, &sig_r, &sig_s] {
        input.extend_from_slice(&word.to_be_bytes()?);
    }
    instruction.constrain_equal(
        input_rlc,
        rlc_encode_bytes(&input, instruction.randomness),
    )?;

    let n = secp256k1_n();
    let (is_r_lt_n, _) = instruction.compare_word(&sig_r, &n)?;
    let (is_s_lt_n, _) = instruction.compare_word(&sig_s, &n)?;
    let is_r_valid = is_r_lt_n * (Fr::one() - instruction.is_zero_word(&sig_r));
    let is_s_valid = is_s_lt_n * (Fr::one() - instruction.is_zero_word(&sig_s));
    let is_v_valid = instruction.is_zero(sig_v.hi)
        * (instruction.is_equal(sig_v.lo, Fr::from(27u64))
            + instruction.is_equal(sig_v.lo, Fr::from(28u64)));
    let is_valid_input = is_r_valid * is_s_valid * is_v_valid;

    let is_recovered = Fr::one() - instruction.is_zero(recovered_addr);
    if is_valid_input.is_one() {
        instruction.sig_lookup(
            &msg_hash,
            sig_v.lo - Fr::from(27u64),
            &sig_r,
            &sig_s,
            recovered_addr,
            is_recovered,
        )?;
    } else {
        instruction.constrain_zero(recovered_addr)?;
    }

    // The return data is the address left-padded to a word.
    let output = Word::from(recovered_addr).to_be_bytes()?;
    let expected_output_rlc = is_recovered * rlc_encode_bytes(&output, instruction.randomness);
    instruction.constrain_equal(output_rlc, expected_output_rlc)?;

    let gas_left = instruction.curr.gas_left - gas_cost;
    instruction.range_check(gas_left, N_BYTES_GAS)?;
    instruction.constrain_restored_context_state_transition(RestoredContextTransition {
        rw_counter_delta: Fr::zero(),
        return_data_offset: Fr::zero(),
        return_data_length: is_recovered * Fr::from(N_BYTES_WORD as u64),
        gas_left,
        is_success: Fr::one(),
    })
}
