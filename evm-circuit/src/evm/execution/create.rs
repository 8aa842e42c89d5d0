//! CREATE and CREATE2.
//!
//! The step hashes the init code out of memory, derives the new address,
//! moves the value, saves the continuation of the creator and enters the
//! creation call with all but one 64th of the remaining gas (EIP-150).

use crate::{
    error::Result,
    evm::{
        instruction::{Instruction, NewContextTransition},
        opcode::Opcode,
        step::Transition,
        table::{AccountFieldTag, CallContextFieldTag, CopyDataTypeTag},
    },
    util::{hash::empty_code_hash_word, param::*, Fr, Word},
};
use ark_ff::{One, Zero};

pub fn create(instruction: &mut Instruction) -> Result<()> {
    let opcode = instruction.opcode_lookup(true)?;
    let (_, is_create2) =
        instruction.pair_select(opcode, Opcode::CREATE.into(), Opcode::CREATE2.into())?;
    instruction.responsible_opcode_lookup(opcode)?;
    let callee_call_id = instruction.curr.rw_counter;

    let value = instruction.stack_pop()?;
    let offset = instruction.stack_pop()?;
    let size = instruction.stack_pop()?;
    let salt = if is_create2.is_one() {
        Some(instruction.stack_pop()?)
    } else {
        None
    };
    let pushed_address = instruction.stack_push()?;

    let tx_id = instruction.call_context_lookup(CallContextFieldTag::TxId, false, None)?;
    let depth = instruction.call_context_lookup(CallContextFieldTag::Depth, false, None)?;
    let creator = instruction.call_context_lookup(CallContextFieldTag::CalleeAddress, false, None)?;
    let is_static = instruction.call_context_lookup(CallContextFieldTag::IsStatic, false, None)?;
    let mut reversion_info = instruction.reversion_info(None)?;

    instruction.range_lookup(depth, CALL_CREATE_DEPTH)?;
    instruction.constrain_zero(is_static)?;

    let (nonce, nonce_prev) =
        instruction.account_write(creator, AccountFieldTag::Nonce, Some(&mut reversion_info))?;
    let (nonce, nonce_prev) = (nonce.expr(), nonce_prev.expr());
    instruction.constrain_equal(nonce, nonce_prev + Fr::one())?;
    instruction.range_check(nonce, N_BYTES_U64)?;

    let (memory_offset, memory_length) = instruction.memory_offset_and_length(&offset, &size)?;
    let (next_memory_word_size, memory_expansion_gas_cost) =
        instruction.memory_expansion(&[(memory_offset, memory_length)])?;

    // The init code goes from memory to a bytecode region named after its
    // hash.
    let init_code_hash = if memory_length.is_zero() {
        empty_code_hash_word()
    } else {
        let row = instruction.copy_lookup(
            &Word::from(instruction.curr.call_id),
            CopyDataTypeTag::Memory,
            None,
            CopyDataTypeTag::Bytecode,
            memory_offset,
            memory_offset + memory_length,
            Fr::zero(),
            memory_length,
        )?;
        let digest = instruction.keccak_lookup(memory_length, row.rlc_acc)?;
        instruction.constrain_equal_word(&digest, &row.dst_id)?;
        row.dst_id
    };

    let contract_address = match &salt {
        Some(salt) => instruction.create2_contract_address(creator, salt, &init_code_hash)?,
        None => instruction.create_contract_address(creator, nonce_prev)?,
    };

    instruction.add_account_to_access_list(tx_id, contract_address, Some(&mut reversion_info))?;
    // No contract may already live at the address.
    let code_hash = instruction.account_read(contract_address, AccountFieldTag::CodeHash)?;
    instruction.constrain_equal_word(&code_hash, &empty_code_hash_word())?;

    let mut callee_reversion_info = instruction.reversion_info(Some(callee_call_id))?;
    let callee_is_success =
        instruction.call_context_lookup(CallContextFieldTag::IsSuccess, false, Some(callee_call_id))?;
    instruction.constrain_equal(
        callee_reversion_info.is_persistent(),
        reversion_info.is_persistent() * callee_is_success,
    )?;
    instruction.transfer(creator, contract_address, &value, &mut callee_reversion_info)?;

    let expected_address = instruction.select(callee_is_success, contract_address, Fr::zero());
    instruction.constrain_equal_word(&pushed_address, &Word::from(expected_address))?;

    let (init_code_word_size, _) = instruction.constant_divmod(
        memory_length + Fr::from(31u64),
        32,
        N_BYTES_MEMORY_ADDRESS,
    )?;
    let gas_cost = Fr::from(GAS_COST_CREATE)
        + memory_expansion_gas_cost
        + is_create2 * Fr::from(GAS_COST_COPY_SHA3) * init_code_word_size;
    // The gas left after the creation cost fits u64, so the callee always
    // gets all but one 64th of it.
    let gas_available = instruction.curr.gas_left - gas_cost;
    instruction.range_check(gas_available, N_BYTES_GAS)?;
    let (one_64th_gas, _) = instruction.constant_divmod(gas_available, 64, N_BYTES_GAS)?;
    let callee_gas_left = gas_available - one_64th_gas;

    let stack_pointer_delta = Fr::from(2u64) + is_create2;
    let caller_continuation = [
        (
            CallContextFieldTag::ProgramCounter,
            instruction.curr.program_counter + Fr::one(),
        ),
        (
            CallContextFieldTag::StackPointer,
            instruction.curr.stack_pointer + stack_pointer_delta,
        ),
        (CallContextFieldTag::GasLeft, gas_available - callee_gas_left),
        (CallContextFieldTag::MemorySize, next_memory_word_size),
        (
            CallContextFieldTag::ReversibleWriteCounter,
            reversion_info.reversible_write_counter(),
        ),
    ];
    for (field_tag, expected) in caller_continuation {
        let value = instruction.call_context_lookup(field_tag, true, None)?;
        instruction.constrain_equal(value, expected)?;
    }

    let callee_context = [
        (CallContextFieldTag::CallerId, Word::from(instruction.curr.call_id)),
        (CallContextFieldTag::TxId, Word::from(tx_id)),
        (CallContextFieldTag::Depth, Word::from(depth + Fr::one())),
        (CallContextFieldTag::CallerAddress, Word::from(creator)),
        (CallContextFieldTag::CalleeAddress, Word::from(contract_address)),
        (CallContextFieldTag::Value, value),
        (CallContextFieldTag::IsStatic, Word::zero()),
        (CallContextFieldTag::IsRoot, Word::zero()),
        (CallContextFieldTag::IsCreate, Word::from(1u64)),
        (CallContextFieldTag::CodeHash, init_code_hash),
    ];
    for (field_tag, expected) in callee_context {
        let value =
            instruction.call_context_lookup_word(field_tag, false, Some(callee_call_id))?;
        instruction.constrain_equal_word(&value, &expected)?;
    }

    instruction.constrain_new_context_state_transition(NewContextTransition {
        rw_counter: Transition::Delta(Fr::from(instruction.rw_counter_offset())),
        call_id: Transition::to(callee_call_id),
        is_root: Transition::to(false),
        is_create: Transition::to(true),
        code_hash: Transition::to(init_code_hash),
        gas_left: Transition::to(callee_gas_left),
        reversible_write_counter: Transition::to(
            callee_reversion_info.reversible_write_counter(),
        ),
    })
}
