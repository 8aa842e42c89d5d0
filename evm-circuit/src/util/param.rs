//! Constants of the gas schedule and of the integer widths used by the
//! constraints.

/// Maximum number of bytes that compose into one field element.
pub const MAX_N_BYTES: usize = 31;
/// Number of bytes used for gas values.
pub const N_BYTES_GAS: usize = 8;
/// Number of bytes of a 64-bit integer.
pub const N_BYTES_U64: usize = 8;
/// Number of bytes of a memory address or size.
pub const N_BYTES_MEMORY_ADDRESS: usize = 5;
/// Number of bytes of an account address.
pub const N_BYTES_ACCOUNT_ADDRESS: usize = 20;
/// Number of bytes of a word.
pub const N_BYTES_WORD: usize = 32;

/// Stack pointer of an empty stack.
pub const STACK_CAPACITY: u64 = 1024;
/// Maximum call depth.
pub const CALL_CREATE_DEPTH: u64 = 1024;

pub const GAS_COST_ZERO: u64 = 0;
pub const GAS_COST_JUMPDEST: u64 = 1;
pub const GAS_COST_QUICK: u64 = 2;
pub const GAS_COST_FASTEST: u64 = 3;
pub const GAS_COST_FAST: u64 = 5;
pub const GAS_COST_MID: u64 = 8;
pub const GAS_COST_SLOW: u64 = 10;
pub const GAS_COST_EXT: u64 = 20;
pub const GAS_COST_SHA3: u64 = 30;
pub const GAS_COST_LOG: u64 = 375;
pub const GAS_COST_SELFDESTRUCT: u64 = 5000;

/// EIP-2929 access costs.
pub const GAS_COST_WARM_ACCESS: u64 = 100;
pub const GAS_COST_ACCOUNT_COLD_ACCESS: u64 = 2600;
pub const GAS_COST_SLOAD_COLD: u64 = 2100;
pub const EXTRA_GAS_COST_ACCOUNT_COLD_ACCESS: u64 =
    GAS_COST_ACCOUNT_COLD_ACCESS - GAS_COST_WARM_ACCESS;

/// EIP-2200 storage costs.
pub const GAS_COST_SSTORE_SET: u64 = 20000;
pub const GAS_COST_SSTORE_RESET: u64 = 2900;
pub const GAS_STIPEND_CALL: u64 = 2300;
/// EIP-3529 refund for clearing a slot.
pub const GAS_REFUND_SSTORE_CLEARS: u64 = 4800;
/// EIP-3529 bound on the refund, a fraction of the gas used.
pub const MAX_REFUND_QUOTIENT_OF_GAS_USED: u64 = 5;

pub const GAS_COST_CREATE: u64 = 32000;
pub const GAS_COST_COPY: u64 = 3;
pub const GAS_COST_COPY_SHA3: u64 = 6;
pub const GAS_COST_EXP_PER_BYTE: u64 = 50;

pub const GAS_COST_TX: u64 = 21000;
pub const GAS_COST_CREATION_TX: u64 = 53000;
pub const GAS_COST_TX_CALL_DATA_PER_NON_ZERO_BYTE: u64 = 16;
pub const GAS_COST_TX_CALL_DATA_PER_ZERO_BYTE: u64 = 4;

/// Quadratic memory expansion: `words^2 / 512 + 3 * words`.
pub const MEMORY_EXPANSION_QUAD_DENOMINATOR: u64 = 512;
pub const MEMORY_EXPANSION_LINEAR_COEFF: u64 = 3;

pub const ECRECOVER_GAS: u64 = 3000;
pub const BN254_ADD_GAS: u64 = 150;
pub const BN254_SCALAR_MUL_GAS: u64 = 6000;
pub const BN254_PAIRING_BASE_GAS: u64 = 45000;
pub const SHA256_BASE_GAS: u64 = 60;
pub const RIPEMD160_BASE_GAS: u64 = 600;
pub const IDENTITY_BASE_GAS: u64 = 15;
pub const BIG_MODEXP_BASE_GAS: u64 = 200;
pub const BLAKE2F_BASE_GAS: u64 = 0;
