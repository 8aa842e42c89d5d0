use crate::{
    evm::opcode::Opcode,
    util::{param::*, Fr},
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// The state-machine tag of an execution step: one per opcode family,
/// transaction and block boundaries, error paths and precompiles.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
pub enum ExecutionState {
    /// Start of a transaction: gas purchase, nonce bump, value transfer.
    #[default]
    BeginTx,
    /// End of a transaction: refund and fee payment.
    EndTx,
    /// Padding after the last transaction of a block.
    EndBlock,

    STOP,
    /// ADD and SUB.
    ADD,
    BYTE,
    SHR,
    SAR,
    EXP,
    CALLDATASIZE,
    COINBASE,
    BALANCE,
    JUMP,
    SLOAD,
    SSTORE,
    /// CREATE and CREATE2.
    CREATE,

    /// CALLDATACOPY, CODECOPY, EXTCODECOPY or RETURNDATACOPY running out of
    /// gas.
    ErrorOutOfGasMemoryCopy,

    EcRecover,
    Bn254Add,
}

impl ExecutionState {
    /// Opcodes whose execution is constrained by this state.
    pub fn responsible_opcodes(&self) -> Vec<Opcode> {
        match self {
            Self::STOP => vec![Opcode::STOP],
            Self::ADD => vec![Opcode::ADD, Opcode::SUB],
            Self::BYTE => vec![Opcode::BYTE],
            Self::SHR => vec![Opcode::SHR],
            Self::SAR => vec![Opcode::SAR],
            Self::EXP => vec![Opcode::EXP],
            Self::CALLDATASIZE => vec![Opcode::CALLDATASIZE],
            Self::COINBASE => vec![Opcode::COINBASE],
            Self::BALANCE => vec![Opcode::BALANCE],
            Self::JUMP => vec![Opcode::JUMP],
            Self::SLOAD => vec![Opcode::SLOAD],
            Self::SSTORE => vec![Opcode::SSTORE],
            Self::CREATE => vec![Opcode::CREATE, Opcode::CREATE2],
            Self::ErrorOutOfGasMemoryCopy => vec![
                Opcode::CALLDATACOPY,
                Opcode::CODECOPY,
                Opcode::EXTCODECOPY,
                Opcode::RETURNDATACOPY,
            ],
            Self::BeginTx | Self::EndTx | Self::EndBlock | Self::EcRecover | Self::Bn254Add => {
                vec![]
            }
        }
    }

    /// The precompile executed in this state, if any.
    pub fn precompile(&self) -> Option<Precompile> {
        match self {
            Self::EcRecover => Some(Precompile::EcRecover),
            Self::Bn254Add => Some(Precompile::Bn254Add),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorOutOfGasMemoryCopy)
    }
}

impl From<ExecutionState> for Fr {
    fn from(state: ExecutionState) -> Fr {
        Fr::from(state as u64)
    }
}

/// Precompiled contracts, identified by their address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Precompile {
    EcRecover = 0x01,
    Sha256 = 0x02,
    Ripemd160 = 0x03,
    Identity = 0x04,
    Modexp = 0x05,
    Bn254Add = 0x06,
    Bn254ScalarMul = 0x07,
    Bn254Pairing = 0x08,
    Blake2F = 0x09,
}

impl Precompile {
    pub fn address(&self) -> u64 {
        *self as u64
    }

    pub fn base_gas_cost(&self) -> u64 {
        match self {
            Self::EcRecover => ECRECOVER_GAS,
            Self::Sha256 => SHA256_BASE_GAS,
            Self::Ripemd160 => RIPEMD160_BASE_GAS,
            Self::Identity => IDENTITY_BASE_GAS,
            Self::Modexp => BIG_MODEXP_BASE_GAS,
            Self::Bn254Add => BN254_ADD_GAS,
            Self::Bn254ScalarMul => BN254_SCALAR_MUL_GAS,
            Self::Bn254Pairing => BN254_PAIRING_BASE_GAS,
            Self::Blake2F => BLAKE2F_BASE_GAS,
        }
    }
}
