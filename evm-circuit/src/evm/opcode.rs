//! Static opcode metadata: gas, stack arity and the classifications the fixed
//! table is generated from.

use crate::util::{param::*, Fr};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An EVM opcode byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const STOP: Opcode = Opcode(0x00);
    pub const ADD: Opcode = Opcode(0x01);
    pub const MUL: Opcode = Opcode(0x02);
    pub const SUB: Opcode = Opcode(0x03);
    pub const DIV: Opcode = Opcode(0x04);
    pub const SDIV: Opcode = Opcode(0x05);
    pub const MOD: Opcode = Opcode(0x06);
    pub const SMOD: Opcode = Opcode(0x07);
    pub const ADDMOD: Opcode = Opcode(0x08);
    pub const MULMOD: Opcode = Opcode(0x09);
    pub const EXP: Opcode = Opcode(0x0a);
    pub const SIGNEXTEND: Opcode = Opcode(0x0b);
    pub const LT: Opcode = Opcode(0x10);
    pub const GT: Opcode = Opcode(0x11);
    pub const SLT: Opcode = Opcode(0x12);
    pub const SGT: Opcode = Opcode(0x13);
    pub const EQ: Opcode = Opcode(0x14);
    pub const ISZERO: Opcode = Opcode(0x15);
    pub const AND: Opcode = Opcode(0x16);
    pub const OR: Opcode = Opcode(0x17);
    pub const XOR: Opcode = Opcode(0x18);
    pub const NOT: Opcode = Opcode(0x19);
    pub const BYTE: Opcode = Opcode(0x1a);
    pub const SHL: Opcode = Opcode(0x1b);
    pub const SHR: Opcode = Opcode(0x1c);
    pub const SAR: Opcode = Opcode(0x1d);
    pub const SHA3: Opcode = Opcode(0x20);
    pub const ADDRESS: Opcode = Opcode(0x30);
    pub const BALANCE: Opcode = Opcode(0x31);
    pub const ORIGIN: Opcode = Opcode(0x32);
    pub const CALLER: Opcode = Opcode(0x33);
    pub const CALLVALUE: Opcode = Opcode(0x34);
    pub const CALLDATALOAD: Opcode = Opcode(0x35);
    pub const CALLDATASIZE: Opcode = Opcode(0x36);
    pub const CALLDATACOPY: Opcode = Opcode(0x37);
    pub const CODESIZE: Opcode = Opcode(0x38);
    pub const CODECOPY: Opcode = Opcode(0x39);
    pub const GASPRICE: Opcode = Opcode(0x3a);
    pub const EXTCODESIZE: Opcode = Opcode(0x3b);
    pub const EXTCODECOPY: Opcode = Opcode(0x3c);
    pub const RETURNDATASIZE: Opcode = Opcode(0x3d);
    pub const RETURNDATACOPY: Opcode = Opcode(0x3e);
    pub const EXTCODEHASH: Opcode = Opcode(0x3f);
    pub const BLOCKHASH: Opcode = Opcode(0x40);
    pub const COINBASE: Opcode = Opcode(0x41);
    pub const TIMESTAMP: Opcode = Opcode(0x42);
    pub const NUMBER: Opcode = Opcode(0x43);
    pub const PREVRANDAO: Opcode = Opcode(0x44);
    pub const GASLIMIT: Opcode = Opcode(0x45);
    pub const CHAINID: Opcode = Opcode(0x46);
    pub const SELFBALANCE: Opcode = Opcode(0x47);
    pub const BASEFEE: Opcode = Opcode(0x48);
    pub const POP: Opcode = Opcode(0x50);
    pub const MLOAD: Opcode = Opcode(0x51);
    pub const MSTORE: Opcode = Opcode(0x52);
    pub const MSTORE8: Opcode = Opcode(0x53);
    pub const SLOAD: Opcode = Opcode(0x54);
    pub const SSTORE: Opcode = Opcode(0x55);
    pub const JUMP: Opcode = Opcode(0x56);
    pub const JUMPI: Opcode = Opcode(0x57);
    pub const PC: Opcode = Opcode(0x58);
    pub const MSIZE: Opcode = Opcode(0x59);
    pub const GAS: Opcode = Opcode(0x5a);
    pub const JUMPDEST: Opcode = Opcode(0x5b);
    pub const PUSH0: Opcode = Opcode(0x5f);
    pub const PUSH1: Opcode = Opcode(0x60);
    pub const PUSH32: Opcode = Opcode(0x7f);
    pub const DUP1: Opcode = Opcode(0x80);
    pub const DUP16: Opcode = Opcode(0x8f);
    pub const SWAP1: Opcode = Opcode(0x90);
    pub const SWAP16: Opcode = Opcode(0x9f);
    pub const LOG0: Opcode = Opcode(0xa0);
    pub const LOG4: Opcode = Opcode(0xa4);
    pub const CREATE: Opcode = Opcode(0xf0);
    pub const CALL: Opcode = Opcode(0xf1);
    pub const CALLCODE: Opcode = Opcode(0xf2);
    pub const RETURN: Opcode = Opcode(0xf3);
    pub const DELEGATECALL: Opcode = Opcode(0xf4);
    pub const CREATE2: Opcode = Opcode(0xf5);
    pub const STATICCALL: Opcode = Opcode(0xfa);
    pub const REVERT: Opcode = Opcode(0xfd);
    pub const SELFDESTRUCT: Opcode = Opcode(0xff);

    /// `PUSH1` to `PUSH32`.
    pub fn push(n: u8) -> Opcode {
        assert!((1..=32).contains(&n), "PUSH{n} does not exist");
        Opcode(Self::PUSH1.0 + n - 1)
    }

    /// `DUP1` to `DUP16`.
    pub fn dup(n: u8) -> Opcode {
        assert!((1..=16).contains(&n), "DUP{n} does not exist");
        Opcode(Self::DUP1.0 + n - 1)
    }

    /// `SWAP1` to `SWAP16`.
    pub fn swap(n: u8) -> Opcode {
        assert!((1..=16).contains(&n), "SWAP{n} does not exist");
        Opcode(Self::SWAP1.0 + n - 1)
    }

    /// `LOG0` to `LOG4`.
    pub fn log(n: u8) -> Opcode {
        assert!(n <= 4, "LOG{n} does not exist");
        Opcode(Self::LOG0.0 + n)
    }

    pub fn is_push(&self) -> bool {
        (Self::PUSH1.0..=Self::PUSH32.0).contains(&self.0)
    }

    /// Number of immediate bytes following the opcode.
    pub fn push_size(&self) -> usize {
        if self.is_push() {
            (self.0 - Self::PUSH1.0 + 1) as usize
        } else {
            0
        }
    }

    /// Metadata of a defined opcode, `None` for invalid ones.
    pub fn info(&self) -> Option<OpcodeInfo> {
        use OpcodeInfo as I;
        let info = match *self {
            Self::STOP => I::new(GAS_COST_ZERO, 0, 0),
            Self::ADD | Self::SUB => I::new(GAS_COST_FASTEST, 2, 1),
            Self::MUL | Self::DIV | Self::SDIV | Self::MOD | Self::SMOD | Self::SIGNEXTEND => {
                I::new(GAS_COST_FAST, 2, 1)
            }
            Self::ADDMOD | Self::MULMOD => I::new(GAS_COST_MID, 3, 1),
            Self::EXP => I::dynamic(GAS_COST_SLOW, 2, 1),
            Self::LT
            | Self::GT
            | Self::SLT
            | Self::SGT
            | Self::EQ
            | Self::AND
            | Self::OR
            | Self::XOR
            | Self::BYTE
            | Self::SHL
            | Self::SHR
            | Self::SAR => I::new(GAS_COST_FASTEST, 2, 1),
            Self::ISZERO | Self::NOT => I::new(GAS_COST_FASTEST, 1, 1),
            Self::SHA3 => I::dynamic(GAS_COST_SHA3, 2, 1),
            Self::ADDRESS
            | Self::ORIGIN
            | Self::CALLER
            | Self::CALLVALUE
            | Self::CALLDATASIZE
            | Self::CODESIZE
            | Self::GASPRICE
            | Self::RETURNDATASIZE
            | Self::COINBASE
            | Self::TIMESTAMP
            | Self::NUMBER
            | Self::PREVRANDAO
            | Self::GASLIMIT
            | Self::CHAINID
            | Self::BASEFEE
            | Self::PC
            | Self::MSIZE
            | Self::GAS
            | Self::PUSH0 => I::new(GAS_COST_QUICK, 0, 1),
            Self::BALANCE | Self::EXTCODESIZE | Self::EXTCODEHASH => {
                I::dynamic(GAS_COST_WARM_ACCESS, 1, 1)
            }
            Self::CALLDATALOAD => I::new(GAS_COST_FASTEST, 1, 1),
            Self::CALLDATACOPY | Self::CODECOPY | Self::RETURNDATACOPY => {
                I::dynamic(GAS_COST_FASTEST, 3, 0)
            }
            Self::EXTCODECOPY => I::dynamic(GAS_COST_WARM_ACCESS, 4, 0),
            Self::BLOCKHASH => I::new(GAS_COST_EXT, 1, 1),
            Self::SELFBALANCE => I::new(GAS_COST_FAST, 0, 1),
            Self::POP => I::new(GAS_COST_QUICK, 1, 0),
            Self::MLOAD => I::dynamic(GAS_COST_FASTEST, 1, 1),
            Self::MSTORE | Self::MSTORE8 => I::dynamic(GAS_COST_FASTEST, 2, 0),
            Self::SLOAD => I::dynamic(GAS_COST_ZERO, 1, 1),
            Self::SSTORE => I::dynamic(GAS_COST_ZERO, 2, 0),
            Self::JUMP => I::new(GAS_COST_MID, 1, 0),
            Self::JUMPI => I::new(GAS_COST_SLOW, 2, 0),
            Self::JUMPDEST => I::new(GAS_COST_JUMPDEST, 0, 0),
            Opcode(0x60..=0x7f) => I::new(GAS_COST_FASTEST, 0, 1),
            Opcode(op @ 0x80..=0x8f) => {
                let n = (op - Self::DUP1.0 + 1) as u64;
                I::new(GAS_COST_FASTEST, n, n + 1)
            }
            Opcode(op @ 0x90..=0x9f) => {
                let n = (op - Self::SWAP1.0 + 1) as u64;
                I::new(GAS_COST_FASTEST, n + 1, n + 1)
            }
            Opcode(op @ 0xa0..=0xa4) => {
                let n = (op - Self::LOG0.0) as u64;
                I::dynamic(GAS_COST_LOG, n + 2, 0)
            }
            Self::CREATE => I::dynamic(GAS_COST_CREATE, 3, 1),
            Self::CREATE2 => I::dynamic(GAS_COST_CREATE, 4, 1),
            Self::CALL | Self::CALLCODE => I::dynamic(GAS_COST_WARM_ACCESS, 7, 1),
            Self::DELEGATECALL | Self::STATICCALL => I::dynamic(GAS_COST_WARM_ACCESS, 6, 1),
            Self::RETURN | Self::REVERT => I::dynamic(GAS_COST_ZERO, 2, 0),
            Self::SELFDESTRUCT => I::dynamic(GAS_COST_SELFDESTRUCT, 1, 0),
            _ => return None,
        };
        Some(info)
    }

    pub fn is_valid(&self) -> bool {
        self.info().is_some()
    }

    /// Constant gas cost, zero for invalid opcodes.
    pub fn constant_gas_cost(&self) -> u64 {
        self.info().map_or(0, |info| info.constant_gas)
    }

    pub fn name(&self) -> String {
        let name = match *self {
            Self::STOP => "STOP",
            Self::ADD => "ADD",
            Self::MUL => "MUL",
            Self::SUB => "SUB",
            Self::DIV => "DIV",
            Self::SDIV => "SDIV",
            Self::MOD => "MOD",
            Self::SMOD => "SMOD",
            Self::ADDMOD => "ADDMOD",
            Self::MULMOD => "MULMOD",
            Self::EXP => "EXP",
            Self::SIGNEXTEND => "SIGNEXTEND",
            Self::LT => "LT",
            Self::GT => "GT",
            Self::SLT => "SLT",
            Self::SGT => "SGT",
            Self::EQ => "EQ",
            Self::ISZERO => "ISZERO",
            Self::AND => "AND",
            Self::OR => "OR",
            Self::XOR => "XOR",
            Self::NOT => "NOT",
            Self::BYTE => "BYTE",
            Self::SHL => "SHL",
            Self::SHR => "SHR",
            Self::SAR => "SAR",
            Self::SHA3 => "SHA3",
            Self::ADDRESS => "ADDRESS",
            Self::BALANCE => "BALANCE",
            Self::ORIGIN => "ORIGIN",
            Self::CALLER => "CALLER",
            Self::CALLVALUE => "CALLVALUE",
            Self::CALLDATALOAD => "CALLDATALOAD",
            Self::CALLDATASIZE => "CALLDATASIZE",
            Self::CALLDATACOPY => "CALLDATACOPY",
            Self::CODESIZE => "CODESIZE",
            Self::CODECOPY => "CODECOPY",
            Self::GASPRICE => "GASPRICE",
            Self::EXTCODESIZE => "EXTCODESIZE",
            Self::EXTCODECOPY => "EXTCODECOPY",
            Self::RETURNDATASIZE => "RETURNDATASIZE",
            Self::RETURNDATACOPY => "RETURNDATACOPY",
            Self::EXTCODEHASH => "EXTCODEHASH",
            Self::BLOCKHASH => "BLOCKHASH",
            Self::COINBASE => "COINBASE",
            Self::TIMESTAMP => "TIMESTAMP",
            Self::NUMBER => "NUMBER",
            Self::PREVRANDAO => "PREVRANDAO",
            Self::GASLIMIT => "GASLIMIT",
            Self::CHAINID => "CHAINID",
            Self::SELFBALANCE => "SELFBALANCE",
            Self::BASEFEE => "BASEFEE",
            Self::POP => "POP",
            Self::MLOAD => "MLOAD",
            Self::MSTORE => "MSTORE",
            Self::MSTORE8 => "MSTORE8",
            Self::SLOAD => "SLOAD",
            Self::SSTORE => "SSTORE",
            Self::JUMP => "JUMP",
            Self::JUMPI => "JUMPI",
            Self::PC => "PC",
            Self::MSIZE => "MSIZE",
            Self::GAS => "GAS",
            Self::JUMPDEST => "JUMPDEST",
            Self::PUSH0 => "PUSH0",
            Self::CREATE => "CREATE",
            Self::CALL => "CALL",
            Self::CALLCODE => "CALLCODE",
            Self::RETURN => "RETURN",
            Self::DELEGATECALL => "DELEGATECALL",
            Self::CREATE2 => "CREATE2",
            Self::STATICCALL => "STATICCALL",
            Self::REVERT => "REVERT",
            Self::SELFDESTRUCT => "SELFDESTRUCT",
            Opcode(op @ 0x60..=0x7f) => return format!("PUSH{}", op - 0x5f),
            Opcode(op @ 0x80..=0x8f) => return format!("DUP{}", op - 0x7f),
            Opcode(op @ 0x90..=0x9f) => return format!("SWAP{}", op - 0x8f),
            Opcode(op @ 0xa0..=0xa4) => return format!("LOG{}", op - 0xa0),
            Opcode(op) => return format!("INVALID({op:#04x})"),
        };
        name.to_string()
    }

    /// All 256 byte values.
    pub fn all() -> impl Iterator<Item = Opcode> {
        (0..=u8::MAX).map(Opcode)
    }
}

impl From<Opcode> for Fr {
    fn from(opcode: Opcode) -> Fr {
        Fr::from(opcode.0 as u64)
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Opcode(byte)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub constant_gas: u64,
    pub stack_in: u64,
    pub stack_out: u64,
    /// Whether the gas cost also depends on the operands or the state.
    pub has_dynamic_gas: bool,
}

impl OpcodeInfo {
    const fn new(constant_gas: u64, stack_in: u64, stack_out: u64) -> Self {
        Self {
            constant_gas,
            stack_in,
            stack_out,
            has_dynamic_gas: false,
        }
    }

    const fn dynamic(constant_gas: u64, stack_in: u64, stack_out: u64) -> Self {
        Self {
            constant_gas,
            stack_in,
            stack_out,
            has_dynamic_gas: true,
        }
    }
}

pub fn invalid_opcodes() -> Vec<Opcode> {
    Opcode::all().filter(|op| !op.is_valid()).collect()
}

/// Opcodes that modify the state, forbidden in a static call.
pub fn state_write_opcodes() -> Vec<Opcode> {
    let mut opcodes = vec![
        Opcode::SSTORE,
        Opcode::CREATE,
        Opcode::CREATE2,
        Opcode::CALL,
        Opcode::SELFDESTRUCT,
    ];
    opcodes.extend((0..=4).map(Opcode::log));
    opcodes
}

/// `(opcode, stack_pointer)` pairs where the opcode finds fewer items than it
/// pops. The stack is empty at pointer [`STACK_CAPACITY`].
pub fn stack_underflow_pairs() -> Vec<(Opcode, u64)> {
    Opcode::all()
        .filter_map(|op| op.info().map(|info| (op, info)))
        .flat_map(|(op, info)| {
            (STACK_CAPACITY - info.stack_in + 1..=STACK_CAPACITY)
                .map(move |stack_pointer| (op, stack_pointer))
        })
        .collect()
}

/// `(opcode, stack_pointer)` pairs where pushing the outputs would exceed the
/// stack capacity.
pub fn stack_overflow_pairs() -> Vec<(Opcode, u64)> {
    Opcode::all()
        .filter_map(|op| op.info().map(|info| (op, info)))
        .flat_map(|(op, info)| {
            (0..info.stack_out.saturating_sub(info.stack_in)).map(move |stack_pointer| (op, stack_pointer))
        })
        .collect()
}

/// `(opcode, gas_left)` pairs where gas is insufficient for an opcode whose
/// cost is fully constant.
pub fn oog_constant_pairs() -> Vec<(Opcode, u64)> {
    Opcode::all()
        .filter_map(|op| op.info().map(|info| (op, info)))
        .filter(|(_, info)| !info.has_dynamic_gas)
        .flat_map(|(op, info)| (0..info.constant_gas).map(move |gas| (op, gas)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_size() {
        assert_eq!(Opcode::PUSH0.push_size(), 0);
        assert_eq!(Opcode::push(1).push_size(), 1);
        assert_eq!(Opcode::PUSH32.push_size(), 32);
        assert_eq!(Opcode::JUMPDEST.push_size(), 0);
    }

    #[test]
    fn test_invalid_opcodes() {
        let invalid = invalid_opcodes();
        assert!(invalid.contains(&Opcode(0x0c)));
        assert!(invalid.contains(&Opcode(0xfe)));
        assert!(invalid.contains(&Opcode(0x5c)));
        assert!(!invalid.contains(&Opcode::PUSH0));
        assert!(!invalid.contains(&Opcode::REVERT));
        // 143 opcodes are defined up to Shanghai.
        assert_eq!(invalid.len(), 256 - 143);
    }

    #[test]
    fn test_stack_pairs() {
        let underflow = stack_underflow_pairs();
        assert!(underflow.contains(&(Opcode::ADD, 1024)));
        assert!(underflow.contains(&(Opcode::ADD, 1023)));
        assert!(!underflow.contains(&(Opcode::ADD, 1022)));
        assert!(!underflow.iter().any(|(op, _)| *op == Opcode::PUSH0));

        let overflow = stack_overflow_pairs();
        assert!(overflow.contains(&(Opcode::push(1), 0)));
        assert!(!overflow.contains(&(Opcode::push(1), 1)));
        assert!(!overflow.iter().any(|(op, _)| *op == Opcode::ADD));
    }

    #[test]
    fn test_oog_constant_pairs() {
        let pairs = oog_constant_pairs();
        assert!(pairs.contains(&(Opcode::ADD, 2)));
        assert!(!pairs.contains(&(Opcode::ADD, 3)));
        assert!(!pairs.iter().any(|(op, _)| *op == Opcode::SLOAD));
        assert!(!pairs.iter().any(|(op, _)| *op == Opcode::STOP));
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::push(2).to_string(), "PUSH2");
        assert_eq!(Opcode::dup(16).to_string(), "DUP16");
        assert_eq!(Opcode(0x0c).to_string(), "INVALID(0x0c)");
    }
}
