//! The subset of EVM opcodes the emitter produces, plus a disassembler.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const STOP: Opcode = Opcode(0x00);
    pub const ADD: Opcode = Opcode(0x01);
    pub const LT: Opcode = Opcode(0x10);
    pub const GT: Opcode = Opcode(0x11);
    pub const EQ: Opcode = Opcode(0x14);
    pub const ISZERO: Opcode = Opcode(0x15);
    pub const SHR: Opcode = Opcode(0x1c);
    pub const CALLER: Opcode = Opcode(0x33);
    pub const CALLVALUE: Opcode = Opcode(0x34);
    pub const CALLDATALOAD: Opcode = Opcode(0x35);
    pub const CODECOPY: Opcode = Opcode(0x39);
    pub const NUMBER: Opcode = Opcode(0x43);
    pub const POP: Opcode = Opcode(0x50);
    pub const MSTORE: Opcode = Opcode(0x52);
    pub const SLOAD: Opcode = Opcode(0x54);
    pub const SSTORE: Opcode = Opcode(0x55);
    pub const JUMP: Opcode = Opcode(0x56);
    pub const JUMPI: Opcode = Opcode(0x57);
    pub const JUMPDEST: Opcode = Opcode(0x5b);
    pub const PUSH1: Opcode = Opcode(0x60);
    pub const PUSH2: Opcode = Opcode(0x61);
    pub const PUSH4: Opcode = Opcode(0x63);
    pub const PUSH32: Opcode = Opcode(0x7f);
    pub const DUP1: Opcode = Opcode(0x80);
    pub const RETURN: Opcode = Opcode(0xf3);
    pub const REVERT: Opcode = Opcode(0xfd);

    /// `PUSHn` for an immediate of `width` bytes.
    ///
    /// # Panics
    ///
    /// If `width` is not in `1..=32`.
    pub fn push(width: usize) -> Opcode {
        assert!((1..=32).contains(&width), "no PUSH opcode for {width} bytes");
        Opcode(Self::PUSH1.0 + (width as u8 - 1))
    }

    /// Number of immediate bytes following this opcode.
    pub fn immediate_size(self) -> usize {
        if (Self::PUSH1.0..=Self::PUSH32.0).contains(&self.0) {
            usize::from(self.0 - Self::PUSH1.0) + 1
        } else {
            0
        }
    }

    fn mnemonic(self) -> Option<&'static str> {
        let name = match self {
            Self::STOP => "STOP",
            Self::ADD => "ADD",
            Self::LT => "LT",
            Self::GT => "GT",
            Self::EQ => "EQ",
            Self::ISZERO => "ISZERO",
            Self::SHR => "SHR",
            Self::CALLER => "CALLER",
            Self::CALLVALUE => "CALLVALUE",
            Self::CALLDATALOAD => "CALLDATALOAD",
            Self::CODECOPY => "CODECOPY",
            Self::NUMBER => "NUMBER",
            Self::POP => "POP",
            Self::MSTORE => "MSTORE",
            Self::SLOAD => "SLOAD",
            Self::SSTORE => "SSTORE",
            Self::JUMP => "JUMP",
            Self::JUMPI => "JUMPI",
            Self::JUMPDEST => "JUMPDEST",
            Self::DUP1 => "DUP1",
            Self::RETURN => "RETURN",
            Self::REVERT => "REVERT",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.immediate_size() {
            0 => match self.mnemonic() {
                Some(name) => f.write_str(name),
                None => write!(f, "UNKNOWN(0x{:02x})", self.0),
            },
            n => write!(f, "PUSH{n}"),
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub opcode: Opcode,
    pub immediate: Vec<u8>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: {}", self.pc, self.opcode)?;
        if !self.immediate.is_empty() {
            write!(f, " 0x{}", hex::encode(&self.immediate))?;
        }
        Ok(())
    }
}

/// Decodes `code` into instructions, skipping over push immediates. A push
/// truncated by the end of the code keeps whatever bytes remain.
pub fn disassemble(code: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let opcode = Opcode(code[pc]);
        let end = (pc + 1 + opcode.immediate_size()).min(code.len());
        instructions.push(Instruction { pc, opcode, immediate: code[pc + 1..end].to_vec() });
        pc = end;
    }
    instructions
}
