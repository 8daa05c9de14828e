//! Symbolic assembly with jump labels, and the pass that resolves it.
//!
//! Codegen emits jumps as placeholders naming a [`Label`]. Once the label
//! table holds final addresses, [`resolve`] rewrites each placeholder into
//! `PUSH2 <addr>` followed by `JUMP` or `JUMPI` and encodes the program.

use std::collections::HashMap;
use std::fmt;

use super::opcode::Opcode;
use crate::error::EmitError;

/// Width of a resolved jump target immediate.
pub const LABEL_WIDTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Function { contract: usize, name: String },
    IfEnd(usize),
    LoopStart(usize),
    LoopEnd(usize),
}

impl Label {
    pub fn function(contract: usize, name: &str) -> Self {
        Label::Function { contract, name: name.to_string() }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Function { contract, name } => write!(f, "fn_{contract}_{name}"),
            Label::IfEnd(id) => write!(f, "if_{id}"),
            Label::LoopStart(id) => write!(f, "loop_{id}"),
            Label::LoopEnd(id) => write!(f, "end_{id}"),
        }
    }
}

pub type LabelTable = HashMap<Label, usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asm {
    Op(Opcode),
    /// `PUSHn` with a big-endian immediate of 1 to 32 bytes.
    Push(Vec<u8>),
    /// A `JUMPDEST` that defines `Label`.
    JumpDest(Label),
    Jump(Label),
    JumpIf(Label),
}

impl Asm {
    /// Encoded size in bytes. Placeholders are sized as their resolved form.
    pub fn size(&self) -> usize {
        match self {
            Asm::Op(_) | Asm::JumpDest(_) => 1,
            Asm::Push(bytes) => 1 + bytes.len(),
            Asm::Jump(_) | Asm::JumpIf(_) => 1 + LABEL_WIDTH + 1,
        }
    }

    /// Minimal-width push of an integer. Zero is pushed as a single byte.
    pub fn push_int(value: u128) -> Asm {
        let bytes = value.to_be_bytes();
        let leading = bytes.iter().take_while(|b| **b == 0).count().min(bytes.len() - 1);
        Asm::Push(bytes[leading..].to_vec())
    }
}

fn lookup(labels: &LabelTable, label: &Label) -> Result<usize, EmitError> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| EmitError::UnresolvedLabel { label: label.to_string() })
}

/// Encodes `code`, resolving every jump placeholder through `labels`.
///
/// Each `JUMPDEST` must land exactly where the table says it does; a
/// disagreement or a missing label is an emitter bug and is reported as such.
pub fn resolve(code: &[Asm], labels: &LabelTable) -> Result<Vec<u8>, EmitError> {
    let mut out = Vec::with_capacity(code.iter().map(Asm::size).sum());

    for item in code {
        match item {
            Asm::Op(op) => out.push(op.0),
            Asm::Push(bytes) => {
                out.push(Opcode::push(bytes.len()).0);
                out.extend_from_slice(bytes);
            }
            Asm::JumpDest(label) => {
                let recorded = lookup(labels, label)?;
                if recorded != out.len() {
                    return Err(EmitError::LabelMismatch {
                        label: label.to_string(),
                        recorded,
                        actual: out.len(),
                    });
                }
                out.push(Opcode::JUMPDEST.0);
            }
            Asm::Jump(label) => push_jump(&mut out, lookup(labels, label)?, Opcode::JUMP)?,
            Asm::JumpIf(label) => push_jump(&mut out, lookup(labels, label)?, Opcode::JUMPI)?,
        }
    }

    Ok(out)
}

fn push_jump(out: &mut Vec<u8>, target: usize, jump: Opcode) -> Result<(), EmitError> {
    let target = u16::try_from(target).map_err(|_| EmitError::CodeTooLarge { size: target })?;
    out.push(Opcode::push(LABEL_WIDTH).0);
    out.extend_from_slice(&target.to_be_bytes());
    out.push(jump.0);
    Ok(())
}
