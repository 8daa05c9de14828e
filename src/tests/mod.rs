mod parser;

use crate::ast::Contract;
use crate::generator::{disassemble, Instruction, Opcode};

pub(crate) const COUNTER: &str = r#"
contract Counter {
    let count: number = 0;

    function getCount(): number {
        return count;
    }
}
"#;

pub(crate) fn parse_checked(source: &str) -> anyhow::Result<Vec<Contract>> {
    let contracts = crate::parser::parse(source)?;
    crate::checker::type_check(&contracts)?;
    Ok(contracts)
}

/// Decodes `0x`-prefixed hex produced by the emitter.
pub(crate) fn decode(code: &str) -> anyhow::Result<Vec<u8>> {
    Ok(hex::decode(code.trim_start_matches("0x"))?)
}

pub(crate) fn runtime_instructions(source: &str) -> anyhow::Result<Vec<Instruction>> {
    let artifact = crate::compile(source)?;
    Ok(disassemble(&decode(&artifact.runtime)?))
}

pub(crate) fn count_opcode(instructions: &[Instruction], opcode: Opcode) -> usize {
    instructions.iter().filter(|i| i.opcode == opcode).count()
}

/// Reads a push immediate as a big-endian integer.
pub(crate) fn immediate(instruction: &Instruction) -> usize {
    instruction.immediate.iter().fold(0, |acc, byte| (acc << 8) | usize::from(*byte))
}

/// Storage slots written by each `SSTORE`, in code order.
pub(crate) fn stored_slots(instructions: &[Instruction]) -> Vec<usize> {
    instructions
        .windows(2)
        .filter(|pair| pair[1].opcode == Opcode::SSTORE)
        .map(|pair| immediate(&pair[0]))
        .collect()
}
