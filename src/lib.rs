//! Compiler for the Useless contract language.
//!
//! `compile` runs the whole pipeline: the pest grammar parser, the
//! structural type checker, the two-pass EVM emitter and the ABI generator.
//! Each call owns all of its state, and either returns a complete
//! [`Artifact`] or a single [`CompileError`].

pub mod abi;
pub mod ast;
pub mod checker;
pub mod error;
pub mod generator;
pub mod parser;

#[cfg(test)]
mod tests;

use tracing::debug_span;

pub use abi::{AbiEntry, AbiParam, EntryKind, StateMutability};
pub use error::{CompileError, EmitError, ParseError, TypeError};
pub use generator::Artifact;

/// Compiles `source` into deployable bytecode and its ABI.
pub fn compile(source: &str) -> Result<Artifact, CompileError> {
    let _span = debug_span!("compile", len = source.len()).entered();

    let contracts = parser::parse(source)?;
    checker::type_check(&contracts)?;
    Ok(generator::emit(&contracts)?)
}
