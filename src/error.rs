//! Error taxonomy for the compilation pipeline.
//!
//! Every stage has its own error enum; [`CompileError`] wraps them for the
//! `compile` entry point. None of them carries partial output.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no valid parse found at line {line}, column {column}: {reason}")]
    NoValidParse {
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("ambiguous grammar: multiple parses possible at line {line}, column {column}")]
    Ambiguous { line: usize, column: usize },

    #[error("number literal `{literal}` does not fit in 128 bits at line {line}, column {column}")]
    InvalidNumber {
        literal: String,
        line: usize,
        column: usize,
    },

    #[error("expected {expected} at line {line}, column {column}")]
    Unexpected {
        expected: &'static str,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    /// Best-effort source position of the failure.
    pub fn position(&self) -> (usize, usize) {
        match self {
            ParseError::NoValidParse { line, column, .. }
            | ParseError::Ambiguous { line, column }
            | ParseError::InvalidNumber { line, column, .. }
            | ParseError::Unexpected { line, column, .. } => (*line, *column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type mismatch in {name}: expected {expected}, got {found}")]
    DeclarationMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("return type mismatch in {function}: expected {expected}, got {found}")]
    ReturnMismatch {
        function: String,
        expected: String,
        found: String,
    },

    #[error("{construct} condition must be boolean, got {found}")]
    NonBooleanCondition {
        construct: &'static str,
        found: String,
    },

    #[error("revert message must be string, got {found}")]
    NonStringRevert { found: String },

    #[error("operator {op} mismatch: {left} vs {right}")]
    OperatorMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("operator {op} is not supported")]
    UnsupportedOperator { op: String },

    #[error("unbound identifier `{name}`")]
    UnboundIdentifier { name: String },

    #[error("unknown struct type `{name}` (structs must be declared before use)")]
    UnknownStruct { name: String },

    #[error("function {function} is declared more than once in contract {contract}")]
    DuplicateFunction { contract: String, function: String },

    #[error("function {function} uses msg.value but is not payable")]
    PayableMismatch { function: String },

    #[error("{kind} not supported in ABI (function {function})")]
    UnsupportedAbiType {
        kind: &'static str,
        function: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("operator {op} has no bytecode lowering")]
    UnsupportedOperator { op: String },

    #[error("identifier `{name}` has no storage slot or parameter")]
    UnknownIdentifier { name: String },

    #[error("string literal of {len} bytes does not fit in one word")]
    StringTooLong { len: usize },

    #[error("runtime code of {size} bytes exceeds the 16-bit jump range")]
    CodeTooLarge { size: usize },

    #[error("internal compiler error: jump label `{label}` was never resolved")]
    UnresolvedLabel { label: String },

    #[error("internal compiler error: label `{label}` recorded at {recorded:#x} but placed at {actual:#x}")]
    LabelMismatch {
        label: String,
        recorded: usize,
        actual: usize,
    },

    #[error(transparent)]
    Abi(#[from] TypeError),
}

impl EmitError {
    /// Whether this error is a bug in the emitter rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, EmitError::UnresolvedLabel { .. } | EmitError::LabelMismatch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("emission error: {0}")]
    Emit(#[from] EmitError),
}
