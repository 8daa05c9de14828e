//! ABI generation: one `function` entry per function declaration.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ast::*;
use crate::error::TypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Function,
    Constructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability")]
    pub state_mutability: StateMutability,
}

/// Builds the ABI of every function in `contracts`, in declaration order.
pub fn generate_abi(contracts: &[Contract]) -> Result<Vec<AbiEntry>, TypeError> {
    contracts
        .iter()
        .flat_map(|contract| contract.functions())
        .map(function_entry)
        .collect()
}

fn function_entry(func: &FunctionDecl) -> Result<AbiEntry, TypeError> {
    let inputs = func
        .params
        .iter()
        .map(|p| Ok(AbiParam { name: p.name.clone(), ty: abi_type(&p.ty, &func.name)? }))
        .collect::<Result<Vec<_>, TypeError>>()?;

    let outputs = if func.return_type.is_void() {
        Vec::new()
    } else {
        vec![AbiParam { name: String::new(), ty: abi_type(&func.return_type, &func.name)? }]
    };

    let state_mutability = if func.payable {
        StateMutability::Payable
    } else if func.body.iter().any(Statement::declares_variable) {
        StateMutability::Nonpayable
    } else {
        StateMutability::View
    };
    trace!(function = %func.name, ?state_mutability, "generated ABI entry");

    Ok(AbiEntry {
        kind: EntryKind::Function,
        name: Some(func.name.clone()),
        inputs,
        outputs,
        state_mutability,
    })
}

/// Maps a source type to its ABI type name.
///
/// `string` maps to `address`. Named types pass through as their bare name
/// without expanding their fields. Maps, unions and `void` have no ABI form.
pub fn abi_type(ty: &Type, function: &str) -> Result<String, TypeError> {
    let unsupported = |kind| TypeError::UnsupportedAbiType { kind, function: function.to_string() };
    match ty {
        Type::Primitive(Primitive::Number) => Ok("uint256".to_string()),
        Type::Primitive(Primitive::String) => Ok("address".to_string()),
        Type::Primitive(Primitive::Boolean) => Ok("bool".to_string()),
        Type::Primitive(Primitive::Void) => Err(unsupported("void values")),
        Type::Array { element, size } => Ok(format!("{}[{}]", abi_type(element, function)?, size)),
        Type::Map { .. } => Err(unsupported("maps")),
        Type::Union(_) => Err(unsupported("unions")),
        Type::Named(name) => Ok(name.clone()),
    }
}
