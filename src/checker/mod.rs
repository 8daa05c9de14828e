//! Structural type checking.
//!
//! Declarations are walked once, in source order. Struct declarations are
//! recorded as they are met, so a struct is only usable after its
//! declaration. Function bodies use one flat scope: a binding made inside an
//! `if` or `for` body stays visible for the rest of the function.
//! Parameter and return types must also have an ABI form.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::abi::abi_type;
use crate::ast::*;
use crate::error::TypeError;

type Scope = HashMap<String, Type>;

/// Type checks a whole compilation unit.
pub fn type_check(contracts: &[Contract]) -> Result<(), TypeError> {
    TypeChecker::default().check(contracts)
}

/// Holds the struct table for one compilation. The contract-level symbol
/// table lives for a single [`TypeChecker::check`] call.
#[derive(Debug, Default)]
pub struct TypeChecker {
    structs: HashMap<String, Vec<Type>>,
}

impl TypeChecker {
    pub fn check(&mut self, contracts: &[Contract]) -> Result<(), TypeError> {
        let mut symbols = Scope::new();
        for contract in contracts {
            debug!(contract = %contract.name, "type checking contract");
            let mut functions = HashSet::new();

            for decl in &contract.body {
                match decl {
                    Declaration::Struct(decl) => self.record_struct(decl)?,
                    Declaration::Variable(decl) => self.check_variable(decl, &mut symbols)?,
                    Declaration::Function(decl) => {
                        if !functions.insert(decl.name.as_str()) {
                            return Err(TypeError::DuplicateFunction {
                                contract: contract.name.clone(),
                                function: decl.name.clone(),
                            });
                        }
                        self.check_function(decl, &symbols)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn record_struct(&mut self, decl: &StructDecl) -> Result<(), TypeError> {
        for field in &decl.fields {
            self.require_known(&field.ty)?;
        }
        trace!(name = %decl.name, fields = decl.fields.len(), "recorded struct");
        self.structs
            .insert(decl.name.clone(), decl.fields.iter().map(|f| f.ty.clone()).collect());
        Ok(())
    }

    /// Every named type reachable from `ty` must already be in the struct table.
    fn require_known(&self, ty: &Type) -> Result<(), TypeError> {
        match ty {
            Type::Primitive(_) => Ok(()),
            Type::Array { element, .. } => self.require_known(element),
            Type::Map { key, value } => {
                self.require_known(key)?;
                self.require_known(value)
            }
            Type::Union(members) => members.iter().try_for_each(|m| self.require_known(m)),
            Type::Named(name) if self.structs.contains_key(name) => Ok(()),
            Type::Named(name) => Err(TypeError::UnknownStruct { name: name.clone() }),
        }
    }

    fn check_variable(&self, decl: &VariableDecl, scope: &mut Scope) -> Result<(), TypeError> {
        self.require_known(&decl.ty)?;
        let inferred = self.infer(&decl.value, scope)?;
        if inferred != decl.ty {
            return Err(TypeError::DeclarationMismatch {
                name: decl.name.clone(),
                expected: decl.ty.to_string(),
                found: inferred.to_string(),
            });
        }
        scope.insert(decl.name.clone(), decl.ty.clone());
        Ok(())
    }

    fn check_function(&self, func: &FunctionDecl, symbols: &Scope) -> Result<(), TypeError> {
        debug!(function = %func.name, "type checking function");
        let mut scope = symbols.clone();
        for param in &func.params {
            self.require_known(&param.ty)?;
            abi_type(&param.ty, &func.name)?;
            scope.insert(param.name.clone(), param.ty.clone());
        }
        self.require_known(&func.return_type)?;
        if !func.return_type.is_void() {
            abi_type(&func.return_type, &func.name)?;
        }

        for stmt in &func.body {
            self.check_statement(stmt, func, &mut scope)?;
        }

        if !func.payable && func.body.iter().any(|s| s.reads_global(Global::MsgValue)) {
            return Err(TypeError::PayableMismatch { function: func.name.clone() });
        }
        Ok(())
    }

    fn check_statement(
        &self,
        stmt: &Statement,
        func: &FunctionDecl,
        scope: &mut Scope,
    ) -> Result<(), TypeError> {
        match stmt {
            Statement::Variable(decl) => self.check_variable(decl, scope),
            Statement::Return(expr) => {
                let found = self.infer(expr, scope)?;
                if found != func.return_type {
                    return Err(TypeError::ReturnMismatch {
                        function: func.name.clone(),
                        expected: func.return_type.to_string(),
                        found: found.to_string(),
                    });
                }
                Ok(())
            }
            Statement::If { condition, body } => {
                self.require_boolean("if", condition, scope)?;
                body.iter().try_for_each(|s| self.check_statement(s, func, scope))
            }
            Statement::For { init, condition, update, body } => {
                self.check_variable(init, scope)?;
                self.require_boolean("for", condition, scope)?;
                self.infer(update, scope)?;
                body.iter().try_for_each(|s| self.check_statement(s, func, scope))
            }
            Statement::Revert(message) => {
                let found = self.infer(message, scope)?;
                if found != Type::STRING {
                    return Err(TypeError::NonStringRevert { found: found.to_string() });
                }
                Ok(())
            }
            Statement::Expression(expr) => self.infer(expr, scope).map(drop),
        }
    }

    fn require_boolean(
        &self,
        construct: &'static str,
        condition: &Expression,
        scope: &Scope,
    ) -> Result<(), TypeError> {
        let found = self.infer(condition, scope)?;
        if found != Type::BOOLEAN {
            return Err(TypeError::NonBooleanCondition { construct, found: found.to_string() });
        }
        Ok(())
    }

    /// Infers the type of `expr` in `scope`.
    pub fn infer(
        &self,
        expr: &Expression,
        scope: &HashMap<String, Type>,
    ) -> Result<Type, TypeError> {
        match expr {
            Expression::Number(_) => Ok(Type::NUMBER),
            Expression::String(_) => Ok(Type::STRING),
            Expression::Identifier(name) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| TypeError::UnboundIdentifier { name: name.clone() }),
            Expression::BinaryOp { op, left, right } => {
                let left = self.infer(left, scope)?;
                let right = self.infer(right, scope)?;
                if left != right {
                    return Err(TypeError::OperatorMismatch {
                        op: op.to_string(),
                        left: left.to_string(),
                        right: right.to_string(),
                    });
                }
                match op {
                    BinaryOperator::Add => Ok(left),
                    BinaryOperator::Lt => Ok(Type::BOOLEAN),
                    BinaryOperator::Sub
                    | BinaryOperator::Mul
                    | BinaryOperator::Div
                    | BinaryOperator::Eq
                    | BinaryOperator::Gt => {
                        Err(TypeError::UnsupportedOperator { op: op.to_string() })
                    }
                }
            }
            Expression::NewMap(ty) => {
                self.require_known(ty)?;
                Ok(ty.clone())
            }
            Expression::Global(global) => match global {
                Global::MsgSender => Ok(Type::STRING),
                Global::MsgValue | Global::BlockNumber => Ok(Type::NUMBER),
            },
        }
    }
}
