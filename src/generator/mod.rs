//! EVM bytecode emission.
//!
//! Emission runs in two passes over the contracts. The first seeds the label
//! table with an estimated entry point for every function. The second
//! generates code, replacing each estimate with the precise offset when the
//! function's `JUMPDEST` is placed. The selector dispatcher is then prepended,
//! labels are rebased past it, jump placeholders are resolved and the result
//! is wrapped in deployment code that returns it.
//!
//! ## Runtime layout
//! - dispatcher: selector load, one compare-and-jump per function of the
//!   first contract, revert fallback
//! - state variable initializers and function bodies, in declaration order
//!
//! ## Memory
//! - `0x00`: return and revert word
//! - `0x20`: last string literal pushed

mod assembly;
mod opcode;

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

pub use assembly::{resolve, Asm, Label, LabelTable, LABEL_WIDTH};
pub use opcode::{disassemble, Instruction, Opcode};

use crate::abi::{generate_abi, AbiEntry};
use crate::ast::*;
use crate::error::EmitError;

/// Pass-one size guess for a function body, in bytes.
pub const FUNCTION_SIZE_ESTIMATE: usize = 32;

/// Size of the code that copies the runtime into memory and returns it.
pub const DEPLOY_WRAPPER_SIZE: usize = 14;

/// Calldata bytes taken by the function selector.
const SELECTOR_WINDOW: usize = 4;
const WORD: usize = 32;
const STRING_SCRATCH: u8 = 0x20;

/// Output of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Deployment code followed by the runtime code, `0x`-prefixed hex.
    pub bytecode: String,
    /// The runtime code alone, `0x`-prefixed hex.
    pub runtime: String,
    pub abi: Vec<AbiEntry>,
}

/// Dispatcher selector for a function name: the first four bytes of its
/// SHA-256 digest.
///
/// This is a placeholder, not the keccak-256 of the canonical signature, so
/// the selectors do not match those computed by standard Ethereum tooling.
pub fn selector(name: &str) -> [u8; 4] {
    let digest = Sha256::digest(name.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Emits deployable bytecode and the ABI for type checked contracts.
pub fn emit(contracts: &[Contract]) -> Result<Artifact, EmitError> {
    let mut emitter = Emitter::default();
    emitter.seed_labels(contracts);

    for (index, contract) in contracts.iter().enumerate() {
        debug!(contract = %contract.name, "emitting contract");
        emitter.emit_contract(index, contract)?;
    }

    let runtime = emitter.finish(contracts.first())?;
    let runtime = hex::encode(&runtime);
    let deploy = deployment_wrapper(runtime.len() / 2)?;
    debug!(runtime_size = runtime.len() / 2, "emitted runtime code");

    Ok(Artifact {
        bytecode: format!("0x{}{}", hex::encode(deploy), runtime),
        runtime: format!("0x{runtime}"),
        abi: generate_abi(contracts)?,
    })
}

/// `CODECOPY`s `runtime_len` bytes that follow this wrapper to memory 0 and
/// returns them.
fn deployment_wrapper(runtime_len: usize) -> Result<Vec<u8>, EmitError> {
    let [hi, lo] = u16::try_from(runtime_len)
        .map_err(|_| EmitError::CodeTooLarge { size: runtime_len })?
        .to_be_bytes();

    let code = vec![
        Opcode::PUSH2.0,
        hi,
        lo,
        Opcode::PUSH1.0,
        DEPLOY_WRAPPER_SIZE as u8,
        Opcode::PUSH1.0,
        0x00,
        Opcode::CODECOPY.0,
        Opcode::PUSH2.0,
        hi,
        lo,
        Opcode::PUSH1.0,
        0x00,
        Opcode::RETURN.0,
    ];
    debug_assert_eq!(code.len(), DEPLOY_WRAPPER_SIZE);
    Ok(code)
}

/// Where an identifier's value lives at runtime.
enum Place {
    Calldata(usize),
    Storage(usize),
}

/// Per-function emission state. Locals allocate storage slots from the
/// compilation-wide counter, seeded at function entry.
struct Frame<'a> {
    params: &'a [Parameter],
    locals: HashMap<String, usize>,
    next_slot: usize,
}

impl<'a> Frame<'a> {
    fn new(params: &'a [Parameter], next_slot: usize) -> Self {
        Self { params, locals: HashMap::new(), next_slot }
    }

    fn allocate(&mut self, name: &str) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.locals.insert(name.to_string(), slot);
        trace!(name, slot, "allocated local slot");
        slot
    }

    /// Locals shadow parameters, which shadow state variables.
    fn resolve(&self, name: &str, state: &HashMap<String, usize>) -> Option<Place> {
        if let Some(slot) = self.locals.get(name) {
            return Some(Place::Storage(*slot));
        }
        if let Some(index) = self.params.iter().position(|p| p.name == name) {
            return Some(Place::Calldata(SELECTOR_WINDOW + index * WORD));
        }
        state.get(name).map(|slot| Place::Storage(*slot))
    }
}

/// Compilation-scoped emission context. Built fresh by every [`emit`] call.
#[derive(Debug, Default)]
struct Emitter {
    code: Vec<Asm>,
    pc: usize,
    labels: LabelTable,
    next_slot: usize,
    state_slots: HashMap<String, usize>,
    next_label: usize,
}

impl Emitter {
    fn seed_labels(&mut self, contracts: &[Contract]) {
        let mut estimate = 0;
        for (index, contract) in contracts.iter().enumerate() {
            for func in contract.functions() {
                self.labels.insert(Label::function(index, &func.name), estimate);
                estimate += FUNCTION_SIZE_ESTIMATE;
            }
        }
    }

    fn push(&mut self, item: Asm) {
        self.pc += item.size();
        self.code.push(item);
    }

    fn op(&mut self, op: Opcode) {
        self.push(Asm::Op(op));
    }

    fn place(&mut self, label: Label) {
        trace!(label = %label, pc = self.pc, "placed label");
        self.labels.insert(label.clone(), self.pc);
        self.push(Asm::JumpDest(label));
    }

    fn fresh_label_id(&mut self) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    fn emit_contract(&mut self, index: usize, contract: &Contract) -> Result<(), EmitError> {
        for decl in &contract.body {
            match decl {
                Declaration::Variable(decl) => {
                    let frame = Frame::new(&[], self.next_slot);
                    self.emit_expression(&decl.value, &frame)?;
                    let slot = self.next_slot;
                    self.next_slot += 1;
                    self.state_slots.insert(decl.name.clone(), slot);
                    trace!(name = %decl.name, slot, "allocated state slot");
                    self.push(Asm::push_int(slot as u128));
                    self.op(Opcode::SSTORE);
                }
                Declaration::Function(func) => self.emit_function(index, func)?,
                Declaration::Struct(_) => {}
            }
        }
        Ok(())
    }

    fn emit_function(&mut self, contract: usize, func: &FunctionDecl) -> Result<(), EmitError> {
        debug!(function = %func.name, "emitting function");
        self.place(Label::function(contract, &func.name));

        let mut frame = Frame::new(&func.params, self.next_slot);
        for stmt in &func.body {
            self.emit_statement(stmt, &mut frame)?;
        }
        self.op(Opcode::STOP);

        self.next_slot = frame.next_slot;
        Ok(())
    }

    fn emit_declaration(
        &mut self,
        decl: &VariableDecl,
        frame: &mut Frame<'_>,
    ) -> Result<(), EmitError> {
        self.emit_expression(&decl.value, frame)?;
        let slot = frame.allocate(&decl.name);
        self.push(Asm::push_int(slot as u128));
        self.op(Opcode::SSTORE);
        Ok(())
    }

    fn emit_statement(
        &mut self,
        stmt: &Statement,
        frame: &mut Frame<'_>,
    ) -> Result<(), EmitError> {
        match stmt {
            Statement::Variable(decl) => self.emit_declaration(decl, frame)?,
            Statement::Return(expr) => {
                self.emit_expression(expr, frame)?;
                self.emit_word_exit(Opcode::RETURN);
            }
            Statement::Expression(expr) => {
                self.emit_expression(expr, frame)?;
                self.op(Opcode::POP);
            }
            Statement::If { condition, body } => {
                let end = Label::IfEnd(self.fresh_label_id());
                self.emit_expression(condition, frame)?;
                self.op(Opcode::ISZERO);
                self.push(Asm::JumpIf(end.clone()));
                for stmt in body {
                    self.emit_statement(stmt, frame)?;
                }
                self.place(end);
            }
            Statement::For { init, condition, update, body } => {
                self.emit_declaration(init, frame)?;
                let id = self.fresh_label_id();
                let start = Label::LoopStart(id);
                let end = Label::LoopEnd(id);

                self.place(start.clone());
                self.emit_expression(condition, frame)?;
                self.op(Opcode::ISZERO);
                self.push(Asm::JumpIf(end.clone()));
                for stmt in body {
                    self.emit_statement(stmt, frame)?;
                }
                self.emit_expression(update, frame)?;
                self.op(Opcode::POP);
                self.push(Asm::Jump(start));
                self.place(end);
            }
            Statement::Revert(message) => {
                self.emit_expression(message, frame)?;
                self.emit_word_exit(Opcode::REVERT);
            }
        }
        Ok(())
    }

    /// Stores the top of the stack at memory 0 and ends execution with
    /// `exit` over that word.
    fn emit_word_exit(&mut self, exit: Opcode) {
        self.push(Asm::push_int(0));
        self.op(Opcode::MSTORE);
        self.push(Asm::push_int(WORD as u128));
        self.push(Asm::push_int(0));
        self.op(exit);
    }

    /// Emits code leaving exactly one word on the stack.
    fn emit_expression(&mut self, expr: &Expression, frame: &Frame<'_>) -> Result<(), EmitError> {
        match expr {
            Expression::Number(value) => self.push(Asm::push_int(*value)),
            Expression::String(value) => {
                let bytes = value.as_bytes();
                if bytes.len() > WORD {
                    return Err(EmitError::StringTooLong { len: bytes.len() });
                }
                let bytes = if bytes.is_empty() { vec![0] } else { bytes.to_vec() };
                self.push(Asm::Push(bytes));
                self.op(Opcode::DUP1);
                self.push(Asm::Push(vec![STRING_SCRATCH]));
                self.op(Opcode::MSTORE);
            }
            Expression::Identifier(name) => match frame.resolve(name, &self.state_slots) {
                Some(Place::Calldata(offset)) => {
                    self.push(Asm::push_int(offset as u128));
                    self.op(Opcode::CALLDATALOAD);
                }
                Some(Place::Storage(slot)) => {
                    self.push(Asm::push_int(slot as u128));
                    self.op(Opcode::SLOAD);
                }
                None => return Err(EmitError::UnknownIdentifier { name: name.clone() }),
            },
            Expression::BinaryOp { op, left, right } => {
                // Operands end up reversed on the stack, so `<` lowers to GT.
                let opcode = match op {
                    BinaryOperator::Add => Opcode::ADD,
                    BinaryOperator::Lt => Opcode::GT,
                    BinaryOperator::Sub
                    | BinaryOperator::Mul
                    | BinaryOperator::Div
                    | BinaryOperator::Eq
                    | BinaryOperator::Gt => {
                        return Err(EmitError::UnsupportedOperator { op: op.to_string() })
                    }
                };
                self.emit_expression(left, frame)?;
                self.emit_expression(right, frame)?;
                self.op(opcode);
            }
            Expression::NewMap(_) => self.push(Asm::push_int(0)),
            Expression::Global(global) => self.op(match global {
                Global::MsgSender => Opcode::CALLER,
                Global::MsgValue => Opcode::CALLVALUE,
                Global::BlockNumber => Opcode::NUMBER,
            }),
        }
        Ok(())
    }

    /// Prepends the dispatcher for `entry`'s functions, rebases every label
    /// past it and resolves all jumps.
    fn finish(self, entry: Option<&Contract>) -> Result<Vec<u8>, EmitError> {
        let Emitter { code: body, mut labels, .. } = self;

        let dispatcher = dispatcher(entry);
        let shift: usize = dispatcher.iter().map(Asm::size).sum();
        for pc in labels.values_mut() {
            *pc += shift;
        }

        let mut code = dispatcher;
        code.extend(body);
        resolve(&code, &labels)
    }
}

fn dispatcher(entry: Option<&Contract>) -> Vec<Asm> {
    let mut code = vec![
        Asm::push_int(0),
        Asm::Op(Opcode::CALLDATALOAD),
        Asm::push_int(0xe0),
        Asm::Op(Opcode::SHR),
    ];

    for func in entry.into_iter().flat_map(|contract| contract.functions()) {
        code.push(Asm::Op(Opcode::DUP1));
        code.push(Asm::Push(selector(&func.name).to_vec()));
        code.push(Asm::Op(Opcode::EQ));
        code.push(Asm::JumpIf(Label::function(0, &func.name)));
    }

    code.extend([Asm::push_int(0), Asm::Op(Opcode::DUP1), Asm::Op(Opcode::REVERT)]);
    code
}
