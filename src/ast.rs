use std::fmt;

/// A single `contract Name { ... }` block. A compilation unit is an ordered
/// sequence of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub name: String,
    pub body: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub name: String,
    pub ty: Type,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub payable: bool,
    pub return_type: Type,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Number,
    String,
    Boolean,
    Void,
}

impl Primitive {
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Void => "void",
        }
    }
}

/// Source-level types. The derived `PartialEq` is the structural equality
/// the checker relies on: arrays compare element and size, maps compare key
/// and value, unions compare members position-wise, named types by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    Array { element: Box<Type>, size: u64 },
    Map { key: Box<Type>, value: Box<Type> },
    Union(Vec<Type>),
    Named(String),
}

impl Type {
    pub const NUMBER: Type = Type::Primitive(Primitive::Number);
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const BOOLEAN: Type = Type::Primitive(Primitive::Boolean);
    pub const VOID: Type = Type::Primitive(Primitive::Void);

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.as_str()),
            Type::Array { element, size } => match **element {
                Type::Union(_) => write!(f, "({})[{}]", element, size),
                _ => write!(f, "{}[{}]", element, size),
            },
            Type::Map { key, value } => write!(f, "Map<{}, {}>", key, value),
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            Type::Named(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "==" => BinaryOperator::Eq,
            "<" => BinaryOperator::Lt,
            ">" => BinaryOperator::Gt,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Environment values readable through `global <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Global {
    MsgSender,
    MsgValue,
    BlockNumber,
}

impl Global {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "msg.sender" => Some(Global::MsgSender),
            "msg.value" => Some(Global::MsgValue),
            "block.number" => Some(Global::BlockNumber),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Global::MsgSender => "msg.sender",
            Global::MsgValue => "msg.value",
            Global::BlockNumber => "block.number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Number(u128),
    String(String),
    Identifier(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    NewMap(Type),
    Global(Global),
}

impl Expression {
    /// Whether `global` is read anywhere in this expression tree.
    pub fn reads_global(&self, global: Global) -> bool {
        match self {
            Expression::Global(g) => *g == global,
            Expression::BinaryOp { left, right, .. } => {
                left.reads_global(global) || right.reads_global(global)
            }
            Expression::Number(_)
            | Expression::String(_)
            | Expression::Identifier(_)
            | Expression::NewMap(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Return(Expression),
    Variable(VariableDecl),
    Expression(Expression),
    If {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        init: VariableDecl,
        condition: Expression,
        update: Expression,
        body: Vec<Statement>,
    },
    Revert(Expression),
}

impl Statement {
    /// Whether `global` is read anywhere in this statement, including nested
    /// bodies, initializers and loop headers.
    pub fn reads_global(&self, global: Global) -> bool {
        match self {
            Statement::Return(expr) | Statement::Expression(expr) | Statement::Revert(expr) => {
                expr.reads_global(global)
            }
            Statement::Variable(decl) => decl.value.reads_global(global),
            Statement::If { condition, body } => {
                condition.reads_global(global) || body.iter().any(|s| s.reads_global(global))
            }
            Statement::For { init, condition, update, body } => {
                init.value.reads_global(global)
                    || condition.reads_global(global)
                    || update.reads_global(global)
                    || body.iter().any(|s| s.reads_global(global))
            }
        }
    }

    /// Whether this statement declares a variable, looking through `if` and
    /// `for` bodies. A `for` initializer alone does not count.
    pub fn declares_variable(&self) -> bool {
        match self {
            Statement::Variable(_) => true,
            Statement::If { body, .. } | Statement::For { body, .. } => {
                body.iter().any(Statement::declares_variable)
            }
            Statement::Return(_) | Statement::Expression(_) | Statement::Revert(_) => false,
        }
    }
}

impl Contract {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.body.iter().filter_map(|decl| match decl {
            Declaration::Function(func) => Some(func),
            Declaration::Variable(_) | Declaration::Struct(_) => None,
        })
    }
}
