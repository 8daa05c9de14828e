use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use tracing::{debug, trace};

use crate::ast::*;
use crate::error::ParseError;

#[derive(Parser)]
#[grammar = "parser/useless.pest"]
pub struct UselessParser;

/// Parses a compilation unit into its contracts, in source order.
///
/// Fails when the grammar admits no derivation of `source`, and when it
/// admits more than one (an unparenthesised operator chain). No partial AST
/// is returned.
pub fn parse(source: &str) -> Result<Vec<Contract>, ParseError> {
    let mut pairs = UselessParser::parse(Rule::program, source).map_err(from_pest)?;
    let program = next_pair(&mut pairs, (1, 1), "a program")?;

    let mut contracts = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::contract => contracts.push(parse_contract(pair)?),
            Rule::EOI => {}
            _ => return Err(unexpected(&pair, "a contract")),
        }
    }

    debug!(contracts = contracts.len(), "parsed compilation unit");
    Ok(contracts)
}

fn from_pest(error: pest::error::Error<Rule>) -> ParseError {
    let (line, column) = match error.line_col {
        LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
    };
    ParseError::NoValidParse {
        line,
        column,
        reason: error.variant.message().into_owned(),
    }
}

fn line_col(pair: &Pair<'_, Rule>) -> (usize, usize) {
    pair.as_span().start_pos().line_col()
}

fn unexpected(pair: &Pair<'_, Rule>, expected: &'static str) -> ParseError {
    let (line, column) = line_col(pair);
    ParseError::Unexpected { expected, line, column }
}

fn next_pair<'i>(
    pairs: &mut Pairs<'i, Rule>,
    (line, column): (usize, usize),
    expected: &'static str,
) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or(ParseError::Unexpected { expected, line, column })
}

fn parse_contract(pair: Pair<'_, Rule>) -> Result<Contract, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, at, "a contract name")?.as_str().to_string();
    trace!(contract = %name, "found contract");

    let mut body = Vec::new();
    for item in inner {
        let decl = match item.as_rule() {
            Rule::struct_decl => Declaration::Struct(parse_struct(item)?),
            Rule::function_decl => Declaration::Function(parse_function(item)?),
            Rule::variable_decl => Declaration::Variable(parse_variable_decl(item)?),
            _ => return Err(unexpected(&item, "a declaration")),
        };
        body.push(decl);
    }

    Ok(Contract { name, body })
}

fn parse_struct(pair: Pair<'_, Rule>) -> Result<StructDecl, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, at, "a struct name")?.as_str().to_string();
    trace!(name = %name, "found struct declaration");

    let mut fields = Vec::new();
    for field in inner {
        let at = line_col(&field);
        let mut parts = field.into_inner();
        let name = next_pair(&mut parts, at, "a field name")?.as_str().to_string();
        let ty = parse_type(next_pair(&mut parts, at, "a field type")?)?;
        fields.push(StructField { name, ty });
    }

    Ok(StructDecl { name, fields })
}

fn parse_function(pair: Pair<'_, Rule>) -> Result<FunctionDecl, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, at, "a function name")?.as_str().to_string();
    trace!(name = %name, "found function definition");

    let mut function = FunctionDecl {
        name,
        params: Vec::new(),
        payable: false,
        return_type: Type::VOID,
        body: Vec::new(),
    };

    for token in inner {
        match token.as_rule() {
            Rule::parameter_list => function.params = parse_parameters(token)?,
            Rule::return_type => {
                let at = line_col(&token);
                let ty = next_pair(&mut token.into_inner(), at, "a return type")?;
                function.return_type = parse_type(ty)?;
            }
            Rule::payable_modifier => function.payable = true,
            Rule::block => function.body = parse_block(token)?,
            _ => return Err(unexpected(&token, "a function signature or body")),
        }
    }

    Ok(function)
}

fn parse_parameters(pair: Pair<'_, Rule>) -> Result<Vec<Parameter>, ParseError> {
    let mut params = Vec::new();

    for param in pair.into_inner() {
        let at = line_col(&param);
        let mut parts = param.into_inner();
        let name = next_pair(&mut parts, at, "a parameter name")?.as_str().to_string();
        let ty = parse_type(next_pair(&mut parts, at, "a parameter type")?)?;
        params.push(Parameter { name, ty });
    }

    Ok(params)
}

fn parse_block(pair: Pair<'_, Rule>) -> Result<Vec<Statement>, ParseError> {
    pair.into_inner().map(parse_statement).collect()
}

fn parse_statement(pair: Pair<'_, Rule>) -> Result<Statement, ParseError> {
    let at = line_col(&pair);
    let statement = match pair.as_rule() {
        Rule::variable_decl => Statement::Variable(parse_variable_decl(pair)?),
        Rule::expression_statement => {
            let expr = next_pair(&mut pair.into_inner(), at, "an expression")?;
            Statement::Expression(parse_expression(expr)?)
        }
        Rule::return_statement => {
            let expr = next_pair(&mut pair.into_inner(), at, "a return value")?;
            Statement::Return(parse_expression(expr)?)
        }
        Rule::revert_statement => {
            let expr = next_pair(&mut pair.into_inner(), at, "a revert message")?;
            Statement::Revert(parse_expression(expr)?)
        }
        Rule::if_statement => {
            let mut inner = pair.into_inner();
            let condition = parse_expression(next_pair(&mut inner, at, "an if condition")?)?;
            let body = parse_block(next_pair(&mut inner, at, "an if body")?)?;
            Statement::If { condition, body }
        }
        Rule::for_statement => {
            let mut inner = pair.into_inner();
            let init = parse_binding(next_pair(&mut inner, at, "a loop initializer")?)?;
            let condition = parse_expression(next_pair(&mut inner, at, "a loop condition")?)?;
            let update = parse_expression(next_pair(&mut inner, at, "a loop update")?)?;
            let body = parse_block(next_pair(&mut inner, at, "a loop body")?)?;
            Statement::For { init, condition, update, body }
        }
        _ => return Err(unexpected(&pair, "a statement")),
    };
    Ok(statement)
}

fn parse_variable_decl(pair: Pair<'_, Rule>) -> Result<VariableDecl, ParseError> {
    let at = line_col(&pair);
    parse_binding(next_pair(&mut pair.into_inner(), at, "a variable binding")?)
}

fn parse_binding(pair: Pair<'_, Rule>) -> Result<VariableDecl, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, at, "a variable name")?.as_str().to_string();
    let ty = parse_type(next_pair(&mut inner, at, "a variable type")?)?;
    let value = parse_expression(next_pair(&mut inner, at, "an initializer")?)?;
    trace!(name = %name, ty = %ty, "found variable declaration");
    Ok(VariableDecl { name, ty, value })
}

fn parse_type(pair: Pair<'_, Rule>) -> Result<Type, ParseError> {
    let at = line_col(&pair);
    let mut members = pair
        .into_inner()
        .map(parse_type_member)
        .collect::<Result<Vec<_>, _>>()?;

    match members.len() {
        0 => Err(ParseError::Unexpected { expected: "a type", line: at.0, column: at.1 }),
        1 => Ok(members.remove(0)),
        _ => Ok(Type::Union(members)),
    }
}

fn parse_type_member(pair: Pair<'_, Rule>) -> Result<Type, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let mut ty = parse_type_atom(next_pair(&mut inner, at, "a type")?)?;

    for size in inner {
        let (line, column) = line_col(&size);
        let literal = size.as_str();
        let size = literal.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
            literal: literal.to_string(),
            line,
            column,
        })?;
        ty = Type::Array { element: Box::new(ty), size };
    }

    Ok(ty)
}

fn parse_type_atom(pair: Pair<'_, Rule>) -> Result<Type, ParseError> {
    match pair.as_rule() {
        Rule::primitive_type => {
            let primitive = match pair.as_str() {
                "number" => Primitive::Number,
                "string" => Primitive::String,
                "boolean" => Primitive::Boolean,
                "void" => Primitive::Void,
                _ => return Err(unexpected(&pair, "a primitive type")),
            };
            Ok(Type::Primitive(primitive))
        }
        Rule::map_type => parse_map_type(pair),
        Rule::named_type => Ok(Type::Named(pair.as_str().to_string())),
        Rule::type_expr => parse_type(pair),
        _ => Err(unexpected(&pair, "a type")),
    }
}

fn parse_map_type(pair: Pair<'_, Rule>) -> Result<Type, ParseError> {
    let at = line_col(&pair);
    let mut inner = pair.into_inner();
    let key = parse_type(next_pair(&mut inner, at, "a map key type")?)?;
    let value = parse_type(next_pair(&mut inner, at, "a map value type")?)?;
    Ok(Type::Map { key: Box::new(key), value: Box::new(value) })
}

fn parse_expression(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    let (line, column) = line_col(&pair);
    let mut inner = pair.into_inner();

    let left = parse_operand(next_pair(&mut inner, (line, column), "an operand")?)?;
    let Some(op) = inner.next() else {
        return Ok(left);
    };
    let right = parse_operand(next_pair(&mut inner, (line, column), "a right operand")?)?;

    // `a + b < c` derives as both `(a + b) < c` and `a + (b < c)`.
    if inner.next().is_some() {
        return Err(ParseError::Ambiguous { line, column });
    }

    let op = BinaryOperator::from_symbol(op.as_str())
        .ok_or_else(|| unexpected(&op, "a binary operator"))?;
    Ok(Expression::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn parse_operand(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    let at = line_col(&pair);
    match pair.as_rule() {
        Rule::number => {
            let literal = pair.as_str();
            literal
                .parse::<u128>()
                .map(Expression::Number)
                .map_err(|_| ParseError::InvalidNumber {
                    literal: literal.to_string(),
                    line: at.0,
                    column: at.1,
                })
        }
        Rule::string => {
            let raw = next_pair(&mut pair.into_inner(), at, "string contents")?;
            Ok(Expression::String(unescape(raw.as_str())))
        }
        Rule::identifier => Ok(Expression::Identifier(pair.as_str().to_string())),
        Rule::global => {
            let name = next_pair(&mut pair.into_inner(), at, "a global name")?;
            Global::from_name(name.as_str())
                .map(Expression::Global)
                .ok_or_else(|| unexpected(&name, "msg.sender, msg.value or block.number"))
        }
        Rule::new_map => {
            let map = next_pair(&mut pair.into_inner(), at, "a map type")?;
            Ok(Expression::NewMap(parse_map_type(map)?))
        }
        Rule::expression => parse_expression(pair),
        _ => Err(unexpected(&pair, "an operand")),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
