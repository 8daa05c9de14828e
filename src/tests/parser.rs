use anyhow::Result;
use proptest::prelude::*;

use super::COUNTER;
use crate::ast::*;
use crate::error::ParseError;
use crate::parser::parse;

#[test]
fn test_parse_basic_contract() -> Result<()> {
    let contracts = parse(COUNTER)?;
    assert_eq!(contracts.len(), 1);

    let contract = &contracts[0];
    assert_eq!(contract.name, "Counter");
    assert_eq!(
        contract.body[0],
        Declaration::Variable(VariableDecl {
            name: "count".to_string(),
            ty: Type::NUMBER,
            value: Expression::Number(0),
        })
    );
    assert_eq!(
        contract.body[1],
        Declaration::Function(FunctionDecl {
            name: "getCount".to_string(),
            params: vec![],
            payable: false,
            return_type: Type::NUMBER,
            body: vec![Statement::Return(Expression::Identifier("count".to_string()))],
        })
    );
    Ok(())
}

#[test]
fn test_parse_multiple_contracts_in_order() -> Result<()> {
    let contracts = parse("contract A { } contract B { } contract C { }")?;
    let names: Vec<_> = contracts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    Ok(())
}

#[test]
fn test_parse_function_signature() -> Result<()> {
    let source = r#"
        contract Vault {
            function deposit(amount: number, note: string) payable {
                global msg.value;
            }
        }
    "#;
    let contracts = parse(source)?;
    let func = contracts[0].functions().next().expect("one function");

    assert_eq!(func.name, "deposit");
    assert!(func.payable);
    assert_eq!(func.return_type, Type::VOID);
    assert_eq!(
        func.params,
        vec![
            Parameter { name: "amount".to_string(), ty: Type::NUMBER },
            Parameter { name: "note".to_string(), ty: Type::STRING },
        ]
    );
    assert_eq!(func.body, vec![Statement::Expression(Expression::Global(Global::MsgValue))]);
    Ok(())
}

#[test]
fn test_parse_types() -> Result<()> {
    let source = r#"
        contract Types {
            struct Point { x: number; y: number; }
            let grid: number[2][3] = 0;
            let either: number | boolean = 0;
            let ledger: Map<string, Point> = new Map<string, Point>();
        }
    "#;
    let contracts = parse(source)?;
    let body = &contracts[0].body;

    assert_eq!(
        body[0],
        Declaration::Struct(StructDecl {
            name: "Point".to_string(),
            fields: vec![
                StructField { name: "x".to_string(), ty: Type::NUMBER },
                StructField { name: "y".to_string(), ty: Type::NUMBER },
            ],
        })
    );

    let types: Vec<_> = body[1..]
        .iter()
        .map(|decl| match decl {
            Declaration::Variable(var) => var.ty.to_string(),
            other => panic!("expected a variable, got {other:?}"),
        })
        .collect();
    assert_eq!(types, ["number[2][3]", "number | boolean", "Map<string, Point>"]);

    let Declaration::Variable(ledger) = &body[3] else {
        panic!("expected a variable");
    };
    assert_eq!(ledger.value, Expression::NewMap(ledger.ty.clone()));
    Ok(())
}

#[test]
fn test_parse_control_flow() -> Result<()> {
    let source = r#"
        contract Loop {
            function spin(): void {
                for (let i: number = 0; i < 10; i + 1) {
                    if (i < 5) {
                        revert "too early";
                    }
                }
            }
        }
    "#;
    let contracts = parse(source)?;
    let func = contracts[0].functions().next().expect("one function");

    let Statement::For { init, condition, update, body } = &func.body[0] else {
        panic!("expected a for loop, got {:?}", func.body[0]);
    };
    assert_eq!(init.name, "i");
    assert_eq!(
        *condition,
        Expression::BinaryOp {
            op: BinaryOperator::Lt,
            left: Box::new(Expression::Identifier("i".to_string())),
            right: Box::new(Expression::Number(10)),
        }
    );
    assert!(matches!(update, Expression::BinaryOp { op: BinaryOperator::Add, .. }));
    assert!(matches!(
        &body[0],
        Statement::If { body, .. } if body == &[Statement::Revert(Expression::String("too early".to_string()))]
    ));
    Ok(())
}

#[test]
fn test_parse_strings_and_comments() -> Result<()> {
    let source = r#"
        // leading comment
        contract Text {
            /* block
               comment */
            let quote: string = "say \"hi\"\n";
        }
    "#;
    let contracts = parse(source)?;
    let Declaration::Variable(var) = &contracts[0].body[0] else {
        panic!("expected a variable");
    };
    assert_eq!(var.value, Expression::String("say \"hi\"\n".to_string()));
    Ok(())
}

#[test]
fn test_keyword_prefixed_identifiers() -> Result<()> {
    let source = r#"
        contract Names {
            let returned: number = 1;
            let format: number = returned;
            function newest(): number {
                returned;
                return format;
            }
        }
    "#;
    let contracts = parse(source)?;
    let func = contracts[0].functions().next().expect("one function");
    assert_eq!(
        func.body[0],
        Statement::Expression(Expression::Identifier("returned".to_string()))
    );
    Ok(())
}

#[test]
fn test_keywords_must_end_at_a_word_boundary() {
    let glued = [
        "contract A { letter: number = 1; }",
        "contract A { functionally(): void { } }",
        "contractA { }",
        "contract A { structPoint { x: number; } }",
        "contract A { function f(): void payable { globalmsg.value; } }",
        "contract A { let m: Map<number, number> = newMap<number, number>(); }",
        "contract A { function f(): void { returnx 1; } }",
    ];
    for source in glued {
        let result = parse(source);
        assert!(
            matches!(result, Err(ParseError::NoValidParse { .. })),
            "{source:?} parsed as {result:?}"
        );
    }
}

#[test]
fn test_keywords_before_punctuation() -> Result<()> {
    let source = r#"
        contract A {
            function f(): number {
                if(1 < 2){ revert"stop"; }
                return(1);
            }
        }
    "#;
    let contracts = parse(source)?;
    let func = contracts[0].functions().next().expect("one function");
    assert!(matches!(func.body[0], Statement::If { .. }));
    assert_eq!(func.body[1], Statement::Return(Expression::Number(1)));
    Ok(())
}

#[test]
fn test_parenthesized_chain_is_accepted() -> Result<()> {
    let contracts = parse("contract A { let x: number = (1 + 2) + 3; }")?;
    let Declaration::Variable(var) = &contracts[0].body[0] else {
        panic!("expected a variable");
    };
    assert!(matches!(
        &var.value,
        Expression::BinaryOp { op: BinaryOperator::Add, left, .. }
            if matches!(**left, Expression::BinaryOp { .. })
    ));
    Ok(())
}

#[test]
fn test_operator_chain_is_ambiguous() {
    let source = "contract A {\n    let x: number = 1 + 2 + 3;\n}\n";
    let err = parse(source).unwrap_err();
    assert_eq!(err, ParseError::Ambiguous { line: 2, column: 21 });
    assert!(err.to_string().contains("ambiguous grammar"));
}

#[test]
fn test_parse_invalid_contract() {
    let err = parse("contract {\n    invalid syntax\n}\n").unwrap_err();
    assert!(matches!(err, ParseError::NoValidParse { line: 1, .. }), "got {err:?}");
}

#[test]
fn test_parse_error_reports_line() {
    let source = "contract A {\n    function f(): number {\n        return 1\n    }\n}\n";
    let err = parse(source).unwrap_err();
    assert!(matches!(err, ParseError::NoValidParse { .. }), "got {err:?}");
    assert_eq!(err.position().0, 4);
}

#[test]
fn test_empty_source_has_no_valid_parse() {
    let err = parse("").unwrap_err();
    assert_eq!(err.position(), (1, 1));
}

#[test]
fn test_unknown_global_is_rejected() {
    assert!(parse("contract A { let x: number = global tx.origin; }").is_err());
}

#[test]
fn test_oversized_number_literal() {
    let source = format!("contract A {{ let x: number = {}0; }}", u128::MAX);
    let err = parse(&source).unwrap_err();
    assert!(matches!(err, ParseError::InvalidNumber { line: 1, column: 30, .. }), "got {err:?}");
}

proptest! {
    #[test]
    fn test_parsing_is_deterministic(
        names in prop::collection::vec("v_[a-z0-9]{0,8}", 1..6),
        values in prop::collection::vec(any::<u64>(), 1..6),
    ) {
        let mut source = String::from("contract Generated {\n");
        for (name, value) in names.iter().zip(&values) {
            source.push_str(&format!("    let {name}: number = {value};\n"));
        }
        source.push_str(&format!("    function read(): number {{ return {}; }}\n}}\n", names[0]));

        let first = parse(&source);
        let second = parse(&source);
        prop_assert!(first.is_ok());
        prop_assert_eq!(first, second);
    }
}
