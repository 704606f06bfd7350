//! Parser tests

use super::*;
use crate::frontend::lexer::tokenize;
use crate::frontend::types::TypeDesc;

fn parse_src(source: &str) -> Module {
    parse(&tokenize(source).unwrap()).unwrap()
}

fn parse_err(source: &str) -> ParseError {
    parse(&tokenize(source).unwrap()).unwrap_err()
}

fn expr(source: &str) -> Expr {
    parse_expression(&tokenize(source).unwrap()).unwrap()
}

fn only_fn(module: &Module) -> &FnDecl {
    match &module.items[..] {
        [Item::Function(f)] => f,
        other => panic!("expected one function, got {:?}", other),
    }
}

#[test]
fn test_precedence_round_trips_through_display() {
    assert_eq!(expr("1 + 2 * 3").to_string(), "1 + 2 * 3");
    assert_eq!(expr("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
    assert_eq!(expr("a - (b - c)").to_string(), "a - (b - c)");
    assert_eq!(expr("a - b - c").to_string(), "a - b - c");
    assert_eq!(expr("!x && y || z").to_string(), "!x && y || z");
    assert_eq!(expr("-v[0]").to_string(), "-v[0]");
    assert_eq!(expr("v.len() < 3").to_string(), "v.len() < 3");
}

#[test]
fn test_left_associative_multiplication() {
    let e = expr("i * i * j");
    match e.kind {
        ExprKind::Binary { op, lhs, .. } => {
            assert_eq!(op, BinOp::Mul);
            assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_port_and_list_expressions() {
    let e = expr("@port(squares)");
    assert!(matches!(e.kind, ExprKind::Port(_)));
    assert_eq!(e.to_string(), "@port(squares)");
    assert_eq!(expr("[1, 2, 3]").to_string(), "[1, 2, 3]");
    assert_eq!(expr("[]").to_string(), "[]");
}

#[test]
fn test_mauto_function_with_meta_statements() {
    let module = parse_src(
        r#"
        @mauto fn counter(): int {
            let i = 100;
            let r = i * i * j;
            @meta ++j;
            return r;
        }
        "#,
    );
    let f = only_fn(&module);
    assert_eq!(f.kind, FnKind::Mauto);
    assert_eq!(f.ret, Some(TypeDesc::Int));
    assert_eq!(f.body.stmts.len(), 4);
    match &f.body.stmts[2].kind {
        StmtKind::Meta(inner) => match &inner.kind {
            StmtKind::Assign { target, value } => {
                assert_eq!(target.to_string(), "j");
                assert_eq!(value.to_string(), "j + 1");
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_function_kinds_and_const_params() {
    let module = parse_src(
        "consteval fn f(x: int): int { return x; }\n\
         constexpr fn g(a: int, b: [int]) { }\n\
         @mauto fn h(const n: int) { }",
    );
    let kinds: Vec<_> = module
        .items
        .iter()
        .map(|item| match item {
            Item::Function(f) => (f.kind, f.params.iter().map(|p| p.is_const).collect::<Vec<_>>()),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            (FnKind::Consteval, vec![false]),
            (FnKind::Constexpr, vec![false, false]),
            (FnKind::Mauto, vec![true]),
        ]
    );
    if let Item::Function(g) = &module.items[1] {
        assert_eq!(g.params[1].ty, TypeDesc::vec_of(TypeDesc::Int));
        assert_eq!(g.ret, None);
    }
}

#[test]
fn test_globals_and_file_scope_meta() {
    let module = parse_src(
        "@meta let squares: [int] = [];\n\
         @meta for i in 0..5 { squares.push(i * i); }\n\
         let c = init(1);",
    );
    assert_eq!(module.items.len(), 3);
    assert!(matches!(&module.items[0], Item::Meta(Stmt { kind: StmtKind::Meta(_), .. })));
    match &module.items[2] {
        Item::Global(g) => {
            assert_eq!(g.name, "c");
            assert_eq!(g.init.to_string(), "init(1)");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_statement_forms() {
    let module = parse_src(
        r#"
        fn main() {
            let v = [1, 2];
            v[0] = 5;
            v[1] += 2;
            --k;
            if v.len() == 2 { print("two"); } else if k { } else { }
            while k < 3 { k += 1; }
            for i in 0..v.len() { print(v[i]); }
            { return; }
        }
        "#,
    );
    let body = &only_fn(&module).body.stmts;
    assert!(matches!(body[1].kind, StmtKind::Assign { .. }));
    match &body[2].kind {
        StmtKind::Assign { target, value } => {
            assert_eq!(target.to_string(), "v[1]");
            assert_eq!(value.to_string(), "v[1] + 2");
        }
        other => panic!("unexpected {:?}", other),
    }
    match &body[3].kind {
        StmtKind::Assign { value, .. } => assert_eq!(value.to_string(), "k - 1"),
        other => panic!("unexpected {:?}", other),
    }
    match &body[4].kind {
        StmtKind::If { else_block, .. } => {
            let else_block = else_block.as_ref().unwrap();
            assert!(matches!(else_block.stmts[0].kind, StmtKind::If { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(body[5].kind, StmtKind::While { .. }));
    match &body[6].kind {
        StmtKind::For { var, end, .. } => {
            assert_eq!(var, "i");
            assert_eq!(end.to_string(), "v.len()");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(body[7].kind, StmtKind::Block(_)));
}

#[test]
fn test_collect_assigned_sees_nested_writes() {
    let module = parse_src("fn f() { while true { if c { x = 1; } v.push(2); @meta ++n; } }");
    let mut names = Vec::new();
    only_fn(&module).body.collect_assigned(&mut names);
    assert_eq!(names, vec!["x", "v", "n"]);
}

#[test]
fn test_statement_spans() {
    let module = parse_src("fn main() {\n    let x = 1;\n}");
    let stmt = &only_fn(&module).body.stmts[0];
    assert_eq!(stmt.span.start.line, 2);
    assert_eq!(stmt.span.start.column, 5);
    assert_eq!(stmt.span.end.column, 15);
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        parse_err("fn main() { let = 1; }"),
        ParseError::ExpectedIdentifier { .. }
    ));
    assert!(matches!(
        parse_err("fn main() { 1 = 2; }"),
        ParseError::InvalidAssignTarget { .. }
    ));
    assert!(matches!(
        parse_err("fn main() { print(1) }"),
        ParseError::ExpectedToken {
            expected: TokenKind::Semicolon,
            ..
        }
    ));
    assert!(matches!(
        parse_err("fn main() {"),
        ParseError::UnterminatedBlock { .. }
    ));
    assert!(matches!(
        parse_err("fn f(x: float) { }"),
        ParseError::UnknownType { .. }
    ));
    assert!(matches!(parse_err("return 1;"), ParseError::ExpectedItem { .. }));
    assert!(matches!(
        parse_err("fn main() { let x = ; }"),
        ParseError::ExpectedExpression { .. }
    ));
}
