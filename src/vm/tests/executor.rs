//! VM executor tests

use crate::frontend::lexer::tokenize;
use crate::frontend::parser::parse;
use crate::middle::ResidualProgram;
use crate::runtime::Value;
use crate::staging::{translate, StageStore};
use crate::util::config::TranslationConfig;
use crate::vm::{RuntimeError, VMConfig, VM};

fn residual(source: &str) -> ResidualProgram {
    let module = parse(&tokenize(source).unwrap()).unwrap();
    let mut store = StageStore::new();
    translate(&module, &mut store, &TranslationConfig::default())
        .unwrap()
        .program
}

fn run(source: &str) -> Result<Vec<String>, RuntimeError> {
    let program = residual(source);
    let mut vm = VM::new(&program);
    vm.run()?;
    Ok(vm.into_output())
}

#[test]
fn test_counter_program_output() {
    let output = run(
        "@meta let j = 0;\n\
         @mauto fn f(i: int): int { @meta let k = j; @meta ++j; return i * i * k; }\n\
         fn main() { let x = f(100); let y = f(100); print(x); print(y); }",
    )
    .unwrap();
    assert_eq!(output, vec!["0", "10000"]);
}

#[test]
fn test_ported_vector_is_an_independent_copy() {
    let output = run(
        "@meta let ints: [int] = [1, 2, 3];\n\
         fn main() {\n\
             let a = @port(ints);\n\
             let b = a;\n\
             b[0] = 10;\n\
             b.push(4);\n\
             print(a);\n\
             print(b);\n\
             print(@port(ints));\n\
         }",
    )
    .unwrap();
    assert_eq!(output, vec!["[1, 2, 3]", "[10, 2, 3, 4]", "[1, 2, 3]"]);
}

#[test]
fn test_globals_initialized_before_main() {
    let output = run(
        "let c = hello();\n\
         fn hello(): int { print(\"Hello World\"); return 7; }\n\
         fn main() { print(c + 1); }",
    )
    .unwrap();
    assert_eq!(output, vec!["Hello World", "8"]);
}

#[test]
fn test_control_flow_and_recursion() {
    let output = run(
        "fn fact(n: int): int { if n <= 1 { return 1; } return n * fact(n - 1); }\n\
         fn main() {\n\
             let total = 0;\n\
             for i in 0..4 { total += i; }\n\
             while total < 10 { ++total; }\n\
             print(total, fact(5));\n\
         }",
    )
    .unwrap();
    assert_eq!(output, vec!["10 120"]);
}

#[test]
fn test_mauto_block_expression() {
    let output = run(
        "@mauto fn inc(x: int): int { x = x + 1; return x; }\n\
         fn main() { let a = inc(5); print(a); }",
    )
    .unwrap();
    assert_eq!(output, vec!["6"]);
}

#[test]
fn test_runtime_errors() {
    assert_eq!(
        run("fn main() { let z = 0; print(1 / z); }"),
        Err(RuntimeError::DivisionByZero)
    );
    assert!(matches!(
        run("fn main() { let v = [1]; print(v[2]); }"),
        Err(RuntimeError::IndexOutOfBounds { index: 2, len: 1 })
    ));

    let program = residual("fn down(n: int): int { return down(n + 1); }\nfn main() { down(0); }");
    let mut vm = VM::with_config(
        &program,
        VMConfig {
            max_call_depth: 32,
            echo_output: false,
        },
    );
    assert_eq!(vm.run(), Err(RuntimeError::StackOverflow(32)));
}

#[test]
fn test_call_entry_point() {
    let program = residual("fn twice(n: int): int { return n * 2; }");
    let mut vm = VM::new(&program);
    assert_eq!(vm.run(), Ok(Value::Unit));
    assert_eq!(vm.call("twice", vec![Value::Int(21)]), Ok(Value::Int(42)));
    assert!(matches!(
        vm.call("missing", vec![]),
        Err(RuntimeError::UndefinedFunction(_))
    ));
}
