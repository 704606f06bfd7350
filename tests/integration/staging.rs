//! End-to-end staging through the public API

use metastage::frontend::Compiler;
use metastage::staging::StageError;
use metastage::vm::RuntimeError;
use metastage::{run, run_with_config, CompileError, StageConfig};
use proptest::prelude::*;

fn stage_error(
    config: StageConfig,
    source: &str,
) -> StageError {
    let mut compiler = Compiler::with_config(config);
    match compiler.compile(source) {
        Err(CompileError::Stage(err)) => err,
        Err(other) => panic!("expected a staging error, got {}", other),
        Ok(translation) => panic!("expected an error, got:\n{}", translation.program),
    }
}

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_meta_state_accumulates_in_statement_order() {
    let output = run(r#"
        @meta let log: [str] = ["start"];
        @meta log.push("first");

        fn main() {
            @meta log.push("second");
            print(log.len());
        }

        @meta print(log);
    "#)
    .unwrap();
    assert_eq!(output.compile_time, lines(&[r#"["start", "first", "second"]"#]));
    assert_eq!(output.runtime, lines(&["3"]));
}

#[test]
fn test_meta_while_unrolls_into_object_statements() {
    let output = run(r#"
        fn main() {
            @meta let n = 1;
            @meta while n < 100 {
                print(n);
                n = n * 3;
            }
        }
    "#)
    .unwrap();
    assert!(output.compile_time.is_empty());
    assert_eq!(output.runtime, lines(&["1", "3", "9", "27", "81"]));
}

#[test]
fn test_meta_if_keeps_only_the_taken_branch() {
    let mut compiler = Compiler::new();
    let translation = compiler
        .compile(
            r#"
            @meta let verbose = false;
            fn main() {
                @meta if verbose { print("debug build"); } else { print("release build"); }
            }
            "#,
        )
        .unwrap();
    let emitted = translation.program.to_string();
    assert!(emitted.contains("print(\"release build\");"), "{}", emitted);
    assert!(!emitted.contains("debug build"), "{}", emitted);
}

#[test]
fn test_stage_error_categories() {
    let cases = [
        (
            "fn main() { @meta for i in 0..3 { } print(i); }",
            "ScopeViolation",
        ),
        (
            "consteval fn id(p: int): int { return p; }\n\
             fn wrap(q: int): int { return id(q); }",
            "ConstancyViolation",
        ),
        (
            "@meta let words: [str] = [\"a\"];\nfn main() { let w = words; }",
            "NonLiteralPortError",
        ),
        ("fn main() { print(missing); }", "UndefinedName"),
        ("fn f() {}\nfn f() {}", "DeclarationError"),
        ("@meta let x = 1 / 0;", "EvaluationError"),
    ];
    for (source, category) in cases {
        let err = stage_error(StageConfig::default(), source);
        assert_eq!(err.category(), category, "{}", source);
    }
}

#[test]
fn test_recursion_limit_is_configurable() {
    let mut config = StageConfig::default();
    config.translation.max_recursion_depth = 8;
    let err = stage_error(
        config,
        "consteval fn down(n: int): int { return down(n + 1); }\n\
         fn main() { print(down(0)); }",
    );
    assert!(matches!(err, StageError::RecursionTooDeep { depth: 8, .. }));
}

#[test]
fn test_run_time_errors_are_not_staging_errors() {
    let err = run("fn main() { let z = 0; print(1 / z); }").unwrap_err();
    assert_eq!(
        err.downcast_ref::<RuntimeError>(),
        Some(&RuntimeError::DivisionByZero)
    );
    assert!(err.downcast_ref::<CompileError>().is_none());
}

#[test]
fn test_echo_setting_does_not_change_captured_output() {
    let mut config = StageConfig::default();
    config.translation.echo_meta_output = false;
    let output = run_with_config("@meta print(6 * 7);", &config).unwrap();
    assert_eq!(output.compile_time, lines(&["42"]));
}

#[test]
fn test_constexpr_output_happens_at_run_time() {
    let output = run(
        "constexpr fn p(a: int): int { print(a); return a; }\n\
         fn main() { let x = p(1); print(x); }",
    )
    .unwrap();
    assert!(output.compile_time.is_empty());
    assert_eq!(output.runtime, lines(&["1", "1"]));
}

#[test]
fn test_constexpr_failure_in_dead_code_is_not_fatal() {
    let output = run(
        "constexpr fn d(a: int): int { return 10 / a; }\n\
         fn main() { if false { print(d(0)); } print(1); }",
    )
    .unwrap();
    assert_eq!(output.runtime, lines(&["1"]));
}

#[test]
fn test_nested_meta_loop_leaves_outer_local_alone() {
    let output = run("fn main() { let i = 7; if true { @meta for i in 0..2 { } print(i); } }")
        .unwrap();
    assert_eq!(output.runtime, lines(&["7"]));
}

#[test]
fn test_ported_aggregate_cannot_change_afterwards() {
    let err = stage_error(
        StageConfig::default(),
        "@meta let v: [int] = [1];\n\
         fn main() { let a = @port(v); @meta v.push(2); print(a.len()); }",
    );
    assert_eq!(err.category(), "ScopeViolation");

    // each expansion is its own evaluation
    let output = run(
        "@meta let v: [int] = [];\n\
         @mauto fn snapshot(): int { @meta v.push(v.len()); let w = @port(v); return w.len(); }\n\
         fn main() { print(snapshot()); print(snapshot()); }",
    )
    .unwrap();
    assert_eq!(output.runtime, lines(&["1", "2"]));
}

fn list(values: &[i64]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

proptest! {
    #[test]
    fn prop_ported_vector_matches_meta_value(values in prop::collection::vec(-1000i64..1000, 1..12)) {
        let source = format!(
            "@meta let v: [int] = [{}];\n\
             fn main() {{\n\
                 let w = @port(v);\n\
                 for i in 0..w.len() {{ print(w[i]); }}\n\
                 w[0] = 0;\n\
                 print(v[0]);\n\
             }}",
            list(&values)
        );
        let output = run(&source).unwrap();
        let mut expected: Vec<String> = values.iter().map(ToString::to_string).collect();
        expected.push(values[0].to_string());
        prop_assert_eq!(output.runtime, expected);
    }

    #[test]
    fn prop_each_expansion_sees_the_next_counter_value(calls in 1usize..16) {
        let mut source = String::from(
            "@meta let j = 0;\n\
             @mauto fn f(i: int): int { @meta let k = j; @meta ++j; return i * k; }\n\
             fn main() {\n",
        );
        for _ in 0..calls {
            source.push_str("    print(f(3));\n");
        }
        source.push_str("}\n");

        let output = run(&source).unwrap();
        let expected: Vec<String> = (0..calls).map(|k| (3 * k).to_string()).collect();
        prop_assert_eq!(output.runtime, expected);
    }
}
