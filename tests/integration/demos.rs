//! The programs under `demos/`

use metastage::{run_file, CompileError, RunOutput};
use std::path::PathBuf;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}

fn run_demo(name: &str) -> RunOutput {
    match run_file(&demo(name)) {
        Ok(output) => output,
        Err(err) => panic!("{} failed: {:#}", name, err),
    }
}

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_mauto_demo() {
    let output = run_demo("mauto.stg");
    assert!(output.compile_time.is_empty());
    assert_eq!(output.runtime, lines(&["0", "10000"]));
}

#[test]
fn test_port_a_vector_demo() {
    let output = run_demo("port_a_vector.stg");
    assert_eq!(
        output.runtime,
        lines(&["1", "1", "2", "3", "4", "1", "2", "3", "4"])
    );
}

#[test]
fn test_run_and_compile_time_demo() {
    let output = run_demo("run_and_compile_time.stg");
    assert_eq!(output.compile_time, lines(&["Hello World"]));
    assert_eq!(output.runtime, lines(&["Hello World"]));
}

#[test]
fn test_consteval_demo() {
    let output = run_demo("consteval.stg");
    assert_eq!(output.runtime, lines(&["42 42 42 3"]));
}

#[test]
fn test_constexpr_demo() {
    let output = run_demo("constexpr.stg");
    assert_eq!(output.compile_time, lines(&["[0, 0, 0] true"]));
    assert_eq!(output.runtime, lines(&["[0, 0, 0] false", "[0, 0, 0]"]));
}

#[test]
fn test_consteval_reject_demo() {
    let err = run_file(&demo("consteval_reject.stg")).unwrap_err();
    let compile = err
        .downcast_ref::<CompileError>()
        .expect("a compile error");
    assert_eq!(compile.category(), "ConstancyViolation");
    assert_eq!(compile.span().start.line, 8);
}
