//! Integration tests for the `metastage` binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const COUNTER: &str = r#"@meta let j = 0;

@mauto fn f(i: int): int {
    @meta let k = j;
    @meta ++j;
    return i * i * k;
}

fn main() {
    let x = f(100);
    let y = f(100);
    print(x);
    print(y);
}
"#;

/// Helper function to create a test file
fn create_test_file(
    dir: &TempDir,
    name: &str,
    content: &str,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Run the binary inside `dir` so no stray config file is picked up
fn metastage(
    dir: &Path,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_metastage"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_run_prints_compile_time_output_first() {
    let dir = TempDir::new().unwrap();
    create_test_file(
        &dir,
        "odr.stg",
        "let c = hello();\n\
         fn hello(): int { print(\"init\"); return 0; }\n\
         fn f() { c; }\n\
         @meta f();\n\
         @meta print(\"translated\");\n\
         fn main() { f(); print(\"running\"); }\n",
    );

    let output = metastage(dir.path(), &["run", "odr.stg"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "init\ntranslated\ninit\nrunning\n");
}

#[test]
fn test_eval() {
    let dir = TempDir::new().unwrap();
    let output = metastage(
        dir.path(),
        &["eval", "@meta let n = 6; fn main() { print(n * 7); }"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "42\n");
}

#[test]
fn test_check_with_store_snapshot() {
    let dir = TempDir::new().unwrap();
    create_test_file(&dir, "counter.stg", COUNTER);

    let output = metastage(dir.path(), &["check", "counter.stg", "--store"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Check passed!"));

    let snapshot: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(snapshot["j"]["value"], "2");
}

#[test]
fn test_emit_residual_program() {
    let dir = TempDir::new().unwrap();
    create_test_file(&dir, "counter.stg", COUNTER);

    let output = metastage(dir.path(), &["emit", "counter.stg"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("let x = 100 * 100 * 0;"), "{}", text);
    assert!(text.contains("let y = 100 * 100 * 1;"), "{}", text);
    assert!(!text.contains("@meta"), "{}", text);

    let output = metastage(dir.path(), &["emit", "counter.stg", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let program: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(program["functions"][0]["name"], "main");
}

#[test]
fn test_diagnostic_on_failure() {
    let dir = TempDir::new().unwrap();
    create_test_file(
        &dir,
        "reject.stg",
        "consteval fn f(p: int): int { return p; }\n\
         fn h(x: int) {\n\
             let y = f(x);\n\
         }\n",
    );

    let output = metastage(dir.path(), &["--no-color", "check", "reject.stg"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("error[E0302] ConstancyViolation"), "{}", err);
    assert!(err.contains("reject.stg:3:"), "{}", err);
    assert!(err.contains("let y = f(x);"), "{}", err);
}

#[test]
fn test_config_file_limits_unrolling() {
    let dir = TempDir::new().unwrap();
    create_test_file(&dir, "metastage.toml", "[translation]\nmax_unroll = 3\n");
    create_test_file(
        &dir,
        "loop.stg",
        "fn main() { @meta for i in 0..10 { print(i); } }\n",
    );

    let output = metastage(dir.path(), &["--no-color", "run", "loop.stg"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("EvaluationError"), "{}", stderr(&output));

    let config = dir.path().join("metastage.toml");
    fs::write(&config, "[translation]\nmax_unroll = 50\n").unwrap();
    let output = metastage(
        dir.path(),
        &["--config", config.to_str().unwrap(), "run", "loop.stg"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 10);
}

#[test]
fn test_run_time_failure_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    create_test_file(&dir, "div.stg", "fn main() { let z = 0; print(10 / z); }\n");
    let output = metastage(dir.path(), &["run", "div.stg"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Division by zero"), "{}", stderr(&output));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = metastage(dir.path(), &["run", "nope.stg"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read file"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = metastage(dir.path(), &["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("metastage "));
}
