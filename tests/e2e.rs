//! End-to-end tests driving the kiln binary on trace documents.

use std::process::Command;

fn run_kiln(doc: &str, args: &[&str]) -> (String, String, bool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    std::fs::write(&path, doc).unwrap();

    let mut full_args: Vec<&str> = vec![args[0], path.to_str().unwrap()];
    full_args.extend(&args[1..]);

    let output = Command::new(env!("CARGO_BIN_EXE_kiln"))
        .args(&full_args)
        .output()
        .expect("failed to execute kiln");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const ADD_DOC: &str = r#"{
    "inputs": [{"var": 0, "lane": "int"}, {"var": 1, "lane": "int"}],
    "ops": [
        {"op": "int_add", "args": [{"var": 0}, {"var": 1}],
         "result": {"var": 2, "lane": "int"}},
        {"op": "fail", "args": [{"var": 2}]}
    ]
}"#;

#[test]
fn test_run_add_trace() {
    let (stdout, stderr, success) = run_kiln(ADD_DOC, &["run", "--ints", "3,4"]);
    assert!(success, "run should succeed, stderr:\n{}", stderr);
    assert_eq!(stdout, "ints: [7, 4]\nobjs: []\n");
}

#[test]
fn test_run_with_negative_inputs() {
    let (stdout, _, success) = run_kiln(ADD_DOC, &["run", "--ints", "-10,4"]);
    assert!(success);
    assert!(stdout.starts_with("ints: [-6"), "stdout was: {}", stdout);
}

#[test]
fn test_trace_jit_logs_to_stderr() {
    let (_, stderr, success) = run_kiln(ADD_DOC, &["run", "--ints", "1,2", "--trace-jit"]);
    assert!(success);
    assert!(stderr.contains("[JIT] Compiled loop 'trace'"), "stderr was: {}", stderr);
}

#[test]
fn test_dump_shows_disassembly() {
    let (stdout, stderr, success) = run_kiln(ADD_DOC, &["dump"]);
    assert!(success, "dump should succeed, stderr:\n{}", stderr);
    assert!(stdout.contains("method 'trace'"), "stdout was: {}", stdout);
    assert!(stdout.contains("add"));
    assert!(stdout.contains("stelem"));
    assert!(stdout.contains("ret"));
}

#[test]
fn test_unsupported_opcode_fails_cleanly() {
    let doc = r#"{
        "inputs": [{"var": 0, "lane": "int"}],
        "ops": [{"op": "guard_true", "args": [{"var": 0}]}]
    }"#;
    let (_, stderr, success) = run_kiln(doc, &["run", "--ints", "1"]);
    assert!(!success, "compilation of a guard should fail");
    assert!(stderr.contains("not supported"), "stderr was: {}", stderr);
}

#[test]
fn test_unknown_opcode_fails_cleanly() {
    let doc = r#"{"ops": [{"op": "int_frobnicate"}]}"#;
    let (_, stderr, success) = run_kiln(doc, &["run"]);
    assert!(!success);
    assert!(stderr.contains("unknown opcode"), "stderr was: {}", stderr);
}
