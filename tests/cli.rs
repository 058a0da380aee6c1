use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const POLICY: &str = "define group Admins as 'ocid1.group.oc1..admins'\n\
                      allow group Admins to manage all-resources in tenancy\n";

const BROKEN: &str = "allow group A to read x in tenancy\nallow group B to read ~ in tenancy\n";

fn write_input(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write input");
    path
}

#[test]
fn parses_policy_file_to_json() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "policy.txt", POLICY);

    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""schema_version":"1.0""#))
        .stdout(predicate::str::contains(r#""kind":"allow""#))
        .stdout(predicate::str::contains(
            r#""diagnostics":{"errors":[],"error_count":0}"#,
        ));
}

#[test]
fn reads_stdin_and_strips_bom() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("-")
        .arg("--error-mode")
        .arg("raise")
        .write_stdin(format!("\u{feff}{POLICY}"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""kind":"define""#))
        .stdout(predicate::str::contains("diagnostics").not());
}

#[test]
fn define_subs_flag_resolves_subjects() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--define-subs").write_stdin(POLICY);
    cmd.assert().success().stdout(predicate::str::contains(
        r#""subject":{"type":"group-id","values":[{"label":"ocid1.group.oc1..admins"}]}"#,
    ));
}

#[test]
fn report_mode_errors_exit_one() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.write_stdin(BROKEN);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains(r#""error_count":1"#))
        .stdout(predicate::str::contains(r#""statement_index":2"#))
        .stderr(predicate::str::contains("1 syntax error(s) detected"));
}

#[test]
fn raise_mode_errors_exit_one_without_output() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--error-mode", "raise"]).write_stdin(BROKEN);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("syntax error at line 2, col 22."));
}

#[test]
fn ignore_mode_always_succeeds() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--error-mode", "ignore"]).write_stdin(BROKEN);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            r#""subject":{"type":"group","values":[{"label":"B"}]}"#,
        ))
        .stdout(predicate::str::contains(r#""resources":{"type":"unknown","values":[]}"#));
}

#[test]
fn unknown_error_mode_is_a_usage_error() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--error-mode", "loud"]).write_stdin(POLICY);
    cmd.assert().code(2);
}

#[test]
fn jsonl_prints_one_statement_per_line() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--jsonl").write_stdin(POLICY);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(r#"{"kind":"define""#));
    assert!(lines[1].starts_with(r#"{"kind":"allow""#));
}

#[test]
fn yaml_output() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--yaml", "--error-mode", "raise"]).write_stdin(POLICY);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("schema_version: '1.0'"))
        .stdout(predicate::str::contains("kind: allow"));
}

#[test]
fn symbols_prints_nested_table() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--symbols").write_stdin(POLICY);
    cmd.assert()
        .success()
        .stdout(r#"{"group":{"Admins":"ocid1.group.oc1..admins"}}"#.to_string() + "\n");
}

#[test]
fn chunked_symbols_match() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--chunked", "--symbols"]).write_stdin(POLICY);
    cmd.assert()
        .success()
        .stdout(r#"{"group":{"Admins":"ocid1.group.oc1..admins"}}"#.to_string() + "\n");
}

#[test]
fn chunked_jsonl_streams_statements() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--chunked", "--jsonl"]).write_stdin(POLICY);
    let output = cmd.assert().success().get_output().stdout.clone();
    assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
}

#[test]
fn chunked_report_mode_aggregates_errors() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--chunked").write_stdin(BROKEN);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains(r#""error_count":1"#))
        .stderr(predicate::str::contains("1 syntax error(s) detected"));
}

#[test]
fn dynamic_group_rules() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--dg", "--nested-simplify"])
        .write_stdin("ALL { ALL { a = '1', b = '2' } }\nANY { c = '3' }\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""rules":[{"level":1"#))
        .stdout(predicate::str::contains(r#""mode":"any""#));
}

#[test]
fn dynamic_group_and_policy_conflict() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--dynamic-group", "--policy"]).write_stdin(POLICY);
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Choose only one of --dynamic-group or --policy.",
        ));
}

#[test]
fn dynamic_group_rejects_chunked_and_symbols() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--dg", "--chunked"]).write_stdin("a = '1'");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("--chunked is not supported"));

    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.args(["--dg", "--symbols"]).write_stdin("a = '1'");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("--symbols is not supported"));
}

#[test]
fn diagnostics_file_is_written() {
    let dir = TempDir::new().unwrap();
    let diagnostics = dir.path().join("diagnostics.json");

    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--diagnostics-file")
        .arg(&diagnostics)
        .write_stdin(BROKEN);
    cmd.assert().code(1);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&diagnostics).unwrap()).unwrap();
    assert_eq!(written["error_count"], 1);
    assert_eq!(written["errors"][0]["offending"], "~");
    assert_eq!(written["errors"][0]["line"], 2);
}

#[test]
fn config_file_sets_defaults() {
    let dir = TempDir::new().unwrap();
    let config = write_input(
        &dir,
        "parser.toml",
        "[policy]\nerror_mode = \"ignore\"\ndefault_tenancy_alias = \"Root\"\n",
    );

    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--config").arg(&config).write_stdin(BROKEN);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""location":{"type":"tenancy","values":["Root"]}"#))
        .stdout(predicate::str::contains("diagnostics").not());
}

#[test]
fn tokens_flag_lists_lexemes() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("--tokens").write_stdin("allow group A");
    cmd.assert().success().stdout(predicate::str::contains(
        r#"{"kind":"keyword","text":"allow","start":0,"end":5,"line":1,"column":0}"#,
    ));
}

#[test]
fn version_flag() {
    let mut cmd = cargo_bin_cmd!("oci-lexer-parse");
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("oci-lexer-parse "));
}
