//! spec.md §6 "CLI surface": runs the built `humanlogica` binary end to end
//! against files on disk, the way the teacher's binary-level tests exercise
//! the process boundary rather than the library API.

use std::io::Write;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_humanlogica"))
}

fn write_source(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp source file");
    file.write_all(contents.as_bytes()).expect("write temp source file");
    file
}

#[test]
fn running_a_file_prints_its_speak_output() {
    let file = write_source("speaker Jared\nas Jared { speak \"Hello, World!\" }");
    let output = bin().arg(file.path()).output().expect("spawn humanlogica");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim_end(), "  [Jared] Hello, World!");
}

#[test]
fn check_flag_prints_ok_for_a_valid_program() {
    let file = write_source("speaker Jared\nas Jared { speak \"hi\" }");
    let output = bin().arg("--check").arg(file.path()).output().expect("spawn humanlogica");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("OK"));
}

#[test]
fn check_flag_fails_with_nonzero_exit_on_an_axiom_violation() {
    let file = write_source("speaker Jared\nspeaker Maria\nas Maria { let Jared.grade = 100 }");
    let output = bin().arg("--check").arg(file.path()).output().expect("spawn humanlogica");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Axiom 8"));
}

#[test]
fn tokens_flag_prints_one_line_per_token() {
    let file = write_source("speaker Jared");
    let output = bin().arg("--tokens").arg(file.path()).output().expect("spawn humanlogica");
    assert!(output.status.success());
    let lines: Vec<_> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    assert!(lines.len() >= 2, "expected at least 'speaker' and 'Jared' tokens, got {lines:?}");
}

#[test]
fn ast_flag_prints_a_debug_rendering_of_the_program() {
    let file = write_source("speaker Jared\nas Jared { speak \"hi\" }");
    let output = bin().arg("--ast").arg(file.path()).output().expect("spawn humanlogica");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Program"));
}

#[test]
fn a_missing_file_fails_cleanly_without_panicking() {
    let output = bin().arg("/nonexistent/path/does-not-exist.lg").output().expect("spawn humanlogica");
    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}

#[test]
fn check_and_tokens_together_are_rejected_by_clap() {
    let file = write_source("speaker Jared");
    let output = bin()
        .arg("--check")
        .arg("--tokens")
        .arg(file.path())
        .output()
        .expect("spawn humanlogica");
    assert!(!output.status.success());
}
