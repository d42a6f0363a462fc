//! Tests that run the `wsi-dzi` binary.

use std::path::Path;
use std::process::{Command, Output};

use super::test_utils::SlideBuilder;

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wsi-dzi"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run wsi-dzi")
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_convert_prints_progress() {
    let dir = tempfile::tempdir().unwrap();
    SlideBuilder::aperio().write_to(dir.path(), "slide.svs");

    let output = run(&["convert", "slide.svs", "out", "demo"], dir.path());
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Opening slide: slide.svs");
    assert_eq!(lines[1], "Slide dimensions: (1000, 800)");
    assert_eq!(lines[2], "Levels: 2");
    assert_eq!(lines[3], "Generating tiles for 11 levels...");
    assert_eq!(lines[4], "  Level 0: 1x1 tiles");
    assert_eq!(lines[14], "  Level 10: 4x4 tiles");
    assert_eq!(lines[15], "SUCCESS: Created out/demo.dzi");
    assert_eq!(lines.len(), 16);

    assert!(dir.path().join("out/demo.dzi").is_file());
    assert!(dir.path().join("out/demo_files/10/3_3.jpeg").is_file());
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&["convert", "missing.svs", "out", "demo"], dir.path());
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("ERROR: "), "stderr: {}", stderr);
    assert!(stderr.contains("missing.svs"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_too_few_arguments() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&["convert", "slide.svs", "out"], dir.path());
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
    assert_eq!(entries(dir.path()), 0);
}

#[test]
fn test_no_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(entries(dir.path()), 0);
}

#[test]
fn test_help_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["--help"], dir.path());
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("convert"));
    assert!(stdout.contains("serve"));
}

#[test]
fn test_invalid_block_size() {
    let dir = tempfile::tempdir().unwrap();
    SlideBuilder::generic().write_to(dir.path(), "scan.tif");

    let output = run(
        &["convert", "scan.tif", "out", "scan", "--block-size", "10"],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("ERROR: block_size"));
    assert!(!dir.path().join("out").exists());
}
