// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::cli::Cli;
use super::{run_with_cli, MAX_PASSES};
use crate::core::error::{AsmErrorKind, Severity};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn create_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("segforge-test-{label}-{}-{nanos}", process::id()));
    fs::create_dir_all(&dir).expect("Create temp dir");
    dir
}

fn write_blob(path: &Path, contents: &[u8]) {
    fs::write(path, contents).expect("Write test file");
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn placement(addr: &str, path: &Path) -> String {
    format!("{addr}={}", path.to_string_lossy())
}

#[test]
fn run_with_cli_places_files_and_fills_gaps() {
    let dir = create_temp_dir("plain");
    let a = dir.join("a.bin");
    let b = dir.join("b.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[1, 2, 3]);
    write_blob(&b, &[4]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        placement("1005", &b),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert!(report.diagnostics().is_empty());
    assert_eq!(report.summary().start, 0x1000);
    assert_eq!(report.summary().len, 6);
    assert_eq!(report.summary().passes, 1);
    assert_eq!(report.summary().format, "plain");
    assert_eq!(fs::read(&out).expect("output"), vec![1, 2, 3, 0, 0, 4]);
}

#[test]
fn run_with_cli_fill_runs_a_second_pass() {
    let dir = create_temp_dir("fill");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0xaa]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("0800", &a),
        "0803=+1".to_string(),
        "--fill".to_string(),
        "ea".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert_eq!(report.summary().passes, 2);
    assert!(report.diagnostics().is_empty());
    assert_eq!(fs::read(&out).expect("output"), vec![0xaa, 0xea, 0xea, 0xea]);
}

#[test]
fn run_with_cli_writes_cbm_and_apple_headers() {
    let dir = create_temp_dir("headers");
    let a = dir.join("a.bin");
    write_blob(&a, &[1, 2, 3]);

    for (format, expected) in [
        ("cbm", vec![0x01, 0x08, 1, 2, 3]),
        ("apple", vec![0x01, 0x08, 0x03, 0x00, 1, 2, 3]),
    ] {
        let out = dir.join(format!("out.{format}"));
        let cli = Cli::parse_from([
            "segforge".to_string(),
            placement("$0801", &a),
            "-f".to_string(),
            format.to_string(),
            "-o".to_string(),
            arg(&out),
        ]);
        let report = run_with_cli(&cli).expect("run");
        assert_eq!(report.summary().format, format);
        assert_eq!(fs::read(&out).expect("output"), expected, "format {format}");
    }
}

#[test]
fn run_with_cli_writes_intel_hex() {
    let dir = create_temp_dir("hex");
    let a = dir.join("a.bin");
    let out = dir.join("out.hex");
    write_blob(&a, &[1, 2, 3]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        "-f".to_string(),
        "HEX".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    run_with_cli(&cli).expect("run");
    let text = fs::read_to_string(&out).expect("output");
    assert_eq!(text, ":03100000010203E7\n:00000001FF\n");
}

#[test]
fn run_with_cli_applies_xor_mask() {
    let dir = create_temp_dir("xor");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0x00, 0x41]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("2000", &a),
        "--xor".to_string(),
        "80".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    run_with_cli(&cli).expect("run");
    assert_eq!(fs::read(&out).expect("output"), vec![0x80, 0xc1]);
}

#[test]
fn run_with_cli_warns_once_about_overlapping_segments() {
    let dir = create_temp_dir("overlap");
    let a = dir.join("a.bin");
    let b = dir.join("b.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0x11; 16]);
    write_blob(&b, &[0x22; 4]);

    let first = placement("1000", &a);
    let second = placement("1008", &b);
    let cli = Cli::parse_from([
        "segforge".to_string(),
        first,
        second.clone(),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert_eq!(report.warning_count(), 1);
    let diag = &report.diagnostics()[0];
    assert_eq!(diag.kind(), AsmErrorKind::Segment);
    assert_eq!(diag.line(), 2);
    assert_eq!(
        diag.message(),
        "Segment starts inside another one, overwriting it."
    );
    assert_eq!(diag.notes(), [format!("in placement '{second}'")]);

    let bytes = fs::read(&out).expect("output");
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[8..12], &[0x22; 4]);
    assert_eq!(&bytes[12..], &[0x11; 4]);
}

#[test]
fn run_with_cli_reports_each_segment_a_placement_runs_into() {
    let dir = create_temp_dir("cross-two");
    let small = dir.join("small.bin");
    let big = dir.join("big.bin");
    let out = dir.join("out.bin");
    write_blob(&small, &[0x11; 4]);
    write_blob(&big, &[0x22; 0x40]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &small),
        placement("1010", &small),
        placement("0ff0", &big),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    let reported: Vec<(u32, &str)> = report
        .diagnostics()
        .iter()
        .map(|diag| (diag.line(), diag.message()))
        .collect();
    assert_eq!(
        reported,
        vec![
            (3, "Segment reached another one, overwriting it."),
            (3, "Segment reached another one, overwriting it."),
        ]
    );
}

#[test]
fn run_with_cli_fill_pass_does_not_repeat_warnings() {
    let dir = create_temp_dir("fill-repeat");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 8]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        placement("1004", &a),
        "--fill".to_string(),
        "ff".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert_eq!(report.summary().passes, 2);
    assert_eq!(report.warning_count(), 1);
}

#[test]
fn run_with_cli_overlay_placement_is_silent() {
    let dir = create_temp_dir("overlay");
    let a = dir.join("a.bin");
    let b = dir.join("b.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 8]);
    write_blob(&b, &[1; 2]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        format!("{},overlay", placement("1002", &b)),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert!(report.diagnostics().is_empty());
}

#[test]
fn run_with_cli_strict_segments_fail_without_output() {
    let dir = create_temp_dir("strict");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 8]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        placement("1004", &a),
        "--strict-segments".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let err = match run_with_cli(&cli) {
        Ok(_) => panic!("overlap should fail with --strict-segments"),
        Err(err) => err,
    };
    assert!(err.to_string().starts_with("Assembly failed with 1 error(s)"));
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].severity(), Severity::Error);
    assert!(!out.exists());
}

#[test]
fn run_with_cli_werror_promotes_warnings() {
    let dir = create_temp_dir("werror");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 8]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        placement("1004", &a),
        "--Werror".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let err = match run_with_cli(&cli) {
        Ok(_) => panic!("warnings should fail under --Werror"),
        Err(err) => err,
    };
    assert_eq!(err.to_string(), "Warnings treated as errors (-Werror)");
    assert!(err
        .diagnostics()
        .iter()
        .all(|diag| diag.severity() == Severity::Error));
}

#[test]
fn run_with_cli_no_warn_drops_warnings() {
    let dir = create_temp_dir("nowarn");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 8]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &a),
        placement("1004", &a),
        "-w".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert!(report.diagnostics().is_empty());
}

#[test]
fn run_with_cli_too_much_code_is_fatal() {
    let dir = create_temp_dir("overflow");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    write_blob(&a, &[0; 4]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("fffe", &a),
        "-o".to_string(),
        arg(&out),
    ]);
    let err = match run_with_cli(&cli) {
        Ok(_) => panic!("writing past the image should fail"),
        Err(err) => err,
    };
    assert_eq!(err.error().kind(), AsmErrorKind::Output);
    assert_eq!(err.to_string(), "Produced too much code.");
    assert!(!out.exists());
}

#[test]
fn run_with_cli_large_image_accepts_wide_addresses() {
    let dir = create_temp_dir("large");
    let a = dir.join("a.bin");
    let out = dir.join("out.hex");
    write_blob(&a, &[1, 2, 3]);

    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("121000", &a),
        "--large".to_string(),
        "-f".to_string(),
        "hex".to_string(),
        "-o".to_string(),
        arg(&out),
    ]);
    let report = run_with_cli(&cli).expect("run");
    assert_eq!(report.summary().start, 0x12_1000);
    let text = fs::read_to_string(&out).expect("output");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(":020000040012E8"));
    assert_eq!(lines.next(), Some(":03100000010203E7"));
    assert_eq!(lines.next(), Some(":00000001FF"));
}

#[test]
fn run_with_cli_missing_input_is_io_error() {
    let dir = create_temp_dir("missing");
    let cli = Cli::parse_from([
        "segforge".to_string(),
        placement("1000", &dir.join("nope.bin")),
        "-o".to_string(),
        arg(&dir.join("out.bin")),
    ]);
    let err = match run_with_cli(&cli) {
        Ok(_) => panic!("missing input should fail"),
        Err(err) => err,
    };
    assert_eq!(err.error().kind(), AsmErrorKind::Io);
    assert!(err.to_string().contains("nope.bin"));
}

#[test]
fn run_with_cli_writes_listing() {
    let dir = create_temp_dir("listing");
    let a = dir.join("a.bin");
    let out = dir.join("out.bin");
    let list = dir.join("out.lst");
    write_blob(&a, &(0u8..10).collect::<Vec<_>>());

    let source = placement("c000", &a);
    let cli = Cli::parse_from([
        "segforge".to_string(),
        source.clone(),
        "c100=+4".to_string(),
        "-l".to_string(),
        arg(&list),
        "-o".to_string(),
        arg(&out),
    ]);
    run_with_cli(&cli).expect("run");
    let text = fs::read_to_string(&list).expect("listing");
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("segforge "));
    // header, two rule lines, then one line per 8-byte statement
    assert_eq!(lines.len(), 5);
    assert!(lines[3].starts_with("C000    00 01 02 03 04 05 06 07"));
    assert!(lines[3].ends_with(&source));
    assert!(lines[4].starts_with("C008    08 09"));
}

#[test]
fn max_passes_leaves_room_for_fill_pass() {
    assert!(MAX_PASSES >= 2);
}
