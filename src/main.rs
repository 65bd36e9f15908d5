// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for segforge.

use std::fs::OpenOptions;
use std::io::{self, Write};

use clap::Parser;
use serde_json::json;

use segforge::assembler::cli::{validate_cli, Cli, DiagnosticsFormat, DiagnosticsSinkConfig};
use segforge::core::error::{Diagnostic, Severity};

struct DiagnosticsSink {
    writer: Option<Box<dyn Write>>,
}

impl DiagnosticsSink {
    fn from_config(config: &DiagnosticsSinkConfig) -> io::Result<Self> {
        match config {
            DiagnosticsSinkConfig::Disabled => Ok(Self { writer: None }),
            DiagnosticsSinkConfig::Stderr => Ok(Self {
                writer: Some(Box::new(io::stderr())),
            }),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                let file = opts.open(path)?;
                Ok(Self {
                    writer: Some(Box::new(file)),
                })
            }
        }
    }

    fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    fn emit_diagnostics(&mut self, diagnostics: &[Diagnostic], format: DiagnosticsFormat) {
        for diag in diagnostics {
            self.emit_line(&format_diagnostic_line(diag, format));
        }
    }
}

fn format_diagnostic_line(diag: &Diagnostic, format: DiagnosticsFormat) -> String {
    match format {
        DiagnosticsFormat::Json => json!({
            "code": diag.code(),
            "severity": diag.severity().as_str(),
            "kind": format!("{:?}", diag.kind()),
            "message": diag.message(),
            "line": diag.line(),
            "notes": diag.notes(),
        })
        .to_string(),
        DiagnosticsFormat::Text => diag.format(),
    }
}

fn init_logging(verbosity: u8, quiet: bool) {
    let level = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1 | 2) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(cli.verbose, cli_config.quiet);

    let mut sink = match DiagnosticsSink::from_config(&cli_config.diagnostics_sink) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };

    match segforge::assembler::run_with_config(&cli_config) {
        Ok(report) => {
            if cli_config.quiet {
                return;
            }
            sink.emit_diagnostics(report.diagnostics(), cli_config.diagnostics_format);
        }
        Err(err) => {
            sink.emit_diagnostics(err.diagnostics(), cli_config.diagnostics_format);
            let error_count = err
                .diagnostics()
                .iter()
                .filter(|diag| diag.severity() == Severity::Error)
                .count();
            if error_count == 0 || cli_config.diagnostics_sink == DiagnosticsSinkConfig::Disabled
            {
                eprintln!("{err}");
            } else {
                sink.emit_line(&err.to_string());
            }
            std::process::exit(1);
        }
    }
}
