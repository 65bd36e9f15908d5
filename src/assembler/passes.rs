// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler run/pass orchestration.
//!
//! Every placement behaves like one `*=ADDR` statement followed by the data
//! statements that emit its file, so the output context sees the same call
//! sequence a source-driven front end would produce.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::Parser;

use super::cli::{validate_cli, Cli, CliConfig, Placement, PlacementSource};
use crate::core::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, OutputSummary, Severity,
};
use crate::core::listing::ListingWriter;
use crate::core::output::OutputContext;

/// Upper bound on passes before the run is abandoned.
pub const MAX_PASSES: u32 = 16;

/// Bytes emitted per data statement when loading a file.
const BYTES_PER_STATEMENT: usize = 8;

/// Run the assembler with command-line arguments.
pub(super) fn run() -> Result<AsmRunReport, AsmRunError> {
    let cli = Cli::parse();
    run_with_cli(&cli)
}

pub(super) fn run_with_cli(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    let config = validate_cli(cli)?;
    run_with_config(&config)
}

/// What a placement contributes once its file has been read.
enum Payload {
    Bytes(Vec<u8>),
    Reserve(u32),
}

struct ListedLine {
    addr: u32,
    bytes: Vec<u8>,
    line: u32,
    source: String,
}

fn load_payloads(placements: &[Placement]) -> Result<Vec<Payload>, AsmRunError> {
    placements
        .iter()
        .map(|placement| match &placement.source {
            PlacementSource::File(path) => fs::read(path).map(Payload::Bytes).map_err(|err| {
                AsmRunError::from(AsmError::new(
                    AsmErrorKind::Io,
                    &format!("Error reading input file: {err}"),
                    Some(path.to_string_lossy().as_ref()),
                ))
            }),
            PlacementSource::Reserve(count) => Ok(Payload::Reserve(*count)),
        })
        .collect()
}

pub(super) fn run_with_config(config: &CliConfig) -> Result<AsmRunReport, AsmRunError> {
    let payloads = load_payloads(&config.placements)?;

    let mut ctx = OutputContext::new(config.output);
    if let Some(name) = config.file_format.as_deref() {
        ctx.set_output_format(name);
    }
    ctx.set_output_file(config.outfile.clone());
    if config.list_file.is_some() {
        ctx.enable_listing();
    }

    let mut diagnostics = ctx.take_diagnostics();
    let mut listed = Vec::new();
    loop {
        ctx.begin_pass();
        listed.clear();
        if let Some(fill) = config.fill_byte {
            if !ctx.fill_is_set() {
                ctx.init_memory(fill);
            }
        }
        if let Some(xor) = config.xor_byte {
            ctx.set_xor(xor);
        }

        if let Err(err) = run_pass(&mut ctx, config, &payloads, &mut listed) {
            merge_diagnostics(&mut diagnostics, ctx.take_diagnostics(), config);
            return Err(AsmRunError::new(err, diagnostics));
        }
        ctx.end_pass();
        merge_diagnostics(&mut diagnostics, ctx.take_diagnostics(), config);

        let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
        if has_errors || ctx.pass().undefined_count() == 0 {
            break;
        }
        if ctx.pass().number() >= MAX_PASSES {
            return Err(AsmRunError::new(
                AsmError::new(
                    AsmErrorKind::Output,
                    &format!("Values still unresolved after {MAX_PASSES} passes"),
                    None,
                ),
                diagnostics,
            ));
        }
    }

    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    if error_count > 0 {
        return Err(AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Output,
                &format!("Assembly failed with {error_count} error(s); no output written"),
                None,
            ),
            diagnostics,
        ));
    }

    if config.warning_policy.treat_warnings_as_errors {
        let warning_diags: Vec<Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| {
                let mut warning = d.clone();
                warning.severity = Severity::Error;
                warning
            })
            .collect();
        if !warning_diags.is_empty() {
            return Err(AsmRunError::new(
                AsmError::new(
                    AsmErrorKind::Output,
                    "Warnings treated as errors (-Werror)",
                    None,
                ),
                warning_diags,
            ));
        }
    }

    let saved = match ctx.save_file() {
        Ok(saved) => saved,
        Err(err) => return Err(AsmRunError::new(err, diagnostics)),
    };
    if let Some(list_path) = &config.list_file {
        if let Err(err) = write_listing(list_path, config, &listed) {
            return Err(AsmRunError::new(err, diagnostics));
        }
    }

    let (start, len) = ctx.image().written_range();
    let summary = OutputSummary {
        path: saved.map(|path| path.to_string_lossy().into_owned()),
        format: ctx.output_format().name(),
        start,
        len,
        passes: ctx.pass().number(),
    };
    log::info!(
        "{} bytes at ${:04X} in {} pass(es), format {}",
        summary.len,
        summary.start,
        summary.passes,
        summary.format
    );
    Ok(AsmRunReport::new(diagnostics, summary))
}

fn run_pass(
    ctx: &mut OutputContext,
    config: &CliConfig,
    payloads: &[Payload],
    listed: &mut Vec<ListedLine>,
) -> Result<(), AsmError> {
    for (idx, (placement, payload)) in config.placements.iter().zip(payloads).enumerate() {
        let line = idx as u32 + 1;
        ctx.set_line(line);
        ctx.set_program_counter(placement.addr, placement.flags)?;
        ctx.end_statement();

        match payload {
            Payload::Bytes(bytes) => {
                for chunk in bytes.chunks(BYTES_PER_STATEMENT) {
                    ctx.write_bytes(chunk)?;
                    ctx.end_statement();
                    if let Some((addr, bytes)) = ctx.take_listing_line() {
                        listed.push(ListedLine {
                            addr,
                            bytes,
                            line,
                            source: placement.text.clone(),
                        });
                    }
                }
            }
            Payload::Reserve(count) => {
                ctx.skip(i64::from(*count))?;
                ctx.end_statement();
                // reserved bytes are not captured; drop the undefined-PC filler
                ctx.take_listing_line();
            }
        }
    }
    Ok(())
}

/// Append the diagnostics of one pass, dropping repeats of earlier passes.
fn merge_diagnostics(into: &mut Vec<Diagnostic>, new: Vec<Diagnostic>, config: &CliConfig) {
    // only diagnostics of earlier passes count as repeats
    let earlier = into.len();
    for diag in new {
        if diag.severity == Severity::Warning && !config.warning_policy.emit_warnings {
            continue;
        }
        let repeated = into[..earlier].iter().any(|seen| {
            seen.line == diag.line
                && seen.severity == diag.severity
                && seen.message() == diag.message()
        });
        if repeated {
            continue;
        }
        let note = config
            .placements
            .get((diag.line as usize).wrapping_sub(1))
            .map(|placement| format!("in placement '{}'", placement.text));
        into.push(match note {
            Some(note) => diag.with_note(note),
            None => diag,
        });
    }
}

fn write_listing(path: &Path, config: &CliConfig, lines: &[ListedLine]) -> Result<(), AsmError> {
    let io_error = |err: std::io::Error| {
        AsmError::new(
            AsmErrorKind::Io,
            &format!("Error writing listing file: {err}"),
            Some(path.to_string_lossy().as_ref()),
        )
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = ListingWriter::new(BufWriter::new(file));
    writer
        .header(&format!(
            "segforge {} listing of {}",
            super::cli::VERSION,
            config.outfile.display()
        ))
        .map_err(io_error)?;
    for line in lines {
        writer
            .write_line(line.addr, &line.bytes, line.line, &line.source)
            .map_err(io_error)?;
    }
    writer.into_inner().flush().map_err(io_error)
}
