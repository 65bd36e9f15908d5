// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::config::{ImageSize, LanguageVersion, OutputConfig};
use crate::core::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::segments::SegmentFlags;
use crate::core::serialize::OutputFileFormat;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Place binary blobs and reserved areas in an object image and save it.

Each PLACEMENT starts a new segment: ADDR=FILE loads FILE at ADDR, ADDR=+COUNT
reserves COUNT bytes without writing them. Append ,overlay to allow a segment to
start inside an earlier one and ,invisible to keep it out of overlap tracking.
ADDR is hexadecimal ($ or 0x prefix optional); COUNT is decimal unless prefixed.
Overlapping segments are reported as warnings unless --strict-segments is set.";

#[derive(Parser, Debug)]
#[command(
    name = "segforge",
    version = VERSION,
    about = "Object image builder with segment overlap checks and plain/cbm/apple/hex output",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        value_name = "PLACEMENT",
        num_args = 1..,
        required = true,
        long_help = "Segment placements, ADDR=FILE[,overlay][,invisible] or ADDR=+COUNT[,overlay][,invisible]."
    )]
    pub placements: Vec<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Object file to write."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        short = 'f',
        long = "format",
        value_name = "NAME",
        long_help = "Object file format: plain, cbm, apple or hex. Defaults to plain."
    )]
    pub file_format: Option<String>,
    #[arg(
        long = "fill",
        value_name = "HH",
        long_help = "Fill byte for unwritten memory (two hex digits). Also used to detect gaps in hex output."
    )]
    pub fill_byte: Option<String>,
    #[arg(
        long = "xor",
        value_name = "HH",
        long_help = "XOR every output byte with HH (two hex digits)."
    )]
    pub xor_byte: Option<String>,
    #[arg(
        long = "large",
        action = ArgAction::SetTrue,
        long_help = "Use a 16 MiB address space instead of 64 KiB."
    )]
    pub large: bool,
    #[arg(
        long = "strict-segments",
        action = ArgAction::SetTrue,
        long_help = "Report segment overlaps as errors instead of warnings."
    )]
    pub strict_segments: bool,
    #[arg(
        long = "lang-version",
        value_name = "N",
        long_help = "Target language version (e.g. 9408) controlling legacy offset-assembly behavior."
    )]
    pub lang_version: Option<u32>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        long_help = "Write a listing of the emitted bytes to FILE."
    )]
    pub list_file: Option<PathBuf>,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        long_help = "Report progress; repeat for per-segment sizes."
    )]
    pub verbose: u8,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful runs."
    )]
    pub quiet: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        conflicts_with = "warn_error",
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        long_help = "Treat warnings as errors (non-zero exit status)."
    )]
    pub warn_error: bool,
    #[arg(
        long = "diagnostics-format",
        value_enum,
        default_value_t = DiagnosticsFormat::Text,
        long_help = "Render diagnostics as text or as one JSON object per line."
    )]
    pub diagnostics_format: DiagnosticsFormat,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiagnosticsFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

/// What a placement puts into its segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementSource {
    File(PathBuf),
    Reserve(u32),
}

/// One segment requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub addr: u32,
    pub source: PlacementSource,
    pub flags: SegmentFlags,
    pub text: String,
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct CliConfig {
    pub placements: Vec<Placement>,
    pub outfile: PathBuf,
    pub file_format: Option<String>,
    pub fill_byte: Option<u8>,
    pub xor_byte: Option<u8>,
    pub list_file: Option<PathBuf>,
    pub output: OutputConfig,
    pub quiet: bool,
    pub diagnostics_format: DiagnosticsFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub warning_policy: WarningPolicy,
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, &message.into(), None),
        Vec::new(),
    )
}

pub fn is_valid_hex_2(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_hex_byte_arg(option: &str, value: &str) -> Result<u8, AsmRunError> {
    if !is_valid_hex_2(value) {
        return Err(cli_error(format!(
            "Invalid {option} value; must be 2 hex digits: {value}"
        )));
    }
    u8::from_str_radix(value, 16)
        .map_err(|_| cli_error(format!("Invalid {option} value: {value}")))
}

fn strip_hex_prefix(text: &str) -> Option<&str> {
    text.strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
}

fn parse_address(text: &str) -> Option<u32> {
    let digits = strip_hex_prefix(text).unwrap_or(text);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn parse_count(text: &str) -> Option<u32> {
    match strip_hex_prefix(text) {
        Some(digits) => u32::from_str_radix(digits, 16).ok(),
        None => text.parse::<u32>().ok(),
    }
}

/// Parse `ADDR=FILE[,flag...]` or `ADDR=+COUNT[,flag...]`.
pub fn parse_placement(text: &str) -> Result<Placement, AsmRunError> {
    let Some((addr_text, rest)) = text.split_once('=') else {
        return Err(cli_error(format!(
            "Invalid placement (expected ADDR=FILE or ADDR=+COUNT): {text}"
        )));
    };
    let addr = parse_address(addr_text.trim())
        .ok_or_else(|| cli_error(format!("Invalid placement address: {addr_text}")))?;

    let mut parts = rest.split(',');
    let target = parts.next().unwrap_or_default().trim();
    let mut flags = SegmentFlags::NONE;
    for flag in parts {
        match flag.trim().to_ascii_lowercase().as_str() {
            "overlay" => flags.overlay = true,
            "invisible" => flags.invisible = true,
            other => {
                return Err(cli_error(format!(
                    "Unknown placement flag '{other}' (expected overlay or invisible)"
                )))
            }
        }
    }

    let source = if let Some(count) = target.strip_prefix('+') {
        let count = parse_count(count)
            .ok_or_else(|| cli_error(format!("Invalid reserve count: {count}")))?;
        PlacementSource::Reserve(count)
    } else if target.is_empty() {
        return Err(cli_error(format!("Missing file in placement: {text}")));
    } else {
        PlacementSource::File(PathBuf::from(target))
    };

    Ok(Placement {
        addr,
        source,
        flags,
        text: text.to_string(),
    })
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )))
        }
    };
    Ok(parsed)
}

fn parse_env_string(var_name: &str) -> Result<Option<String>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let env_format = parse_env_string("SEGFORGE_FORMAT")?;
    let env_fill = parse_env_string("SEGFORGE_FILL")?;
    let env_strict_segments = parse_env_bool("SEGFORGE_STRICT_SEGMENTS")?;
    let env_quiet = parse_env_bool("SEGFORGE_QUIET")?;
    let env_warn_error = parse_env_bool("SEGFORGE_WERROR")?;

    let Some(outfile) = cli.outfile.clone() else {
        return Err(cli_error("No output file selected. Use -o/--outfile"));
    };

    let placements = cli
        .placements
        .iter()
        .map(|text| parse_placement(text))
        .collect::<Result<Vec<_>, _>>()?;

    let file_format = cli.file_format.clone().or(env_format);
    if let Some(name) = file_format.as_deref() {
        if OutputFileFormat::from_name(name).is_none() {
            return Err(cli_error(format!(
                "Unknown output format '{name}'. Known formats: {}",
                OutputFileFormat::KNOWN_FORMATS
            )));
        }
    }

    let fill_byte = match cli.fill_byte.as_deref().or(env_fill.as_deref()) {
        Some(text) => Some(parse_hex_byte_arg("--fill", text)?),
        None => None,
    };
    let xor_byte = match cli.xor_byte.as_deref() {
        Some(text) => Some(parse_hex_byte_arg("--xor", text)?),
        None => None,
    };

    let wanted_version = match cli.lang_version {
        Some(version) if version < LanguageVersion::OLDEST_SUPPORTED.0 => {
            return Err(cli_error(format!(
                "Language version {version} is older than the oldest supported version {}",
                LanguageVersion::OLDEST_SUPPORTED.0
            )))
        }
        Some(version) => LanguageVersion(version),
        None => LanguageVersion::default(),
    };

    let image_size = if cli.large {
        ImageSize::Large
    } else {
        ImageSize::Small
    };
    let capacity = image_size.capacity();
    if let Some(placement) = placements.iter().find(|p| p.addr >= capacity) {
        return Err(cli_error(format!(
            "Placement address ${:X} is outside the {} address space (use --large)",
            placement.addr,
            if cli.large { "16 MiB" } else { "64 KiB" }
        )));
    }

    let output = OutputConfig {
        image_size,
        segment_overlap_is_error: cli.strict_segments || env_strict_segments.unwrap_or(false),
        verbosity: cli.verbose,
        wanted_version,
        // the driver applies the fill like an in-source memory init
        initial_fill: None,
    };

    let quiet = cli.quiet || env_quiet.unwrap_or(false);
    let treat_warnings_as_errors = cli.warn_error || env_warn_error.unwrap_or(false);

    Ok(CliConfig {
        placements,
        outfile,
        file_format,
        fill_byte,
        xor_byte,
        list_file: cli.list_file.clone(),
        output,
        quiet,
        diagnostics_format: cli.diagnostics_format,
        diagnostics_sink: if cli.no_error {
            DiagnosticsSinkConfig::Disabled
        } else if let Some(path) = &cli.error_file {
            DiagnosticsSinkConfig::File {
                path: path.clone(),
                append: cli.error_append,
            }
        } else {
            DiagnosticsSinkConfig::Stderr
        },
        warning_policy: WarningPolicy {
            emit_warnings: !cli.no_warn,
            treat_warnings_as_errors,
        },
    })
}
