// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line front end: places files and reserved areas in the output
//! image and drives the passes over them.

pub mod cli;
mod passes;
#[cfg(test)]
mod tests;

use crate::core::error::{AsmRunError, AsmRunReport};
use cli::{Cli, CliConfig};

pub use passes::MAX_PASSES;

/// Run with the process command line.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    passes::run()
}

pub fn run_with_cli(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    passes::run_with_cli(cli)
}

/// Run with an already validated configuration.
pub fn run_with_config(config: &CliConfig) -> Result<AsmRunReport, AsmRunError> {
    passes::run_with_config(config)
}
