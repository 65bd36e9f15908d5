// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and run reports for the output backend.

use std::fmt;

/// Categories of backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Bug,
    Cli,
    Io,
    Memory,
    OffsetAssembly,
    Output,
    ProgramCounter,
    Segment,
}

/// An error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    /// Internal invariant violation, tagged with a stable identifier.
    pub fn bug(tag: &str) -> Self {
        Self::new(AsmErrorKind::Bug, "Internal bug found", Some(tag))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A diagnostic message attached to a statement line.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) code: String,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        let mut out = format!(
            "{}: {sev} [{}] - {}",
            self.line,
            self.code,
            self.error.message()
        );
        for note in &self.notes {
            out.push_str("\nnote: ");
            out.push_str(note);
        }
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

/// Summary of the object file written by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSummary {
    pub path: Option<String>,
    pub format: &'static str,
    pub start: u32,
    pub len: u32,
    pub passes: u32,
}

/// Report from a successful run.
#[derive(Debug)]
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    summary: OutputSummary,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, summary: OutputSummary) -> Self {
        Self {
            diagnostics,
            summary,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn summary(&self) -> &OutputSummary {
        &self.summary
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a failed or aborted run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

impl From<AsmError> for AsmRunError {
    fn from(error: AsmError) -> Self {
        Self::new(error, Vec::new())
    }
}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Bug => "seg900",
        AsmErrorKind::Cli => "seg101",
        AsmErrorKind::Io => "seg501",
        AsmErrorKind::Memory => "seg301",
        AsmErrorKind::OffsetAssembly => "seg401",
        AsmErrorKind::Output => "seg001",
        AsmErrorKind::ProgramCounter => "seg402",
        AsmErrorKind::Segment => "seg201",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line_and_severity() {
        let err = AsmError::new(AsmErrorKind::Segment, "Segment overlap", None);
        let diag = Diagnostic::new(12, Severity::Error, err);
        assert_eq!(diag.format(), "12: ERROR [seg201] - Segment overlap");
    }

    #[test]
    fn diagnostic_format_appends_notes() {
        let err = AsmError::new(AsmErrorKind::Memory, "Memory already initialised.", None);
        let diag = Diagnostic::new(3, Severity::Warning, err)
            .with_note("the first fill value stays in effect");
        assert_eq!(
            diag.format(),
            "3: WARNING [seg301] - Memory already initialised.\n\
             note: the first fill value stays in effect"
        );
    }

    #[test]
    fn bug_errors_carry_their_tag() {
        let err = AsmError::bug("ClosingUnopenedPseudopcBlock");
        assert_eq!(err.kind(), AsmErrorKind::Bug);
        assert_eq!(err.to_string(), "Internal bug found: ClosingUnopenedPseudopcBlock");
    }

    #[test]
    fn run_report_counts_by_severity() {
        let diags = vec![
            Diagnostic::new(
                1,
                Severity::Warning,
                AsmError::new(AsmErrorKind::Output, "w", None),
            ),
            Diagnostic::new(
                2,
                Severity::Error,
                AsmError::new(AsmErrorKind::Segment, "e", None),
            ),
            Diagnostic::new(
                3,
                Severity::Error,
                AsmError::new(AsmErrorKind::Segment, "e", None),
            ),
        ];
        let summary = OutputSummary {
            path: None,
            format: "plain",
            start: 0,
            len: 0,
            passes: 1,
        };
        let report = AsmRunReport::new(diags, summary);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 2);
    }
}
