// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output context: image, segments, program counter and offset assembly.
//!
//! One [`OutputContext`] holds all backend state of an assembler run. The
//! pass driver calls [`OutputContext::begin_pass`] before every pass,
//! [`OutputContext::end_statement`] after every source statement and
//! [`OutputContext::end_pass`] when a pass is done. Encoders emit bytes with
//! [`OutputContext::write_byte`] and [`OutputContext::skip`].
//!
//! Recoverable problems are collected as [`Diagnostic`]s and processing
//! continues. Only running past the end of the image and internal bugs are
//! returned as `Err`, and both abort the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::config::{LanguageVersion, OutputConfig, FILL_VALUE_INITIAL};
use super::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use super::image::OutputImage;
use super::listing::ListingCapture;
use super::pc::{unproject_address, OffsetContext, ProgramCounter};
use super::segments::{CurrentSegment, SegmentFlags, SegmentLedger};
use super::serialize::{write_image, OutputFileFormat};

/// Pass bookkeeping shared with the pass driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassState {
    number: u32,
    undefined_count: u32,
}

impl PassState {
    /// 1-based pass number, 0 before the first pass.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    /// Number of reasons found during this pass to run another one.
    pub fn undefined_count(&self) -> u32 {
        self.undefined_count
    }

    /// Make sure at least one more pass is run.
    pub fn request_another_pass(&mut self) {
        if self.undefined_count == 0 {
            self.undefined_count = 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// PC not set yet this pass; the next write reports it once.
    Disabled,
    Enabled,
}

/// All output state of one assembler run.
pub struct OutputContext {
    config: OutputConfig,
    image: OutputImage,
    fill_set: bool,
    ledger: SegmentLedger,
    segment: CurrentSegment,
    write_mode: WriteMode,
    pc: ProgramCounter,
    offset_context: Option<Rc<OffsetContext>>,
    pass: PassState,
    line: u32,
    diagnostics: Vec<Diagnostic>,
    listing: Option<ListingCapture>,
    output_file: Option<PathBuf>,
    output_format: OutputFileFormat,
    fatal: Option<AsmError>,
}

impl OutputContext {
    pub fn new(config: OutputConfig) -> Self {
        let capacity = config.image_size.capacity();
        let fill = config.initial_fill.unwrap_or(FILL_VALUE_INITIAL);
        Self {
            config,
            image: OutputImage::new(capacity, fill),
            fill_set: config.initial_fill.is_some(),
            ledger: SegmentLedger::new(),
            segment: CurrentSegment::closed(capacity),
            write_mode: WriteMode::Disabled,
            pc: ProgramCounter::undefined(),
            offset_context: None,
            pass: PassState::default(),
            line: 0,
            diagnostics: Vec::new(),
            listing: None,
            output_file: None,
            output_format: OutputFileFormat::Unspecified,
            fatal: None,
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn image(&self) -> &OutputImage {
        &self.image
    }

    pub fn ledger(&self) -> &SegmentLedger {
        &self.ledger
    }

    pub fn current_segment(&self) -> &CurrentSegment {
        &self.segment
    }

    pub fn pass(&self) -> &PassState {
        &self.pass
    }

    pub fn pass_mut(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn capacity(&self) -> u32 {
        self.image.capacity()
    }

    fn mask(&self) -> u32 {
        self.image.mask()
    }

    /// Set the statement line attached to subsequent diagnostics.
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, severity: Severity, kind: AsmErrorKind, msg: &str) {
        let diag = Diagnostic::new(self.line, severity, AsmError::new(kind, msg, None));
        self.diagnostics.push(diag);
    }

    fn report_segment_problem(&mut self, msg: &str) {
        let severity = if self.config.segment_overlap_is_error {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.report(severity, AsmErrorKind::Segment, msg);
    }

    fn fail(&mut self, err: AsmError) -> AsmError {
        self.fatal = Some(err.clone());
        err
    }

    fn check_not_aborted(&self) -> Result<(), AsmError> {
        match &self.fatal {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn enable_listing(&mut self) {
        if self.listing.is_none() {
            self.listing = Some(ListingCapture::new());
        }
    }

    /// Take the bytes captured since the last call.
    pub fn take_listing_line(&mut self) -> Option<(u32, Vec<u8>)> {
        self.listing.as_mut().and_then(ListingCapture::take_line)
    }

    /// Reset per-pass state. Safe to call any number of times.
    pub fn begin_pass(&mut self) {
        self.pass.number += 1;
        self.pass.undefined_count = 0;
        log::debug!("starting pass {}", self.pass.number);

        self.image.begin_pass();
        self.write_mode = WriteMode::Disabled;
        self.segment = CurrentSegment::closed(self.capacity());
        self.pc = ProgramCounter::undefined();
        self.offset_context = None;
        if let Some(listing) = &mut self.listing {
            listing.take_line();
        }
    }

    /// Close the open segment at the end of a pass.
    pub fn end_pass(&mut self) {
        self.finalize_segment();
    }

    /// Emit one byte at the write cursor.
    pub fn write_byte(&mut self, value: u8) -> Result<(), AsmError> {
        self.check_not_aborted()?;
        if self.write_mode == WriteMode::Disabled {
            self.report(
                Severity::Error,
                AsmErrorKind::ProgramCounter,
                "Program counter undefined.",
            );
            self.write_mode = WriteMode::Enabled;
        }

        let idx = self.image.cursor();
        if idx > self.segment.limit {
            self.limit_crossed(u64::from(idx))?;
        }
        self.image.note_written(idx, idx);
        if let Some(listing) = &mut self.listing {
            listing.record(idx, value);
        }
        self.image.store(value);
        self.pc.pending_advance = self.pc.pending_advance.wrapping_add(1);
        Ok(())
    }

    pub fn write_bytes(&mut self, values: &[u8]) -> Result<(), AsmError> {
        for &value in values {
            self.write_byte(value)?;
        }
        Ok(())
    }

    /// Reserve `size` bytes without generating them. `size < 1` does nothing.
    pub fn skip(&mut self, size: i64) -> Result<(), AsmError> {
        if size < 1 {
            return Ok(());
        }
        self.check_not_aborted()?;
        let mut size = size as u64;
        if self.write_mode == WriteMode::Disabled {
            self.write_byte(0)?;
            size -= 1;
            if size == 0 {
                return Ok(());
            }
        }

        let first = self.image.cursor();
        let last = u64::from(first) + size - 1;
        if last > u64::from(self.segment.limit) {
            self.limit_crossed(last)?;
        }
        // limit_crossed guarantees last < capacity from here on
        let last = last as u32;
        self.image.note_written(first, last);
        self.image.advance(size as u32);
        self.pc.pending_advance = self.pc.pending_advance.wrapping_add(size as u32);
        Ok(())
    }

    fn limit_crossed(&mut self, addr: u64) -> Result<(), AsmError> {
        if addr >= u64::from(self.capacity()) {
            let err = AsmError::new(AsmErrorKind::Output, "Produced too much code.", None);
            return Err(self.fail(err));
        }
        if self.pass.is_first() {
            self.report_segment_problem("Segment reached another one, overwriting it.");
            self.segment.limit = self.ledger.find_limit(addr as u32, self.capacity());
        }
        Ok(())
    }

    pub fn xor(&self) -> u8 {
        self.image.xor()
    }

    pub fn set_xor(&mut self, xor: u8) {
        self.image.set_xor(xor);
    }

    fn start_segment(&mut self, address_change: u32, flags: SegmentFlags) {
        self.finalize_segment();

        self.image.relocate(address_change);
        let start = self.image.cursor();
        self.segment = CurrentSegment {
            start: Some(start),
            limit: self.mask(),
            flags,
        };
        self.write_mode = WriteMode::Enabled;
        if self.pass.is_first() && !flags.overlay {
            self.check_overlap(start);
        }
        self.segment.limit = self.ledger.find_limit(start, self.capacity());
    }

    fn check_overlap(&mut self, pc: u32) {
        if self.ledger.find_containing(pc).is_some() {
            self.report_segment_problem("Segment starts inside another one, overwriting it.");
        }
    }

    /// Record the open segment in the ledger and close it.
    fn finalize_segment(&mut self) {
        let Some(start) = self.segment.start.take() else {
            return;
        };
        if !self.pass.is_first() || self.segment.flags.invisible {
            return;
        }
        let end = self.image.cursor();
        let amount = end.wrapping_sub(start);
        if amount == 0 {
            return;
        }
        self.ledger.insert(start, amount);
        if self.config.verbosity > 1 {
            log::info!(
                "Segment size is {amount} (0x{amount:x}) bytes (0x{start:x} - 0x{end:x} exclusive)."
            );
        }
    }

    /// Set the program counter and start a new segment there.
    pub fn set_program_counter(
        &mut self,
        new_pc: u32,
        flags: SegmentFlags,
    ) -> Result<(), AsmError> {
        self.check_not_aborted()?;
        if self.offset_context.is_some() {
            let version = self.config.wanted_version;
            if version < LanguageVersion::SHORTER_SETPC_WARNING {
                self.report(
                    Severity::Warning,
                    AsmErrorKind::OffsetAssembly,
                    "Offset assembly still active at end of segment. Switched it off.",
                );
                self.pop_all_offset_contexts()?;
            } else if version < LanguageVersion::DISABLED_OBSOLETE_STUFF {
                self.report(
                    Severity::Warning,
                    AsmErrorKind::OffsetAssembly,
                    "Offset assembly still active at end of segment.",
                );
                self.pop_all_offset_contexts()?;
            }
        }
        let pc_change = new_pc.wrapping_sub(self.pc.value);
        // oversized values wrap at the end of the statement
        self.pc.value = new_pc;
        self.pc.defined = true;
        self.start_segment(pc_change, flags);
        Ok(())
    }

    /// Current program counter, including definedness.
    pub fn read_pc(&self) -> ProgramCounter {
        self.pc
    }

    /// Bytes produced so far by the current statement.
    pub fn statement_size(&self) -> u32 {
        self.pc.pending_advance
    }

    /// Fold the bytes of the finished statement into the program counter.
    pub fn end_statement(&mut self) {
        self.pc.value = self.pc.value.wrapping_add(self.pc.pending_advance) & self.mask();
        self.pc.pending_advance = 0;
    }

    /// Active offset context, to be stored alongside label values.
    pub fn current_offset_context(&self) -> Option<Rc<OffsetContext>> {
        self.offset_context.clone()
    }

    /// Enter offset assembly with `new_pc` as the logical program counter.
    pub fn push_offset_context(&mut self, new_pc: u32) -> Rc<OffsetContext> {
        let context = Rc::new(OffsetContext::new(
            self.offset_context.take(),
            new_pc.wrapping_sub(self.pc.value),
            self.pc.defined,
        ));
        self.pc.value = new_pc;
        self.pc.defined = true;
        self.offset_context = Some(Rc::clone(&context));
        context
    }

    /// Leave the innermost offset-assembly block.
    pub fn pop_offset_context(&mut self) -> Result<(), AsmError> {
        match self.offset_context.take() {
            Some(context) => {
                self.pc.value = self.pc.value.wrapping_sub(context.delta()) & self.mask();
                self.pc.defined = context.outer_defined();
                self.offset_context = context.outer().cloned();
                Ok(())
            }
            // older sources could close blocks that were never opened
            None if self.config.wanted_version.is_legacy() => Ok(()),
            None => {
                let err = AsmError::bug("ClosingUnopenedPseudopcBlock");
                Err(self.fail(err))
            }
        }
    }

    /// Leave all offset-assembly blocks.
    pub fn pop_all_offset_contexts(&mut self) -> Result<(), AsmError> {
        while self.offset_context.is_some() {
            self.pop_offset_context()?;
        }
        Ok(())
    }

    /// Convert `address`, captured while `context` was active, back through
    /// `levels` offset contexts. Reports an error when the chain is too short.
    pub fn unproject(
        &mut self,
        address: u32,
        context: Option<&Rc<OffsetContext>>,
        levels: u32,
    ) -> Option<u32> {
        let result = unproject_address(address, context, levels, self.mask());
        if result.is_none() {
            self.report(
                Severity::Error,
                AsmErrorKind::OffsetAssembly,
                "Un-projection has no enclosing offset-assembly context.",
            );
        }
        result
    }

    /// Set the fill byte for unwritten memory. Only the first call has an
    /// effect; it also asks the driver for another pass.
    pub fn init_memory(&mut self, fill: u8) -> bool {
        if self.fill_set {
            self.report(
                Severity::Warning,
                AsmErrorKind::Memory,
                "Memory already initialised.",
            );
            return false;
        }
        self.fill_set = true;
        self.image.fill_completely(fill);
        self.pass.request_another_pass();
        true
    }

    pub fn fill_is_set(&self) -> bool {
        self.fill_set
    }

    /// Choose the output file. Only the first call has an effect.
    pub fn set_output_file(&mut self, path: impl Into<PathBuf>) -> bool {
        if self.output_file.is_some() {
            self.report(
                Severity::Warning,
                AsmErrorKind::Output,
                "Output file already chosen.",
            );
            return false;
        }
        self.output_file = Some(path.into());
        true
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Choose the output format by name. Only the first call has an effect.
    pub fn set_output_format(&mut self, name: &str) -> bool {
        let Some(format) = OutputFileFormat::from_name(name) else {
            let msg = format!(
                "Unknown output format (known formats are: {})",
                OutputFileFormat::KNOWN_FORMATS
            );
            let diag = Diagnostic::new(
                self.line,
                Severity::Error,
                AsmError::new(AsmErrorKind::Output, &msg, Some(name)),
            );
            self.diagnostics.push(diag);
            return false;
        };
        if self.output_format != OutputFileFormat::Unspecified {
            self.report(
                Severity::Warning,
                AsmErrorKind::Output,
                "Output format already chosen.",
            );
            return false;
        }
        self.output_format = format;
        true
    }

    /// Choose CBM format unless a format was already chosen.
    pub fn prefer_cbm_format(&mut self) -> bool {
        if self.output_format != OutputFileFormat::Unspecified {
            return false;
        }
        self.output_format = OutputFileFormat::Cbm;
        true
    }

    pub fn output_format(&self) -> OutputFileFormat {
        self.output_format
    }

    /// Render the written range in the chosen format.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<(), AsmError> {
        let (start, amount) = self.image.written_range();
        if self.config.verbosity > 0 {
            let end = start + amount;
            log::info!(
                "Saving {amount} (0x{amount:x}) bytes (0x{start:x} - 0x{end:x} exclusive)."
            );
        }
        write_image(out, self.output_format, &self.image).map_err(|err| {
            AsmError::new(
                AsmErrorKind::Io,
                &format!("Error writing output: {err}"),
                None,
            )
        })
    }

    /// Write the object file to the chosen path. Returns `Ok(None)` when no
    /// output file was chosen.
    pub fn save_file(&self) -> Result<Option<PathBuf>, AsmError> {
        let Some(path) = self.output_file.clone() else {
            return Ok(None);
        };
        let io_error = |err: std::io::Error| {
            AsmError::new(
                AsmErrorKind::Io,
                &format!("Error writing output file: {err}"),
                Some(path.to_string_lossy().as_ref()),
            )
        };
        let file = File::create(&path).map_err(io_error)?;
        let mut out = BufWriter::new(file);
        self.save(&mut out)?;
        out.flush().map_err(io_error)?;
        Ok(Some(path))
    }
}
