// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Object file rendering: plain, CBM, Apple and Intel HEX.

use std::io::{self, Write};
use std::ops::Range;

use super::image::OutputImage;

/// Fill runs longer than this are gaps in hex output.
const HEX_MAX_FILL_RUN: usize = 32;
/// Maximum data bytes per hex record.
const HEX_MAX_RECORD_LEN: usize = 64;

/// Supported object file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFileFormat {
    /// No format chosen yet; rendered as plain.
    #[default]
    Unspecified,
    /// Load address, length, code.
    Apple,
    /// Load address, code.
    Cbm,
    /// Code only.
    Plain,
    /// Intel HEX records.
    Hex,
}

impl OutputFileFormat {
    /// Format names shown when an unknown name is given.
    pub const KNOWN_FORMATS: &'static str = "'plain', 'cbm', 'apple', 'hex'";

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "apple" => Some(Self::Apple),
            "cbm" => Some(Self::Cbm),
            "plain" => Some(Self::Plain),
            "hex" => Some(Self::Hex),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unspecified | Self::Plain => "plain",
            Self::Apple => "apple",
            Self::Cbm => "cbm",
            Self::Hex => "hex",
        }
    }
}

/// Render the written range of `image` in `format`.
pub fn write_image<W: Write>(
    out: &mut W,
    format: OutputFileFormat,
    image: &OutputImage,
) -> io::Result<()> {
    let (start, len) = image.written_range();
    let data = image.written_bytes();
    match format {
        OutputFileFormat::Unspecified | OutputFileFormat::Plain => out.write_all(data),
        OutputFileFormat::Cbm => {
            out.write_all(&(start as u16).to_le_bytes())?;
            out.write_all(data)
        }
        OutputFileFormat::Apple => {
            out.write_all(&(start as u16).to_le_bytes())?;
            out.write_all(&(len as u16).to_le_bytes())?;
            out.write_all(data)
        }
        OutputFileFormat::Hex => write_hex(out, start, data, image.fill_value()),
    }
}

/// Split `data` into runs separated by long stretches of `fill`.
fn hex_spans(data: &[u8], fill: u8) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut span_start = 0usize;
    let mut idx = 0usize;
    while idx < data.len() {
        if data[idx] != fill {
            idx += 1;
            continue;
        }
        let run_start = idx;
        while idx < data.len() && data[idx] == fill {
            idx += 1;
        }
        if idx - run_start > HEX_MAX_FILL_RUN {
            if run_start > span_start {
                spans.push(span_start..run_start);
            }
            span_start = idx;
        }
    }
    if data.len() > span_start {
        spans.push(span_start..data.len());
    }
    spans
}

/// Write `data` located at `base` as Intel HEX, skipping gaps of `fill`.
pub fn write_hex<W: Write>(out: &mut W, base: u32, data: &[u8], fill: u8) -> io::Result<()> {
    let mut current_ela: Option<u16> = None;
    for span in hex_spans(data, fill) {
        let mut offset = span.start;
        while offset < span.end {
            let addr = base + offset as u32;
            let ela = (addr >> 16) as u16;
            if current_ela != Some(ela) {
                if ela != 0 || current_ela.is_some() {
                    write_extended_linear_address_record(out, ela)?;
                }
                current_ela = Some(ela);
            }
            let to_page_end = 0x1_0000 - (addr & 0xFFFF) as usize;
            let len = (span.end - offset)
                .min(HEX_MAX_RECORD_LEN)
                .min(to_page_end);
            write_data_record(out, (addr & 0xFFFF) as u16, &data[offset..offset + len])?;
            offset += len;
        }
    }
    writeln!(out, ":00000001FF")
}

fn write_data_record<W: Write>(out: &mut W, addr: u16, data: &[u8]) -> io::Result<()> {
    let mut checksum: u8 = data.len() as u8;
    checksum = checksum.wrapping_add((addr >> 8) as u8);
    checksum = checksum.wrapping_add((addr & 0xff) as u8);
    let mut hex_data = String::with_capacity(data.len() * 2);
    for &val in data {
        hex_data.push(hex_digit((val >> 4) & 0x0f));
        hex_data.push(hex_digit(val & 0x0f));
        checksum = checksum.wrapping_add(val);
    }
    checksum = (!checksum).wrapping_add(1);
    writeln!(
        out,
        ":{:02X}{:04X}00{}{:02X}",
        data.len(),
        addr,
        hex_data,
        checksum
    )
}

fn hex_digit(val: u8) -> char {
    match val {
        0..=9 => (b'0' + val) as char,
        _ => (b'A' + (val - 10)) as char,
    }
}

fn write_extended_linear_address_record<W: Write>(out: &mut W, upper: u16) -> io::Result<()> {
    let mut csum: u8 = 0;
    csum = csum.wrapping_add(2); // length
    csum = csum.wrapping_add(4); // record type 04
    csum = csum.wrapping_add((upper >> 8) as u8);
    csum = csum.wrapping_add((upper & 0xff) as u8);
    csum = (!csum).wrapping_add(1);
    writeln!(out, ":02000004{:04X}{:02X}", upper, csum)
}
