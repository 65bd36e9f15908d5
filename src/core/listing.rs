// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Capture of raw output bytes for listing generation.

use std::io::{self, Write};

/// Bytes kept per listing line; one more than is shown so the writer can
/// tell that the line was truncated.
pub const LISTING_BYTES_PER_LINE: usize = 9;

/// Bytes shown per listing line.
const LISTING_BYTES_SHOWN: usize = LISTING_BYTES_PER_LINE - 1;

/// Mirror of the bytes produced by the current statement.
#[derive(Debug, Default)]
pub struct ListingCapture {
    address: Option<u32>,
    bytes: Vec<u8>,
}

impl ListingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one byte written at `address`.
    pub fn record(&mut self, address: u32, value: u8) {
        if self.address.is_none() {
            self.address = Some(address);
        }
        if self.bytes.len() < LISTING_BYTES_PER_LINE {
            self.bytes.push(value);
        }
    }

    /// Take the captured line, leaving the capture empty.
    pub fn take_line(&mut self) -> Option<(u32, Vec<u8>)> {
        let address = self.address.take()?;
        Some((address, std::mem::take(&mut self.bytes)))
    }
}

/// Writer for listing file output.
pub struct ListingWriter<W: Write> {
    out: W,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "ADDR    BYTES                        LINE  SOURCE")?;
        writeln!(self.out, "------  ---------------------------  ----  ------")?;
        Ok(())
    }

    pub fn write_line(
        &mut self,
        addr: u32,
        bytes: &[u8],
        line_num: u32,
        source: &str,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "{:<6}  {:<27}  {:>4}  {}",
            format_addr(addr),
            format_bytes(bytes),
            line_num,
            source
        )
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_addr(addr: u32) -> String {
    if addr <= 0xFFFF {
        format!("{addr:04X}")
    } else {
        format!("{addr:06X}")
    }
}

/// Format bytes as hex string for listing, marking truncated lines.
pub fn format_bytes(bytes: &[u8]) -> String {
    let shown = bytes.len().min(LISTING_BYTES_SHOWN);
    let mut out = bytes[..shown]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > LISTING_BYTES_SHOWN {
        out.push_str(" ...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_remembers_first_address_only() {
        let mut capture = ListingCapture::new();
        capture.record(0x1000, 1);
        capture.record(0x1001, 2);
        assert_eq!(capture.take_line(), Some((0x1000, vec![1, 2])));
        assert_eq!(capture.take_line(), None);
    }

    #[test]
    fn capture_keeps_at_most_line_buffer() {
        let mut capture = ListingCapture::new();
        for i in 0..20u8 {
            capture.record(0x2000 + i as u32, i);
        }
        let (_, bytes) = capture.take_line().expect("line");
        assert_eq!(bytes.len(), LISTING_BYTES_PER_LINE);
    }

    #[test]
    fn format_bytes_marks_truncation() {
        assert_eq!(format_bytes(&[0x01, 0xab]), "01 AB");
        assert_eq!(
            format_bytes(&[0; LISTING_BYTES_PER_LINE]),
            "00 00 00 00 00 00 00 00 ..."
        );
    }

    #[test]
    fn writer_aligns_columns() {
        let mut writer = ListingWriter::new(Vec::new());
        writer.write_line(0x1000, &[1, 2, 3], 7, "prog.bin").unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.starts_with("1000    01 02 03"));
        assert!(text.trim_end().ends_with("7  prog.bin"));
    }
}
