// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Fixed-capacity output image with write cursor and watermarks.

/// In-memory image of the object code for one run.
///
/// The buffer spans the whole address space. Only the range between the low
/// and high watermarks is ever written to the object file.
pub struct OutputImage {
    bytes: Vec<u8>,
    cursor: u32,
    lowest_written: u32,
    highest_written: u32,
    fill_value: u8,
    xor: u8,
}

impl OutputImage {
    /// Allocate an image of `capacity` bytes pre-filled with `fill`.
    ///
    /// `capacity` must be a power of two.
    pub fn new(capacity: u32, fill: u8) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            bytes: vec![fill; capacity as usize],
            cursor: 0,
            lowest_written: capacity - 1,
            highest_written: 0,
            fill_value: fill,
            xor: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Mask selecting the valid address bits.
    pub fn mask(&self) -> u32 {
        self.capacity() - 1
    }

    /// Reset the per-pass state. Buffer contents are kept.
    pub fn begin_pass(&mut self) {
        self.cursor = 0;
        self.lowest_written = self.mask();
        self.highest_written = 0;
        self.xor = 0;
    }

    /// Overwrite the whole buffer with `value` and make it the fill byte.
    pub fn fill_completely(&mut self, value: u8) {
        self.bytes.fill(value);
        self.fill_value = value;
    }

    pub fn fill_value(&self) -> u8 {
        self.fill_value
    }

    pub fn xor(&self) -> u8 {
        self.xor
    }

    pub fn set_xor(&mut self, xor: u8) {
        self.xor = xor;
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Move the cursor by `delta`, wrapping around the address space.
    pub(crate) fn relocate(&mut self, delta: u32) {
        self.cursor = self.cursor.wrapping_add(delta) & self.mask();
    }

    pub(crate) fn advance(&mut self, count: u32) {
        self.cursor = self.cursor.wrapping_add(count);
    }

    /// Extend the watermarks to cover `first..=last`.
    pub(crate) fn note_written(&mut self, first: u32, last: u32) {
        if first < self.lowest_written {
            self.lowest_written = first;
        }
        if last > self.highest_written {
            self.highest_written = last;
        }
    }

    /// Store `value` at the cursor (scrambled with the xor mask) and advance.
    ///
    /// The caller has already checked the cursor against the capacity.
    pub(crate) fn store(&mut self, value: u8) {
        self.bytes[self.cursor as usize] = value ^ self.xor;
        self.cursor += 1;
    }

    pub fn lowest_written(&self) -> u32 {
        self.lowest_written
    }

    pub fn highest_written(&self) -> u32 {
        self.highest_written
    }

    /// Return `(start, len)` of the written range; `len` is 0 when empty.
    pub fn written_range(&self) -> (u32, u32) {
        if self.highest_written < self.lowest_written {
            (0, 0)
        } else {
            (
                self.lowest_written,
                self.highest_written - self.lowest_written + 1,
            )
        }
    }

    /// Return the written bytes, empty when nothing was written.
    pub fn written_bytes(&self) -> &[u8] {
        let (start, len) = self.written_range();
        &self.bytes[start as usize..(start + len) as usize]
    }

    /// Raw view of the complete buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
