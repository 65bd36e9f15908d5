// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Segment ledger used to detect overlapping output.

/// Flags given when a segment is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentFlags {
    /// Do not check the new segment against already claimed ones.
    pub overlay: bool,
    /// Do not record the segment and do not report its size.
    pub invisible: bool,
}

impl SegmentFlags {
    pub const NONE: Self = Self {
        overlay: false,
        invisible: false,
    };
    pub const OVERLAY: Self = Self {
        overlay: true,
        invisible: false,
    };
    pub const INVISIBLE: Self = Self {
        overlay: false,
        invisible: true,
    };
}

/// A committed address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    pub start: u32,
    pub length: u32,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// Committed segments, sorted by `(start, length)`.
#[derive(Debug, Default)]
pub struct SegmentLedger {
    entries: Vec<Segment>,
}

impl SegmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Segment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a finished segment, keeping `(start, length)` order.
    pub fn insert(&mut self, start: u32, length: u32) {
        let segment = Segment { start, length };
        let idx = self.entries.partition_point(|entry| *entry < segment);
        self.entries.insert(idx, segment);
    }

    /// Highest address a segment at `pc` may use before it runs into the next
    /// recorded segment, or `capacity - 1` if there is none.
    pub fn find_limit(&self, pc: u32, capacity: u32) -> u32 {
        let idx = self.entries.partition_point(|entry| entry.start <= pc);
        match self.entries.get(idx) {
            Some(next) => next.start - 1,
            None => capacity - 1,
        }
    }

    /// Return the first recorded segment containing `pc`.
    pub fn find_containing(&self, pc: u32) -> Option<&Segment> {
        let end = self.entries.partition_point(|entry| entry.start <= pc);
        self.entries[..end].iter().find(|entry| entry.contains(pc))
    }
}

/// The segment currently receiving output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentSegment {
    /// Physical start address, `None` while no segment is open.
    pub start: Option<u32>,
    /// Last address usable without running into another segment.
    pub limit: u32,
    pub flags: SegmentFlags,
}

impl CurrentSegment {
    pub fn closed(capacity: u32) -> Self {
        Self {
            start: None,
            limit: capacity - 1,
            flags: SegmentFlags::NONE,
        }
    }
}
