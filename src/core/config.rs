// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Configuration consumed by the output backend.

/// Size of the addressable output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    /// 64 KiB address space.
    #[default]
    Small,
    /// 16 MiB address space.
    Large,
}

impl ImageSize {
    pub const fn capacity(self) -> u32 {
        match self {
            ImageSize::Small => 0x1_0000,
            ImageSize::Large => 0x100_0000,
        }
    }
}

/// Target language version used to gate legacy offset-assembly behavior.
///
/// Versions are encoded as `major * 10000 + minor * 100 + patch`, so 0.86.50
/// becomes 8650.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LanguageVersion(pub u32);

impl LanguageVersion {
    pub const OLDEST_SUPPORTED: Self = Self(8500);
    /// Setting the PC inside an offset block warns with a shorter message.
    pub const SHORTER_SETPC_WARNING: Self = Self(8650);
    /// Obsolete constructs are errors instead of being silently tolerated.
    pub const DISABLED_OBSOLETE_STUFF: Self = Self(9408);
    pub const CURRENT: Self = Self(9712);

    pub fn is_legacy(self) -> bool {
        self < Self::DISABLED_OBSOLETE_STUFF
    }
}

impl Default for LanguageVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Output backend configuration, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputConfig {
    pub image_size: ImageSize,
    /// Report segment overlaps as errors instead of warnings.
    pub segment_overlap_is_error: bool,
    pub verbosity: u8,
    pub wanted_version: LanguageVersion,
    /// Fill byte given up front; `None` uses the default and leaves
    /// `init_memory` free to set it once.
    pub initial_fill: Option<u8>,
}

/// Fill byte used when nothing else was requested.
pub const FILL_VALUE_INITIAL: u8 = 0x00;
