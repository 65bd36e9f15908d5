// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output backend: image, segment ledger, program counter, offset assembly
//! and object file serialization.

pub mod config;
pub mod error;
pub mod image;
pub mod listing;
pub mod output;
pub mod pc;
pub mod segments;
pub mod serialize;
