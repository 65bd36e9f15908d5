// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Library entry exposing the output backend and its command-line driver.
pub mod assembler;
pub mod core;
