// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Program counter state and offset-assembly contexts.

use std::rc::Rc;

/// Logical program counter as seen by the source program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter {
    /// Logical address. Values set explicitly are not masked until the end
    /// of the current statement.
    pub value: u32,
    pub defined: bool,
    /// Bytes produced by the statement being processed.
    pub pending_advance: u32,
}

impl ProgramCounter {
    /// State at the start of a pass: zero and undefined.
    pub const fn undefined() -> Self {
        Self {
            value: 0,
            defined: false,
            pending_advance: 0,
        }
    }
}

impl Default for ProgramCounter {
    fn default() -> Self {
        Self::undefined()
    }
}

/// One level of offset assembly.
///
/// Label values captured while a context was active keep a handle to it, so
/// contexts outlive their time on the active chain.
#[derive(Debug)]
pub struct OffsetContext {
    outer: Option<Rc<OffsetContext>>,
    delta: u32,
    outer_defined: bool,
}

impl OffsetContext {
    pub(crate) fn new(outer: Option<Rc<OffsetContext>>, delta: u32, outer_defined: bool) -> Self {
        Self {
            outer,
            delta,
            outer_defined,
        }
    }

    /// Enclosing context, if any.
    pub fn outer(&self) -> Option<&Rc<OffsetContext>> {
        self.outer.as_ref()
    }

    /// Logical minus physical address, modulo 2^32.
    pub fn delta(&self) -> u32 {
        self.delta
    }

    /// Definedness of the PC when this context was entered.
    pub fn outer_defined(&self) -> bool {
        self.outer_defined
    }
}

/// Walk `levels` contexts outward from `context`, removing each offset.
///
/// Returns `None` if the chain ends before `levels` reaches zero.
pub fn unproject_address(
    mut address: u32,
    mut context: Option<&Rc<OffsetContext>>,
    levels: u32,
    mask: u32,
) -> Option<u32> {
    for _ in 0..levels {
        let ctx = context?;
        address = address.wrapping_sub(ctx.delta) & mask;
        context = ctx.outer();
    }
    Some(address)
}
