// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later


//! Execution breakpoints, run-to-address and an external RAM watchpoint.
//!
//! The machine consults the debugger before every instruction of a frame.
//! When it stops, the frame is abandoned where it is; the next
//! `run_frame` starts a fresh one.

use log::info;

use crate::core::memory::XRAM_SIZE;
use crate::error::DebugError;

pub const MAX_BREAKPOINTS: usize = 16;

/// Why the last frame stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u16),
    RunTo(u16),
    Watch { addr: u16, old: u8, new: u8 },
}

#[derive(Debug, Clone, Copy)]
struct Watch {
    addr: u16,
    last: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Debugger {
    active: bool,
    stopped: Option<StopReason>,
    breakpoints: Vec<u16>,
    run_to: Option<u16>,
    watch: Option<Watch>,
    // pc we resumed from; its breakpoint is skipped once
    resume_pc: Option<u16>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enabling arms every stop condition; disabling also resumes.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.stopped = None;
            self.resume_pc = None;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    pub fn breakpoints(&self) -> &[u16] {
        &self.breakpoints
    }

    pub fn add_breakpoint(&mut self, addr: u16) -> Result<(), DebugError> {
        if addr > 0x0FFF {
            return Err(DebugError::ProgramAddress(addr));
        }
        if self.breakpoints.contains(&addr) {
            return Ok(());
        }
        if self.breakpoints.len() == MAX_BREAKPOINTS {
            return Err(DebugError::BreakpointLimit(MAX_BREAKPOINTS));
        }
        self.breakpoints.push(addr);
        Ok(())
    }

    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|&bp| bp != addr);
        self.breakpoints.len() != before
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// One-shot stop the next time the PC reaches `addr`.
    pub fn run_to(&mut self, addr: u16) -> Result<(), DebugError> {
        if addr > 0x0FFF {
            return Err(DebugError::ProgramAddress(addr));
        }
        self.run_to = Some(addr);
        Ok(())
    }

    /// Stop whenever the byte at external RAM `addr` changes.
    pub fn set_watch(&mut self, addr: u16) -> Result<(), DebugError> {
        if addr as usize >= XRAM_SIZE {
            return Err(DebugError::RamAddress(addr));
        }
        self.watch = Some(Watch { addr, last: None });
        Ok(())
    }

    pub fn clear_watch(&mut self) {
        self.watch = None;
    }

    pub fn watch_address(&self) -> Option<u16> {
        self.watch.map(|w| w.addr)
    }

    /// Leave the stopped state; execution continues from `pc` without
    /// re-triggering a breakpoint there.
    pub fn resume(&mut self, pc: u16) {
        self.stopped = None;
        self.resume_pc = Some(pc);
    }

    /// Pre-instruction check. Returns true when execution must stop.
    pub(crate) fn check_pc(&mut self, pc: u16) -> bool {
        if !self.active {
            return false;
        }
        if self.stopped.is_some() {
            return true;
        }
        if self.resume_pc.take() == Some(pc) {
            return false;
        }
        let reason = if self.run_to == Some(pc) {
            self.run_to = None;
            StopReason::RunTo(pc)
        } else if self.breakpoints.contains(&pc) {
            StopReason::Breakpoint(pc)
        } else {
            return false;
        };
        info!("debugger: {reason:?}");
        self.stopped = Some(reason);
        true
    }

    /// Post-instruction check of the watched byte.
    pub(crate) fn check_watch(&mut self, xram: &[u8]) -> bool {
        if !self.active {
            return false;
        }
        let Some(watch) = self.watch.as_mut() else {
            return false;
        };
        let Some(&value) = xram.get(watch.addr as usize) else {
            return false;
        };
        match watch.last.replace(value) {
            Some(old) if old != value => {
                let reason = StopReason::Watch {
                    addr: watch.addr,
                    old,
                    new: value,
                };
                info!("debugger: {reason:?}");
                self.stopped = Some(reason);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_debugger_never_stops() {
        let mut dbg = Debugger::new();
        dbg.add_breakpoint(0x010).unwrap();
        assert!(!dbg.check_pc(0x010));
    }

    #[test]
    fn breakpoint_table_is_bounded() {
        let mut dbg = Debugger::new();
        for addr in 0..MAX_BREAKPOINTS as u16 {
            dbg.add_breakpoint(addr).unwrap();
        }
        // duplicates are not new entries
        assert_eq!(dbg.add_breakpoint(0), Ok(()));
        assert_eq!(
            dbg.add_breakpoint(0x100),
            Err(DebugError::BreakpointLimit(MAX_BREAKPOINTS))
        );
        assert!(dbg.remove_breakpoint(3));
        assert!(!dbg.remove_breakpoint(3));
        assert_eq!(dbg.add_breakpoint(0x100), Ok(()));
        assert_eq!(
            dbg.add_breakpoint(0x1000),
            Err(DebugError::ProgramAddress(0x1000))
        );
    }

    #[test]
    fn resume_skips_current_breakpoint_once() {
        let mut dbg = Debugger::new();
        dbg.set_active(true);
        dbg.add_breakpoint(0x020).unwrap();
        assert!(dbg.check_pc(0x020));
        assert_eq!(dbg.stop_reason(), Some(StopReason::Breakpoint(0x020)));
        assert!(dbg.check_pc(0x021));

        dbg.resume(0x020);
        assert!(!dbg.check_pc(0x020));
        assert!(!dbg.check_pc(0x021));
        assert!(dbg.check_pc(0x020));
    }

    #[test]
    fn run_to_fires_once() {
        let mut dbg = Debugger::new();
        dbg.set_active(true);
        dbg.run_to(0x0AB).unwrap();
        assert!(dbg.check_pc(0x0AB));
        assert_eq!(dbg.stop_reason(), Some(StopReason::RunTo(0x0AB)));
        dbg.resume(0x0AC);
        assert!(!dbg.check_pc(0x0AB));
    }

    #[test]
    fn watch_reports_changes_only() {
        let mut dbg = Debugger::new();
        dbg.set_active(true);
        dbg.set_watch(0x105).unwrap();
        let mut xram = [0u8; XRAM_SIZE];
        xram[0x105] = 7;
        assert!(!dbg.check_watch(&xram));
        assert!(!dbg.check_watch(&xram));
        xram[0x105] = 9;
        assert!(dbg.check_watch(&xram));
        assert_eq!(
            dbg.stop_reason(),
            Some(StopReason::Watch {
                addr: 0x105,
                old: 7,
                new: 9
            })
        );
        assert_eq!(dbg.set_watch(0x400), Err(DebugError::RamAddress(0x400)));
    }

    #[test]
    fn disabling_clears_stop() {
        let mut dbg = Debugger::new();
        dbg.set_active(true);
        dbg.add_breakpoint(0).unwrap();
        assert!(dbg.check_pc(0));
        dbg.set_active(false);
        assert!(!dbg.is_stopped());
    }
}
