// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded per-frame history for rewinding.

use std::collections::VecDeque;

use log::trace;

use crate::core::memory::{IRAM_SIZE, Memory, XRAM_SIZE};
use crate::cpu::{CoreLatches, Cpu, IrqLatches};
use crate::display::Display;
use crate::sound::SoundRegisters;

/// Two seconds at 15 frames per second.
pub const REWIND_CAPACITY: usize = 120;

/// Compact machine state: CPU core, RAM, phosphor buffer and the sound
/// registers needed to keep the command protocol in step.
#[derive(Debug, Clone, PartialEq)]
pub struct RewindSnapshot {
    a: u8,
    pc: u16,
    sp: u8,
    p1: u8,
    p2: u8,
    bus: u8,
    timer: u8,
    prescaler: u32,
    core: CoreLatches,
    irq: IrqLatches,
    iram: [u8; IRAM_SIZE],
    xram: Box<[u8; XRAM_SIZE]>,
    phosphor: Vec<f32>,
    pub sound: SoundRegisters,
}

impl RewindSnapshot {
    pub fn capture(cpu: &Cpu, mem: &Memory, display: &Display, sound: SoundRegisters) -> Self {
        let (core, irq) = cpu.latches();
        Self {
            a: cpu.a,
            pc: cpu.pc,
            sp: cpu.sp,
            p1: cpu.p1,
            p2: cpu.p2,
            bus: cpu.bus,
            timer: cpu.timer,
            prescaler: cpu.prescaler,
            core,
            irq,
            iram: mem.iram,
            xram: Box::new(mem.xram),
            phosphor: display.phosphor().to_vec(),
            sound,
        }
    }

    /// Restore CPU, RAM and phosphor. The caller restores [`Self::sound`]
    /// under the engine lock.
    pub fn apply(&self, cpu: &mut Cpu, mem: &mut Memory, display: &mut Display) {
        cpu.a = self.a;
        cpu.pc = self.pc & 0x0FFF;
        cpu.sp = self.sp & 0x07;
        cpu.p1 = self.p1;
        cpu.p2 = self.p2;
        cpu.bus = self.bus;
        cpu.timer = self.timer;
        cpu.prescaler = self.prescaler;
        cpu.set_latches(self.core, self.irq);
        cpu.ei_delay = 0;
        mem.iram = self.iram;
        mem.xram = *self.xram;
        display.restore_phosphor(&self.phosphor);
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn p2(&self) -> u8 {
        self.p2
    }
}

/// Ring of the most recent snapshots, oldest dropped first.
#[derive(Debug, Default)]
pub struct RewindBuffer {
    frames: VecDeque<RewindSnapshot>,
}

impl RewindBuffer {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(REWIND_CAPACITY),
        }
    }

    pub fn push(&mut self, snapshot: RewindSnapshot) {
        if self.frames.len() == REWIND_CAPACITY {
            self.frames.pop_front();
        }
        self.frames.push_back(snapshot);
        trace!("rewind push, depth {}", self.frames.len());
    }

    /// Most recent snapshot, or `None` when history is empty.
    pub fn pop(&mut self) -> Option<RewindSnapshot> {
        let snap = self.frames.pop_back();
        trace!("rewind pop, depth {}", self.frames.len());
        snap
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_at(pc: u16) -> RewindSnapshot {
        let mut cpu = Cpu::new();
        cpu.pc = pc;
        RewindSnapshot::capture(&cpu, &Memory::new(), &Display::new(), SoundRegisters::default())
    }

    #[test]
    fn pop_on_empty_fails() {
        let mut buf = RewindBuffer::new();
        assert!(buf.pop().is_none());
    }

    #[test]
    fn pops_newest_first() {
        let mut buf = RewindBuffer::new();
        buf.push(snapshot_at(1));
        buf.push(snapshot_at(2));
        assert_eq!(buf.pop().map(|s| s.pc()), Some(2));
        assert_eq!(buf.pop().map(|s| s.pc()), Some(1));
        assert!(buf.is_empty());
    }

    #[test]
    fn oldest_is_overwritten_when_full() {
        let mut buf = RewindBuffer::new();
        for pc in 0..(REWIND_CAPACITY as u16 + 5) {
            buf.push(snapshot_at(pc));
        }
        assert_eq!(buf.len(), REWIND_CAPACITY);
        let mut last = None;
        while let Some(snap) = buf.pop() {
            last = Some(snap.pc());
        }
        assert_eq!(last, Some(5));
    }

    #[test]
    fn apply_restores_ram_and_phosphor() {
        let mut cpu = Cpu::new();
        cpu.a = 0x33;
        cpu.timer_overflow = true;
        let mut mem = Memory::new();
        mem.xram[0x200] = 0x12;
        let mut display = Display::new();
        display.begin_frame();
        display.write_led_register(0x80, 0x00);
        display.latch_column_on_strobe_edge();
        display.update(1.0);
        let snap = RewindSnapshot::capture(&cpu, &mem, &display, SoundRegisters::default());

        let mut cpu2 = Cpu::new();
        let mut mem2 = Memory::new();
        let mut display2 = Display::new();
        snap.apply(&mut cpu2, &mut mem2, &mut display2);
        assert_eq!(cpu2.a, 0x33);
        assert!(cpu2.timer_overflow);
        assert_eq!(mem2.xram[0x200], 0x12);
        assert_eq!(display2.phosphor(), display.phosphor());
    }
}
