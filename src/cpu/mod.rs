// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Intel 8048 core.
//!
//! The core owns registers, flags, the timer/counter and interrupt state.
//! Program and data memory live in [`Memory`]; port traffic goes through a
//! [`PortIo`] implementation supplied by the caller for each step, so the CPU
//! never holds a reference to the rest of the machine.

mod decode;
mod execute;
pub mod flags;

use log::{trace, warn};

use crate::core::memory::Memory;

pub use decode::{AluOp, Condition, Instruction, Operand, Port, decode};
pub use flags::{CoreLatches, IrqLatches, Psw};

/// Power-on level of port 1: boot ROM overlay enabled (bit 2 low).
pub const P1_RESET: u8 = 0xFB;
pub const P2_RESET: u8 = 0xFF;
/// Timer prescaler divides machine cycles by this.
pub const TIMER_PRESCALE: u32 = 32;
pub const IRQ_VECTOR: u16 = 0x007;

const STACK_BASE: u8 = 8;
const BANK1_BASE: u8 = 24;

/// Board-side view of the CPU's ports.
pub trait PortIo {
    /// Value returned by `IN`/`INS`. `latch` is the CPU's own output latch for
    /// that port.
    fn read_port(&mut self, port: Port, latch: u8) -> u8;

    /// Called after the CPU updates an output latch.
    fn write_port(&mut self, port: Port, value: u8);

    /// `MOVX A,@Rr` puts `data` on the bus while P2 holds `p2`.
    fn external_read(&mut self, p2: u8, data: u8);
}

/// Ports tied off: inputs float high, outputs go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconnected;

impl PortIo for Unconnected {
    fn read_port(&mut self, port: Port, latch: u8) -> u8 {
        match port {
            Port::Bus => 0xFF,
            Port::P1 | Port::P2 => latch,
        }
    }

    fn write_port(&mut self, _port: Port, _value: u8) {}

    fn external_read(&mut self, _p2: u8, _data: u8) {}
}

pub struct Cpu {
    pub a: u8,
    /// 12-bit program counter.
    pub pc: u16,
    pub psw: Psw,
    /// 3-bit stack pointer.
    pub sp: u8,
    pub f1: bool,
    /// Memory bank flip-flop, applied to the next JMP/CALL.
    pub mb: bool,

    pub timer: u8,
    pub prescaler: u32,
    pub timer_running: bool,
    pub counter_running: bool,
    pub timer_overflow: bool,
    pub timer_irq_enabled: bool,

    pub irq_enabled: bool,
    pub irq_pending: bool,
    pub in_irq: bool,
    /// Instructions left before a freshly enabled interrupt may be taken.
    pub ei_delay: u8,

    pub t0: bool,
    pub t1: bool,

    pub p1: u8,
    pub p2: u8,
    pub bus: u8,

    pub cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            pc: 0,
            psw: Psw::empty(),
            sp: 0,
            f1: false,
            mb: false,
            timer: 0,
            prescaler: 0,
            timer_running: false,
            counter_running: false,
            timer_overflow: false,
            timer_irq_enabled: false,
            irq_enabled: false,
            irq_pending: false,
            in_irq: false,
            ei_delay: 0,
            t0: true,
            t1: true,
            p1: P1_RESET,
            p2: P2_RESET,
            bus: 0,
            cycles: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fetch, decode and execute one instruction, then advance the timer and
    /// take a pending interrupt if allowed. Returns machine cycles used.
    pub fn execute_one<I: PortIo>(&mut self, mem: &mut Memory, io: &mut I) -> u32 {
        let op_pc = self.pc;
        let opcode = self.fetch(mem);
        let instr = decode(opcode);
        if let Instruction::Unknown(op) = instr {
            warn!("unknown opcode {op:#04X} at {op_pc:#05X}");
        }
        self.execute(instr, mem, io);

        let cycles = instr.cycles();
        self.cycles = self.cycles.wrapping_add(cycles as u64);
        self.tick_timer(cycles);
        self.service_interrupt(mem);
        cycles
    }

    /// Next program byte; the counter wraps at 12 bits without page wrap.
    pub(crate) fn fetch(&mut self, mem: &Memory) -> u8 {
        let byte = mem.read_rom(self.pc, self.p1);
        self.pc = (self.pc + 1) & 0x0FFF;
        byte
    }

    fn tick_timer(&mut self, cycles: u32) {
        if !self.timer_running {
            return;
        }
        self.prescaler += cycles;
        while self.prescaler >= TIMER_PRESCALE {
            self.prescaler -= TIMER_PRESCALE;
            self.increment_timer();
        }
    }

    fn increment_timer(&mut self) {
        self.timer = self.timer.wrapping_add(1);
        if self.timer == 0 {
            self.timer_overflow = true;
            if self.timer_irq_enabled && self.irq_enabled && !self.in_irq {
                self.irq_pending = true;
            }
        }
    }

    /// Drive the T1 input. In counter mode a high-to-low transition counts.
    pub fn clock_t1(&mut self, level: bool) {
        if self.counter_running && self.t1 && !level {
            self.increment_timer();
        }
        self.t1 = level;
    }

    fn service_interrupt(&mut self, mem: &mut Memory) {
        // The instruction after EI always runs before dispatch.
        if self.ei_delay > 0 {
            self.ei_delay -= 1;
            return;
        }
        if self.irq_pending && self.irq_enabled && !self.in_irq {
            trace!("timer interrupt from {:#05X}", self.pc);
            self.irq_pending = false;
            self.in_irq = true;
            self.irq_enabled = false;
            self.push_return(mem);
            self.pc = IRQ_VECTOR;
        }
    }

    /// Full PSW byte with the stack pointer in bits 0-2.
    pub fn psw_byte(&self) -> u8 {
        self.psw.bits() | (self.sp & 0x07)
    }

    pub fn set_psw_byte(&mut self, value: u8) {
        self.psw = Psw::from_bits_truncate(value);
        self.sp = value & 0x07;
    }

    pub fn carry(&self) -> bool {
        self.psw.contains(Psw::CARRY)
    }

    pub(crate) fn set_carry(&mut self, on: bool) {
        self.psw.set(Psw::CARRY, on);
    }

    /// Internal RAM address of working register `r` in the selected bank.
    pub fn register_address(&self, r: u8) -> u8 {
        let base = if self.psw.contains(Psw::BANK_SELECT) {
            BANK1_BASE
        } else {
            0
        };
        base + (r & 0x07)
    }

    pub fn reg(&self, mem: &Memory, r: u8) -> u8 {
        mem.read_iram(self.register_address(r))
    }

    pub fn set_reg(&mut self, mem: &mut Memory, r: u8, value: u8) {
        mem.write_iram(self.register_address(r), value);
    }

    /// Push PC and the PSW upper nibble onto the internal-RAM stack.
    pub(crate) fn push_return(&mut self, mem: &mut Memory) {
        let addr = STACK_BASE + self.sp * 2;
        mem.write_iram(addr, self.pc as u8);
        mem.write_iram(addr + 1, ((self.pc >> 8) as u8 & 0x0F) | (self.psw_byte() & 0xF0));
        self.sp = (self.sp + 1) & 0x07;
    }

    /// Pop a return address; returns the saved PSW nibble in bits 4-7.
    pub(crate) fn pop_return(&mut self, mem: &Memory) -> u8 {
        self.sp = self.sp.wrapping_sub(1) & 0x07;
        let addr = STACK_BASE + self.sp * 2;
        let lo = mem.read_iram(addr) as u16;
        let hi = mem.read_iram(addr + 1);
        self.pc = (((hi & 0x0F) as u16) << 8) | lo;
        hi & 0xF0
    }

    /// Core and interrupt flags in their packed save-record form.
    pub fn latches(&self) -> (CoreLatches, IrqLatches) {
        let mut core = CoreLatches::empty();
        core.set(CoreLatches::MEMORY_BANK, self.mb);
        core.set(CoreLatches::CARRY, self.psw.contains(Psw::CARRY));
        core.set(CoreLatches::AUX_CARRY, self.psw.contains(Psw::AUX_CARRY));
        core.set(CoreLatches::F0, self.psw.contains(Psw::F0));
        core.set(CoreLatches::F1, self.f1);
        core.set(CoreLatches::BANK_SELECT, self.psw.contains(Psw::BANK_SELECT));
        core.set(CoreLatches::TIMER_RUN, self.timer_running);
        core.set(CoreLatches::COUNTER_RUN, self.counter_running);

        let mut irq = IrqLatches::empty();
        irq.set(IrqLatches::TIMER_OVERFLOW, self.timer_overflow);
        irq.set(IrqLatches::TIMER_IRQ_ENABLE, self.timer_irq_enabled);
        irq.set(IrqLatches::IRQ_ENABLE, self.irq_enabled);
        irq.set(IrqLatches::IRQ_PENDING, self.irq_pending);
        irq.set(IrqLatches::IN_IRQ, self.in_irq);
        (core, irq)
    }

    pub fn set_latches(&mut self, core: CoreLatches, irq: IrqLatches) {
        self.mb = core.contains(CoreLatches::MEMORY_BANK);
        self.psw.set(Psw::CARRY, core.contains(CoreLatches::CARRY));
        self.psw.set(Psw::AUX_CARRY, core.contains(CoreLatches::AUX_CARRY));
        self.psw.set(Psw::F0, core.contains(CoreLatches::F0));
        self.f1 = core.contains(CoreLatches::F1);
        self.psw
            .set(Psw::BANK_SELECT, core.contains(CoreLatches::BANK_SELECT));
        self.timer_running = core.contains(CoreLatches::TIMER_RUN);
        self.counter_running = core.contains(CoreLatches::COUNTER_RUN);

        self.timer_overflow = irq.contains(IrqLatches::TIMER_OVERFLOW);
        self.timer_irq_enabled = irq.contains(IrqLatches::TIMER_IRQ_ENABLE);
        self.irq_enabled = irq.contains(IrqLatches::IRQ_ENABLE);
        self.irq_pending = irq.contains(IrqLatches::IRQ_PENDING);
        self.in_irq = irq.contains(IrqLatches::IN_IRQ);
    }

    /// One-line register dump for debug logging.
    pub fn registers(&self, mem: &Memory) -> String {
        let regs: Vec<String> = (0..8)
            .map(|r| format!("{:02X}", self.reg(mem, r)))
            .collect();
        format!(
            "PC={:03X} A={:02X} PSW={:02X} SP={} R=[{}] T={:02X} P1={:02X} P2={:02X} MB={} IRQ={}{}",
            self.pc,
            self.a,
            self.psw_byte(),
            self.sp,
            regs.join(" "),
            self.timer,
            self.p1,
            self.p2,
            self.mb as u8,
            if self.irq_enabled { 'E' } else { '-' },
            if self.in_irq { 'I' } else { '-' },
        )
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// CPU with the boot overlay disabled and `program` at cartridge address 0.
    pub(super) fn setup(program: &[u8]) -> (Cpu, Memory) {
        let mut mem = Memory::new();
        let mut cart = vec![0u8; 4096];
        cart[..program.len()].copy_from_slice(program);
        mem.load_cartridge(&cart).unwrap();
        let mut cpu = Cpu::new();
        cpu.p1 = 0xFF;
        (cpu, mem)
    }

    pub(super) fn run(cpu: &mut Cpu, mem: &mut Memory, steps: usize) -> u32 {
        (0..steps)
            .map(|_| cpu.execute_one(mem, &mut Unconnected))
            .sum()
    }

    #[test]
    fn power_on_state() {
        let cpu = Cpu::new();
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.p1, 0xFB);
        assert_eq!(cpu.p2, 0xFF);
        assert!(cpu.t0);
        assert!(!cpu.irq_enabled);
    }

    #[test]
    fn sequential_fetch_does_not_wrap_within_page() {
        let mut program = vec![0u8; 0x101];
        program[0xFF] = 0x27; // CLR A at the end of page 0
        let (mut cpu, mut mem) = setup(&program);
        cpu.pc = 0x0FF;
        cpu.a = 0x55;
        run(&mut cpu, &mut mem, 1);
        assert_eq!(cpu.pc, 0x100);
        assert_eq!(cpu.a, 0);
    }

    #[test]
    fn program_counter_wraps_at_twelve_bits() {
        let (mut cpu, mut mem) = setup(&[]);
        cpu.pc = 0xFFF;
        run(&mut cpu, &mut mem, 1);
        assert_eq!(cpu.pc, 0x000);
    }

    #[test]
    fn timer_overflows_after_prescaled_cycles() {
        let (mut cpu, mut mem) = setup(&[]);
        cpu.timer = 0xFE;
        cpu.timer_running = true;
        let cycles = run(&mut cpu, &mut mem, 64);
        assert_eq!(cycles, 64);
        assert_eq!(cpu.timer, 0x00);
        assert!(cpu.timer_overflow);
        assert!(!cpu.irq_pending);
    }

    #[test]
    fn overflow_with_timer_interrupt_dispatches_to_vector() {
        let (mut cpu, mut mem) = setup(&[]);
        cpu.pc = 0x123;
        cpu.timer = 0xFF;
        cpu.prescaler = 31;
        cpu.timer_running = true;
        cpu.timer_irq_enabled = true;
        cpu.irq_enabled = true;
        cpu.psw = Psw::CARRY;

        run(&mut cpu, &mut mem, 1);
        assert_eq!(cpu.pc, IRQ_VECTOR);
        assert!(cpu.in_irq);
        assert!(!cpu.irq_enabled);
        assert_eq!(cpu.sp, 1);
        assert_eq!(mem.iram[8], 0x24);
        assert_eq!(mem.iram[9], 0x81);
    }

    #[test]
    fn counter_counts_falling_edges_of_t1() {
        let mut cpu = Cpu::new();
        cpu.counter_running = true;
        cpu.timer = 0xFF;
        cpu.clock_t1(false);
        assert_eq!(cpu.timer, 0);
        assert!(cpu.timer_overflow);
        cpu.clock_t1(false);
        cpu.clock_t1(true);
        assert_eq!(cpu.timer, 0);
        cpu.clock_t1(false);
        assert_eq!(cpu.timer, 1);
    }

    #[test]
    fn counter_ignores_edges_when_stopped() {
        let mut cpu = Cpu::new();
        cpu.clock_t1(false);
        cpu.clock_t1(true);
        assert_eq!(cpu.timer, 0);
        assert!(cpu.t1);
    }

    #[test]
    fn latches_round_trip() {
        let mut cpu = Cpu::new();
        cpu.mb = true;
        cpu.psw = Psw::AUX_CARRY | Psw::BANK_SELECT;
        cpu.counter_running = true;
        cpu.irq_pending = true;
        cpu.in_irq = true;
        let (core, irq) = cpu.latches();
        assert_eq!(core.bits(), 0x01 | 0x04 | 0x20 | 0x80);
        assert_eq!(irq.bits(), 0x08 | 0x10);

        let mut other = Cpu::new();
        other.set_latches(core, irq);
        assert_eq!(other.latches(), (core, irq));
        assert_eq!(other.psw, cpu.psw);
    }

    #[test]
    fn register_bank_select_moves_registers() {
        let (mut cpu, mut mem) = setup(&[]);
        cpu.set_reg(&mut mem, 2, 0x11);
        cpu.psw.insert(Psw::BANK_SELECT);
        cpu.set_reg(&mut mem, 2, 0x22);
        assert_eq!(mem.iram[2], 0x11);
        assert_eq!(mem.iram[26], 0x22);
    }

    #[test]
    fn register_dump_mentions_pc() {
        let (cpu, mem) = setup(&[]);
        assert!(cpu.registers(&mem).starts_with("PC=000 A=00"));
    }
}
