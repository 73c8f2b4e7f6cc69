// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Instruction semantics.

use super::decode::{AluOp, Condition, Instruction, Operand, Port};
use super::{Cpu, PortIo, Psw};
use crate::core::memory::Memory;

impl Cpu {
    pub(super) fn execute<I: PortIo>(&mut self, instr: Instruction, mem: &mut Memory, io: &mut I) {
        use Instruction::*;

        match instr {
            Nop | EntClk | Expander | Unknown(_) => {}

            MovA(src) => self.a = self.operand(src, mem),
            MovReg(r) => self.set_reg(mem, r, self.a),
            MovRegImm(r) => {
                let imm = self.fetch(mem);
                self.set_reg(mem, r, imm);
            }
            MovIndirect(r) => mem.write_iram(self.reg(mem, r), self.a),
            MovIndirectImm(r) => {
                let imm = self.fetch(mem);
                mem.write_iram(self.reg(mem, r), imm);
            }
            XchReg(r) => {
                let value = self.reg(mem, r);
                self.set_reg(mem, r, self.a);
                self.a = value;
            }
            XchIndirect(r) => {
                let addr = self.reg(mem, r);
                let value = mem.read_iram(addr);
                mem.write_iram(addr, self.a);
                self.a = value;
            }
            Xchd(r) => {
                let addr = self.reg(mem, r);
                let value = mem.read_iram(addr);
                mem.write_iram(addr, (value & 0xF0) | (self.a & 0x0F));
                self.a = (self.a & 0xF0) | (value & 0x0F);
            }

            Alu(op, src) => {
                let value = self.operand(src, mem);
                match op {
                    AluOp::Add => self.add(value, false),
                    AluOp::Addc => self.add(value, true),
                    AluOp::Anl => self.a &= value,
                    AluOp::Orl => self.a |= value,
                    AluOp::Xrl => self.a ^= value,
                }
            }
            IncA => self.a = self.a.wrapping_add(1),
            DecA => self.a = self.a.wrapping_sub(1),
            IncReg(r) => {
                let value = self.reg(mem, r).wrapping_add(1);
                self.set_reg(mem, r, value);
            }
            DecReg(r) => {
                let value = self.reg(mem, r).wrapping_sub(1);
                self.set_reg(mem, r, value);
            }
            IncIndirect(r) => {
                let addr = self.reg(mem, r);
                mem.write_iram(addr, mem.read_iram(addr).wrapping_add(1));
            }
            ClrA => self.a = 0,
            CplA => self.a = !self.a,
            DaA => self.decimal_adjust(),
            SwapA => self.a = self.a.rotate_left(4),
            Rl => self.a = self.a.rotate_left(1),
            Rr => self.a = self.a.rotate_right(1),
            Rlc => {
                let carry_in = self.carry() as u8;
                self.set_carry(self.a & 0x80 != 0);
                self.a = (self.a << 1) | carry_in;
            }
            Rrc => {
                let carry_in = self.carry() as u8;
                self.set_carry(self.a & 0x01 != 0);
                self.a = (self.a >> 1) | (carry_in << 7);
            }

            ClrC => self.set_carry(false),
            CplC => self.psw.toggle(Psw::CARRY),
            ClrF0 => self.psw.remove(Psw::F0),
            CplF0 => self.psw.toggle(Psw::F0),
            ClrF1 => self.f1 = false,
            CplF1 => self.f1 = !self.f1,
            SelRb(bank1) => self.psw.set(Psw::BANK_SELECT, bank1),
            SelMb(bank1) => self.mb = bank1,
            MovAPsw => self.a = self.psw_byte(),
            MovPswA => self.set_psw_byte(self.a),

            Jmp(page) => {
                let low = self.fetch(mem) as u16;
                self.pc = self.long_target(page | low);
            }
            Jmpp => {
                let page = self.pc & 0xF00;
                let low = mem.read_rom(page | self.a as u16, self.p1) as u16;
                self.pc = page | low;
            }
            Djnz(r) => {
                let target = self.fetch(mem);
                let value = self.reg(mem, r).wrapping_sub(1);
                self.set_reg(mem, r, value);
                if value != 0 {
                    self.jump_in_page(target);
                }
            }
            Jcc(cond) => {
                let target = self.fetch(mem);
                if self.condition(cond) {
                    self.jump_in_page(target);
                }
            }
            Call(page) => {
                let low = self.fetch(mem) as u16;
                self.push_return(mem);
                self.pc = self.long_target(page | low);
            }
            Ret => {
                self.pop_return(mem);
            }
            Retr => {
                let saved = self.pop_return(mem);
                self.psw = Psw::from_bits_truncate(saved);
                self.irq_enabled = true;
                self.in_irq = false;
            }

            Ei => {
                self.irq_enabled = true;
                self.ei_delay = 1;
            }
            Di => self.irq_enabled = false,
            EnTcnti => self.timer_irq_enabled = true,
            DisTcnti => self.timer_irq_enabled = false,
            StrtT => {
                self.timer_running = true;
                self.counter_running = false;
                self.prescaler = 0;
            }
            StrtCnt => {
                self.counter_running = true;
                self.timer_running = false;
                self.prescaler = 0;
            }
            StopTcnt => {
                self.timer_running = false;
                self.counter_running = false;
                self.prescaler = 0;
            }
            MovAT => self.a = self.timer,
            MovTA => {
                self.timer = self.a;
                self.prescaler = 0;
            }

            In(port) => {
                let latch = self.port_latch(port);
                self.a = io.read_port(port, latch);
            }
            Outl(port) => self.write_latch(port, self.a, io),
            AnlPort(port) => {
                let mask = self.fetch(mem);
                let value = self.port_latch(port) & mask;
                self.write_latch(port, value, io);
            }
            OrlPort(port) => {
                let bits = self.fetch(mem);
                let value = self.port_latch(port) | bits;
                self.write_latch(port, value, io);
            }
            MovxRead(r) => {
                let data = mem.read_xram(self.p1, self.reg(mem, r));
                self.a = data;
                io.external_read(self.p2, data);
            }
            MovxWrite(r) => {
                let offset = self.reg(mem, r);
                mem.write_xram(self.p1, offset, self.a);
            }
            Movp => {
                let addr = (self.pc & 0xF00) | self.a as u16;
                self.a = mem.read_rom(addr, self.p1);
            }
            Movp3 => self.a = mem.read_rom(0x300 | self.a as u16, self.p1),
            MovdRead => self.a = 0x0F,
        }
    }

    fn operand(&mut self, src: Operand, mem: &Memory) -> u8 {
        match src {
            Operand::Register(r) => self.reg(mem, r),
            Operand::Indirect(r) => mem.read_iram(self.reg(mem, r)),
            Operand::Immediate => self.fetch(mem),
        }
    }

    fn add(&mut self, value: u8, with_carry: bool) {
        let carry_in = (with_carry && self.carry()) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let half = (self.a & 0x0F) as u16 + (value & 0x0F) as u16 + carry_in;
        self.psw.set(Psw::AUX_CARRY, half > 0x0F);
        self.set_carry(sum > 0xFF);
        self.a = sum as u8;
    }

    fn decimal_adjust(&mut self) {
        if self.a & 0x0F > 9 || self.psw.contains(Psw::AUX_CARRY) {
            let (adjusted, overflow) = self.a.overflowing_add(0x06);
            self.a = adjusted;
            if overflow {
                self.set_carry(true);
            }
        }
        if self.a >> 4 > 9 || self.carry() {
            self.a = self.a.wrapping_add(0x60);
            self.set_carry(true);
        }
    }

    fn condition(&mut self, cond: Condition) -> bool {
        match cond {
            Condition::Carry => self.carry(),
            Condition::NoCarry => !self.carry(),
            Condition::Zero => self.a == 0,
            Condition::NotZero => self.a != 0,
            Condition::T0 => self.t0,
            Condition::NotT0 => !self.t0,
            Condition::T1 => self.t1,
            Condition::NotT1 => !self.t1,
            Condition::F0 => self.psw.contains(Psw::F0),
            Condition::F1 => self.f1,
            Condition::TimerFlag => std::mem::take(&mut self.timer_overflow),
            Condition::NotInt => false,
            Condition::Bit(bit) => self.a & (1 << bit) != 0,
        }
    }

    /// Conditional branches stay in the page of the byte after the operand.
    fn jump_in_page(&mut self, low: u8) {
        self.pc = (self.pc & 0xF00) | low as u16;
    }

    fn long_target(&self, addr: u16) -> u16 {
        if self.mb { addr | 0x800 } else { addr }
    }

    fn port_latch(&self, port: Port) -> u8 {
        match port {
            Port::Bus => self.bus,
            Port::P1 => self.p1,
            Port::P2 => self.p2,
        }
    }

    fn write_latch<I: PortIo>(&mut self, port: Port, value: u8, io: &mut I) {
        match port {
            Port::Bus => self.bus = value,
            Port::P1 => self.p1 = value,
            Port::P2 => self.p2 = value,
        }
        io.write_port(port, value);
    }
}
