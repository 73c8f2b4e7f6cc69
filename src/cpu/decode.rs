// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Opcode decoding into a tagged instruction set.
//!
//! Decoding is pure: immediate operands and branch targets are fetched by
//! the executor, so `decode` never touches memory.

/// Source operand of an accumulator instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Working register R0-R7 of the selected bank.
    Register(u8),
    /// Internal RAM addressed through R0 or R1.
    Indirect(u8),
    /// Byte following the opcode.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Addc,
    Anl,
    Orl,
    Xrl,
}

/// Branch condition for the two-byte in-page jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Carry,
    NoCarry,
    Zero,
    NotZero,
    T0,
    NotT0,
    T1,
    NotT1,
    F0,
    F1,
    /// Taken when the timer overflow flag is set; clears the flag.
    TimerFlag,
    /// External interrupt line; not wired on this board, never taken.
    NotInt,
    /// Accumulator bit set.
    Bit(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Bus,
    P1,
    P2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    // data movement
    MovA(Operand),
    MovReg(u8),
    MovRegImm(u8),
    MovIndirect(u8),
    MovIndirectImm(u8),
    XchReg(u8),
    XchIndirect(u8),
    Xchd(u8),
    // arithmetic and logic
    Alu(AluOp, Operand),
    IncA,
    DecA,
    IncReg(u8),
    DecReg(u8),
    IncIndirect(u8),
    ClrA,
    CplA,
    DaA,
    SwapA,
    Rl,
    Rlc,
    Rr,
    Rrc,
    // flags and bank selects
    ClrC,
    CplC,
    ClrF0,
    CplF0,
    ClrF1,
    CplF1,
    SelRb(bool),
    SelMb(bool),
    MovAPsw,
    MovPswA,
    // control flow
    Jmp(u16),
    Jmpp,
    Djnz(u8),
    Jcc(Condition),
    Call(u16),
    Ret,
    Retr,
    // interrupts, timer and counter
    Ei,
    Di,
    EnTcnti,
    DisTcnti,
    StrtT,
    StrtCnt,
    StopTcnt,
    MovAT,
    MovTA,
    EntClk,
    // ports and external memory
    In(Port),
    Outl(Port),
    AnlPort(Port),
    OrlPort(Port),
    MovxRead(u8),
    MovxWrite(u8),
    Movp,
    Movp3,
    /// Port-expander read; the expander is absent so the nibble reads high.
    MovdRead,
    /// Port-expander write or logic op; no effect.
    Expander,
    Unknown(u8),
}

impl Instruction {
    /// Machine cycles taken by this instruction.
    pub fn cycles(&self) -> u32 {
        use Instruction::*;
        match self {
            MovA(Operand::Immediate)
            | Alu(_, Operand::Immediate)
            | MovRegImm(_)
            | MovIndirectImm(_)
            | Jmp(_)
            | Jmpp
            | Djnz(_)
            | Jcc(_)
            | Call(_)
            | Ret
            | Retr
            | In(_)
            | Outl(_)
            | AnlPort(_)
            | OrlPort(_)
            | MovxRead(_)
            | MovxWrite(_)
            | Movp
            | Movp3
            | MovdRead
            | Expander => 2,
            _ => 1,
        }
    }
}

/// Page-select bits of an absolute JMP or CALL (opcode bits 5-7 -> address bits 8-10).
fn page_bits(op: u8) -> u16 {
    ((op & 0xE0) as u16) << 3
}

pub fn decode(op: u8) -> Instruction {
    use Instruction::*;

    let reg = op & 0x07;
    let ind = op & 0x01;

    match op {
        0x00 => Nop,

        0xF8..=0xFF => MovA(Operand::Register(reg)),
        0xF0 | 0xF1 => MovA(Operand::Indirect(ind)),
        0x23 => MovA(Operand::Immediate),
        0xA8..=0xAF => MovReg(reg),
        0xB8..=0xBF => MovRegImm(reg),
        0xA0 | 0xA1 => MovIndirect(ind),
        0xB0 | 0xB1 => MovIndirectImm(ind),

        0x28..=0x2F => XchReg(reg),
        0x20 | 0x21 => XchIndirect(ind),
        0x30 | 0x31 => Xchd(ind),

        0x68..=0x6F => Alu(AluOp::Add, Operand::Register(reg)),
        0x60 | 0x61 => Alu(AluOp::Add, Operand::Indirect(ind)),
        0x03 => Alu(AluOp::Add, Operand::Immediate),
        0x78..=0x7F => Alu(AluOp::Addc, Operand::Register(reg)),
        0x70 | 0x71 => Alu(AluOp::Addc, Operand::Indirect(ind)),
        0x13 => Alu(AluOp::Addc, Operand::Immediate),
        0x58..=0x5F => Alu(AluOp::Anl, Operand::Register(reg)),
        0x50 | 0x51 => Alu(AluOp::Anl, Operand::Indirect(ind)),
        0x53 => Alu(AluOp::Anl, Operand::Immediate),
        0x48..=0x4F => Alu(AluOp::Orl, Operand::Register(reg)),
        0x40 | 0x41 => Alu(AluOp::Orl, Operand::Indirect(ind)),
        0x43 => Alu(AluOp::Orl, Operand::Immediate),
        0xD8..=0xDF => Alu(AluOp::Xrl, Operand::Register(reg)),
        0xD0 | 0xD1 => Alu(AluOp::Xrl, Operand::Indirect(ind)),
        0xD3 => Alu(AluOp::Xrl, Operand::Immediate),

        0x17 => IncA,
        0x07 => DecA,
        0x18..=0x1F => IncReg(reg),
        0xC8..=0xCF => DecReg(reg),
        0x10 | 0x11 => IncIndirect(ind),
        0x27 => ClrA,
        0x37 => CplA,
        0x57 => DaA,
        0x47 => SwapA,
        0xE7 => Rl,
        0xF7 => Rlc,
        0x77 => Rr,
        0x67 => Rrc,

        0x97 => ClrC,
        0xA7 => CplC,
        0x85 => ClrF0,
        0x95 => CplF0,
        0xA5 => ClrF1,
        0xB5 => CplF1,
        0xC5 => SelRb(false),
        0xD5 => SelRb(true),
        0xE5 => SelMb(false),
        0xF5 => SelMb(true),
        0xC7 => MovAPsw,
        0xD7 => MovPswA,

        _ if op & 0x1F == 0x04 => Jmp(page_bits(op)),
        _ if op & 0x1F == 0x14 => Call(page_bits(op)),
        _ if op & 0x1F == 0x12 => Jcc(Condition::Bit(op >> 5)),
        0xB3 => Jmpp,
        0xE8..=0xEF => Djnz(reg),
        0xF6 => Jcc(Condition::Carry),
        0xE6 => Jcc(Condition::NoCarry),
        0xC6 => Jcc(Condition::Zero),
        0x96 => Jcc(Condition::NotZero),
        0x36 => Jcc(Condition::T0),
        0x26 => Jcc(Condition::NotT0),
        0x56 => Jcc(Condition::T1),
        0x46 => Jcc(Condition::NotT1),
        0xB6 => Jcc(Condition::F0),
        0x76 => Jcc(Condition::F1),
        0x16 => Jcc(Condition::TimerFlag),
        0x86 => Jcc(Condition::NotInt),
        0x83 => Ret,
        0x93 => Retr,

        0x05 => Ei,
        0x15 => Di,
        0x25 => EnTcnti,
        0x35 => DisTcnti,
        0x55 => StrtT,
        0x45 => StrtCnt,
        0x65 => StopTcnt,
        0x42 => MovAT,
        0x62 => MovTA,
        0x75 => EntClk,

        0x08 => In(Port::Bus),
        0x09 => In(Port::P1),
        0x0A => In(Port::P2),
        0x02 => Outl(Port::Bus),
        0x39 => Outl(Port::P1),
        0x3A => Outl(Port::P2),
        0x98 => AnlPort(Port::Bus),
        0x99 => AnlPort(Port::P1),
        0x9A => AnlPort(Port::P2),
        0x88 => OrlPort(Port::Bus),
        0x89 => OrlPort(Port::P1),
        0x8A => OrlPort(Port::P2),
        0x80 | 0x81 => MovxRead(ind),
        0x90 | 0x91 => MovxWrite(ind),
        0xA3 => Movp,
        0xE3 => Movp3,
        0x0C..=0x0F => MovdRead,
        0x3C..=0x3F | 0x8C..=0x8F | 0x9C..=0x9F => Expander,

        _ => Unknown(op),
    }
}
