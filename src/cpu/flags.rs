// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! 8048 status and latch bit definitions.

use bitflags::bitflags;

bitflags! {
    /// Upper nibble of the program status word. The low three bits hold the
    /// stack pointer and live in [`Cpu::sp`](super::Cpu::sp).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Psw: u8 {
        const CARRY = 0x80;
        const AUX_CARRY = 0x40;
        const F0 = 0x20;
        const BANK_SELECT = 0x10;
    }
}

bitflags! {
    /// Packed core flags as stored in save records and rewind snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CoreLatches: u8 {
        const MEMORY_BANK = 0x01;
        const CARRY = 0x02;
        const AUX_CARRY = 0x04;
        const F0 = 0x08;
        const F1 = 0x10;
        const BANK_SELECT = 0x20;
        const TIMER_RUN = 0x40;
        const COUNTER_RUN = 0x80;
    }
}

bitflags! {
    /// Packed timer/interrupt flags as stored in save records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrqLatches: u8 {
        const TIMER_OVERFLOW = 0x01;
        const TIMER_IRQ_ENABLE = 0x02;
        const IRQ_ENABLE = 0x04;
        const IRQ_PENDING = 0x08;
        const IN_IRQ = 0x10;
    }
}
