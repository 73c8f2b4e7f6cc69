// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Port decoder between the CPU and the rest of the board.
//!
//! - P1 bits 0-1 select the external RAM bank; bits 3-7 read the buttons
//! - P2 bits 4-7 carry the sound protocol nibbles, bit 4 doubles as the
//!   column strobe and bits 5-7 select the LED register
//! - the data bus is not connected and reads high

use crate::cpu::{Port, PortIo};
use crate::display::Display;
use crate::sound::SharedSound;

const COLUMN_STROBE: u8 = 0x10;

/// Controller state. Buttons pull their P1 lines low while held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub b1: bool,
    pub b2: bool,
    pub b3: bool,
    pub b4: bool,
}

impl Buttons {
    /// AND mask applied to P1 reads.
    pub fn p1_mask(&self) -> u8 {
        let lines: [(bool, u8); 8] = [
            (self.b1, 0x30),
            (self.b2, 0x50),
            (self.b3, 0x08),
            (self.b4, 0x90),
            (self.up, 0x20),
            (self.down, 0x10),
            (self.right, 0x40),
            (self.left, 0x80),
        ];
        lines
            .iter()
            .filter(|(held, _)| *held)
            .fold(0xFF, |mask, (_, bits)| mask & !bits)
    }

    /// Parse a held-button string such as `"U1"`: `U D L R` for the pad,
    /// `1`-`4` for the buttons. Unknown characters are ignored.
    pub fn from_letters(keys: &str) -> Self {
        let mut buttons = Self::default();
        for key in keys.chars() {
            match key.to_ascii_uppercase() {
                'U' => buttons.up = true,
                'D' => buttons.down = true,
                'L' => buttons.left = true,
                'R' => buttons.right = true,
                '1' => buttons.b1 = true,
                '2' => buttons.b2 = true,
                '3' => buttons.b3 = true,
                '4' => buttons.b4 = true,
                _ => {}
            }
        }
        buttons
    }
}

/// Board-side port state: the last P2 value (for strobe edge detection) and
/// the buttons currently held.
#[derive(Debug, Clone)]
pub struct PortBus {
    prev_p2: u8,
    buttons: Buttons,
}

impl PortBus {
    pub fn new() -> Self {
        Self {
            prev_p2: 0,
            buttons: Buttons::default(),
        }
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
    }

    pub fn prev_p2(&self) -> u8 {
        self.prev_p2
    }

    /// Align edge memory with a restored P2 latch so a load does not fake a
    /// strobe.
    pub fn sync_p2(&mut self, p2: u8) {
        self.prev_p2 = p2;
    }

    /// Wire the decoder to the display and sound chip for one CPU step.
    pub fn connect<'a>(
        &'a mut self,
        display: &'a mut Display,
        sound: &'a SharedSound,
    ) -> BusContext<'a> {
        BusContext {
            bus: self,
            display,
            sound,
        }
    }
}

impl Default for PortBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusContext<'a> {
    bus: &'a mut PortBus,
    display: &'a mut Display,
    sound: &'a SharedSound,
}

impl PortIo for BusContext<'_> {
    fn read_port(&mut self, port: Port, latch: u8) -> u8 {
        match port {
            Port::Bus => 0xFF,
            Port::P1 => latch & self.bus.buttons.p1_mask(),
            Port::P2 => latch,
        }
    }

    fn write_port(&mut self, port: Port, value: u8) {
        if port != Port::P2 {
            return;
        }
        if value & COLUMN_STROBE != 0 && self.bus.prev_p2 & COLUMN_STROBE == 0 {
            self.display.latch_column_on_strobe_edge();
        }
        self.bus.prev_p2 = value;
        self.sound.receive_command(value);
    }

    fn external_read(&mut self, p2: u8, data: u8) {
        self.display.write_led_register(p2, data);
    }
}
