// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Spinning-mirror display capture and phosphor persistence.
//!
//! A column of 40 red LEDs is swept across the viewer by a rotating mirror.
//! The BIOS loads five 8-bit LED registers (as a side effect of `MOVX`
//! reads) and strobes P2 bit 4 once per column. Each frame the captured
//! columns light their pixels at full intensity and everything else decays.
//!
//! Column bits are active low: a 0 bit is a lit LED.

mod gamma;

use bitvec::prelude::*;

pub use gamma::GammaLut;

pub const WIDTH: usize = 150;
pub const HEIGHT: usize = 40;
pub const LED_REGISTERS: usize = 5;

/// Intensities below this are treated as fully dark.
const NOISE_FLOOR: f32 = 0.01;
const COLUMNS_PER_BANK: usize = 50;
const BANK_COLUMN_OFFSET: usize = 6;

pub struct Display {
    phosphor: Vec<f32>,
    col_data: [[u8; LED_REGISTERS]; WIDTH],
    cols_captured: usize,
    led_reg: [u8; LED_REGISTERS],
    led_col: usize,
    led_active: bool,
}

impl Display {
    pub fn new() -> Self {
        Self {
            phosphor: vec![0.0; WIDTH * HEIGHT],
            col_data: [[0xFF; LED_REGISTERS]; WIDTH],
            cols_captured: 0,
            led_reg: [0xFF; LED_REGISTERS],
            led_col: 0,
            led_active: false,
        }
    }

    pub fn clear_phosphor(&mut self) {
        self.phosphor.fill(0.0);
    }

    /// Start-of-frame latch state: registers dark, column counter home.
    pub fn begin_frame(&mut self) {
        self.led_reg = [0xFF; LED_REGISTERS];
        self.led_col = 0;
        self.led_active = false;
    }

    /// Mirror reached its home position.
    pub fn reset_column_counter(&mut self) {
        self.led_col = 0;
    }

    /// True once any strobe has been seen this frame.
    pub fn led_active(&self) -> bool {
        self.led_active
    }

    pub fn led_registers(&self) -> [u8; LED_REGISTERS] {
        self.led_reg
    }

    /// LED register addressed by P2 bits 5-7, if the encoding is wired.
    pub fn decode_led_register_select(p2: u8) -> Option<usize> {
        match (p2 >> 5) & 0x07 {
            4 => Some(0),
            2 => Some(1),
            6 => Some(2),
            1 => Some(3),
            5 => Some(4),
            _ => None,
        }
    }

    /// Data-bus value seen during an external RAM read lands in the LED
    /// register selected by P2.
    pub fn write_led_register(&mut self, p2: u8, value: u8) {
        if let Some(idx) = Self::decode_led_register_select(p2) {
            self.led_reg[idx] = value;
        }
    }

    /// P2 bit 4 rose: copy the LED registers into the current column and
    /// advance.
    pub fn latch_column_on_strobe_edge(&mut self) {
        if let Some(slot) = self.col_data.get_mut(self.led_col) {
            *slot = self.led_reg;
            self.cols_captured = self.cols_captured.max(self.led_col + 1);
        }
        self.led_col += 1;
        self.led_active = true;
    }

    /// Fallback path: read column `col` straight out of video RAM
    /// (banks 1-3, 50 columns each, five bytes per column).
    pub fn capture_column_from_memory(&mut self, xram: &[u8], col: usize) {
        if col >= WIDTH {
            return;
        }
        let bank = 1 + col / COLUMNS_PER_BANK;
        let base = bank * 256 + BANK_COLUMN_OFFSET + (col % COLUMNS_PER_BANK) * LED_REGISTERS;
        if let Some(bytes) = xram.get(base..base + LED_REGISTERS) {
            self.col_data[col].copy_from_slice(bytes);
        }
        self.cols_captured = self.cols_captured.max(col + 1);
    }

    pub fn capture_all_columns(&mut self, xram: &[u8]) {
        for col in 0..WIDTH {
            self.capture_column_from_memory(xram, col);
        }
    }

    /// End-of-frame fold: decay every pixel, then light the captured columns.
    pub fn update(&mut self, decay: f32) {
        for px in &mut self.phosphor {
            *px *= decay;
            if *px < NOISE_FLOOR {
                *px = 0.0;
            }
        }

        for (col, bytes) in self.col_data.iter().enumerate().take(self.cols_captured) {
            for (bi, byte) in bytes.iter().enumerate() {
                for (bit, on) in byte.view_bits::<Lsb0>().iter().by_vals().enumerate() {
                    if on {
                        continue;
                    }
                    let y = (4 - bi) * 8 + (7 - bit);
                    self.phosphor[col + y * WIDTH] = 1.0;
                }
            }
        }
        self.cols_captured = 0;
    }

    /// Intensity at (x, y); zero outside the panel.
    pub fn pixel(&self, x: usize, y: usize) -> f32 {
        if x >= WIDTH || y >= HEIGHT {
            return 0.0;
        }
        self.phosphor[x + y * WIDTH]
    }

    /// Row-major intensity buffer for the renderer.
    pub fn phosphor(&self) -> &[f32] {
        &self.phosphor
    }

    pub fn restore_phosphor(&mut self, data: &[f32]) {
        let n = data.len().min(self.phosphor.len());
        self.phosphor[..n].copy_from_slice(&data[..n]);
    }

    pub fn lit_pixels(&self) -> usize {
        self.phosphor.iter().filter(|&&p| p > 0.0).count()
    }

    /// Text rendering for headless runs and debugging.
    pub fn ascii_dump(&self) -> String {
        let mut out = String::with_capacity((WIDTH + 1) * HEIGHT);
        for row in self.phosphor.chunks(WIDTH) {
            out.extend(row.iter().map(|&p| match p {
                p if p > 0.7 => '#',
                p if p > 0.3 => '*',
                p if p > 0.05 => '.',
                _ => ' ',
            }));
            out.push('\n');
        }
        out
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
