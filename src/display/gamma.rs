// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Gamma lookup for presenting phosphor intensities.

const ENTRIES: usize = 256;

/// 256-entry gamma table, rebuilt only when the gamma value changes.
#[derive(Debug, Clone)]
pub struct GammaLut {
    gamma: f32,
    table: [f32; ENTRIES],
}

impl GammaLut {
    pub fn new(gamma: f32) -> Self {
        let mut lut = Self {
            gamma: f32::NAN,
            table: [0.0; ENTRIES],
        };
        lut.set_gamma(gamma);
        lut
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Returns true when the table had to be rebuilt.
    pub fn set_gamma(&mut self, gamma: f32) -> bool {
        if gamma == self.gamma {
            return false;
        }
        self.gamma = gamma;
        for (i, slot) in self.table.iter_mut().enumerate() {
            *slot = (i as f32 / 255.0).powf(gamma);
        }
        true
    }

    /// Gamma-corrected value of an intensity in 0.0..=1.0.
    pub fn apply(&self, intensity: f32) -> f32 {
        let idx = (intensity.clamp(0.0, 1.0) * 255.0) as usize;
        self.table[idx.min(ENTRIES - 1)]
    }
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new(1.0)
    }
}
