// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host-side output stage: filter, clip and scale engine samples.

use super::SharedSound;

/// Listening profile applied after synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
pub enum AudioProfile {
    /// Unfiltered square waves.
    Raw,
    /// Small-speaker response with soft clipping.
    #[default]
    Speaker,
    Headphone,
}

impl AudioProfile {
    /// One-pole low-pass coefficient.
    pub fn alpha(self) -> f32 {
        match self {
            AudioProfile::Raw => 1.0,
            AudioProfile::Speaker => 0.45,
            AudioProfile::Headphone => 0.7,
        }
    }

    fn shape(self, x: f32) -> f32 {
        if self != AudioProfile::Speaker || x.abs() <= 0.8 {
            return x;
        }
        if x > 0.0 {
            0.8 + 0.2 * ((x - 0.8) * 5.0).tanh()
        } else {
            -0.8 + 0.2 * ((x + 0.8) * 5.0).tanh()
        }
    }
}

/// Pulls samples for an audio callback. Owned by the callback side; the
/// engine itself stays shared with the emulator.
pub struct AudioOutput {
    sound: SharedSound,
    profile: AudioProfile,
    volume: u8,
    filtered: f32,
}

impl AudioOutput {
    pub fn new(sound: SharedSound, profile: AudioProfile, volume: u8) -> Self {
        Self {
            sound,
            profile,
            volume: volume.min(10),
            filtered: 0.0,
        }
    }

    pub fn set_profile(&mut self, profile: AudioProfile) {
        self.profile = profile;
    }

    /// Volume step 0..=10.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(10);
    }

    /// Fill a block of signed 16-bit samples. The engine is locked once for
    /// the whole block.
    pub fn render(&mut self, out: &mut [i16]) {
        let amplitude = 300.0 * self.volume as f32;
        let alpha = self.profile.alpha();
        let mut prev = self.filtered;
        self.sound.with(|engine| {
            for slot in out.iter_mut() {
                let s = engine.sample();
                prev += alpha * (s - prev);
                *slot = (self.profile.shape(prev) * amplitude) as i16;
            }
        });
        self.filtered = prev;
    }
}
