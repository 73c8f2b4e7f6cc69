// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Numeric parameters supplied by the host configuration layer.
//!
//! Parsing configuration files is the host's business; this module only
//! guarantees that whatever reaches the frame loop is in range. Values that
//! fail validation are replaced by their defaults with a warning.

use log::warn;

use crate::error::ConfigError;
use crate::sound::AudioProfile;

/// Cycle offset (from frame start) where the mirror sensor pulls T1 low.
pub const DEFAULT_SYNC_START: u32 = 200;
/// Cycle offset where T1 returns high, marking the mirror home position.
pub const DEFAULT_SYNC_END: u32 = 400;
/// Per-frame multiplier applied to every phosphor cell.
pub const DEFAULT_PHOSPHOR_DECAY: f32 = 0.45;
pub const DEFAULT_LED_GAMMA: f32 = 1.0;
pub const DEFAULT_VOLUME: u8 = 7;

const SYNC_START_LIMIT: u32 = 1000;
const SYNC_END_LIMIT: u32 = 2000;

/// Window of the frame during which the mirror sync input reads low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncPulse {
    start: u32,
    end: u32,
}

impl SyncPulse {
    /// Build a pulse window. An empty or inverted window would leave the BIOS
    /// spinning on its sync wait forever, so it is rejected here.
    pub fn new(start: u32, end: u32) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::InvertedSyncWindow { start, end });
        }
        if start >= SYNC_START_LIMIT || end >= SYNC_END_LIMIT {
            return Err(ConfigError::SyncWindowOutOfRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Level of the T1 input after `elapsed` cycles of the current frame.
    pub fn level_at(&self, elapsed: u32) -> bool {
        !(elapsed >= self.start && elapsed < self.end)
    }
}

impl Default for SyncPulse {
    fn default() -> Self {
        Self {
            start: DEFAULT_SYNC_START,
            end: DEFAULT_SYNC_END,
        }
    }
}

/// Emulator tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub sync_pulse: SyncPulse,
    pub phosphor_decay: f32,
    pub led_gamma: f32,
    /// Sample external RAM during the post-sync window when the game never
    /// strobes the LED registers. When off, the fallback capture happens once
    /// at the end of the frame.
    pub midframe_scan: bool,
    pub volume: u8,
    pub audio_profile: AudioProfile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_pulse: SyncPulse::default(),
            phosphor_decay: DEFAULT_PHOSPHOR_DECAY,
            led_gamma: DEFAULT_LED_GAMMA,
            midframe_scan: true,
            volume: DEFAULT_VOLUME,
            audio_profile: AudioProfile::Speaker,
        }
    }
}

impl Config {
    /// Return a copy with every out-of-range field replaced by its default.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        Self {
            sync_pulse: SyncPulse::new(self.sync_pulse.start, self.sync_pulse.end)
                .unwrap_or_else(|err| fallback(err, defaults.sync_pulse)),
            phosphor_decay: check_decay(self.phosphor_decay)
                .unwrap_or_else(|err| fallback(err, defaults.phosphor_decay)),
            led_gamma: check_gamma(self.led_gamma)
                .unwrap_or_else(|err| fallback(err, defaults.led_gamma)),
            midframe_scan: self.midframe_scan,
            volume: check_volume(self.volume).unwrap_or_else(|err| fallback(err, defaults.volume)),
            audio_profile: self.audio_profile,
        }
    }

    /// First problem found, if any, without repairing anything.
    pub fn check(&self) -> Result<(), ConfigError> {
        SyncPulse::new(self.sync_pulse.start, self.sync_pulse.end)?;
        check_decay(self.phosphor_decay)?;
        check_gamma(self.led_gamma)?;
        check_volume(self.volume)?;
        Ok(())
    }
}

fn fallback<T: std::fmt::Debug>(err: ConfigError, default: T) -> T {
    warn!("config: {err}; using default {default:?}");
    default
}

fn check_decay(decay: f32) -> Result<f32, ConfigError> {
    if decay.is_finite() && (0.0..=1.0).contains(&decay) {
        Ok(decay)
    } else {
        Err(ConfigError::DecayOutOfRange(decay))
    }
}

fn check_gamma(gamma: f32) -> Result<f32, ConfigError> {
    if gamma.is_finite() && (0.2..=3.0).contains(&gamma) {
        Ok(gamma)
    } else {
        Err(ConfigError::GammaOutOfRange(gamma))
    }
}

fn check_volume(volume: u8) -> Result<u8, ConfigError> {
    if volume <= 10 {
        Ok(volume)
    } else {
        Err(ConfigError::VolumeOutOfRange(volume))
    }
}
