// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Effect step tables for the sound processor.
//!
//! No dump of the sound chip's ROM exists, so every table here is a
//! behavioural reconstruction of the documented effects.

use super::SAMPLE_RATE;

pub const MAX_STEPS: usize = 16;

/// Hardware-measured note frequencies for the tone commands (Hz).
pub const NOTE_TABLE: [f32; 16] = [
    239.23, 253.03, 268.53, 286.04, 302.48, 320.92, 337.38, 360.49, 381.38, 404.85, 424.44,
    453.72, 478.46, 506.07, 537.05, 572.08,
];

/// One entry of an effect: pitch, waveform, duration and level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Step {
    pub freq: f32,
    pub noise: bool,
    pub dur_ms: i32,
    pub volume: f32,
}

impl Step {
    fn new(freq: f32, noise: bool, dur_ms: f32, volume: f32) -> Self {
        Self {
            freq,
            noise,
            dur_ms: dur_ms as i32,
            volume,
        }
    }

    /// Duration in output samples, at least one.
    pub fn samples(&self) -> u32 {
        ms_to_samples(self.dur_ms).max(1)
    }

    /// Copy with non-finite or negative values replaced.
    pub fn sanitized(self) -> Self {
        Self {
            freq: if self.freq.is_finite() && self.freq >= 0.0 {
                self.freq
            } else {
                0.0
            },
            noise: self.noise,
            dur_ms: if self.dur_ms < 0 { 1 } else { self.dur_ms },
            volume: if !self.volume.is_finite() || self.volume < 0.0 {
                0.0
            } else if self.volume > 2.0 {
                1.0
            } else {
                self.volume
            },
        }
    }
}

pub(crate) fn ms_to_samples(ms: i32) -> u32 {
    (ms.max(0) as i64 * SAMPLE_RATE as i64 / 1000) as u32
}

/// Up to sixteen steps. The length never exceeds the backing array, so an
/// index below [`len`](Self::len) is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepSequence {
    steps: [Step; MAX_STEPS],
    len: usize,
}

impl StepSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted data. A count outside `0..=16` empties the
    /// sequence; every step inside the count is sanitized.
    pub fn from_raw(steps: [Step; MAX_STEPS], count: i32) -> Self {
        let len = usize::try_from(count)
            .ok()
            .filter(|&n| n <= MAX_STEPS)
            .unwrap_or(0);
        let mut seq = Self { steps, len };
        for step in &mut seq.steps[..len] {
            *step = step.sanitized();
        }
        seq
    }

    fn push(&mut self, step: Step) {
        if self.len < MAX_STEPS {
            self.steps[self.len] = step;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps[..self.len].get(index)
    }

    /// Full backing array, including slots past `len`, in save-record order.
    pub fn raw(&self) -> &[Step; MAX_STEPS] {
        &self.steps
    }
}

/// Loop behaviour of an effect once its last step ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPolicy {
    /// Follow the control register's loop bit.
    Control,
    Always,
    Never,
}

/// What a command 0x1-0xD plays.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub steps: StepSequence,
    pub policy: LoopPolicy,
    /// Command started when this one finishes.
    pub chain: Option<u8>,
}

/// Build the step list for effect `cmd`. `speed` scales durations (0.5 fast,
/// 1.0 slow); `loop_bit` is the control register's loop flag.
pub fn build(cmd: u8, speed: f32, loop_bit: bool) -> Option<Effect> {
    let mut steps = StepSequence::new();
    let mut policy = LoopPolicy::Control;
    let mut chain = None;

    match cmd {
        // continuous noise
        0x01 => {
            policy = LoopPolicy::Always;
            steps.push(Step::new(800.0, true, 200.0 * speed, 0.8));
        }
        // falling square slide (player shot)
        0x02 => {
            for i in 0..8 {
                let i = i as f32;
                steps.push(Step::new(1200.0 - i * (900.0 / 8.0), false, 25.0 * speed, 1.0 - i * 0.08));
            }
        }
        // five-pitch noise burst, hands over to 0x2 when looping
        0x03 => {
            for (i, pitch) in [1000.0, 800.0, 600.0, 400.0, 250.0].into_iter().enumerate() {
                steps.push(Step::new(pitch, true, 60.0 * speed, 1.0 - i as f32 * 0.12));
            }
            if loop_bit {
                chain = Some(0x02);
            }
        }
        // rising square slide (reward)
        0x04 => {
            for i in 0..8 {
                let i = i as f32;
                steps.push(Step::new(300.0 + i * (900.0 / 8.0), false, 30.0 * speed, 0.7 + i * 0.04));
            }
        }
        // rising noise slide (thrusters); loops on its last pitch
        0x05 => {
            for i in 0..10 {
                let i = i as f32;
                let dur = (40.0 + i * 8.0) * speed;
                steps.push(Step::new(200.0 + i * (600.0 / 10.0), true, dur, 0.6 + i * 0.04));
            }
            if loop_bit {
                policy = LoopPolicy::Always;
            }
        }
        // falling noise slide (explosion)
        0x06 => {
            policy = LoopPolicy::Never;
            for i in 0..12 {
                let i = i as f32;
                let dur = (30.0 + i * 10.0) * speed;
                steps.push(Step::new(1200.0 - i * (900.0 / 12.0), true, dur, 1.0 - i * 0.06));
            }
        }
        // medium to low square slide (enemy shot)
        0x07 => {
            for i in 0..6 {
                let i = i as f32;
                steps.push(Step::new(800.0 - i * (500.0 / 6.0), false, 30.0 * speed, 0.9 - i * 0.1));
            }
        }
        0x08 => {
            for i in 0..6 {
                let i = i as f32;
                steps.push(Step::new(400.0 + i * (800.0 / 6.0), false, 12.0 * speed, 0.8));
            }
        }
        0x09 => {
            for i in 0..8 {
                let i = i as f32;
                steps.push(Step::new(300.0 + i * (600.0 / 8.0), false, 18.0 * speed, 0.85));
            }
        }
        // Undocumented; a short blip keeps games that send them audible.
        0x0A..=0x0D => {
            let freq = 300.0 + (cmd - 0x0A) as f32 * 100.0;
            steps.push(Step::new(freq, false, 50.0 * speed, 0.5));
        }
        _ => return None,
    }

    Some(Effect {
        steps,
        policy,
        chain,
    })
}
