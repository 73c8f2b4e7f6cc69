// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! COP411L sound processor, modelled behaviourally.
//!
//! The main CPU talks to the sound chip through four P2 bits. A reset byte
//! (0xC0) opens a command, the next two writes carry the high and low
//! nibbles, and a zero write closes it. Commands either program the
//! persistent control register, start a two-segment tone, or start one of
//! the canned effects in [`effects`].

pub mod effects;
pub mod output;
pub mod shared;

use log::{debug, warn};

use effects::{LoopPolicy, MAX_STEPS, NOTE_TABLE, Step, StepSequence, ms_to_samples};

pub use output::{AudioOutput, AudioProfile};
pub use shared::SharedSound;

pub const SAMPLE_RATE: u32 = 44_100;

const LFSR_SEED: u16 = 0x7FFF;
const PROTOCOL_RESET: u8 = 0xC0;

/// Position of the command-assembly state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    #[default]
    Idle,
    AwaitHigh,
    AwaitLow,
    AwaitClear,
}

impl ProtocolState {
    pub fn to_raw(self) -> u8 {
        match self {
            ProtocolState::Idle => 0,
            ProtocolState::AwaitHigh => 1,
            ProtocolState::AwaitLow => 2,
            ProtocolState::AwaitClear => 3,
        }
    }

    /// Unknown encodings fall back to idle.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ProtocolState::AwaitHigh,
            2 => ProtocolState::AwaitLow,
            3 => ProtocolState::AwaitClear,
            _ => ProtocolState::Idle,
        }
    }
}

/// Control register written by command 0x0n. Survives resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlRegister {
    pub fast: bool,
    /// Two-bit segment volume mode.
    pub volume: u8,
    pub looping: bool,
}

impl ControlRegister {
    pub fn from_nibble(data: u8) -> Self {
        Self {
            fast: data & 0x01 != 0,
            volume: (data >> 1) & 0x03,
            looping: data & 0x08 != 0,
        }
    }

    /// Duration multiplier for effect steps.
    pub fn speed(&self) -> f32 {
        if self.fast { 0.5 } else { 1.0 }
    }

    /// Levels of the two tone segments.
    pub fn segment_volumes(&self) -> (f32, f32) {
        match self.volume {
            0 => (0.4, 0.4),
            1 => (1.0, 0.4),
            _ => (1.0, 1.0),
        }
    }

    fn tone_segment_ms(&self, segment: Segment) -> i32 {
        match (segment, self.fast) {
            (Segment::First, true) => 46,
            (Segment::First, false) => 117,
            (Segment::Second, true) => 104,
            (Segment::Second, false) => 240,
        }
    }
}

/// Which half of a two-segment tone is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    #[default]
    First,
    Second,
}

impl Segment {
    pub fn to_raw(self) -> i32 {
        match self {
            Segment::First => 0,
            Segment::Second => 1,
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        if raw == 1 { Segment::Second } else { Segment::First }
    }
}

/// 15-bit noise register. Zero is a stuck state and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr(u16);

impl Lfsr {
    pub fn new(value: u16) -> Self {
        let value = value & 0x7FFF;
        Self(if value == 0 { LFSR_SEED } else { value })
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Taps at bits 0 and 1, feedback into bit 14.
    pub fn clock(&mut self) -> bool {
        let bit = (self.0 ^ (self.0 >> 1)) & 1;
        self.0 = (self.0 >> 1) | (bit << 14);
        self.0 & 1 != 0
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self(LFSR_SEED)
    }
}

/// Sound registers carried by rewind snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoundRegisters {
    pub control: ControlRegister,
    pub protocol: ProtocolState,
    pub protocol_high: u8,
    pub lfsr: u16,
}

/// Full playback state in persisted (unvalidated) form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoundSnapshot {
    pub ctrl_loop: u8,
    pub ctrl_volume: u8,
    pub ctrl_fast: u8,
    pub protocol_state: u8,
    pub protocol_high: u8,
    pub lfsr: u16,
    pub active: bool,
    pub noise: bool,
    pub command: u8,
    pub freq: f32,
    pub volume: f32,
    pub phase_acc: u32,
    pub phase_inc: u32,
    pub cur_step: i32,
    pub step_count: i32,
    pub step_samples_left: i32,
    pub segment: i32,
    pub seg_samples_left: i32,
    pub seg_samples_total: i32,
    pub seg1_volume: f32,
    pub seg2_volume: f32,
    pub steps: [Step; MAX_STEPS],
}

/// Phase increment of a 32-bit accumulator for `freq` Hz.
pub fn phase_increment(freq: f32) -> u32 {
    if freq <= 0.0 || !freq.is_finite() {
        return 0;
    }
    ((freq as f64 / SAMPLE_RATE as f64) * 4_294_967_296.0) as u32
}

#[derive(Debug, Clone)]
pub struct SoundEngine {
    control: ControlRegister,
    protocol: ProtocolState,
    protocol_high: u8,

    active: bool,
    noise: bool,
    command: u8,
    policy: LoopPolicy,
    chain: Option<u8>,

    steps: StepSequence,
    cur_step: usize,
    step_samples_left: u32,

    freq: f32,
    phase_acc: u32,
    phase_inc: u32,
    lfsr: Lfsr,

    seg1_volume: f32,
    seg2_volume: f32,
    volume: f32,
    segment: Segment,
    seg_samples_total: u32,
    seg_samples_left: u32,
}

impl SoundEngine {
    pub fn new() -> Self {
        Self {
            control: ControlRegister::default(),
            protocol: ProtocolState::Idle,
            protocol_high: 0,
            active: false,
            noise: false,
            command: 0,
            policy: LoopPolicy::Control,
            chain: None,
            steps: StepSequence::new(),
            cur_step: 0,
            step_samples_left: 0,
            freq: 0.0,
            phase_acc: 0,
            phase_inc: 0,
            lfsr: Lfsr::default(),
            seg1_volume: 1.0,
            seg2_volume: 0.5,
            volume: 0.0,
            segment: Segment::First,
            seg_samples_total: 0,
            seg_samples_left: 0,
        }
    }

    /// Power-cycle everything except the control register.
    pub fn reset(&mut self) {
        let control = self.control;
        *self = Self::new();
        self.control = control;
        (self.seg1_volume, self.seg2_volume) = control.segment_volumes();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_noise(&self) -> bool {
        self.noise
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn control(&self) -> ControlRegister {
        self.control
    }

    pub fn protocol(&self) -> ProtocolState {
        self.protocol
    }

    pub fn lfsr(&self) -> u16 {
        self.lfsr.value()
    }

    pub fn loop_policy(&self) -> LoopPolicy {
        self.policy
    }

    /// Feed one P2 write into the command protocol. Every byte is accepted in
    /// every state.
    pub fn receive_command(&mut self, value: u8) {
        match self.protocol {
            ProtocolState::Idle => {
                if value == PROTOCOL_RESET {
                    self.protocol = ProtocolState::AwaitHigh;
                    self.protocol_high = 0;
                }
            }
            ProtocolState::AwaitHigh => {
                self.protocol_high = value >> 4;
                self.protocol = ProtocolState::AwaitLow;
            }
            ProtocolState::AwaitLow => {
                if value == 0 {
                    // a zero low nibble arrives as the clear itself
                    self.dispatch(self.protocol_high << 4);
                    self.protocol = ProtocolState::Idle;
                } else {
                    self.dispatch((self.protocol_high << 4) | (value >> 4));
                    self.protocol = ProtocolState::AwaitClear;
                }
            }
            ProtocolState::AwaitClear => {
                if value == 0 {
                    self.protocol = ProtocolState::Idle;
                }
            }
        }
    }

    /// Execute an assembled command byte.
    pub fn dispatch(&mut self, byte: u8) {
        let cmd = byte >> 4;
        let data = byte & 0x0F;
        debug!("sound command {byte:#04X}");

        match cmd {
            0x0 => {
                self.control = ControlRegister::from_nibble(data);
                (self.seg1_volume, self.seg2_volume) = self.control.segment_volumes();
                self.active = false;
            }
            0xE | 0xF => self.start_tone(data),
            _ => self.start_effect(cmd),
        }
    }

    fn start_effect(&mut self, cmd: u8) {
        self.command = cmd;
        self.cur_step = 0;
        self.segment = Segment::First;
        self.phase_acc = 0;

        let Some(effect) =
            effects::build(cmd, self.control.speed(), self.control.looping)
        else {
            self.active = false;
            return;
        };
        self.steps = effect.steps;
        self.policy = effect.policy;
        self.chain = effect.chain;
        self.active = true;
        self.load_step();
    }

    fn start_tone(&mut self, note: u8) {
        self.active = true;
        self.noise = false;
        self.command = 0x0E;
        self.steps = StepSequence::new();
        self.cur_step = 0;
        self.chain = None;
        self.policy = LoopPolicy::Control;

        self.freq = NOTE_TABLE[(note & 0x0F) as usize];
        self.phase_inc = phase_increment(self.freq);

        (self.seg1_volume, self.seg2_volume) = self.control.segment_volumes();
        self.segment = Segment::First;
        self.volume = self.seg1_volume;
        self.seg_samples_total = ms_to_samples(self.control.tone_segment_ms(Segment::First));
        self.seg_samples_left = self.seg_samples_total;
    }

    /// Load the step at `cur_step`. An index past the sequence stops playback.
    fn load_step(&mut self) {
        let Some(&step) = self.steps.get(self.cur_step) else {
            self.active = false;
            return;
        };
        self.freq = step.freq;
        self.noise = step.noise;
        self.volume = step.volume;
        self.phase_inc = phase_increment(step.freq);
        self.step_samples_left = step.samples();
    }

    /// Produce one sample in -1.0..=1.0 (scaled by the current level) and
    /// advance playback by one sample period.
    pub fn sample(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }

        self.phase_acc = self.phase_acc.wrapping_add(self.phase_inc);
        let high = if self.noise {
            if self.phase_acc < self.phase_inc {
                self.lfsr.clock();
            }
            self.lfsr.value() & 1 != 0
        } else {
            self.phase_acc & 0x8000_0000 != 0
        };
        let out = if high { self.volume } else { -self.volume };

        if self.steps.is_empty() {
            self.advance_tone();
        } else {
            self.advance_step();
        }
        out
    }

    fn advance_step(&mut self) {
        self.step_samples_left = self.step_samples_left.saturating_sub(1);
        if self.step_samples_left > 0 {
            return;
        }

        self.cur_step += 1;
        if self.cur_step >= self.steps.len() {
            if let Some(next) = self.chain {
                self.start_effect(next);
                return;
            }
            let looping = match self.policy {
                LoopPolicy::Never => false,
                LoopPolicy::Always => true,
                LoopPolicy::Control => self.control.looping,
            };
            if !looping {
                self.active = false;
                return;
            }
            // thrusters hold their top pitch
            self.cur_step = if self.command == 0x05 {
                self.steps.len() - 1
            } else {
                0
            };
        }
        self.load_step();
    }

    fn advance_tone(&mut self) {
        self.seg_samples_left = self.seg_samples_left.saturating_sub(1);
        if self.seg_samples_left > 0 {
            return;
        }
        match self.segment {
            Segment::First => {
                self.segment = Segment::Second;
                self.volume = self.seg2_volume;
                self.seg_samples_left =
                    ms_to_samples(self.control.tone_segment_ms(Segment::Second));
            }
            Segment::Second if self.control.looping => {
                self.segment = Segment::First;
                self.volume = self.seg1_volume;
                self.seg_samples_left = self.seg_samples_total;
            }
            Segment::Second => self.active = false,
        }
    }

    pub fn registers(&self) -> SoundRegisters {
        SoundRegisters {
            control: self.control,
            protocol: self.protocol,
            protocol_high: self.protocol_high,
            lfsr: self.lfsr.value(),
        }
    }

    /// Restore rewind registers. Playback is silenced; the next command
    /// restarts it.
    pub fn set_registers(&mut self, regs: SoundRegisters) {
        self.control = regs.control;
        self.protocol = regs.protocol;
        self.protocol_high = regs.protocol_high & 0x0F;
        self.lfsr = Lfsr::new(regs.lfsr);
        self.active = false;
    }

    pub fn snapshot(&self) -> SoundSnapshot {
        SoundSnapshot {
            ctrl_loop: self.control.looping as u8,
            ctrl_volume: self.control.volume,
            ctrl_fast: self.control.fast as u8,
            protocol_state: self.protocol.to_raw(),
            protocol_high: self.protocol_high,
            lfsr: self.lfsr.value(),
            active: self.active,
            noise: self.noise,
            command: self.command,
            freq: self.freq,
            volume: self.volume,
            phase_acc: self.phase_acc,
            phase_inc: self.phase_inc,
            cur_step: self.cur_step as i32,
            step_count: self.steps.len() as i32,
            step_samples_left: self.step_samples_left as i32,
            segment: self.segment.to_raw(),
            seg_samples_left: self.seg_samples_left as i32,
            seg_samples_total: self.seg_samples_total as i32,
            seg1_volume: self.seg1_volume,
            seg2_volume: self.seg2_volume,
            steps: *self.steps.raw(),
        }
    }

    /// Load persisted playback state, clamping anything out of range.
    pub fn restore(&mut self, snap: &SoundSnapshot) {
        if snap.lfsr & 0x7FFF == 0 {
            warn!("sound: zero LFSR in save, reseeding");
        }
        if snap.protocol_state > 3 {
            warn!("sound: protocol state {} out of range", snap.protocol_state);
        }
        if !(0..=MAX_STEPS as i32).contains(&snap.step_count) {
            warn!("sound: step count {} out of range", snap.step_count);
        }

        self.control = ControlRegister {
            fast: snap.ctrl_fast & 1 != 0,
            volume: snap.ctrl_volume & 0x03,
            looping: snap.ctrl_loop & 1 != 0,
        };
        self.protocol = ProtocolState::from_raw(snap.protocol_state);
        self.protocol_high = snap.protocol_high & 0x0F;
        self.lfsr = Lfsr::new(snap.lfsr);

        self.active = snap.active;
        self.noise = snap.noise;
        self.command = snap.command;
        self.freq = finite_non_negative(snap.freq, 0.0);
        self.volume = match finite_non_negative(snap.volume, 0.0) {
            v if v > 2.0 => 1.0,
            v => v,
        };
        self.phase_acc = snap.phase_acc;
        self.phase_inc = phase_increment(self.freq);

        self.steps = StepSequence::from_raw(snap.steps, snap.step_count);
        self.cur_step = usize::try_from(snap.cur_step)
            .ok()
            .filter(|&i| i < self.steps.len())
            .unwrap_or(0);
        self.step_samples_left = snap.step_samples_left.max(0) as u32;
        self.segment = Segment::from_raw(snap.segment);
        self.seg_samples_left = snap.seg_samples_left.max(0) as u32;
        self.seg_samples_total = snap.seg_samples_total.max(0) as u32;
        // Segment levels only ever come from the control register.
        let (seg1, seg2) = self.control.segment_volumes();
        self.seg1_volume = unit_level(snap.seg1_volume).unwrap_or(seg1);
        self.seg2_volume = unit_level(snap.seg2_volume).unwrap_or(seg2);
        // Not persisted; re-derived from the command that was playing.
        (self.policy, self.chain) = match self.command {
            0x01 => (LoopPolicy::Always, None),
            0x03 if self.control.looping => (LoopPolicy::Control, Some(0x02)),
            0x05 if self.control.looping => (LoopPolicy::Always, None),
            0x06 => (LoopPolicy::Never, None),
            _ => (LoopPolicy::Control, None),
        };
    }
}

impl Default for SoundEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn unit_level(value: f32) -> Option<f32> {
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value)
}

fn finite_non_negative(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}
