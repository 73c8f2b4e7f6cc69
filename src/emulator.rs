// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later


use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

use crate::config::Config;
use crate::core::bus::{Buttons, PortBus};
use crate::core::memory::{BOOT_ROM_SIZE, CART_ROM_SIZE, Memory, read_rom_file};
use crate::cpu::Cpu;
use crate::debugger::{Debugger, StopReason};
use crate::display::{Display, GammaLut, WIDTH};
use crate::error::{EmuError, StateError};
use crate::sound::{AudioOutput, SharedSound, SoundEngine};
use crate::state::{RewindBuffer, RewindSnapshot, SaveRecord};

/// Complete Adventure Vision machine.
pub struct AdventureVision {
    pub cpu: Cpu,
    pub memory: Memory,
    pub display: Display,
    pub debugger: Debugger,
    ports: PortBus,
    sound: SharedSound,
    config: Config,
    gamma: GammaLut,
    rewind: RewindBuffer,

    pub frame_count: u64,
}

impl AdventureVision {
    /// CPU clock: 11 MHz crystal divided by 15
    pub const CPU_CLOCK_HZ: u32 = 733_333;

    /// Mirror revolutions per second
    pub const TARGET_FPS: u32 = 15;

    pub const CYCLES_PER_FRAME: u32 = 48_889;

    /// Cycles the BIOS needs after mirror sync to output all 150 columns.
    pub const DISPLAY_OUTPUT_CYCLES: u32 = 2550;

    pub fn new(config: Config) -> Self {
        let config = config.validated();
        Self {
            cpu: Cpu::new(),
            memory: Memory::new(),
            display: Display::new(),
            debugger: Debugger::new(),
            ports: PortBus::new(),
            sound: SharedSound::new(SoundEngine::new()),
            gamma: GammaLut::new(config.led_gamma),
            config,
            rewind: RewindBuffer::new(),
            frame_count: 0,
        }
    }

    /// Power-cycle the console. ROMs, the LED latch and the sound control
    /// register survive; the phosphor buffer is cleared.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.memory.clear_ram();
        self.display.clear_phosphor();
        self.ports = PortBus::new();
        self.sound.with(|engine| engine.reset());
        self.frame_count = 0;
        info!("system reset");
    }

    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), EmuError> {
        self.memory.load_boot_rom(data)?;
        Ok(())
    }

    pub fn load_cartridge(&mut self, data: &[u8]) -> Result<(), EmuError> {
        self.memory.load_cartridge(data)?;
        Ok(())
    }

    pub fn load_bios_file(&mut self, path: impl AsRef<Path>) -> Result<(), EmuError> {
        let data = read_rom_file(path.as_ref(), BOOT_ROM_SIZE)?;
        self.load_bios(&data)
    }

    pub fn load_cartridge_file(&mut self, path: impl AsRef<Path>) -> Result<(), EmuError> {
        let data = read_rom_file(path.as_ref(), CART_ROM_SIZE)?;
        self.load_cartridge(&data)
    }

    /// Execute a single instruction outside frame timing.
    pub fn step(&mut self) -> u32 {
        let mut io = self.ports.connect(&mut self.display, &self.sound);
        self.cpu.execute_one(&mut self.memory, &mut io)
    }

    /// Run one mirror revolution: execute a frame's worth of cycles while
    /// driving the sync input, then fold captured columns into the phosphor
    /// buffer and record a rewind snapshot.
    ///
    /// If the debugger stops execution the frame is abandoned part way:
    /// nothing is folded into the display and the reason is returned.
    pub fn run_frame(&mut self) -> Option<StopReason> {
        let pulse = self.config.sync_pulse;
        let mut elapsed = 0u32;
        let mut sync_cycle = None;
        self.display.begin_frame();

        while elapsed < Self::CYCLES_PER_FRAME {
            if self.debugger.check_pc(self.cpu.pc) {
                return self.debugger.stop_reason();
            }

            let prev_t1 = self.cpu.t1;
            elapsed += self.step();
            let t1 = pulse.level_at(elapsed);

            if !prev_t1 && t1 && sync_cycle.is_none() {
                debug!("mirror sync at cycle {elapsed}");
                sync_cycle = Some(elapsed);
                self.display.reset_column_counter();
            }

            if let Some(sync) = sync_cycle
                && self.config.midframe_scan
                && !self.display.led_active()
            {
                let since = elapsed - sync;
                if since <= Self::DISPLAY_OUTPUT_CYCLES {
                    let col = (since as usize * WIDTH) / Self::DISPLAY_OUTPUT_CYCLES as usize;
                    self.display
                        .capture_column_from_memory(&self.memory.xram, col);
                }
            }

            self.cpu.clock_t1(t1);

            if self.debugger.check_watch(&self.memory.xram) {
                return self.debugger.stop_reason();
            }
        }

        if !self.display.led_active() && !self.config.midframe_scan {
            self.display.capture_all_columns(&self.memory.xram);
        }
        self.display.update(self.config.phosphor_decay);
        self.frame_count += 1;
        self.rewind_push();
        None
    }

    /// Run up to `frames` frames, stopping early at a debugger stop.
    pub fn run_frames(&mut self, frames: u64) -> Option<StopReason> {
        for _ in 0..frames {
            if let Some(reason) = self.run_frame() {
                return Some(reason);
            }
        }
        None
    }

    /// Continue after a debugger stop from the current PC.
    pub fn resume(&mut self) {
        self.debugger.resume(self.cpu.pc);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install new parameters. Out-of-range values fall back to defaults.
    pub fn set_config(&mut self, config: Config) {
        self.config = config.validated();
        self.gamma.set_gamma(self.config.led_gamma);
    }

    /// Strict variant of [`set_config`](Self::set_config): rejects the
    /// whole config if any field is out of range.
    pub fn try_set_config(&mut self, config: Config) -> Result<(), EmuError> {
        config.check()?;
        self.set_config(config);
        Ok(())
    }

    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.ports.set_buttons(buttons);
    }

    /// Gamma-corrected pixel intensity for presentation.
    pub fn pixel_gamma(&self, x: usize, y: usize) -> f32 {
        self.gamma.apply(self.display.pixel(x, y))
    }

    /// Handle for the host audio side.
    pub fn sound(&self) -> SharedSound {
        self.sound.clone()
    }

    /// Output stage configured from the current volume and profile.
    pub fn audio_output(&self) -> AudioOutput {
        AudioOutput::new(
            self.sound.clone(),
            self.config.audio_profile,
            self.config.volume,
        )
    }

    pub fn save_state_to<W: Write>(&self, writer: &mut W) -> Result<(), StateError> {
        let sound = self.sound.with(|engine| engine.snapshot());
        SaveRecord::capture(&self.cpu, &self.memory, sound).write_to(writer)
    }

    /// Load a record. Nothing is touched unless the whole record parses.
    pub fn load_state_from<R: Read>(&mut self, reader: &mut R) -> Result<(), StateError> {
        let record = SaveRecord::read_from(reader)?;
        record.apply(&mut self.cpu, &mut self.memory);
        self.sound.with(|engine| engine.restore(&record.sound));
        self.ports.sync_p2(self.cpu.p2);
        Ok(())
    }

    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), EmuError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).map_err(StateError::from)?);
        self.save_state_to(&mut writer)?;
        info!("state saved to '{}'", path.display());
        Ok(())
    }

    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<(), EmuError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path).map_err(StateError::from)?);
        self.load_state_from(&mut reader)?;
        info!("state loaded from '{}'", path.display());
        Ok(())
    }

    pub fn rewind_push(&mut self) {
        let sound = self.sound.with(|engine| engine.registers());
        self.rewind.push(RewindSnapshot::capture(
            &self.cpu,
            &self.memory,
            &self.display,
            sound,
        ));
    }

    /// Step back one frame. Returns false when there is no history.
    pub fn rewind_pop(&mut self) -> bool {
        let Some(snap) = self.rewind.pop() else {
            return false;
        };
        snap.apply(&mut self.cpu, &mut self.memory, &mut self.display);
        self.ports.sync_p2(self.cpu.p2);
        self.sound.with(|engine| engine.set_registers(snap.sound));
        true
    }

    pub fn rewind_depth(&self) -> usize {
        self.rewind.len()
    }

    pub fn stats(&self) -> EmulatorStats {
        EmulatorStats {
            total_cycles: self.cpu.cycles,
            frame_count: self.frame_count,
            pc: self.cpu.pc,
            lit_pixels: self.display.lit_pixels(),
            sound_active: self.sound.with(|engine| engine.is_active()),
        }
    }
}

impl Default for AdventureVision {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Emulator execution statistics
#[derive(Debug, Clone, Copy)]
pub struct EmulatorStats {
    pub total_cycles: u64,
    pub frame_count: u64,
    pub pc: u16,
    pub lit_pixels: usize,
    pub sound_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::ProtocolState;

    /// Boot ROM that lights one column through the LED register path, then
    /// spins.
    const STROBE_PROGRAM: [u8; 14] = [
        0x23, 0x80, // MOV A,#80h     select LED register 0
        0x3A, // OUTL P2,A
        0x27, // CLR A
        0x90, // MOVX @R0,A
        0x80, // MOVX A,@R0     latches 0x00 into register 0
        0x23, 0x90, // MOV A,#90h
        0x3A, // OUTL P2,A      strobe rises
        0x23, 0x80, // MOV A,#80h
        0x3A, // OUTL P2,A
        0x04, 0x0C, // JMP 00Ch
    ];

    fn machine(program: &[u8]) -> AdventureVision {
        let mut emu = AdventureVision::default();
        emu.load_bios(program).unwrap();
        emu
    }

    #[test]
    fn emulator_initialization() {
        let emu = AdventureVision::default();
        assert_eq!(emu.cpu.pc, 0);
        assert_eq!(emu.cpu.p1, 0xFB);
        assert_eq!(emu.frame_count, 0);
        assert_eq!(emu.rewind_depth(), 0);
    }

    #[test]
    fn cycles_per_frame_constant() {
        assert_eq!(
            AdventureVision::CPU_CLOCK_HZ / AdventureVision::TARGET_FPS,
            AdventureVision::CYCLES_PER_FRAME
        );
    }

    #[test]
    fn run_frame_spends_frame_budget() {
        let mut emu = machine(&[0x04, 0x00]); // JMP 000h
        emu.run_frame();
        let cycles = emu.cpu.cycles;
        assert!(cycles >= AdventureVision::CYCLES_PER_FRAME as u64);
        assert!(cycles < AdventureVision::CYCLES_PER_FRAME as u64 + 2);
        assert_eq!(emu.frame_count, 1);
        assert_eq!(emu.rewind_depth(), 1);
    }

    #[test]
    fn strobe_path_lights_column() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frame();
        assert_eq!(emu.display.pixel(0, 39), 1.0);
        assert_eq!(emu.display.pixel(0, 32), 1.0);
        assert_eq!(emu.display.lit_pixels(), 8);
    }

    #[test]
    fn memory_scan_fallback_after_sync() {
        let mut emu = machine(&[0x04, 0x00]);
        emu.memory.xram[0x100 + 6] = 0x00; // column 0, register 0
        emu.run_frame();
        assert_eq!(emu.display.lit_pixels(), 8);
        assert_eq!(emu.display.pixel(0, 35), 1.0);
    }

    #[test]
    fn whole_frame_fallback_without_midframe_scan() {
        let mut emu = machine(&[0x04, 0x00]);
        emu.set_config(Config {
            midframe_scan: false,
            ..Config::default()
        });
        emu.memory.xram[0x300 + 6 + 49 * 5] = 0x7F; // column 149
        emu.run_frame();
        assert_eq!(emu.display.pixel(149, 32), 1.0);
        assert_eq!(emu.display.lit_pixels(), 1);
    }

    #[test]
    fn phosphor_fades_when_nothing_is_drawn() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frame();
        // second frame: the program is stuck in its spin loop
        emu.memory.xram.fill(0xFF);
        emu.set_config(Config {
            midframe_scan: false,
            ..Config::default()
        });
        emu.run_frame();
        let px = emu.display.pixel(0, 39);
        assert!(px > 0.44 && px < 0.46);
    }

    #[test]
    fn sync_pulse_drives_t1_counter() {
        // STRT CNT then spin
        let mut emu = machine(&[0x45, 0x04, 0x01]);
        emu.run_frame();
        let first = emu.cpu.timer;
        emu.run_frame();
        assert_eq!(emu.cpu.timer, first.wrapping_add(1));
        emu.run_frame();
        assert_eq!(emu.cpu.timer, first.wrapping_add(2));
    }

    #[test]
    fn breakpoint_abandons_frame() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.debugger.set_active(true);
        emu.debugger.add_breakpoint(0x009).unwrap();

        let stop = emu.run_frame();
        assert_eq!(stop, Some(StopReason::Breakpoint(0x009)));
        assert_eq!(emu.cpu.pc, 0x009);
        assert_eq!(emu.frame_count, 0);
        assert_eq!(emu.rewind_depth(), 0);
        assert_eq!(emu.display.lit_pixels(), 0);

        // still stopped until resumed
        assert_eq!(emu.run_frame(), Some(StopReason::Breakpoint(0x009)));
        assert_eq!(emu.cpu.pc, 0x009);

        emu.resume();
        assert_eq!(emu.run_frame(), None);
        assert_eq!(emu.frame_count, 1);
    }

    #[test]
    fn run_to_stops_once() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.debugger.set_active(true);
        emu.debugger.run_to(0x00C).unwrap();
        assert_eq!(emu.run_frames(3), Some(StopReason::RunTo(0x00C)));
        assert_eq!(emu.cpu.pc, 0x00C);
        emu.resume();
        assert_eq!(emu.run_frames(2), None);
        assert_eq!(emu.frame_count, 2);
    }

    #[test]
    fn watchpoint_stops_after_the_write() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.memory.xram[0x300] = 0x55;
        emu.debugger.set_active(true);
        emu.debugger.set_watch(0x300).unwrap();

        // MOVX @R0,A at 0x004 clears it
        let stop = emu.run_frame();
        assert_eq!(
            stop,
            Some(StopReason::Watch {
                addr: 0x300,
                old: 0x55,
                new: 0x00
            })
        );
        assert_eq!(emu.cpu.pc, 0x005);
    }

    #[test]
    fn invalid_config_falls_back() {
        let emu = AdventureVision::new(Config {
            phosphor_decay: 4.0,
            led_gamma: 0.0,
            ..Config::default()
        });
        assert_eq!(emu.config().phosphor_decay, 0.45);
        assert_eq!(emu.config().led_gamma, 1.0);
    }

    #[test]
    fn strict_config_rejects_bad_gamma() {
        let mut emu = AdventureVision::default();
        let err = emu
            .try_set_config(Config {
                led_gamma: 9.0,
                ..Config::default()
            })
            .unwrap_err();
        assert!(matches!(err, EmuError::Config(_)));
        assert_eq!(emu.config().led_gamma, 1.0);

        emu.try_set_config(Config {
            led_gamma: 2.2,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(emu.config().led_gamma, 2.2);
    }

    #[test]
    fn reset_keeps_roms_and_sound_control() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.sound().with(|engine| engine.dispatch(0x0B));
        emu.run_frames(2);
        emu.reset();
        assert_eq!(emu.cpu.pc, 0);
        assert_eq!(emu.frame_count, 0);
        assert_eq!(emu.display.lit_pixels(), 0);
        assert_eq!(emu.memory.read_rom(0, emu.cpu.p1), 0x23);
        assert!(emu.sound().with(|engine| engine.control().looping));
    }

    #[test]
    fn save_and_load_through_memory() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frame();
        emu.sound().with(|engine| engine.dispatch(0xE5));
        let mut buf = Vec::new();
        emu.save_state_to(&mut buf).unwrap();

        let (pc, a) = (emu.cpu.pc, emu.cpu.a);
        emu.cpu.a = 0x99;
        emu.cpu.pc = 0x123;
        emu.memory.xram[0x300] = 0x42;
        emu.sound().with(|engine| engine.dispatch(0x00));

        emu.load_state_from(&mut buf.as_slice()).unwrap();
        assert_eq!(emu.cpu.pc, pc);
        assert_eq!(emu.cpu.a, a);
        assert_eq!(emu.memory.xram[0x300], 0x00);
        assert!(emu.sound().with(|engine| engine.is_active()));
    }

    #[test]
    fn failed_load_leaves_state_alone() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frame();
        emu.cpu.a = 0x5A;
        let mut buf = Vec::new();
        emu.save_state_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        emu.cpu.a = 0x77;

        let err = emu.load_state_from(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, StateError::Truncated));
        assert_eq!(emu.cpu.a, 0x77);
    }

    #[test]
    fn rewind_restores_last_frame() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frame();
        let pc = emu.cpu.pc;
        emu.memory.xram[0] = 0x77;
        emu.cpu.pc = 0x3FF;
        emu.sound().with(|engine| engine.receive_command(0xC0));

        assert!(emu.rewind_pop());
        assert_eq!(emu.cpu.pc, pc);
        assert_eq!(emu.memory.xram[0], 0x00);
        assert_eq!(
            emu.sound().with(|engine| engine.protocol()),
            ProtocolState::Idle
        );
        assert!(!emu.rewind_pop());
    }

    #[test]
    fn stats_report_progress() {
        let mut emu = machine(&STROBE_PROGRAM);
        emu.run_frames(3);
        let stats = emu.stats();
        assert_eq!(stats.frame_count, 3);
        assert_eq!(stats.lit_pixels, 8);
        assert_eq!(stats.pc, 0x00C);
        assert!(!stats.sound_active);
    }
}
