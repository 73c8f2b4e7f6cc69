// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Versioned save record.
//!
//! Fixed-width little-endian layout so files move between hosts. ROM images
//! are never stored; a loaded record is applied on top of whatever ROMs are
//! inserted.

use std::io::{Read, Write};

use crate::core::memory::{IRAM_SIZE, Memory, XRAM_SIZE};
use crate::cpu::{CoreLatches, Cpu, IrqLatches, TIMER_PRESCALE};
use crate::error::StateError;
use crate::sound::SoundSnapshot;
use crate::sound::effects::{MAX_STEPS, Step};

/// "AV13"
pub const SAVE_MAGIC: u32 = 0x4156_3133;
pub const SAVE_VERSION: u32 = 18;

const STEP_BYTES: usize = 16;
pub const RECORD_SIZE: usize =
    8 + 11 + IRAM_SIZE + XRAM_SIZE + 4 + 8 + 5 + 2 + 3 + 16 + 24 + 8 + MAX_STEPS * STEP_BYTES;

/// Everything a save file holds, detached from the live machine.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRecord {
    pub a: u8,
    pub pc: u16,
    pub psw: u8,
    pub sp: u8,
    pub core: CoreLatches,
    pub irq: IrqLatches,
    pub timer: u8,
    pub p1: u8,
    pub p2: u8,
    pub bus: u8,
    pub iram: [u8; IRAM_SIZE],
    pub xram: Vec<u8>,
    pub prescaler: u32,
    pub cycles: u64,
    pub sound: SoundSnapshot,
}

impl SaveRecord {
    pub fn capture(cpu: &Cpu, mem: &Memory, sound: SoundSnapshot) -> Self {
        let (core, irq) = cpu.latches();
        Self {
            a: cpu.a,
            pc: cpu.pc,
            psw: cpu.psw_byte(),
            sp: cpu.sp,
            core,
            irq,
            timer: cpu.timer,
            p1: cpu.p1,
            p2: cpu.p2,
            bus: cpu.bus,
            iram: mem.iram,
            xram: mem.xram.to_vec(),
            prescaler: cpu.prescaler,
            cycles: cpu.cycles,
            sound,
        }
    }

    /// Overwrite CPU registers and RAM. Sound state is restored separately
    /// under the engine lock.
    pub fn apply(&self, cpu: &mut Cpu, mem: &mut Memory) {
        cpu.a = self.a;
        cpu.pc = self.pc & 0x0FFF;
        cpu.sp = self.sp & 0x07;
        cpu.set_latches(self.core, self.irq);
        cpu.timer = self.timer;
        cpu.p1 = self.p1;
        cpu.p2 = self.p2;
        cpu.bus = self.bus;
        cpu.prescaler = self.prescaler % TIMER_PRESCALE;
        cpu.cycles = self.cycles;
        cpu.ei_delay = 0;
        // expansion pin idles high
        cpu.t0 = true;

        mem.iram = self.iram;
        let n = self.xram.len().min(XRAM_SIZE);
        mem.xram[..n].copy_from_slice(&self.xram[..n]);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(RECORD_SIZE);
        data.extend_from_slice(&SAVE_MAGIC.to_le_bytes());
        data.extend_from_slice(&SAVE_VERSION.to_le_bytes());

        data.push(self.a);
        data.extend_from_slice(&self.pc.to_le_bytes());
        data.push(self.psw);
        data.push(self.sp);
        data.push(self.core.bits());
        data.push(self.irq.bits());
        data.push(self.timer);
        data.push(self.p1);
        data.push(self.p2);
        data.push(self.bus);
        data.extend_from_slice(&self.iram);
        data.extend_from_slice(&self.xram);
        data.extend_from_slice(&self.prescaler.to_le_bytes());
        data.extend_from_slice(&self.cycles.to_le_bytes());

        let snd = &self.sound;
        data.extend_from_slice(&[
            snd.ctrl_loop,
            snd.ctrl_volume,
            snd.ctrl_fast,
            snd.protocol_state,
            snd.protocol_high,
        ]);
        data.extend_from_slice(&snd.lfsr.to_le_bytes());
        data.extend_from_slice(&[snd.active as u8, snd.noise as u8, snd.command]);
        data.extend_from_slice(&snd.freq.to_le_bytes());
        data.extend_from_slice(&snd.volume.to_le_bytes());
        data.extend_from_slice(&snd.phase_acc.to_le_bytes());
        data.extend_from_slice(&snd.phase_inc.to_le_bytes());
        for value in [
            snd.cur_step,
            snd.step_count,
            snd.step_samples_left,
            snd.segment,
            snd.seg_samples_left,
            snd.seg_samples_total,
        ] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&snd.seg1_volume.to_le_bytes());
        data.extend_from_slice(&snd.seg2_volume.to_le_bytes());
        for step in &snd.steps {
            data.extend_from_slice(&step.freq.to_le_bytes());
            data.extend_from_slice(&[step.noise as u8, 0, 0, 0]);
            data.extend_from_slice(&step.dur_ms.to_le_bytes());
            data.extend_from_slice(&step.volume.to_le_bytes());
        }
        data
    }

    /// Parse a record. Magic and version are checked first; a short buffer is
    /// [`StateError::Truncated`]. Trailing bytes are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StateError> {
        let mut cur = Cursor { data, pos: 0 };

        let magic = cur.u32()?;
        if magic != SAVE_MAGIC {
            return Err(StateError::BadMagic(magic));
        }
        let version = cur.u32()?;
        if version != SAVE_VERSION {
            return Err(StateError::VersionMismatch {
                found: version,
                expected: SAVE_VERSION,
            });
        }

        let a = cur.u8()?;
        let pc = cur.u16()?;
        let psw = cur.u8()?;
        let sp = cur.u8()?;
        let core = CoreLatches::from_bits_retain(cur.u8()?);
        let irq = IrqLatches::from_bits_truncate(cur.u8()?);
        let timer = cur.u8()?;
        let p1 = cur.u8()?;
        let p2 = cur.u8()?;
        let bus = cur.u8()?;
        let mut iram = [0; IRAM_SIZE];
        iram.copy_from_slice(cur.take(IRAM_SIZE)?);
        let xram = cur.take(XRAM_SIZE)?.to_vec();
        let prescaler = cur.u32()?;
        let cycles = cur.u64()?;

        let mut sound = SoundSnapshot {
            ctrl_loop: cur.u8()?,
            ctrl_volume: cur.u8()?,
            ctrl_fast: cur.u8()?,
            protocol_state: cur.u8()?,
            protocol_high: cur.u8()?,
            lfsr: cur.u16()?,
            active: cur.u8()? != 0,
            noise: cur.u8()? != 0,
            command: cur.u8()?,
            freq: cur.f32()?,
            volume: cur.f32()?,
            phase_acc: cur.u32()?,
            phase_inc: cur.u32()?,
            cur_step: cur.i32()?,
            step_count: cur.i32()?,
            step_samples_left: cur.i32()?,
            segment: cur.i32()?,
            seg_samples_left: cur.i32()?,
            seg_samples_total: cur.i32()?,
            seg1_volume: cur.f32()?,
            seg2_volume: cur.f32()?,
            steps: [Step::default(); MAX_STEPS],
        };
        for step in &mut sound.steps {
            let freq = cur.f32()?;
            let noise = cur.take(4)?[0] != 0;
            *step = Step {
                freq,
                noise,
                dur_ms: cur.i32()?,
                volume: cur.f32()?,
            };
        }

        Ok(Self {
            a,
            pc,
            psw,
            sp,
            core,
            irq,
            timer,
            p1,
            p2,
            bus,
            iram,
            xram,
            prescaler,
            cycles,
            sound,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), StateError> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, StateError> {
        let mut data = Vec::with_capacity(RECORD_SIZE);
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(StateError::Truncated)?;
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, StateError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, StateError> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::SoundEngine;
    use pretty_assertions::assert_eq;

    fn sample_record() -> SaveRecord {
        let mut cpu = Cpu::new();
        cpu.a = 0x42;
        cpu.pc = 0x7AB;
        cpu.timer = 0x99;
        cpu.mb = true;
        cpu.irq_enabled = true;
        cpu.cycles = 123_456_789;
        let mut mem = Memory::new();
        mem.iram[5] = 0x55;
        mem.xram[0x3FF] = 0x11;
        let mut sound = SoundEngine::new();
        for b in [0xC0, 0x40, 0x00] {
            sound.receive_command(b);
        }
        SaveRecord::capture(&cpu, &mem, sound.snapshot())
    }

    #[test]
    fn record_has_fixed_size() {
        assert_eq!(sample_record().to_bytes().len(), RECORD_SIZE);
    }

    #[test]
    fn header_is_magic_then_version() {
        let bytes = sample_record().to_bytes();
        assert_eq!(&bytes[..4], b"31VA");
        assert_eq!(&bytes[4..8], &18u32.to_le_bytes());
    }

    #[test]
    fn bytes_round_trip() {
        let record = sample_record();
        let back = SaveRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample_record().to_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            SaveRecord::from_bytes(&bytes),
            Err(StateError::BadMagic(_))
        ));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut bytes = sample_record().to_bytes();
        bytes[4..8].copy_from_slice(&17u32.to_le_bytes());
        assert!(matches!(
            SaveRecord::from_bytes(&bytes),
            Err(StateError::VersionMismatch {
                found: 17,
                expected: 18
            })
        ));
    }

    #[test]
    fn short_record_is_truncated() {
        let bytes = sample_record().to_bytes();
        for len in [0, 6, 100, RECORD_SIZE - 1] {
            assert!(matches!(
                SaveRecord::from_bytes(&bytes[..len]),
                Err(StateError::Truncated)
            ));
        }
    }

    #[test]
    fn apply_restores_cpu_and_ram() {
        let record = sample_record();
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        record.apply(&mut cpu, &mut mem);
        assert_eq!(cpu.a, 0x42);
        assert_eq!(cpu.pc, 0x7AB);
        assert!(cpu.mb);
        assert!(cpu.irq_enabled);
        assert_eq!(cpu.cycles, 123_456_789);
        assert_eq!(mem.iram[5], 0x55);
        assert_eq!(mem.xram[0x3FF], 0x11);
    }

    #[test]
    fn apply_masks_pc_and_sp() {
        let mut record = sample_record();
        record.pc = 0xFFFF;
        record.sp = 0xFF;
        let mut cpu = Cpu::new();
        record.apply(&mut cpu, &mut Memory::new());
        assert_eq!(cpu.pc, 0x0FFF);
        assert_eq!(cpu.sp, 7);
    }

    #[test]
    fn apply_tames_counters_from_hostile_record() {
        let mut record = sample_record();
        record.prescaler = u32::MAX;
        record.cycles = u64::MAX;
        record.core.insert(CoreLatches::TIMER_RUN);
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        record.apply(&mut cpu, &mut mem);
        assert!(cpu.prescaler < TIMER_PRESCALE);
        assert!(cpu.timer_running);

        let used = cpu.execute_one(&mut mem, &mut crate::cpu::Unconnected);
        assert_eq!(cpu.cycles, used as u64 - 1);
        assert!(cpu.prescaler < TIMER_PRESCALE);
    }
}
