// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Memory map of the Adventure Vision board.
//!
//! - 64 bytes of internal RAM (register banks, stack, scratch)
//! - 1 KiB of external RAM in four 256-byte banks selected by P1 bits 0-1
//! - 1 KiB internal boot ROM, visible below 0x400 while P1 bit 2 is low
//! - up to 4 KiB of cartridge ROM

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};

use crate::error::RomError;

pub const IRAM_SIZE: usize = 64;
pub const XRAM_SIZE: usize = 1024;
pub const BOOT_ROM_SIZE: usize = 1024;
pub const CART_ROM_SIZE: usize = 4096;

const XRAM_BANK_MASK: u8 = 0x03;
const BOOT_ROM_DISABLE: u8 = 0x04;

pub struct Memory {
    pub iram: [u8; IRAM_SIZE],
    pub xram: [u8; XRAM_SIZE],
    boot_rom: Box<[u8; BOOT_ROM_SIZE]>,
    cart_rom: Box<[u8; CART_ROM_SIZE]>,
}

impl Memory {
    pub fn new() -> Self {
        let mut mem = Self {
            iram: [0; IRAM_SIZE],
            xram: [0; XRAM_SIZE],
            boot_rom: Box::new([0; BOOT_ROM_SIZE]),
            cart_rom: Box::new([0; CART_ROM_SIZE]),
        };
        mem.clear_ram();
        mem
    }

    /// Power-on RAM contents: bank 0 zeroed, video banks 1-3 all LEDs off.
    pub fn clear_ram(&mut self) {
        self.iram = [0; IRAM_SIZE];
        self.xram[..0x100].fill(0x00);
        self.xram[0x100..].fill(0xFF);
    }

    /// Copy a boot ROM image in, truncating anything past 1 KiB.
    pub fn load_boot_rom(&mut self, data: &[u8]) -> Result<(), RomError> {
        copy_image(&mut self.boot_rom[..], data, "boot ROM")
    }

    /// Copy a cartridge image in, truncating anything past 4 KiB.
    pub fn load_cartridge(&mut self, data: &[u8]) -> Result<(), RomError> {
        copy_image(&mut self.cart_rom[..], data, "cartridge")
    }

    /// Program-space read. `addr` is always the full 12-bit address; there is
    /// no bank wraparound for sequential fetch.
    pub fn read_rom(&self, addr: u16, p1: u8) -> u8 {
        let addr = (addr & 0x0FFF) as usize;
        if addr < BOOT_ROM_SIZE && p1 & BOOT_ROM_DISABLE == 0 {
            self.boot_rom[addr]
        } else {
            self.cart_rom[addr & (CART_ROM_SIZE - 1)]
        }
    }

    pub fn read_iram(&self, addr: u8) -> u8 {
        self.iram[addr as usize & (IRAM_SIZE - 1)]
    }

    pub fn write_iram(&mut self, addr: u8, value: u8) {
        self.iram[addr as usize & (IRAM_SIZE - 1)] = value;
    }

    /// Physical external-RAM address for `offset` in the bank selected by P1.
    pub fn xram_address(p1: u8, offset: u8) -> usize {
        ((((p1 & XRAM_BANK_MASK) as usize) << 8) | offset as usize) & (XRAM_SIZE - 1)
    }

    pub fn read_xram(&self, p1: u8, offset: u8) -> u8 {
        self.xram[Self::xram_address(p1, offset)]
    }

    pub fn write_xram(&mut self, p1: u8, offset: u8, value: u8) {
        self.xram[Self::xram_address(p1, offset)] = value;
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_image(dest: &mut [u8], data: &[u8], what: &str) -> Result<(), RomError> {
    if data.is_empty() {
        return Err(RomError::EmptyImage);
    }
    if data.len() > dest.len() {
        warn!(
            "{what} image is {} bytes, truncating to {}",
            data.len(),
            dest.len()
        );
    }
    let len = data.len().min(dest.len());
    dest.fill(0);
    dest[..len].copy_from_slice(&data[..len]);
    Ok(())
}

/// Read a ROM file whole, keeping at most `capacity` bytes.
///
/// Empty files and short reads are errors; oversized files are truncated
/// with a warning.
pub fn read_rom_file(path: &Path, capacity: usize) -> Result<Vec<u8>, RomError> {
    let mut file = File::open(path).map_err(|source| RomError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file
        .metadata()
        .map_err(|source| RomError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .len() as usize;
    if file_len == 0 {
        return Err(RomError::Empty {
            path: path.to_path_buf(),
        });
    }
    if file_len > capacity {
        warn!(
            "'{}' is {file_len} bytes, truncating to {capacity}",
            path.display()
        );
    }
    let expected = file_len.min(capacity);
    let mut data = vec![0; expected];
    file.read_exact(&mut data)
        .map_err(|source| RomError::Truncated {
            path: path.to_path_buf(),
            expected,
            source,
        })?;
    info!("loaded {expected} bytes from '{}'", path.display());
    Ok(data)
}
