// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later


//! Whole-machine behavior: frame timing, display capture, timer interrupts,
//! controller input and the sound command path.

use advision_core::cpu::IRQ_VECTOR;
use advision_core::display::{HEIGHT, WIDTH};
use advision_core::{AdventureVision, Buttons, Config};
use pretty_assertions::assert_eq;

fn machine_with_bios(program: &[u8]) -> AdventureVision {
    let mut emu = AdventureVision::default();
    emu.load_bios(program).expect("bios should load");
    emu
}

/// Program with the timer interrupt routine at the vector; the main loop
/// spins at 0x00F.
fn timer_program() -> Vec<u8> {
    let mut rom = vec![0u8; 0x20];
    rom[0x000..0x002].copy_from_slice(&[0x04, 0x09]); // JMP 009h
    rom[IRQ_VECTOR as usize] = 0x18; // INC R0
    rom[IRQ_VECTOR as usize + 1] = 0x93; // RETR
    rom[0x009..0x011].copy_from_slice(&[
        0x23, 0xF0, // MOV A,#F0h
        0x62, // MOV T,A
        0x25, // EN TCNTI
        0x05, // EI
        0x55, // STRT T
        0x04, 0x0F, // JMP 00Fh
    ]);
    rom
}

#[test]
fn timer_interrupt_fires_each_overflow() {
    let mut emu = machine_with_bios(&timer_program());
    emu.run_frame();

    // 16 ticks to the first overflow, then one every 256 ticks of 32 cycles
    let first = (AdventureVision::CYCLES_PER_FRAME as usize - 16 * 32) / (256 * 32) + 1;
    let count = emu.memory.iram[0] as usize;
    assert!(
        (first - 1..=first).contains(&count),
        "expected about {first} interrupts, saw {count}"
    );
    assert!(emu.cpu.timer_running);

    let before = emu.memory.iram[0];
    emu.run_frame();
    assert!(emu.memory.iram[0] > before);
}

#[test]
fn frame_count_and_cycles_advance_together() {
    let mut emu = machine_with_bios(&[0x04, 0x00]);
    emu.run_frames(5);
    let stats = emu.stats();
    assert_eq!(stats.frame_count, 5);
    let budget = 5 * AdventureVision::CYCLES_PER_FRAME as u64;
    assert!(stats.total_cycles >= budget && stats.total_cycles < budget + 10);
}

#[test]
fn video_ram_fallback_draws_every_bank() {
    let mut emu = machine_with_bios(&[0x04, 0x00]);
    // bottom LED of column 0, 50 and 149
    for (bank, col) in [(1usize, 0usize), (2, 0), (3, 49)] {
        emu.memory.xram[bank * 0x100 + 6 + col * 5 + 4] = 0xFE;
    }
    emu.run_frame();

    for x in [0, 50, 149] {
        assert_eq!(emu.display.pixel(x, 7), 1.0, "column {x}");
    }
    assert_eq!(emu.display.lit_pixels(), 3);
    assert_eq!(emu.display.pixel(WIDTH, 0), 0.0);
    assert_eq!(emu.display.pixel(0, HEIGHT), 0.0);
}

#[test]
fn gamma_only_changes_presentation() {
    let mut emu = machine_with_bios(&[0x04, 0x00]);
    emu.memory.xram[0x106] = 0x7F;
    emu.set_config(Config {
        led_gamma: 2.2,
        ..Config::default()
    });
    emu.run_frame();
    emu.memory.xram[0x106] = 0xFF;
    emu.run_frame();

    let raw = emu.display.pixel(0, 32);
    assert!((raw - 0.45).abs() < 1e-6);
    let shown = emu.pixel_gamma(0, 32);
    assert!((shown - 0.45f32.powf(2.2)).abs() < 0.01);
}

#[test]
fn buttons_reach_p1() {
    // IN A,P1 ; MOV R1,A ; JMP 000h
    let mut emu = machine_with_bios(&[0x09, 0xA9, 0x04, 0x00]);
    emu.run_frame();
    assert_eq!(emu.memory.iram[1], 0xFB);

    emu.set_buttons(Buttons::from_letters("u"));
    emu.run_frame();
    assert_eq!(emu.memory.iram[1], 0xDB);

    emu.reset();
    emu.run_frame();
    assert_eq!(emu.memory.iram[1], 0xFB);
}

#[test]
fn sound_command_through_p2() {
    let mut program = Vec::new();
    for byte in [0xC0u8, 0xE0, 0x50, 0x00] {
        program.extend_from_slice(&[0x23, byte, 0x3A]); // MOV A,#byte ; OUTL P2,A
    }
    let spin = program.len() as u8;
    program.extend_from_slice(&[0x04, spin]);

    let mut emu = machine_with_bios(&program);
    emu.run_frame();

    let sound = emu.sound();
    assert!(sound.with(|engine| engine.is_active()));
    let freq = sound.with(|engine| engine.frequency());
    assert!((freq - 320.92).abs() < 0.01);

    let mut out = emu.audio_output();
    let mut buf = vec![0i16; 512];
    out.render(&mut buf);
    assert!(buf.iter().any(|&s| s != 0));
}

#[test]
fn cartridge_space_above_boot_rom() {
    let mut emu = machine_with_bios(&[0x04, 0x00]);
    let mut cart = vec![0u8; 0x1000];
    cart[0x400] = 0xAB;
    emu.load_cartridge(&cart).expect("cartridge should load");
    assert_eq!(emu.memory.read_rom(0x400, emu.cpu.p1), 0xAB);
    assert_eq!(emu.memory.read_rom(0x000, emu.cpu.p1), 0x04);
}

#[test]
fn rom_files_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bios = dir.path().join("bios.bin");
    std::fs::write(&bios, [0x04, 0x00]).expect("write bios");

    let mut emu = AdventureVision::default();
    emu.load_bios_file(&bios).expect("bios file should load");
    assert_eq!(emu.memory.read_rom(0, emu.cpu.p1), 0x04);

    let missing = dir.path().join("missing.bin");
    assert!(emu.load_cartridge_file(&missing).is_err());

    let empty = dir.path().join("empty.bin");
    std::fs::write(&empty, []).expect("write empty");
    assert!(emu.load_cartridge_file(&empty).is_err());
}
