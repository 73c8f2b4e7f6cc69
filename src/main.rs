// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later


// Headless runner: boots a BIOS and cartridge, runs some frames and reports.
use std::env;

use advision_core::{AdventureVision, Buttons, Config};
use anyhow::{Context, Result, bail};

const USAGE: &str = "usage: advision <bios.bin> <cart.bin> [--frames N] [--input UDLR1234] [--save FILE] [--load FILE] [--break ADDR] [--dump]";

struct Args {
    bios: String,
    cart: String,
    frames: u64,
    input: Option<String>,
    save: Option<String>,
    load: Option<String>,
    breakpoints: Vec<u16>,
    dump: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut args = Args {
        bios: String::new(),
        cart: String::new(),
        frames: 60,
        input: None,
        save: None,
        load: None,
        breakpoints: Vec::new(),
        dump: false,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--frames" => {
                let n = iter.next().context("--frames needs a value")?;
                args.frames = n.parse().with_context(|| format!("bad frame count '{n}'"))?;
            }
            "--input" => args.input = Some(iter.next().context("--input needs a value")?),
            "--save" => args.save = Some(iter.next().context("--save needs a path")?),
            "--load" => args.load = Some(iter.next().context("--load needs a path")?),
            "--break" => {
                let addr = iter.next().context("--break needs an address")?;
                let hex = addr.trim_start_matches("0x");
                args.breakpoints.push(
                    u16::from_str_radix(hex, 16)
                        .with_context(|| format!("bad breakpoint address '{addr}'"))?,
                );
            }
            "--dump" => args.dump = true,
            "-h" | "--help" => bail!(USAGE),
            _ => positional.push(arg),
        }
    }

    let [bios, cart] = <[String; 2]>::try_from(positional).map_err(|_| anyhow::anyhow!(USAGE))?;
    args.bios = bios;
    args.cart = cart;
    Ok(args)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;

    println!("Adventure Vision Emulator v{}", env!("CARGO_PKG_VERSION"));
    println!("==============================");

    let mut emulator = AdventureVision::new(Config::default());
    emulator
        .load_bios_file(&args.bios)
        .with_context(|| format!("loading BIOS '{}'", args.bios))?;
    emulator
        .load_cartridge_file(&args.cart)
        .with_context(|| format!("loading cartridge '{}'", args.cart))?;
    emulator.reset();

    if let Some(path) = &args.load {
        emulator.load_state(path)?;
    }
    if let Some(keys) = &args.input {
        emulator.set_buttons(Buttons::from_letters(keys));
    }

    let mut audio = emulator.audio_output();
    let mut samples = vec![0i16; (advision_core::sound::SAMPLE_RATE / 15) as usize];
    let mut peak = 0i16;
    if !args.breakpoints.is_empty() {
        emulator.debugger.set_active(true);
        for &addr in &args.breakpoints {
            emulator.debugger.add_breakpoint(addr)?;
        }
    }

    for _ in 0..args.frames {
        if let Some(reason) = emulator.run_frame() {
            println!("Stopped:      {reason:?}");
            break;
        }
        audio.render(&mut samples);
        peak = samples.iter().fold(peak, |p, s| p.max(s.saturating_abs()));
    }

    if let Some(path) = &args.save {
        emulator.save_state(path)?;
    }

    let stats = emulator.stats();
    println!("Frames:       {}", stats.frame_count);
    println!("Cycles:       {}", stats.total_cycles);
    println!("PC:           0x{:03X}", stats.pc);
    println!("Lit pixels:   {}", stats.lit_pixels);
    println!("Sound active: {}", stats.sound_active);
    println!("Audio peak:   {peak}");
    println!("{}", emulator.cpu.registers(&emulator.memory));

    if args.dump {
        print!("{}", emulator.display.ascii_dump());
    }
    Ok(())
}
