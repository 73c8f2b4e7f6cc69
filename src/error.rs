// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error taxonomy for the emulator core.
//!
//! Errors that make further emulation meaningless (missing ROM, unreadable
//! save header) surface here. Recoverable anomalies such as a single bad
//! field inside an otherwise valid save record are repaired in place and
//! only logged.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading a boot ROM or cartridge image.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("cannot open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("empty ROM image '{path}'")]
    Empty { path: PathBuf },
    #[error("read error: expected {expected} bytes from '{path}': {source}")]
    Truncated {
        path: PathBuf,
        expected: usize,
        #[source]
        source: io::Error,
    },
    #[error("empty ROM image")]
    EmptyImage,
}

/// Failures while saving or loading a machine state record.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid save file (bad magic {0:#010X})")]
    BadMagic(u32),
    #[error("save version mismatch (got {found}, need {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("corrupt save file: record ended early")]
    Truncated,
}

/// Configuration values rejected at the boundary.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sync pulse start {start} must be below its end {end}")]
    InvertedSyncWindow { start: u32, end: u32 },
    #[error("sync pulse window {start}..{end} lies outside the frame preamble")]
    SyncWindowOutOfRange { start: u32, end: u32 },
    #[error("phosphor decay {0} outside 0.0..=1.0")]
    DecayOutOfRange(f32),
    #[error("LED gamma {0} outside 0.2..=3.0")]
    GammaOutOfRange(f32),
    #[error("volume {0} outside 0..=10")]
    VolumeOutOfRange(u8),
}

/// Rejected debugger requests.
#[derive(Debug, Error, PartialEq)]
pub enum DebugError {
    #[error("breakpoint table full ({0} entries)")]
    BreakpointLimit(usize),
    #[error("address {0:#06X} outside program space")]
    ProgramAddress(u16),
    #[error("address {0:#06X} outside external RAM")]
    RamAddress(u16),
}

/// Umbrella error for the machine-level entry points.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Debug(#[from] DebugError),
}
