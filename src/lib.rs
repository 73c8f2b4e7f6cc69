// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later


//! Entex Adventure Vision emulator core
//!
//! Intel 8048 CPU, COP411L sound behavioral model and the spinning-mirror
//! LED display, tied together by a frame-stepped machine with save states
//! and rewind. Rendering and audio playback belong to the host.

pub mod config;
pub mod core;
pub mod cpu;
pub mod debugger;
pub mod display;
pub mod emulator;
pub mod error;
pub mod sound;
pub mod state;

// Re-export commonly used types
pub use config::{Config, SyncPulse};
pub use core::{Buttons, Memory};
pub use cpu::Cpu;
pub use debugger::{Debugger, StopReason};
pub use display::Display;
pub use emulator::{AdventureVision, EmulatorStats};
pub use error::{ConfigError, DebugError, EmuError, RomError, StateError};
pub use sound::{AudioOutput, AudioProfile, SharedSound};
