// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Save files and rewind history.

pub mod rewind;
pub mod save;

pub use rewind::{REWIND_CAPACITY, RewindBuffer, RewindSnapshot};
pub use save::{RECORD_SIZE, SAVE_MAGIC, SAVE_VERSION, SaveRecord};
