// Copyright (C) 2025 Dayton Fishell
// Adventure Vision Emulator
// This file is part of advision.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Lock-guarded owner of the sound engine.
//!
//! The frame loop and the host's audio callback both touch the engine. Every
//! access goes through one mutex and holds it only for the call at hand; no
//! method here takes the lock twice.

use std::sync::Arc;

use parking_lot::Mutex;

use super::SoundEngine;

#[derive(Clone, Default)]
pub struct SharedSound {
    inner: Arc<Mutex<SoundEngine>>,
}

impl SharedSound {
    pub fn new(engine: SoundEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn receive_command(&self, value: u8) {
        self.inner.lock().receive_command(value);
    }

    pub fn sample(&self) -> f32 {
        self.inner.lock().sample()
    }

    /// Fill `out` with consecutive samples under a single lock.
    pub fn fill(&self, out: &mut [f32]) {
        let mut engine = self.inner.lock();
        for slot in out {
            *slot = engine.sample();
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut SoundEngine) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_one_engine() {
        let sound = SharedSound::default();
        let audio = sound.clone();
        for b in [0xC0, 0x10, 0x00] {
            sound.receive_command(b);
        }
        assert!(audio.with(|engine| engine.is_active()));
    }

    #[test]
    fn audio_thread_pulls_while_commands_arrive() {
        let sound = SharedSound::default();
        let audio = sound.clone();
        let puller = thread::spawn(move || {
            let mut buf = [0.0f32; 256];
            for _ in 0..200 {
                audio.fill(&mut buf);
                assert!(buf.iter().all(|s| s.is_finite() && s.abs() <= 2.0));
            }
        });
        for n in 0..500u32 {
            let cmd = ((n % 15) as u8 + 1) << 4;
            for b in [0xC0, cmd, 0x50, 0x00] {
                sound.receive_command(b);
            }
        }
        puller.join().unwrap();
    }
}
