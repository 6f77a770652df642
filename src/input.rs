// Copyright 2018 Ian Johnson

// This file is part of Chip-8.

// Chip-8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8.  If not, see <http://www.gnu.org/licenses/>.

//! Input handling for the Chip-8 interpreter.
//!
//! The keypad is shared between the interpreter and whatever is polling the
//! real input device, which may live on another thread.  Each key is an
//! independent atomic flag; a press only has to become visible by the next
//! instruction step, so relaxed ordering is enough.

use std::sync::atomic::{AtomicBool, Ordering};

use num::traits::FromPrimitive;

/// The number of keys on the Chip-8 controller.
pub const N_KEYS: usize = 16;

enum_from_primitive!{
/// The keys on the Chip-8 controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    K0 = 0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF
}
}

impl Key {
    /// Returns the key corresponding to the lowest four bits of the given
    /// byte.
    pub fn from_byte(b: u8) -> Key {
        Key::from_u8(b % N_KEYS as u8).unwrap()
    }
}

/// The state of the sixteen-key input device.
#[derive(Debug, Default)]
pub struct Keypad {
    /// The key states (`true` means "pressed").
    keys: [AtomicBool; N_KEYS],
}

impl Keypad {
    /// Returns a new keypad with all keys released.
    pub fn new() -> Self {
        Keypad::default()
    }

    /// Marks the given key as pressed.
    pub fn press(&self, key: Key) {
        self.keys[key as usize].store(true, Ordering::Relaxed);
    }

    /// Marks the given key as released.
    pub fn release(&self, key: Key) {
        self.keys[key as usize].store(false, Ordering::Relaxed);
    }

    /// Returns whether the given key is pressed.
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys[key as usize].load(Ordering::Relaxed)
    }

    /// Returns the lowest key that is currently pressed, if any.
    ///
    /// The key stays pressed.
    pub fn first_pressed(&self) -> Option<Key> {
        self.keys
            .iter()
            .position(|key| key.load(Ordering::Relaxed))
            .map(|i| Key::from_byte(i as u8))
    }

    /// Releases every key.
    pub fn release_all(&self) {
        for key in self.keys.iter() {
            key.store(false, Ordering::Relaxed);
        }
    }
}
