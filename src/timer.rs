/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The delay and sound timers, and a clock for driving them.
//!
//! The interpreter only ever reads and writes the timers; decrementing them
//! is the job of whoever calls `Timers::tick`, normally a separate thread
//! running at 60 Hz.  Each timer is its own atomic byte, so a tick racing
//! with an instruction can at worst be one tick stale.

use std::num::Wrapping;
use std::sync::atomic::{AtomicU8, Ordering};

use time;

/// The frequency at which the timers are meant to be decremented, in Hz.
pub const TIMER_FREQ: u32 = 60;

/// The delay timer (`DT`) and sound timer (`ST`).
#[derive(Debug, Default)]
pub struct Timers {
    delay: AtomicU8,
    sound: AtomicU8,
}

impl Timers {
    /// Returns a pair of timers, both at zero.
    pub fn new() -> Self {
        Timers::default()
    }

    /// Returns the value of the delay timer.
    pub fn delay(&self) -> u8 {
        self.delay.load(Ordering::Relaxed)
    }

    /// Sets the value of the delay timer.
    pub fn set_delay(&self, val: u8) {
        self.delay.store(val, Ordering::Relaxed);
    }

    /// Returns the value of the sound timer.
    pub fn sound(&self) -> u8 {
        self.sound.load(Ordering::Relaxed)
    }

    /// Sets the value of the sound timer.
    pub fn set_sound(&self, val: u8) {
        self.sound.store(val, Ordering::Relaxed);
    }

    /// Decrements both timers by one, stopping at zero.
    pub fn tick(&self) {
        decrement(&self.delay);
        decrement(&self.sound);
    }

    /// Sets both timers back to zero.
    pub fn reset(&self) {
        self.set_delay(0);
        self.set_sound(0);
    }
}

fn decrement(timer: &AtomicU8) {
    // A timer already at zero makes the update fail, which is what we want.
    let _ = timer.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
}

/// A clock that counts ticks at a fixed frequency.
#[derive(Debug)]
pub struct Ticker {
    /// The frequency at which to count ticks.
    frequency: u32,
    /// The tick count as of the last lap.
    ticks: Wrapping<u32>,
}

impl Ticker {
    /// Returns a new ticker running at the given frequency.
    pub fn new(frequency: u32) -> Self {
        Ticker {
            frequency,
            ticks: ticks_at(time::precise_time_ns(), frequency),
        }
    }

    /// Returns the number of ticks which have elapsed since the last call to
    /// this method (or the creation of the ticker).
    pub fn lap(&mut self) -> u32 {
        let old = self.ticks;
        self.ticks = ticks_at(time::precise_time_ns(), self.frequency);
        (self.ticks - old).0
    }

    /// Returns the number of nanoseconds in one tick.
    pub fn period_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.frequency.max(1))
    }
}

/// Returns the tick count at the given clock reading, truncated to 32 bits.
fn ticks_at(ns: u64, frequency: u32) -> Wrapping<u32> {
    Wrapping((u128::from(ns) * u128::from(frequency) / 1_000_000_000) as u32)
}
