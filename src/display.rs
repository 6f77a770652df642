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

//! The Chip-8 framebuffer.
//!
//! The interpreter never pushes frames anywhere.  Instead, whatever is
//! rendering the display polls the `Buffer`, either checking `dirty` itself
//! or letting `refresh` decide whether a redraw is needed.

use std::default::Default;

use failure::Fail;

/// The width of the display.
pub const WIDTH: usize = 64;
/// The height of the display.
pub const HEIGHT: usize = 32;

/// The height of a hex digit sprite.
pub const HEX_HEIGHT: usize = 5;

/// The hex digit sprites, stored at the bottom of memory.
pub const HEX_SPRITES: [[u8; HEX_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A Chip-8 display buffer.
///
/// Pixels are stored column-major, so `data()[x][y]` is the pixel at column
/// `x` and row `y`.
///
/// Only the interpreter draws on the buffer; everything else can read it
/// and refresh it.
///
/// ```compile_fail
/// let mut buffer = chip8::display::Buffer::new();
/// buffer.draw_sprite(&[0xFF], 0, 0);
/// ```
///
/// ```compile_fail
/// let mut buffer = chip8::display::Buffer::new();
/// buffer.clear();
/// ```
#[derive(Clone)]
pub struct Buffer {
    /// The underlying display buffer data.
    data: [[bool; HEIGHT]; WIDTH],
    /// Whether sprites wrap around the edges of the display (otherwise they
    /// are clipped).
    wrap: bool,
    /// Whether the display needs to be refreshed.
    needs_refresh: bool,
}

impl Buffer {
    /// Returns a new display buffer with all pixels clear and sprite
    /// wrapping enabled.
    pub fn new() -> Self {
        Buffer::with_wrapping(true)
    }

    /// Returns a new display buffer with all pixels clear, wrapping or
    /// clipping sprites at the edges as requested.
    pub fn with_wrapping(wrap: bool) -> Self {
        Buffer {
            data: [[false; HEIGHT]; WIDTH],
            wrap,
            needs_refresh: true,
        }
    }

    /// Clears the display.
    pub(crate) fn clear(&mut self) {
        for col in self.data.iter_mut() {
            for elem in col.iter_mut() {
                *elem = false;
            }
        }
        self.needs_refresh = true;
    }

    /// Returns a reference to the underlying pixel data.
    pub fn data(&self) -> &[[bool; HEIGHT]; WIDTH] {
        &self.data
    }

    /// Returns whether the pixel at the given position is set.
    ///
    /// Positions outside the display are never set.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.data[x][y]
    }

    /// Returns whether sprites wrap around the display edges.
    pub fn wraps(&self) -> bool {
        self.wrap
    }

    /// Draws the given sprite at the given position, XOR-ing each set bit
    /// onto the display.
    ///
    /// The starting position always wraps; the rest of the sprite wraps or
    /// is clipped depending on how the buffer was created.  Returns whether
    /// any set pixel was cleared (a collision).
    pub(crate) fn draw_sprite(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let x = x % WIDTH;
        let y = y % HEIGHT;
        let mut collision = false;

        for (j, row) in sprite.iter().enumerate() {
            for i in 0..8 {
                if row & (1 << (7 - i)) != 0 && self.toggle(x + i, y + j) {
                    collision = true;
                }
            }
        }
        self.needs_refresh = true;

        collision
    }

    /// Returns whether the display has changed since it was last refreshed.
    pub fn dirty(&self) -> bool {
        self.needs_refresh
    }

    /// Forces a refresh on the next call to `refresh`, even if no draw
    /// operation has been performed.
    pub fn force_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Refreshes the display using the given refresh function.
    ///
    /// If a refresh is unnecessary, nothing will be done.  The refresh
    /// function receives a "snapshot" of the display, and should draw that to
    /// whatever user-facing display buffer is currently being used.
    pub fn refresh<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Self) -> Result<(), E>,
        E: Fail,
    {
        if self.needs_refresh {
            f(self)?;
            self.needs_refresh = false;
        }
        Ok(())
    }

    /// Flips the on/off state of the given pixel, returning whether it was
    /// flipped off from the on state.
    fn toggle(&mut self, x: usize, y: usize) -> bool {
        let (x, y) = if self.wrap {
            (x % WIDTH, y % HEIGHT)
        } else if x < WIDTH && y < HEIGHT {
            (x, y)
        } else {
            return false;
        };

        let old = self.data[x][y];
        self.data[x][y] = !old;
        old
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Fail)]
    #[fail(display = "refresh failed")]
    struct RefreshError;

    fn lit(buffer: &Buffer) -> usize {
        buffer
            .data()
            .iter()
            .map(|col| col.iter().filter(|&&p| p).count())
            .sum()
    }

    #[test]
    fn draw_and_erase() {
        let mut buffer = Buffer::new();
        let sprite = HEX_SPRITES[0];

        assert!(!buffer.draw_sprite(&sprite, 10, 5));
        assert!(buffer.pixel(10, 5));
        assert!(buffer.pixel(13, 9));
        assert!(!buffer.pixel(11, 6));
        assert_eq!(lit(&buffer), 14);

        assert!(buffer.draw_sprite(&sprite, 10, 5));
        assert_eq!(lit(&buffer), 0);
    }

    /// Tests that sprites crossing an edge come back on the other side when
    /// wrapping and disappear when clipping.
    #[test]
    fn edges() {
        // Test cases, in the format (wrap, x, y, probe, probe set, lit
        // count), drawing an 8x2 block.
        let cases = [
            (true, 62, 0, (0, 0), true, 16),
            (false, 62, 0, (0, 0), false, 4),
            (true, 0, 31, (0, 0), true, 16),
            (false, 0, 31, (0, 0), false, 8),
            (true, 67, 33, (3, 1), true, 16),
            (false, 67, 33, (3, 1), true, 16),
        ];

        for &(wrap, x, y, (px, py), set, count) in cases.iter() {
            let case = (wrap, x, y);
            let mut buffer = Buffer::with_wrapping(wrap);
            assert!(!buffer.draw_sprite(&[0xFF, 0xFF], x, y), "case {:?}", case);
            assert_eq!(buffer.pixel(px, py), set, "case {:?}", case);
            assert_eq!(lit(&buffer), count, "case {:?}", case);
        }
    }

    #[test]
    fn clear_marks_dirty() {
        let mut buffer = Buffer::new();
        buffer.draw_sprite(&[0x80], 0, 0);
        buffer.refresh(|_| Ok::<(), RefreshError>(())).unwrap();
        assert!(!buffer.dirty());

        buffer.clear();
        assert!(buffer.dirty());
        assert_eq!(lit(&buffer), 0);
    }

    #[test]
    fn refresh_only_when_dirty() {
        let mut buffer = Buffer::new();
        let mut calls = 0;
        buffer
            .refresh(|_| {
                calls += 1;
                Ok::<(), RefreshError>(())
            })
            .unwrap();
        buffer
            .refresh(|_| {
                calls += 1;
                Ok::<(), RefreshError>(())
            })
            .unwrap();
        assert_eq!(calls, 1);

        assert!(buffer.refresh(|_| Err(RefreshError)).is_ok());
        buffer.force_refresh();
        assert!(buffer.refresh(|_| Err(RefreshError)).is_err());
        assert!(buffer.dirty());
    }
}
