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

//! The Chip-8 interpreter.
//!
//! The main focus of this module is the `Interpreter` struct, which contains
//! the state of a Chip-8 machine and provides the interface used by the
//! front-end: `reset`, `load_program` and `step`.  The interpreter does no
//! timing of its own.  The caller decides how often to call `step`, and the
//! delay and sound timers are decremented through `tick` (or a shared
//! `Timers` handle) on a separate 60 Hz cadence.
//!
//! Every instruction is atomic: all of its preconditions (memory bounds,
//! stack depth, room for the next instruction) are checked before any state
//! is changed, so a failed `step` leaves the machine as it was.

use std::default::Default;
use std::io::Read;
use std::num::Wrapping;
use std::sync::Arc;
use std::u8;

use failure::{Error, Fail, ResultExt};
use rand;

use MEM_SIZE;
use PROG_SIZE;
use PROG_START;
use Register;
use STACK_SIZE;
use display::{self, HEX_HEIGHT, HEX_SPRITES};
use input::{Key, Keypad};
use instruction::{Address, AddressOutOfBoundsError, Instruction, Opcode};
use timer::Timers;
use util;

/// The location at which to put the hex digit sprites.
const HEX_START: usize = 0x0;

/// An error resulting from a bad `RET` instruction.
#[derive(Debug, Fail)]
#[fail(display = "no subroutine to return from")]
pub struct NotInSubroutineError;

/// An error resulting from calling too many nested subroutines.
#[derive(Debug, Fail)]
#[fail(display = "call stack overflowed (max depth {})", _0)]
pub struct StackOverflowError(pub usize);

/// An error resulting from an input program being too large.
#[derive(Debug, Fail)]
#[fail(display = "input program is too large: {} bytes (max {})", size, max)]
pub struct ProgramTooLargeError {
    /// The size of the rejected program.
    pub size: usize,
    /// The largest program that fits in memory.
    pub max: usize,
}

/// Options for the interpreter.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether sprites wrap around the edges of the display rather than
    /// being clipped (default `true`).
    pub wrap_sprites: bool,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options { wrap_sprites: true }
    }

    /// Returns a set of options useful for testing.
    pub fn testing() -> Self {
        Options::new()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// The outcome of a single execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Whether the instruction changed the display (`CLS` or `DRW`).
    pub redraw: bool,
    /// The value of the sound timer after the instruction; the buzzer
    /// should sound while this is non-zero.
    pub sound_timer: u8,
    /// Whether the instruction was `LD Vx, K` with no key pressed, in which
    /// case the program counter did not move.
    pub waiting_for_key: bool,
}

/// A Chip-8 interpreter.
///
/// This struct contains the entire state of a Chip-8 machine and provides
/// all the expected methods for interacting with it, such as stepping
/// through execution and inspecting the internal state.
pub struct Interpreter {
    /// The internal memory.
    mem: [u8; MEM_SIZE],
    /// The display buffer.
    display: display::Buffer,
    /// The keypad, shared with whatever polls the input device.
    keypad: Arc<Keypad>,
    /// The general-purpose registers `V0`-`VF`.
    regs: [Wrapping<u8>; 16],
    /// The special register `I`.
    reg_i: Address,
    /// The delay and sound timers, shared with the timer driver.
    timers: Arc<Timers>,
    /// The program counter.
    pc: Address,
    /// The call stack (for returning from subroutines).
    call_stack: Vec<Address>,
}

impl Interpreter {
    /// Returns a new interpreter with the default options.
    pub fn new() -> Self {
        Interpreter::with_options(Options::default())
    }

    /// Returns a new interpreter in its power-on state, using the given
    /// options.
    pub fn with_options(options: Options) -> Self {
        let mut interpreter = Interpreter {
            mem: [0; MEM_SIZE],
            display: display::Buffer::with_wrapping(options.wrap_sprites),
            keypad: Arc::new(Keypad::new()),
            regs: [Wrapping(0); 16],
            reg_i: Address::default(),
            timers: Arc::new(Timers::new()),
            pc: Address::PROGRAM_START,
            call_stack: Vec::with_capacity(STACK_SIZE),
        };
        interpreter.reset();
        interpreter
    }

    /// Returns the interpreter to its power-on state.
    ///
    /// All memory, registers, timers, keys and the display are cleared, the
    /// hex digit sprites are copied to the bottom of memory and the program
    /// counter is set to the start of the program region.  Any loaded
    /// program is lost.  Shared `Keypad` and `Timers` handles stay connected.
    pub fn reset(&mut self) {
        self.mem = [0; MEM_SIZE];
        for (i, sprite) in HEX_SPRITES.iter().enumerate() {
            let start = HEX_START + i * HEX_HEIGHT;
            let end = start + sprite.len();
            self.mem[start..end].copy_from_slice(sprite);
        }

        self.display = display::Buffer::with_wrapping(self.display.wraps());
        self.keypad.release_all();
        self.regs = [Wrapping(0); 16];
        self.reg_i = Address::default();
        self.timers.reset();
        self.pc = Address::PROGRAM_START;
        self.call_stack.clear();
        debug!("interpreter reset");
    }

    /// Copies the given program into memory at the start of the program
    /// region.
    ///
    /// Nothing outside the program's own bytes is touched.  A program that
    /// does not fit is rejected without writing anything.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Error> {
        if program.len() > PROG_SIZE {
            return Err(ProgramTooLargeError {
                size: program.len(),
                max: PROG_SIZE,
            }.into());
        }

        self.mem[PROG_START..PROG_START + program.len()].copy_from_slice(program);
        debug!("loaded {} byte program", program.len());
        trace!("program contents:\n{}", util::hex_dump(program, PROG_START));
        Ok(())
    }

    /// Loads program data from the specified source.
    pub fn load_program_from<R: Read>(&mut self, input: &mut R) -> Result<(), Error> {
        // One byte more than fits is enough to know the program is too big.
        let mut program = Vec::with_capacity(PROG_SIZE);
        input
            .take(PROG_SIZE as u64 + 1)
            .read_to_end(&mut program)
            .context("could not read program data")?;
        self.load_program(&program)
    }

    /// Returns a reference to the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a mutable reference to the display buffer, for refreshing it.
    pub fn display_mut(&mut self) -> &mut display::Buffer {
        &mut self.display
    }

    /// Returns a handle to the keypad, for use by an input thread.
    pub fn keypad(&self) -> Arc<Keypad> {
        Arc::clone(&self.keypad)
    }

    /// Marks the given key as pressed.  Only the lowest four bits of the
    /// index are used.
    pub fn set_key(&self, index: u8) {
        self.keypad.press(Key::from_byte(index));
    }

    /// Marks the given key as released.  Only the lowest four bits of the
    /// index are used.
    pub fn clear_key(&self, index: u8) {
        self.keypad.release(Key::from_byte(index));
    }

    /// Returns a handle to the timers, for use by a timer thread.
    pub fn timers(&self) -> Arc<Timers> {
        Arc::clone(&self.timers)
    }

    /// Decrements the delay and sound timers, as should happen 60 times a
    /// second.
    pub fn tick(&self) {
        self.timers.tick();
    }

    /// Returns a reference to the internal memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> Address {
        self.reg_i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: Address) {
        self.reg_i = val;
    }

    /// Returns the value of the delay timer.
    pub fn dt(&self) -> u8 {
        self.timers.delay()
    }

    /// Sets the value of the delay timer.
    pub fn set_dt(&mut self, val: u8) {
        self.timers.set_delay(val);
    }

    /// Returns the value of the sound timer.
    pub fn st(&self) -> u8 {
        self.timers.sound()
    }

    /// Sets the value of the sound timer.
    pub fn set_st(&mut self, val: u8) {
        self.timers.set_sound(val);
    }

    /// Returns the value in the given register.
    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize].0
    }

    /// Sets the given register to the given value.
    pub fn set_register(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize].0 = val
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> Address {
        self.pc
    }

    /// Returns the saved return addresses, innermost call last.
    pub fn stack(&self) -> &[Address] {
        &self.call_stack
    }

    /// Returns the instruction at the program counter.
    pub fn current_instruction(&self) -> Result<Instruction, Error> {
        Ok(Instruction::from_opcode(self.current_opcode()?)?)
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Result<Opcode, AddressOutOfBoundsError> {
        let low = (self.pc + 1)?;
        Ok(Opcode::from_bytes(self.mem[self.pc.addr()], self.mem[low.addr()]))
    }

    /// Performs a single execution step: fetches, decodes and executes the
    /// instruction at the program counter.
    ///
    /// An opcode that matches no instruction fails with an
    /// `InvalidOpcodeError` and leaves the machine untouched.
    pub fn step(&mut self) -> Result<Step, Error> {
        let pc = self.pc;
        let ins = self.current_instruction()?;
        trace!("{}: {}", pc, ins);
        self.execute(ins)?;

        Ok(Step {
            redraw: match ins {
                Instruction::Cls | Instruction::Drw(..) => true,
                _ => false,
            },
            sound_timer: self.st(),
            waiting_for_key: match ins {
                Instruction::LdKey(_) => self.pc == pc,
                _ => false,
            },
        })
    }

    /// Executes the given instruction in the current interpreter context.
    ///
    /// The interpreter will behave as if the given instruction were executed
    /// at the current program location in memory.
    pub fn execute(&mut self, ins: Instruction) -> Result<(), Error> {
        use self::Instruction::*;

        // Jumps never fall through, so they don't need the address after
        // this instruction to exist.
        let next = match ins {
            Ret | Jp(_) | Call(_) | JpV0(_) => self.pc,
            _ => (self.pc + 2).context("program counter overflowed")?,
        };

        match ins {
            Cls => self.display.clear(),
            Ret => {
                let ret = *self.call_stack
                    .last()
                    .ok_or(NotInSubroutineError)
                    .with_context(|_| format!("error executing {}", ins))?;
                let after = (ret + 2).context("program counter overflowed")?;
                self.call_stack.pop();
                self.pc = after;
                return Ok(());
            }
            Jp(addr) => {
                self.pc = addr;
                return Ok(());
            }
            Call(addr) => {
                if self.call_stack.len() >= STACK_SIZE {
                    return Err(StackOverflowError(STACK_SIZE)
                        .context(format!("error executing {}", ins))
                        .into());
                }
                self.call_stack.push(self.pc);
                self.pc = addr;
                return Ok(());
            }
            SeByte(reg, b) => if self.register(reg) == b {
                return self.skip(next);
            },
            SneByte(reg, b) => if self.register(reg) != b {
                return self.skip(next);
            },
            SeReg(reg1, reg2) => if self.register(reg1) == self.register(reg2) {
                return self.skip(next);
            },
            LdByte(reg, b) => self.set_register(reg, b),
            AddByte(reg, b) => self.regs[reg as usize] += Wrapping(b),
            LdReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.set_register(reg1, r2);
            }
            Or(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 | r2);
            }
            And(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 & r2);
            }
            Xor(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 ^ r2);
            }
            AddReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.add(reg1, r2);
            }
            Sub(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.sub(reg1, r2);
            }
            Shr(reg, _) => self.shr(reg),
            Subn(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.subn(reg1, r2);
            }
            Shl(reg, _) => self.shl(reg),
            SneReg(reg1, reg2) => if self.register(reg1) != self.register(reg2) {
                return self.skip(next);
            },
            LdI(addr) => self.reg_i = addr,
            JpV0(addr) => {
                self.pc = (addr + self.register(Register::V0) as usize)
                    .context("attempted to jump to out of bounds address")?;
                return Ok(());
            }
            Rnd(reg, b) => self.set_register(reg, rand::random::<u8>() & b),
            Drw(reg1, reg2, n) => self.drw(reg1, reg2, n)
                .with_context(|_| format!("error executing {}", ins))?,
            Skp(reg) => if self.keypad.is_pressed(Key::from_byte(self.register(reg))) {
                return self.skip(next);
            },
            Sknp(reg) => if !self.keypad.is_pressed(Key::from_byte(self.register(reg))) {
                return self.skip(next);
            },
            LdRegDt(reg) => {
                let dt = self.dt();
                self.set_register(reg, dt);
            }
            LdKey(reg) => match self.keypad.first_pressed() {
                Some(key) => self.set_register(reg, key as u8),
                // Stay on this instruction until a key is pressed.
                None => return Ok(()),
            },
            LdDtReg(reg) => {
                let r = self.register(reg);
                self.set_dt(r);
            }
            LdSt(reg) => {
                let r = self.register(reg);
                self.set_st(r);
            }
            AddI(reg) => {
                let r = self.register(reg) as usize;
                self.reg_i = self.reg_i.wrapping_add(r);
            }
            LdF(reg) => {
                let r = self.register(reg) as usize;
                self.reg_i = Address::from_usize(HEX_START + HEX_HEIGHT * r)
                    .with_context(|_| format!("error executing {}", ins))?;
            }
            LdB(reg) => self.ld_b(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdDerefIReg(reg) => self.ld_deref_i_reg(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdRegDerefI(reg) => self.ld_reg_deref_i(reg)
                .with_context(|_| format!("error executing {}", ins))?,
        }

        self.pc = next;
        Ok(())
    }

    /// Skips the instruction after the current one, given the address of
    /// that instruction.
    fn skip(&mut self, next: Address) -> Result<(), Error> {
        self.pc = (next + 2).context("program counter overflowed")?;
        Ok(())
    }

    /// Adds the given byte to the given register, setting `VF` to 1 on carry
    /// or 0 otherwise.
    fn add(&mut self, reg: Register, val: u8) {
        let carry = val > u8::MAX - self.register(reg);
        self.regs[reg as usize] += Wrapping(val);
        self.set_register(Register::VF, carry as u8);
    }

    /// Implements the `DRW` operation.
    fn drw(&mut self, reg1: Register, reg2: Register, n: u8) -> Result<(), Error> {
        let start = self.reg_i.addr();
        let end = start + n as usize;
        if end > MEM_SIZE {
            Err(AddressOutOfBoundsError(end - 1))?
        }

        let x = self.register(reg1) as usize;
        let y = self.register(reg2) as usize;
        let collision = self.display.draw_sprite(&self.mem[start..end], x, y);
        self.set_register(Register::VF, collision as u8);
        Ok(())
    }

    /// Implements the `LD B, Vx` operation.
    fn ld_b(&mut self, reg: Register) -> Result<(), Error> {
        let val = self.register(reg);
        let hundreds = val / 100;
        let tens = val % 100 / 10;
        let ones = val % 10;
        let addr = self.i().addr();

        if addr + 2 >= MEM_SIZE {
            Err(AddressOutOfBoundsError(addr + 2))?
        } else {
            self.mem[addr] = hundreds;
            self.mem[addr + 1] = tens;
            self.mem[addr + 2] = ones;
            Ok(())
        }
    }

    /// Implements the `LD [I], Vx` operation, storing `V0` through `Vx`
    /// inclusive.  `I` is left unchanged.
    fn ld_deref_i_reg(&mut self, reg: Register) -> Result<(), Error> {
        let count = reg as usize + 1;
        let start = self.i().addr();

        if start + count > MEM_SIZE {
            Err(AddressOutOfBoundsError(start + count - 1))?
        } else {
            for (dest, src) in self.mem[start..start + count]
                .iter_mut()
                .zip(self.regs[..count].iter())
            {
                *dest = src.0;
            }
            Ok(())
        }
    }

    /// Implements the `LD Vx, [I]` operation, loading `V0` through `Vx`
    /// inclusive.  `I` is left unchanged.
    fn ld_reg_deref_i(&mut self, reg: Register) -> Result<(), Error> {
        let count = reg as usize + 1;
        let start = self.i().addr();

        if start + count > MEM_SIZE {
            Err(AddressOutOfBoundsError(start + count - 1))?
        } else {
            for (dest, src) in self.regs[..count]
                .iter_mut()
                .zip(self.mem[start..start + count].iter())
            {
                *dest = Wrapping(*src);
            }
            Ok(())
        }
    }

    /// Shifts `reg` left by one, setting `VF` to the old highest bit.
    fn shl(&mut self, reg: Register) {
        let r = self.register(reg);
        self.set_register(reg, r << 1);
        self.set_register(Register::VF, r >> 7);
    }

    /// Shifts `reg` right by one, setting `VF` to the old lowest bit.
    fn shr(&mut self, reg: Register) {
        let r = self.register(reg);
        self.set_register(reg, r >> 1);
        self.set_register(Register::VF, r & 1);
    }

    /// Subtracts the given byte from the given register, setting `VF` to 0 on
    /// borrow or 1 otherwise.
    fn sub(&mut self, reg: Register, val: u8) {
        let borrow = val > self.register(reg);
        self.regs[reg as usize] -= Wrapping(val);
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Sets `reg` to `val - reg`, setting `VF` to 0 on borrow or 1 otherwise.
    fn subn(&mut self, reg: Register, val: u8) {
        let borrow = self.register(reg) > val;
        self.regs[reg as usize] = Wrapping(val) - self.regs[reg as usize];
        self.set_register(Register::VF, !borrow as u8);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}
