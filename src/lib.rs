/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A Chip-8 virtual machine.
//!
//! The `Interpreter` owns all of the machine state and advances it one
//! instruction at a time through `Interpreter::step`.  Rendering, input
//! polling and the 60 Hz timer cadence are left to the caller, which talks to
//! the interpreter through the `display`, `input` and `timer` modules.

#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
extern crate num;
extern crate rand;
extern crate time;

/// The size of the Chip-8's memory, in bytes.
pub const MEM_SIZE: usize = 0x1000;
/// The address where programs should be loaded.
pub const PROG_START: usize = 0x200;
/// The maximum size of a Chip-8 program, in bytes.
pub const PROG_SIZE: usize = MEM_SIZE - PROG_START;
/// The maximum depth of the call stack.
pub const STACK_SIZE: usize = 16;

pub mod display;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod timer;
mod util;

pub use instruction::{Address, AddressOutOfBoundsError, Instruction, InvalidOpcodeError, Opcode,
                      Register};
pub use interpreter::{Interpreter, NotInSubroutineError, Options, ProgramTooLargeError,
                      StackOverflowError, Step};
