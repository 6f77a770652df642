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

//! The `chip8` binary program.
//!
//! This is a headless front-end: the display is printed to the terminal as
//! text whenever it changes, the buzzer is reported through the log, and the
//! timers are driven from their own thread.

extern crate chip8;
extern crate clap;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use failure::{Error, ResultExt};
use log::LevelFilter;

use chip8::display;
use chip8::interpreter::{Interpreter, Options};
use chip8::timer::{Ticker, Timers, TIMER_FREQ};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default instruction frequency, in Hz.
const DEFAULT_FREQ: u32 = 400;

/// An error resulting from a frequency of zero.
#[derive(Debug, Fail)]
#[fail(display = "frequency must be at least 1 Hz")]
struct ZeroFrequencyError;

/// Parses a frequency argument in Hz, using the default if none was given.
fn parse_frequency(arg: Option<&str>, default: u32) -> Result<u32, Error> {
    let frequency = match arg {
        Some(n) => n.parse::<u32>()?,
        None => default,
    };
    if frequency == 0 {
        return Err(ZeroFrequencyError.into());
    }
    Ok(frequency)
}

/// Prints the display buffer to the given terminal, one character per pixel.
fn draw<W: Write>(out: &mut W, buffer: &display::Buffer) -> Result<(), io::Error> {
    // Move the cursor home rather than clearing, to avoid flicker.
    write!(out, "\x1B[H")?;
    for y in 0..display::HEIGHT {
        let row: String = (0..display::WIDTH)
            .map(|x| if buffer.pixel(x, y) { '\u{2588}' } else { ' ' })
            .collect();
        writeln!(out, "{}", row)?;
    }
    out.flush()
}

/// Decrements the timers at the given frequency until `running` is cleared.
fn drive_timers(timers: Arc<Timers>, frequency: u32, running: Arc<AtomicBool>) {
    let mut ticker = Ticker::new(frequency);
    let period = Duration::from_nanos(ticker.period_ns());

    while running.load(Ordering::Relaxed) {
        for _ in 0..ticker.lap() {
            timers.tick();
        }
        thread::sleep(period);
    }
}

fn main() {
    let matches = App::new("chip8")
        .version(VERSION)
        .author("Ian Johnson <ianprime0509@gmail.com>")
        .about("A headless Chip-8 interpreter")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .arg(
            Arg::with_name("clip")
                .short("c")
                .long("clip")
                .help("clip sprites at the display edges instead of wrapping"),
        )
        .arg(
            Arg::with_name("frequency")
                .short("f")
                .long("frequency")
                .value_name("FREQ")
                .help("set instruction frequency (in Hz)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("steps")
                .short("n")
                .long("steps")
                .value_name("STEPS")
                .help("stop after executing this many instructions")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timer-frequency")
                .long("timer-frequency")
                .value_name("FREQ")
                .help("set delay and sound timer frequency (in Hz)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("increase verbosity"),
        )
        .arg(
            Arg::with_name("FILE")
                .help("set the program file to run")
                .required(true)
                .index(1),
        )
        .get_matches();

    let verbosity = matches.occurrences_of("verbose");
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.iter_chain().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let frequency = parse_frequency(matches.value_of("frequency"), DEFAULT_FREQ)
        .context("invalid frequency argument")?;
    let timer_frequency = parse_frequency(matches.value_of("timer-frequency"), TIMER_FREQ)
        .context("invalid timer frequency argument")?;
    let max_steps = match matches.value_of("steps") {
        Some(n) => Some(n.parse::<u64>().context("invalid steps argument")?),
        None => None,
    };
    let opts = Options {
        wrap_sprites: !matches.is_present("clip"),
    };

    let filename = matches.value_of("FILE").unwrap_or_default();
    let mut input =
        File::open(filename).with_context(|_| format!("could not open file '{}'", filename))?;
    let mut interpreter = Interpreter::with_options(opts);
    interpreter
        .load_program_from(&mut input)
        .with_context(|_| format!("could not load program from file '{}'", filename))?;

    let running = Arc::new(AtomicBool::new(true));
    let timer_thread = {
        let timers = interpreter.timers();
        let running = Arc::clone(&running);
        thread::spawn(move || drive_timers(timers, timer_frequency, running))
    };

    let result = run_loop(&mut interpreter, frequency, max_steps);
    running.store(false, Ordering::Relaxed);
    if timer_thread.join().is_err() {
        warn!("timer thread panicked");
    }
    result
}

/// Steps the interpreter at the given frequency, redrawing the terminal when
/// the display changes.
fn run_loop(
    interpreter: &mut Interpreter,
    frequency: u32,
    max_steps: Option<u64>,
) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut clock = Ticker::new(frequency);
    let period = Duration::from_nanos(clock.period_ns());
    let mut executed = 0u64;
    let mut buzzing = false;

    write!(stdout.lock(), "\x1B[2J").context("could not clear terminal")?;
    loop {
        for _ in 0..clock.lap() {
            if max_steps.map_or(false, |max| executed >= max) {
                info!("stopping after {} instructions", executed);
                return Ok(());
            }

            // The necessary context for any error in 'step' should be
            // provided from the method itself; providing more context here
            // would shadow the more useful errors defined there.
            let step = interpreter.step()?;
            executed += 1;

            if (step.sound_timer > 0) != buzzing {
                buzzing = !buzzing;
                info!("buzzer {}", if buzzing { "on" } else { "off" });
            }
        }

        interpreter
            .display_mut()
            .refresh(|buf| draw(&mut stdout.lock(), buf))
            .context("could not refresh terminal display")?;
        thread::sleep(period);
    }
}
