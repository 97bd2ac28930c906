//! osccal - AVR internal oscillator calibration
//!
//! Drives an AVR running calibration firmware with a precise training clock
//! generated by an FTDI MPSSE engine, then decides from the sampled MISO
//! line whether the firmware managed to trim OSCCAL to it.
//!
//! # Architecture
//!
//! - `osccal-core` holds the clock math, the MPSSE command encoding, the
//!   calibration sequence and the lock detector. It only needs a
//!   `Transport` that writes command batches and reads sampled bytes.
//! - `osccal-ftdi` provides that transport for real adapters.
//! - `osccal-dummy` simulates an adapter with a target attached.

mod cli;
mod commands;
mod programmers;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Calibrate {
            programmer,
            clock_rate,
            timeout,
        } => {
            let locked =
                commands::run_calibrate(&programmer, clock_rate, timeout.map(Duration::from_secs))?;
            if !locked {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Plan { clock_rate } => commands::run_plan(clock_rate),
        Commands::List => commands::list_devices(),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}
