//! CLI argument parsing

use clap::{Parser, Subcommand};

/// Reference clock for a 32.768 kHz watch crystal
const DEFAULT_CLOCK_RATE: &str = "32768";

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a reference clock frequency in Hz
fn parse_clock_rate(s: &str) -> Result<u32, String> {
    match parse_hex_u32(s)? {
        0 => Err("Clock rate must be at least 1 Hz".to_string()),
        hz => Ok(hz),
    }
}

#[derive(Parser)]
#[command(name = "osccal")]
#[command(
    author,
    version,
    about = "AVR internal oscillator calibration over FTDI MPSSE",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reset the target, send the training clock and report whether it locked
    Calibrate {
        /// Programmer to use (ftdi[:latency=2] or dummy[:response=lock])
        #[arg(short, long, default_value = "ftdi")]
        programmer: String,

        /// Reference frequency the target trims against, in Hz
        #[arg(short, long, default_value = DEFAULT_CLOCK_RATE, value_parser = parse_clock_rate)]
        clock_rate: u32,

        /// Give up waiting for the target after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Print the clock settings and command batches without touching hardware
    Plan {
        /// Reference frequency the target trims against, in Hz
        #[arg(short, long, default_value = DEFAULT_CLOCK_RATE, value_parser = parse_clock_rate)]
        clock_rate: u32,
    },

    /// List attached FTDI adapters
    List,

    /// List supported programmers
    ListProgrammers,
}
