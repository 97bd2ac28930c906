//! Plan command implementation
//!
//! Prints the clock settings and the command batches a calibration run
//! would send, without opening a programmer.

use osccal_core::error::{Error, Result};
use osccal_core::mpsse::opcodes;
use osccal_core::sequencer::{CalibrationParams, Calibrator};
use osccal_core::transport::Transport;

/// Stand-in transport: the plan only builds batches
struct Offline;

impl Transport for Offline {
    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::WriteFailed("no programmer in plan mode".to_string()))
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<()> {
        Err(Error::ReadFailed("no programmer in plan mode".to_string()))
    }
}

/// Show the calibration plan for `clock_rate`
pub fn run_plan(clock_rate: u32) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let params = CalibrationParams::with_clock_rate(clock_rate);
    let calibrator = Calibrator::new(Offline, params);
    let clock = calibrator.clock();
    let params = calibrator.params();

    println!("Calibration Plan");
    println!("================");
    println!();
    println!("Reference clock: {} Hz", params.clock_rate_hz);
    println!("Toggle rate:     {} Hz", clock.target_hz);
    println!(
        "Prescaler:       {}",
        if clock.div5_enabled { "div5 (6 MHz)" } else { "off (30 MHz)" }
    );
    println!("Divisor:         {} (0x{:04X})", clock.divisor, clock.divisor);
    println!(
        "Actual rate:     {:.2} Hz ({:+.3}%)",
        clock.actual_hz(),
        clock.error_percent()
    );
    println!();

    println!("Setup batch (clock, reset pulse, startup wait):");
    hexdump(calibrator.setup_batch().as_bytes());
    println!();

    println!("Ready poll request (repeated until MISO reads all high):");
    hexdump(calibrator.poll_request().as_bytes());
    println!();

    let training = calibrator.training_batch();
    let header = &training.as_bytes()[..3.min(training.len())];
    println!(
        "Training batch ({} bytes of 0x{:02X} after the header):",
        params.training_len, params.training_pattern
    );
    hexdump(header);
    println!();

    println!("Cleanup batch:");
    hexdump(Calibrator::<Offline>::cleanup_batch().as_bytes());

    Ok(())
}

/// Print bytes 16 per line, with the opcode names of the commands
fn hexdump(data: &[u8]) {
    for (i, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        println!("  {:04X}: {}", i * 16, hex.join(" "));
    }
    let names = command_names(data);
    if !names.is_empty() {
        println!("        {}", names.join(", "));
    }
}

/// Walk a batch and name its commands
fn command_names(data: &[u8]) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let opcode = data[i];
        names.push(opcodes::name(opcode));
        i += 1 + match opcode {
            opcodes::EN_DIV_5 | opcodes::DIS_DIV_5 => 0,
            opcodes::CLK_BITS => 1,
            opcodes::TCK_DIVISOR | opcodes::SET_BITS_LOW | opcodes::CLK_BYTES => 2,
            opcodes::MPSSE_DO_WRITE | opcodes::MPSSE_DO_WRITE_READ => {
                // Payload may be cut off, as for the training header
                let len = data
                    .get(i + 1..i + 3)
                    .map(|b| usize::from(u16::from_le_bytes([b[0], b[1]])) + 1)
                    .unwrap_or(0);
                2 + len
            }
            opcodes::MPSSE_DO_READ => 2,
            _ => break,
        };
    }
    names
}
