//! osccal-core - Host-side logic for training an AVR's internal RC oscillator
//!
//! The target runs a small calibration firmware that measures an externally
//! supplied clock on its MOSI pin, trims OSCCAL until it matches, and then
//! toggles MISO to signal that it locked. This crate contains everything the
//! host needs to drive that exchange through an FTDI MPSSE engine, without
//! knowing how the bytes reach the adapter:
//!
//! - [`clock`] - divisor and divide-by-5 selection for a target toggle rate
//! - [`mpsse`] - opcodes and a batch builder for the MPSSE instruction set
//! - [`pins`] - the low-byte GPIO assignment used by the calibration cable
//! - [`detect`] - the edge-counting automaton that recognises the lock signal
//! - [`sequencer`] - the reset / ready-poll / training / cleanup procedure
//! - [`transport`] - the narrow write/read seam a backend implements
//!
//! The crate is `no_std` (with `alloc`) unless the default `std` feature is
//! enabled.
//!
//! # Example
//!
//! ```ignore
//! use osccal_core::sequencer::{CalibrationParams, Calibrator};
//!
//! fn run<T: osccal_core::transport::Transport>(transport: &mut T) {
//!     let mut calibrator = Calibrator::new(transport, CalibrationParams::default());
//!     match calibrator.run(&mut ()) {
//!         Ok(report) if report.outcome.is_success() => println!("Success!"),
//!         Ok(_) => println!("Failed"),
//!         Err(e) => println!("Transport error: {:?}", e),
//!     }
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

pub mod clock;
pub mod detect;
pub mod error;
pub mod mpsse;
pub mod pins;
pub mod sequencer;
pub mod transport;

pub use error::{Error, Result};
