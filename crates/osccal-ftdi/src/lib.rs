//! osccal-ftdi - FTDI MPSSE transport for osccal
//!
//! This crate opens the calibration cable, an FTDI FT2232H (0403:6010),
//! through libftdi1, puts channel A into MPSSE mode and exposes it as an
//! [`osccal_core::transport::Transport`].
//!
//! # Example
//!
//! ```no_run
//! use osccal_core::sequencer::{CalibrationParams, Calibrator};
//! use osccal_ftdi::FtdiTransport;
//!
//! let transport = FtdiTransport::open_default()?;
//! let mut calibrator = Calibrator::new(transport, CalibrationParams::default());
//! let report = calibrator.run(&mut ())?;
//! println!("{}", report.outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Programmer Options
//!
//! When using the CLI, the following options are available:
//!
//! - `latency=<ms>` - USB latency timer (default: 2)
//! - `timeout=<ms>` - Read timeout without data (default: 5000)

mod device;
mod error;
mod protocol;

pub use device::{list_devices, parse_options, FtdiConfig, FtdiDeviceInfo, FtdiTransport};
pub use error::{FtdiError, Result};
pub use protocol::{FTDI_FT2232H_PID, FTDI_VID};
