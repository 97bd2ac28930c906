//! FTDI MPSSE instruction set
//!
//! Only the subset the calibration procedure needs: GPIO on the low byte,
//! clock configuration, clock-only delays and byte-wise data shifting.

mod command;
pub mod opcodes;

pub use command::{cmd, cmd16, delay_clocks, Batch, ShiftMode};
