//! CLI command implementations
//!
//! `calibrate` is the only command that drives a target; `plan` shows what
//! it would send, and the list commands report what is available.

mod calibrate;
mod list;
mod plan;

pub use calibrate::run_calibrate;
pub use list::{list_devices, list_programmers};
pub use plan::run_plan;
