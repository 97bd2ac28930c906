//! Error types for osccal-core
//!
//! Only transport failures and cancellation are errors. A target that does
//! not lock is a normal [`Outcome`](crate::detect::Outcome), not an error.

use alloc::string::String;

#[cfg(feature = "std")]
use thiserror::Error;

/// Errors raised while driving the calibration procedure
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Error))]
pub enum Error {
    /// Submitting a command batch to the adapter failed
    #[cfg_attr(feature = "std", error("Write failed: {0}"))]
    WriteFailed(String),

    /// Reading sampled data back from the adapter failed
    #[cfg_attr(feature = "std", error("Read failed: {0}"))]
    ReadFailed(String),

    /// The adapter returned fewer bytes than requested
    #[cfg_attr(feature = "std", error("Short read: expected {expected} bytes, got {got}"))]
    ShortRead {
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually received
        got: usize,
    },

    /// The caller aborted the ready poll
    #[cfg_attr(feature = "std", error("Cancelled while waiting for target (after {attempts} polls)"))]
    Cancelled {
        /// Ready polls issued before cancellation
        attempts: u32,
    },
}

/// Result type for osccal-core operations
pub type Result<T> = core::result::Result<T, Error>;
