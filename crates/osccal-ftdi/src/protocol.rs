//! FTDI adapter identity and link defaults
//!
//! The calibration cable is built around an FT2232H with the target wired
//! to channel A. No other adapter is looked for.

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// Name printed when the OS does not expose a product string
pub const DEVICE_NAME: &str = "FT2232H";

/// Latency timer in ms; short so that poll results come back promptly
pub const DEFAULT_LATENCY_MS: u8 = 2;

/// Give up on a read after this long without data
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// Bit mode mask; ignored in MPSSE mode
pub const MPSSE_BITMODE_MASK: u8 = 0x00;

/// Whether a USB device is the calibration cable
pub fn is_calibration_cable(vid: u16, pid: u16) -> bool {
    vid == FTDI_VID && pid == FTDI_FT2232H_PID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_identity() {
        assert!(is_calibration_cable(0x0403, 0x6010));
        // FT4232H and FT232H share the vendor but are not the cable
        assert!(!is_calibration_cable(0x0403, 0x6011));
        assert!(!is_calibration_cable(0x0403, 0x6014));
        assert!(!is_calibration_cable(0x1a86, 0x6010));
    }
}
