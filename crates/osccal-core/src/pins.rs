//! GPIO assignment on the adapter's low byte (ADBUS0-7)
//!
//! The calibration cable wires the AVR's ISP header to channel A:
//!
//! | ADBUS | MPSSE role | Target    |
//! |-------|------------|-----------|
//! | 1     | TDI/DO     | MOSI      |
//! | 2     | TDO/DI     | MISO      |
//! | 3     | TMS/CS     | RESET     |
//! | 6     | GPIOL2     | buffer OE |
//!
//! The buffer enable is active low, so it is driven as an output at 0.

use bitflags::bitflags;

bitflags! {
    /// Lines on the low GPIO byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Pins: u8 {
        /// Host data out, carries the training clock (ADBUS1)
        const MOSI = 1 << 1;
        /// Target feedback, sampled by the host (ADBUS2)
        const MISO = 1 << 2;
        /// Target reset, active low (ADBUS3)
        const RST = 1 << 3;
        /// Level shifter output enable, active low (ADBUS6)
        const BUFF = 1 << 6;
    }
}

/// Lines the host drives during calibration
pub const DIRECTION: Pins = Pins::MOSI.union(Pins::BUFF).union(Pins::RST);

/// Output levels that hold the target in reset
pub const RESET_ASSERTED: Pins = Pins::MOSI;

/// Output levels that let the target run (also the idle state)
pub const RESET_RELEASED: Pins = Pins::MOSI.union(Pins::RST);

/// A value/direction pair for `SET_BITS_LOW`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioState {
    /// Output levels
    pub value: Pins,
    /// Lines configured as outputs
    pub direction: Pins,
}

impl GpioState {
    /// Target held in reset, MOSI idling high
    pub const fn reset() -> Self {
        GpioState {
            value: RESET_ASSERTED,
            direction: DIRECTION,
        }
    }

    /// Target running, MOSI idling high
    pub const fn run() -> Self {
        GpioState {
            value: RESET_RELEASED,
            direction: DIRECTION,
        }
    }

    /// Whether this state drives the reset line low
    pub fn holds_reset(&self) -> bool {
        self.direction.contains(Pins::RST) && !self.value.contains(Pins::RST)
    }

    /// Decode the two argument bytes of `SET_BITS_LOW`
    pub fn from_bits(value: u8, direction: u8) -> Self {
        GpioState {
            value: Pins::from_bits_retain(value),
            direction: Pins::from_bits_retain(direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_bytes() {
        assert_eq!(DIRECTION.bits(), 0x4A);
        assert_eq!(RESET_ASSERTED.bits(), 0x02);
        assert_eq!(RESET_RELEASED.bits(), 0x0A);
        assert!(!DIRECTION.contains(Pins::MISO));
    }

    #[test]
    fn test_reset_state() {
        assert!(GpioState::reset().holds_reset());
        assert!(!GpioState::run().holds_reset());
        // Reset as input floats high through the target's pull-up
        assert!(!GpioState::from_bits(0x00, 0x00).holds_reset());
        assert_eq!(GpioState::from_bits(0x0A, 0x4A), GpioState::run());
    }
}
