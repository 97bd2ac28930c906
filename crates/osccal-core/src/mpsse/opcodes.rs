//! MPSSE opcodes used by the calibration procedure
//!
//! Values are from FTDI AN_108 ("Command Processor for MPSSE and MCU Host
//! Bus Emulation Modes"), the same numbering libftdi exports.

// ============================================================================
// Data shifting
// ============================================================================

/// Shift bytes out on TDI/DO (MSB first, +ve edge)
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Shift bytes in from TDO/DI (MSB first, +ve edge)
pub const MPSSE_DO_READ: u8 = 0x20;

/// Shift bytes out and in simultaneously
pub const MPSSE_DO_WRITE_READ: u8 = MPSSE_DO_WRITE | MPSSE_DO_READ;

// ============================================================================
// GPIO
// ============================================================================

/// Set data bits low byte (value, direction)
pub const SET_BITS_LOW: u8 = 0x80;

// ============================================================================
// Clocking
// ============================================================================

/// Set clock divisor (16-bit little-endian argument)
pub const TCK_DIVISOR: u8 = 0x86;

/// Disable divide-by-5 prescaler (60 MHz master clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Enable divide-by-5 prescaler (12 MHz master clock)
pub const EN_DIV_5: u8 = 0x8B;

/// Clock for n+1 bits with no data transfer (n = 0..=7)
pub const CLK_BITS: u8 = 0x8E;

/// Clock for (n+1) * 8 bits with no data transfer (16-bit n)
pub const CLK_BYTES: u8 = 0x8F;

/// Longest transfer a single 16-bit length argument can express
pub const MAX_TRANSFER_LEN: usize = 65536;

/// Human-readable name of an opcode, for trace output
pub fn name(opcode: u8) -> &'static str {
    match opcode {
        MPSSE_DO_WRITE => "DO_WRITE",
        MPSSE_DO_READ => "DO_READ",
        MPSSE_DO_WRITE_READ => "DO_WRITE_READ",
        SET_BITS_LOW => "SET_BITS_LOW",
        TCK_DIVISOR => "TCK_DIVISOR",
        DIS_DIV_5 => "DIS_DIV_5",
        EN_DIV_5 => "EN_DIV_5",
        CLK_BITS => "CLK_BITS",
        CLK_BYTES => "CLK_BYTES",
        _ => "UNKNOWN",
    }
}
