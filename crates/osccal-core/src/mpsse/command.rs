//! MPSSE command encoding
//!
//! Commands are an opcode followed by argument bytes. Length and divisor
//! arguments are 16-bit little-endian, and lengths are encoded as `len - 1`.
//! Commands for one stage are concatenated into a [`Batch`] and sent in a
//! single write.

use alloc::vec::Vec;
use core::time::Duration;

use super::opcodes::*;

/// Encode a command with plain byte arguments: `[opcode, args...]`
pub fn cmd(opcode: u8, args: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + args.len());
    buf.push(opcode);
    buf.extend_from_slice(args);
    buf
}

/// Encode a command with a 16-bit argument: `[opcode, lo, hi, trailing...]`
pub fn cmd16(opcode: u8, arg: u16, trailing: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3 + trailing.len());
    buf.push(opcode);
    buf.extend_from_slice(&arg.to_le_bytes());
    buf.extend_from_slice(trailing);
    buf
}

/// Number of whole bit clocks that fit in `duration` at `hz`
pub fn delay_clocks(hz: u32, duration: Duration) -> u64 {
    let clocks = duration.as_nanos() * u128::from(hz) / 1_000_000_000;
    u64::try_from(clocks).unwrap_or(u64::MAX)
}

/// Direction of a data shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftMode {
    /// Clock data out on DO, ignore DI
    Write,
    /// Clock data in from DI, DO idles
    Read,
    /// Clock data out on DO while sampling DI
    WriteRead,
}

impl ShiftMode {
    /// Opcode for this shift direction
    pub fn opcode(self) -> u8 {
        match self {
            ShiftMode::Write => MPSSE_DO_WRITE,
            ShiftMode::Read => MPSSE_DO_READ,
            ShiftMode::WriteRead => MPSSE_DO_WRITE_READ,
        }
    }

    /// Decode a shift opcode
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            MPSSE_DO_WRITE => Some(ShiftMode::Write),
            MPSSE_DO_READ => Some(ShiftMode::Read),
            MPSSE_DO_WRITE_READ => Some(ShiftMode::WriteRead),
            _ => None,
        }
    }

    /// Whether payload bytes follow the length argument
    pub fn writes(self) -> bool {
        matches!(self, ShiftMode::Write | ShiftMode::WriteRead)
    }

    /// Whether the adapter returns sampled bytes
    pub fn reads(self) -> bool {
        matches!(self, ShiftMode::Read | ShiftMode::WriteRead)
    }
}

/// A batch of MPSSE commands built up for a single write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    buf: Vec<u8>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Batch {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a command encoded by [`cmd`]
    pub fn push(&mut self, opcode: u8, args: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&cmd(opcode, args));
        self
    }

    /// Append a command encoded by [`cmd16`]
    pub fn push16(&mut self, opcode: u8, arg: u16, trailing: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&cmd16(opcode, arg, trailing));
        self
    }

    /// Enable or disable the divide-by-5 prescaler
    pub fn div5(&mut self, enabled: bool) -> &mut Self {
        self.push(if enabled { EN_DIV_5 } else { DIS_DIV_5 }, &[])
    }

    /// Set the TCK divisor register
    pub fn divisor(&mut self, divisor: u16) -> &mut Self {
        self.push16(TCK_DIVISOR, divisor, &[])
    }

    /// Drive the low GPIO byte: `value` for outputs, `direction` 1 = output
    pub fn set_bits_low(&mut self, value: u8, direction: u8) -> &mut Self {
        self.push(SET_BITS_LOW, &[value, direction])
    }

    /// Idle for `duration` at a shift clock of `hz`
    ///
    /// `CLK_BYTES` only counts in multiples of 8 clocks, so the remainder
    /// goes out as a `CLK_BITS`. Counts of 8 or fewer use `CLK_BITS` alone.
    /// A zero count emits nothing.
    pub fn delay(&mut self, hz: u32, duration: Duration) -> &mut Self {
        let clocks = delay_clocks(hz, duration);

        let remainder = if clocks > 8 {
            let mut units = clocks / 8;
            while units > 0 {
                let chunk = units.min(MAX_TRANSFER_LEN as u64);
                self.push16(CLK_BYTES, (chunk - 1) as u16, &[]);
                units -= chunk;
            }
            clocks % 8
        } else {
            clocks
        };

        if remainder != 0 {
            self.push(CLK_BITS, &[(remainder - 1) as u8]);
        }
        self
    }

    /// Shift `payload` out on DO, optionally sampling DI at the same time
    ///
    /// Payloads longer than one command can carry are split; an empty
    /// payload emits nothing.
    pub fn shift_out(&mut self, mode: ShiftMode, payload: &[u8]) -> &mut Self {
        debug_assert!(mode.writes());
        for chunk in payload.chunks(MAX_TRANSFER_LEN) {
            self.push16(mode.opcode(), (chunk.len() - 1) as u16, chunk);
        }
        self
    }

    /// Sample `len` bytes from DI without driving data
    pub fn shift_in(&mut self, len: usize) -> &mut Self {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(MAX_TRANSFER_LEN);
            self.push16(MPSSE_DO_READ, (chunk - 1) as u16, &[]);
            remaining -= chunk;
        }
        self
    }

    /// Number of encoded bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no commands have been added
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Take the encoded bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl AsRef<[u8]> for Batch {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl From<Batch> for Vec<u8> {
    fn from(batch: Batch) -> Self {
        batch.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// Total bit clocks requested by a batch made only of delay commands
    fn delayed_clocks(bytes: &[u8]) -> u64 {
        let mut total = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                CLK_BYTES => {
                    let n = u16::from_le_bytes([bytes[i + 1], bytes[i + 2]]);
                    total += (u64::from(n) + 1) * 8;
                    i += 3;
                }
                CLK_BITS => {
                    total += u64::from(bytes[i + 1]) + 1;
                    i += 2;
                }
                other => panic!("unexpected opcode 0x{:02X}", other),
            }
        }
        total
    }

    #[test]
    fn test_cmd_encoding() {
        assert_eq!(cmd(DIS_DIV_5, &[]), vec![0x8A]);
        assert_eq!(cmd(SET_BITS_LOW, &[0x02, 0x4A]), vec![0x80, 0x02, 0x4A]);
        assert_eq!(cmd16(TCK_DIVISOR, 457, &[]), vec![0x86, 0xC9, 0x01]);
        assert_eq!(
            cmd16(MPSSE_DO_WRITE_READ, 1, &[0x55, 0x55]),
            vec![0x30, 0x01, 0x00, 0x55, 0x55]
        );
    }

    #[test]
    fn test_cmd16_little_endian() {
        for arg in [0u16, 1, 0x00FF, 0x0100, 0x1234, 3999, 0xFFFF] {
            let bytes = cmd16(CLK_BYTES, arg, &[]);
            assert_eq!(bytes.len(), 3);
            assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), arg);
        }
    }

    #[test]
    fn test_batch_matches_encoders() {
        let mut batch = Batch::new();
        batch.push(SET_BITS_LOW, &[0x02, 0x4A]).push16(CLK_BYTES, 0x1234, &[]);
        let mut expected = cmd(SET_BITS_LOW, &[0x02, 0x4A]);
        expected.extend_from_slice(&cmd16(CLK_BYTES, 0x1234, &[]));
        assert_eq!(batch.as_bytes(), expected.as_slice());
        assert_eq!(u16::from_le_bytes([batch.as_bytes()[4], batch.as_bytes()[5]]), 0x1234);
    }

    #[test]
    fn test_delay_reset_pulse() {
        // 1 ms at 65536 Hz = 65 clocks = 8 bytes + 1 bit
        let mut batch = Batch::new();
        batch.delay(65536, Duration::from_millis(1));
        assert_eq!(batch.as_bytes(), &[CLK_BYTES, 7, 0, CLK_BITS, 0]);
    }

    #[test]
    fn test_delay_startup_wait() {
        // 100 ms at 65536 Hz = 6553 clocks = 819 bytes + 1 bit
        let mut batch = Batch::new();
        batch.delay(65536, Duration::from_millis(100));
        assert_eq!(batch.as_bytes(), &[CLK_BYTES, 0x32, 0x03, CLK_BITS, 0]);
    }

    #[test]
    fn test_delay_short_counts() {
        let mut batch = Batch::new();
        batch.delay(1000, Duration::ZERO);
        assert!(batch.is_empty());

        // 5 clocks
        let mut batch = Batch::new();
        batch.delay(1000, Duration::from_millis(5));
        assert_eq!(batch.as_bytes(), &[CLK_BITS, 4]);

        // Exactly 8 clocks stays on the bit-granular path
        let mut batch = Batch::new();
        batch.delay(1000, Duration::from_millis(8));
        assert_eq!(batch.as_bytes(), &[CLK_BITS, 7]);

        // 16 clocks is a whole number of bytes
        let mut batch = Batch::new();
        batch.delay(1000, Duration::from_millis(16));
        assert_eq!(batch.as_bytes(), &[CLK_BYTES, 1, 0]);
    }

    #[test]
    fn test_delay_reconstructs_clock_count() {
        let rates = [1u32, 999, 1000, 32768, 65536, 1_000_000, 30_000_000];
        let durations = [
            Duration::ZERO,
            Duration::from_nanos(1),
            Duration::from_micros(123),
            Duration::from_millis(1),
            Duration::from_millis(8),
            Duration::from_millis(100),
            Duration::from_secs(3),
        ];
        for hz in rates {
            for duration in durations {
                let mut batch = Batch::new();
                batch.delay(hz, duration);
                assert_eq!(
                    delayed_clocks(batch.as_bytes()),
                    delay_clocks(hz, duration),
                    "hz={} duration={:?}",
                    hz,
                    duration
                );
            }
        }
    }

    #[test]
    fn test_long_delay_is_split() {
        // 30 MHz for 1 s = 3_750_000 byte units, more than one CLK_BYTES holds
        let mut batch = Batch::new();
        batch.delay(30_000_000, Duration::from_secs(1));
        assert_eq!(batch.as_bytes()[0], CLK_BYTES);
        assert_eq!(batch.as_bytes()[1..3], [0xFF, 0xFF]);
        assert_eq!(delayed_clocks(batch.as_bytes()), 30_000_000);
    }

    #[test]
    fn test_shift_commands() {
        let mut batch = Batch::new();
        batch.shift_in(4000);
        assert_eq!(batch.as_bytes(), &[MPSSE_DO_READ, 0x9F, 0x0F]);

        let payload = [0x55u8; 4];
        let mut batch = Batch::new();
        batch.shift_out(ShiftMode::WriteRead, &payload);
        assert_eq!(batch.as_bytes(), &[0x30, 3, 0, 0x55, 0x55, 0x55, 0x55]);

        let mut batch = Batch::new();
        batch.shift_in(0).shift_out(ShiftMode::Write, &[]);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_shift_mode_opcodes() {
        for mode in [ShiftMode::Write, ShiftMode::Read, ShiftMode::WriteRead] {
            assert_eq!(ShiftMode::from_opcode(mode.opcode()), Some(mode));
        }
        assert!(ShiftMode::WriteRead.writes() && ShiftMode::WriteRead.reads());
        assert!(!ShiftMode::Read.writes());
        assert_eq!(ShiftMode::from_opcode(SET_BITS_LOW), None);
    }

    #[test]
    fn test_clock_setup_batch() {
        let mut batch = Batch::new();
        batch.div5(false).divisor(457);
        assert_eq!(batch.as_bytes(), &[DIS_DIV_5, TCK_DIVISOR, 0xC9, 0x01]);

        let mut batch = Batch::new();
        batch.div5(true);
        assert_eq!(batch.into_vec(), vec![EN_DIV_5]);
    }
}
