//! osccal-dummy - Simulated calibration target
//!
//! This crate provides a [`Transport`] that decodes the MPSSE command stream
//! the way the adapter would and answers the way an AVR running the
//! calibration firmware would. It is useful for testing the procedure and
//! the CLI without an adapter or a target on the bench.
//!
//! The simulated firmware keeps MISO low while held in reset or starting
//! up, then idles it high. During training it answers according to the
//! configured [`Response`].

mod error;

use std::collections::VecDeque;

use osccal_core::error::{Error, Result};
use osccal_core::mpsse::opcodes::*;
use osccal_core::mpsse::ShiftMode;
use osccal_core::pins::GpioState;
use osccal_core::transport::Transport;

pub use error::{DummyError, Result as DummyResult};

/// Idle-high bytes the firmware produces before it has finished trimming
pub const LEAD_BYTES: usize = 64;

/// How the simulated firmware answers the training clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Response {
    /// Locks and toggles MISO every clock period (every two samples)
    #[default]
    Lock,
    /// Toggles MISO far too slowly (every eight samples)
    Drift,
    /// Never answers; MISO stays high
    Silent,
    /// Gives up and clears MISO for good
    Fail,
}

impl Response {
    /// Parse a response name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lock" | "success" => Some(Response::Lock),
            "drift" => Some(Response::Drift),
            "silent" | "none" => Some(Response::Silent),
            "fail" => Some(Response::Fail),
            _ => None,
        }
    }

    /// Name of this response
    pub fn name(&self) -> &'static str {
        match self {
            Response::Lock => "lock",
            Response::Drift => "drift",
            Response::Silent => "silent",
            Response::Fail => "fail",
        }
    }

    /// MISO capture for a training transfer of `len` bytes
    pub fn capture(&self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                if i < LEAD_BYTES {
                    return 0xFF;
                }
                match self {
                    Response::Lock => 0xCC,
                    Response::Drift if (i - LEAD_BYTES) % 2 == 0 => 0x00,
                    Response::Drift => 0xFF,
                    Response::Silent => 0xFF,
                    Response::Fail => 0x00,
                }
            })
            .collect()
    }
}

/// Configuration for the simulated target
#[derive(Debug, Clone, Default)]
pub struct DummyConfig {
    /// Training behaviour
    pub response: Response,
    /// Ready polls answered low after reset is released
    pub ready_after: u32,
    /// Fail the write with this index (0-based), once
    pub fail_write_at: Option<usize>,
}

/// Simulated adapter with an AVR attached
#[derive(Debug)]
pub struct SimulatedTarget {
    config: DummyConfig,
    gpio: GpioState,
    gpio_history: Vec<GpioState>,
    div5: Option<bool>,
    divisor: Option<u16>,
    delayed_clocks: u64,
    polls_since_release: u32,
    trainings: u32,
    writes: usize,
    pending: VecDeque<u8>,
}

impl SimulatedTarget {
    /// Create a target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        log::info!(
            "Simulated target: response={} ready_after={}",
            config.response.name(),
            config.ready_after
        );
        SimulatedTarget {
            config,
            // All lines are inputs after the bit mode is set
            gpio: GpioState::from_bits(0x00, 0x00),
            gpio_history: Vec::new(),
            div5: None,
            divisor: None,
            delayed_clocks: 0,
            polls_since_release: 0,
            trainings: 0,
            writes: 0,
            pending: VecDeque::new(),
        }
    }

    /// Create a target that locks on the first training run
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Current low-byte GPIO state
    pub fn gpio(&self) -> GpioState {
        self.gpio
    }

    /// Every `SET_BITS_LOW` received, in order
    pub fn gpio_history(&self) -> &[GpioState] {
        &self.gpio_history
    }

    /// Prescaler state, if it was ever set
    pub fn div5(&self) -> Option<bool> {
        self.div5
    }

    /// Divisor register, if it was ever set
    pub fn divisor(&self) -> Option<u16> {
        self.divisor
    }

    /// Bit clocks spent in `CLK_BYTES`/`CLK_BITS` delays
    pub fn delayed_clocks(&self) -> u64 {
        self.delayed_clocks
    }

    /// Training transfers received
    pub fn trainings(&self) -> u32 {
        self.trainings
    }

    /// Writes accepted so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Bytes waiting to be read
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn is_ready(&self) -> bool {
        !self.gpio.holds_reset() && self.polls_since_release >= self.config.ready_after
    }

    fn set_gpio(&mut self, state: GpioState) {
        if state.holds_reset() {
            self.polls_since_release = 0;
        }
        log::trace!(
            "GPIO value=0x{:02X} dir=0x{:02X}",
            state.value.bits(),
            state.direction.bits()
        );
        self.gpio = state;
        self.gpio_history.push(state);
    }

    fn shift(&mut self, mode: ShiftMode, len: usize) {
        let response = match mode {
            ShiftMode::Write => return,
            ShiftMode::Read => {
                let level = if self.is_ready() { 0xFF } else { 0x00 };
                if !self.gpio.holds_reset() {
                    self.polls_since_release = self.polls_since_release.saturating_add(1);
                }
                vec![level; len]
            }
            ShiftMode::WriteRead => {
                self.trainings += 1;
                if self.is_ready() {
                    self.config.response.capture(len)
                } else {
                    vec![0x00; len]
                }
            }
        };
        self.pending.extend(response);
    }

    /// Decode and apply one batch
    fn apply(&mut self, data: &[u8]) -> Result<()> {
        let mut i = 0;
        while i < data.len() {
            let opcode = data[i];
            let args = &data[i + 1..];
            log::trace!("MPSSE {} (0x{:02X})", name(opcode), opcode);

            let consumed = match opcode {
                EN_DIV_5 | DIS_DIV_5 => {
                    self.div5 = Some(opcode == EN_DIV_5);
                    0
                }
                TCK_DIVISOR => {
                    self.divisor = Some(arg16(opcode, args)?);
                    2
                }
                SET_BITS_LOW => {
                    let [value, direction] = take::<2>(opcode, args)?;
                    self.set_gpio(GpioState::from_bits(value, direction));
                    2
                }
                CLK_BYTES => {
                    let units = u64::from(arg16(opcode, args)?) + 1;
                    self.delayed_clocks += units * 8;
                    2
                }
                CLK_BITS => {
                    let [bits] = take::<1>(opcode, args)?;
                    if bits > 7 {
                        return Err(Error::WriteFailed(format!(
                            "CLK_BITS length {} out of range",
                            bits
                        )));
                    }
                    self.delayed_clocks += u64::from(bits) + 1;
                    1
                }
                _ => match ShiftMode::from_opcode(opcode) {
                    Some(mode) => {
                        let len = usize::from(arg16(opcode, args)?) + 1;
                        let payload = if mode.writes() { len } else { 0 };
                        if args.len() < 2 + payload {
                            return Err(truncated(opcode));
                        }
                        self.shift(mode, len);
                        2 + payload
                    }
                    None => {
                        return Err(Error::WriteFailed(format!(
                            "unsupported MPSSE opcode 0x{:02X}",
                            opcode
                        )))
                    }
                },
            };

            i += 1 + consumed;
        }
        Ok(())
    }
}

fn truncated(opcode: u8) -> Error {
    Error::WriteFailed(format!("truncated {} command", name(opcode)))
}

fn take<const N: usize>(opcode: u8, args: &[u8]) -> Result<[u8; N]> {
    args.get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(opcode))
}

fn arg16(opcode: u8, args: &[u8]) -> Result<u16> {
    take::<2>(opcode, args).map(u16::from_le_bytes)
}

impl Transport for SimulatedTarget {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.config.fail_write_at == Some(self.writes) {
            self.config.fail_write_at = None;
            return Err(Error::WriteFailed("simulated USB disconnect".to_string()));
        }
        self.apply(data)?;
        self.writes += 1;
        log::trace!("Accepted {} bytes, {} pending", data.len(), self.pending.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.pending.len() < buf.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                got: self.pending.len(),
            });
        }
        for b in buf.iter_mut() {
            // Length checked above
            *b = self.pending.pop_front().unwrap_or(0);
        }
        Ok(())
    }
}

/// Parse programmer options
///
/// Format: "response=<lock|drift|silent|fail>,ready-after=<N>,fail-write=<N>"
pub fn parse_options(options: &[(&str, &str)]) -> DummyResult<DummyConfig> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "response" => {
                config.response = Response::parse(value)
                    .ok_or_else(|| DummyError::InvalidResponse(value.to_string()))?;
            }
            "ready-after" | "ready_after" => {
                config.ready_after = value.parse().map_err(|_| {
                    DummyError::InvalidParameter(format!("Invalid ready-after '{}'", value))
                })?;
            }
            "fail-write" | "fail_write" => {
                config.fail_write_at = Some(value.parse().map_err(|_| {
                    DummyError::InvalidParameter(format!("Invalid fail-write '{}'", value))
                })?);
            }
            _ => {
                log::warn!("Unknown dummy option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}
