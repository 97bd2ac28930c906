//! Calibration procedure
//!
//! The procedure runs in fixed stages:
//!
//! 1. **ClockSetup** - prescaler and divisor for the toggle rate
//! 2. **ResetAssert** - hold RESET low for the reset pulse
//! 3. **ResetRelease** - release RESET and wait for the firmware to start
//! 4. **ReadyPoll** - sample MISO until a whole capture reads idle-high
//! 5. **TrainingTransmit** - shift the training pattern out on MOSI while
//!    sampling MISO
//! 6. **Cleanup** - put the GPIO lines back into their run state
//! 7. **Verdict** - scan the training capture for the lock signal
//!
//! Stages 1-3 go out as one batch. The ready poll has no iteration limit of
//! its own; a [`PollObserver`] can stop it.
//!
//! Any transport error ends the procedure. Cleanup is still attempted on the
//! way out, but only on a best-effort basis: if the adapter is gone the pins
//! stay where they were. [`Calibrator::stage`] keeps naming the stage that
//! failed.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::ControlFlow;
use core::time::Duration;

use crate::clock::{toggle_rate, ClockConfig, MPSSE_BASE_CLOCK_HZ};
use crate::detect::{detect, Outcome};
use crate::error::{Error, Result};
use crate::mpsse::{Batch, ShiftMode};
use crate::pins::GpioState;
use crate::transport::Transport;

/// Frequency of a 32.768 kHz watch crystal, the usual calibration reference
pub const DEFAULT_CLOCK_RATE_HZ: u32 = 32768;

/// Samples per ready poll
pub const DEFAULT_POLL_LEN: usize = 4000;

/// Bytes of training clock shifted out
///
/// 4000 bytes give 16000 clock periods, more than the firmware needs to
/// finish its search.
pub const DEFAULT_TRAINING_LEN: usize = 4000;

/// Training byte: one clock period per bit pair
pub const TRAINING_PATTERN: u8 = 0x55;

/// Accumulated poll time between progress callbacks
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Parameters of a calibration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationParams {
    /// Reference frequency the target trims against, in Hz
    pub clock_rate_hz: u32,
    /// MPSSE clock numerator (see [`ClockConfig::configure`])
    pub base_clock_hz: u32,
    /// How long RESET is held low
    pub reset_pulse: Duration,
    /// Wait after releasing RESET before polling
    pub startup_wait: Duration,
    /// Bytes sampled per ready poll
    pub poll_len: usize,
    /// Bytes of training clock
    pub training_len: usize,
    /// Byte repeated to form the training clock
    pub training_pattern: u8,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        CalibrationParams {
            clock_rate_hz: DEFAULT_CLOCK_RATE_HZ,
            base_clock_hz: MPSSE_BASE_CLOCK_HZ,
            reset_pulse: Duration::from_millis(1),
            startup_wait: Duration::from_millis(100),
            poll_len: DEFAULT_POLL_LEN,
            training_len: DEFAULT_TRAINING_LEN,
            training_pattern: TRAINING_PATTERN,
        }
    }
}

impl CalibrationParams {
    /// Params for a different reference frequency
    pub fn with_clock_rate(clock_rate_hz: u32) -> Self {
        CalibrationParams {
            clock_rate_hz,
            ..Self::default()
        }
    }

    /// Shift clock rate: two bits per reference period
    pub fn toggle_rate_hz(&self) -> u32 {
        toggle_rate(self.clock_rate_hz)
    }

    /// Clock configuration for these params
    pub fn clock(&self) -> ClockConfig {
        ClockConfig::configure(self.toggle_rate_hz(), self.base_clock_hz)
    }
}

/// Stage the procedure is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the prescaler and divisor commands
    ClockSetup,
    /// Building the reset pulse
    ResetAssert,
    /// Releasing reset and sending the setup batch
    ResetRelease,
    /// Waiting for MISO to go idle-high
    ReadyPoll,
    /// Shifting out the training clock
    TrainingTransmit,
    /// Restoring GPIO state
    Cleanup,
    /// Procedure complete
    Verdict,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ClockSetup => "clock setup",
            Stage::ResetAssert => "reset assert",
            Stage::ResetRelease => "reset release",
            Stage::ReadyPoll => "ready poll",
            Stage::TrainingTransmit => "training transmit",
            Stage::Cleanup => "cleanup",
            Stage::Verdict => "verdict",
        };
        f.write_str(name)
    }
}

/// Ready poll progress handed to a [`PollObserver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
    /// Polls that came back not ready
    pub attempts: u32,
    /// Samples taken so far converted to time at the toggle rate
    ///
    /// Each sample byte holds 8 bit clocks, so this undercounts the time the
    /// adapter actually spent polling.
    pub sampled: Duration,
}

/// Hooks into a run, mainly the otherwise unbounded ready poll
pub trait PollObserver {
    /// Called on entering each stage
    fn stage(&mut self, _stage: Stage) {}

    /// Called at most once per [`PROGRESS_INTERVAL`] of accumulated sample time
    fn progress(&mut self, _status: &PollStatus) {}

    /// Called after every poll that was not ready; `Break` cancels the run
    fn check(&mut self, _status: &PollStatus) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Poll forever, report nothing
impl PollObserver for () {}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationReport {
    /// Detector verdict on the training capture
    pub outcome: Outcome,
    /// Clock settings used
    pub clock: ClockConfig,
    /// Ready polls that came back not ready
    pub poll_attempts: u32,
}

/// Drives one calibration run over a transport
pub struct Calibrator<T: Transport> {
    transport: T,
    params: CalibrationParams,
    clock: ClockConfig,
    stage: Stage,
}

impl<T: Transport> Calibrator<T> {
    /// Prepare a run; nothing is sent until [`run`](Self::run)
    pub fn new(transport: T, params: CalibrationParams) -> Self {
        let clock = params.clock();
        Calibrator {
            transport,
            params,
            clock,
            stage: Stage::ClockSetup,
        }
    }

    /// Current stage, or the stage that failed if [`run`](Self::run) errored
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Clock configuration in use
    pub fn clock(&self) -> &ClockConfig {
        &self.clock
    }

    /// Parameters in use
    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Run the whole procedure
    ///
    /// A target that does not lock is reported in the [`CalibrationReport`];
    /// only transport failures and cancellation are errors.
    pub fn run<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> Result<CalibrationReport> {
        log::info!(
            "Training clock {} Hz (toggle rate {} Hz, divisor {}{}, actual {:.1} Hz)",
            self.params.clock_rate_hz,
            self.clock.target_hz,
            self.clock.divisor,
            if self.clock.div5_enabled { ", div5" } else { "" },
            self.clock.actual_hz()
        );

        let (capture, poll_attempts) = match self.exchange(observer) {
            Ok(result) => result,
            Err(e) => {
                log::debug!("Aborted during {}: {}", self.stage, DisplayError(&e));
                if let Err(cleanup_err) = self.restore_gpio() {
                    log::warn!(
                        "Failed to restore GPIO state: {}",
                        DisplayError(&cleanup_err)
                    );
                }
                return Err(e);
            }
        };

        self.enter(Stage::Cleanup, observer);
        self.restore_gpio()?;

        self.enter(Stage::Verdict, observer);
        let outcome = detect(&capture);
        log::info!("Calibration result: {}", outcome);

        Ok(CalibrationReport {
            outcome,
            clock: self.clock,
            poll_attempts,
        })
    }

    /// Everything up to and including the training capture
    fn exchange<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> Result<(Vec<u8>, u32)> {
        self.reset_target(observer)?;
        let attempts = self.wait_ready(observer)?;
        let capture = self.train(observer)?;
        Ok((capture, attempts))
    }

    /// Stages 1-3, sent as one batch
    fn reset_target<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> Result<()> {
        let mut batch = Batch::with_capacity(32);
        self.enter(Stage::ClockSetup, observer);
        self.push_clock_setup(&mut batch);
        self.enter(Stage::ResetAssert, observer);
        self.push_reset_assert(&mut batch);
        self.enter(Stage::ResetRelease, observer);
        self.push_reset_release(&mut batch);
        self.transport.write(batch.as_bytes())?;
        log::trace!("Sent setup batch ({} bytes)", batch.len());
        Ok(())
    }

    /// Stage 4: poll until a whole capture is idle-high
    fn wait_ready<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> Result<u32> {
        self.enter(Stage::ReadyPoll, observer);
        let request = self.poll_request();
        let hz = u64::from(self.clock.target_hz.max(1));
        let poll_len = self.params.poll_len as u64;

        let mut attempts: u32 = 0;
        let mut total_samples: u64 = 0;
        let mut since_progress: u64 = 0;

        loop {
            self.transport.write(request.as_bytes())?;
            let sample = self.transport.read_vec(self.params.poll_len)?;
            if is_ready(&sample) {
                log::debug!("Target ready after {} polls", attempts);
                return Ok(attempts);
            }

            attempts = attempts.saturating_add(1);
            total_samples = total_samples.saturating_add(poll_len);
            let status = PollStatus {
                attempts,
                sampled: Duration::from_nanos(total_samples.saturating_mul(1_000_000_000) / hz),
            };
            log::trace!("Poll {} not ready", attempts);

            // since_progress / hz > PROGRESS_INTERVAL
            if since_progress.saturating_mul(1000) > hz * PROGRESS_INTERVAL.as_millis() as u64 {
                observer.progress(&status);
                since_progress = 0;
            } else {
                since_progress += poll_len;
            }

            if observer.check(&status).is_break() {
                log::info!("Ready poll cancelled after {} attempts", attempts);
                return Err(Error::Cancelled { attempts });
            }
        }
    }

    /// Stage 5: shift out the training clock and capture MISO
    fn train<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> Result<Vec<u8>> {
        self.enter(Stage::TrainingTransmit, observer);
        let batch = self.training_batch();
        self.transport.write(batch.as_bytes())?;
        log::trace!("Sent training batch ({} bytes)", batch.len());
        self.transport.read_vec(self.params.training_len)
    }

    /// Stage 6: release the target
    fn restore_gpio(&mut self) -> Result<()> {
        self.transport.write(Self::cleanup_batch().as_bytes())
    }

    fn enter<O: PollObserver + ?Sized>(&mut self, stage: Stage, observer: &mut O) {
        log::debug!("Stage: {}", stage);
        self.stage = stage;
        observer.stage(stage);
    }

    fn push_clock_setup(&self, batch: &mut Batch) {
        batch.div5(self.clock.div5_enabled).divisor(self.clock.divisor);
    }

    fn push_reset_assert(&self, batch: &mut Batch) {
        let reset = GpioState::reset();
        batch
            .set_bits_low(reset.value.bits(), reset.direction.bits())
            .delay(self.clock.target_hz, self.params.reset_pulse);
    }

    fn push_reset_release(&self, batch: &mut Batch) {
        let run = GpioState::run();
        batch
            .set_bits_low(run.value.bits(), run.direction.bits())
            .delay(self.clock.target_hz, self.params.startup_wait);
    }

    /// Clock setup, reset pulse and startup wait
    pub fn setup_batch(&self) -> Batch {
        let mut batch = Batch::with_capacity(32);
        self.push_clock_setup(&mut batch);
        self.push_reset_assert(&mut batch);
        self.push_reset_release(&mut batch);
        batch
    }

    /// One ready poll request
    pub fn poll_request(&self) -> Batch {
        let mut batch = Batch::new();
        batch.shift_in(self.params.poll_len);
        batch
    }

    /// Training clock shifted out while sampling
    pub fn training_batch(&self) -> Batch {
        let payload = vec![self.params.training_pattern; self.params.training_len];
        let mut batch = Batch::with_capacity(payload.len() + 3);
        batch.shift_out(ShiftMode::WriteRead, &payload);
        batch
    }

    /// GPIO back to the run state: RESET released, MOSI idle-high
    pub fn cleanup_batch() -> Batch {
        let run = GpioState::run();
        let mut batch = Batch::new();
        batch.set_bits_low(run.value.bits(), run.direction.bits());
        batch
    }
}

/// A capture is ready when MISO never left the idle-high level
pub fn is_ready(sample: &[u8]) -> bool {
    sample.iter().all(|&b| b == 0xFF)
}

/// Formats an [`Error`] with or without `std`
struct DisplayError<'a>(&'a Error);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::WriteFailed(s) => write!(f, "write failed: {}", s),
            Error::ReadFailed(s) => write!(f, "read failed: {}", s),
            Error::ShortRead { expected, got } => {
                write!(f, "short read ({} of {} bytes)", got, expected)
            }
            Error::Cancelled { attempts } => write!(f, "cancelled after {} polls", attempts),
        }
    }
}
