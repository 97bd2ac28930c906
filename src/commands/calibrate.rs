//! Calibrate command implementation

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use osccal_core::error::Error;
use osccal_core::sequencer::{CalibrationParams, Calibrator, PollObserver, PollStatus};

use crate::programmers;

/// Spinner while waiting for the target, with Ctrl-C and timeout cancellation
struct CliObserver {
    pb: ProgressBar,
    interrupted: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl PollObserver for CliObserver {
    fn progress(&mut self, status: &PollStatus) {
        self.pb.set_message(format!(
            "Waiting for target... {} polls ({:.1}s sampled)",
            status.attempts,
            status.sampled.as_secs_f64()
        ));
        self.pb.tick();
    }

    fn check(&mut self, _status: &PollStatus) -> ControlFlow<()> {
        if self.interrupted.load(Ordering::SeqCst) {
            log::warn!("Interrupted, releasing target");
            return ControlFlow::Break(());
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            log::warn!("Timed out waiting for target");
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// Run one calibration
///
/// Returns whether the target locked.
pub fn run_calibrate(
    programmer: &str,
    clock_rate: u32,
    timeout: Option<Duration>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let transport = programmers::open_transport(programmer)?;
    let params = CalibrationParams::with_clock_rate(clock_rate);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Waiting for target...");

    let mut observer = CliObserver {
        pb,
        interrupted,
        deadline: timeout.map(|t| Instant::now() + t),
    };

    let mut calibrator = Calibrator::new(transport, params);
    let result = calibrator.run(&mut observer);
    observer.pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::Cancelled { attempts }) => {
            return Err(format!(
                "Calibration cancelled after {} polls; target never signalled ready",
                attempts
            )
            .into());
        }
        Err(e) => {
            return Err(format!("Calibration aborted during {}: {}", calibrator.stage(), e).into())
        }
    };

    log::debug!(
        "Clock error {:+.3}% after {} polls",
        report.clock.error_percent(),
        report.poll_attempts
    );

    if report.outcome.is_success() {
        println!("Success!");
        Ok(true)
    } else {
        println!("Failed");
        Ok(false)
    }
}
