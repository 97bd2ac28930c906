//! MPSSE clock configuration
//!
//! The MPSSE shift clock is derived from a 60 MHz master clock (12 MHz with
//! the divide-by-5 prescaler enabled):
//!
//! ```text
//! TCK = 60 MHz / ((1 + divisor) * 2) = 30 MHz / (1 + divisor)
//! ```
//!
//! The training clock is bit-banged on the data line, one bit per shift
//! clock, so the shift clock has to run at twice the oscillator frequency
//! the target is calibrated against. That doubled rate is the toggle rate.

/// Numerator of the TCK formula with the prescaler disabled
pub const MPSSE_BASE_CLOCK_HZ: u32 = 30_000_000;

/// Toggle rates below this need the divide-by-5 prescaler
pub const DIV5_THRESHOLD_HZ: u32 = 1000;

/// Largest value the 16-bit divisor register accepts
pub const MAX_DIVISOR: u16 = u16::MAX;

/// Clock settings for a requested toggle rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Requested toggle rate in Hz
    pub target_hz: u32,
    /// Whether the divide-by-5 prescaler is enabled
    pub div5_enabled: bool,
    /// Value for the TCK divisor register
    pub divisor: u16,
    /// Numerator the divisor was computed from (after the prescaler)
    pub numerator: u32,
}

impl ClockConfig {
    /// Compute the prescaler and divisor for `target_toggle_hz`
    ///
    /// `divisor = round(numerator / target_toggle_hz - 1)`, where the
    /// numerator is `base_numerator / 5` if the prescaler is needed.
    /// Negative results clamp to 0 and results beyond 16 bits saturate.
    pub fn configure(target_toggle_hz: u32, base_numerator: u32) -> Self {
        let div5_enabled = target_toggle_hz < DIV5_THRESHOLD_HZ;
        let prescale: u64 = if div5_enabled { 5 } else { 1 };

        let divisor = if target_toggle_hz == 0 {
            MAX_DIVISOR
        } else {
            // round(n / (p * hz)) - 1, half away from zero, in integers
            let denom = prescale * u64::from(target_toggle_hz);
            let rounded = (2 * u64::from(base_numerator) + denom) / (2 * denom);
            let divisor = rounded.saturating_sub(1);
            if divisor > u64::from(MAX_DIVISOR) {
                log::warn!(
                    "Toggle rate {} Hz is below the slowest MPSSE clock, saturating divisor",
                    target_toggle_hz
                );
                MAX_DIVISOR
            } else {
                divisor as u16
            }
        };

        ClockConfig {
            target_hz: target_toggle_hz,
            div5_enabled,
            divisor,
            numerator: (u64::from(base_numerator) / prescale) as u32,
        }
    }

    /// Configuration for the default MPSSE master clock
    pub fn for_toggle_rate(target_toggle_hz: u32) -> Self {
        Self::configure(target_toggle_hz, MPSSE_BASE_CLOCK_HZ)
    }

    /// Toggle rate the adapter will actually produce, in Hz
    pub fn actual_hz(&self) -> f64 {
        self.numerator as f64 / (u32::from(self.divisor) + 1) as f64
    }

    /// Relative error of the actual toggle rate, in percent
    pub fn error_percent(&self) -> f64 {
        if self.target_hz == 0 {
            return 0.0;
        }
        (self.actual_hz() - self.target_hz as f64) * 100.0 / self.target_hz as f64
    }
}

/// Toggle rate needed to train an oscillator against `clock_rate_hz`
///
/// One clock period takes two data bits (high, low).
pub fn toggle_rate(clock_rate_hz: u32) -> u32 {
    clock_rate_hz.saturating_mul(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_crystal_rate() {
        let config = ClockConfig::configure(toggle_rate(32768), MPSSE_BASE_CLOCK_HZ);
        assert_eq!(config.target_hz, 65536);
        assert!(!config.div5_enabled);
        assert_eq!(config.divisor, 457);
    }

    #[test]
    fn test_div5_threshold() {
        assert!(ClockConfig::for_toggle_rate(999).div5_enabled);
        assert!(!ClockConfig::for_toggle_rate(1000).div5_enabled);
        assert!(ClockConfig::for_toggle_rate(0).div5_enabled);

        // 6 MHz / 500 Hz - 1
        let config = ClockConfig::for_toggle_rate(500);
        assert_eq!(config.numerator, 6_000_000);
        assert_eq!(config.divisor, 11_999);
    }

    #[test]
    fn test_negative_divisor_clamps_to_zero() {
        // 30 MHz / 60 MHz - 1 = -0.5
        assert_eq!(ClockConfig::for_toggle_rate(60_000_000).divisor, 0);
        assert_eq!(ClockConfig::for_toggle_rate(u32::MAX).divisor, 0);
        // 30 MHz / 30 MHz - 1 = 0
        assert_eq!(ClockConfig::for_toggle_rate(30_000_000).divisor, 0);
    }

    #[test]
    fn test_rounding() {
        // 30 MHz / 7 MHz - 1 = 3.2857 -> 3
        assert_eq!(ClockConfig::for_toggle_rate(7_000_000).divisor, 3);
        // 30 MHz / 4 MHz - 1 = 6.5 -> 7 (half away from zero)
        assert_eq!(ClockConfig::for_toggle_rate(4_000_000).divisor, 7);
        // 30 MHz / 1 MHz - 1 = 29
        assert_eq!(ClockConfig::for_toggle_rate(1_000_000).divisor, 29);
    }

    #[test]
    fn test_slow_rates_saturate() {
        assert_eq!(ClockConfig::for_toggle_rate(1).divisor, MAX_DIVISOR);
        assert_eq!(ClockConfig::for_toggle_rate(0).divisor, MAX_DIVISOR);
    }

    #[test]
    fn test_actual_frequency() {
        let config = ClockConfig::for_toggle_rate(65536);
        // 30 MHz / 458
        assert!((config.actual_hz() - 65502.18).abs() < 0.01);
        assert!(config.error_percent().abs() < 0.1);
    }
}
