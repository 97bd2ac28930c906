//! Lock detection on the sampled MISO stream
//!
//! While the training clock is shifted out, DI is sampled once per bit.
//! The calibration firmware keeps MISO high while it works and, once OSCCAL
//! is trimmed, toggles it with every clock period it counts. Since each
//! clock period spans two training bits, a locked target shows edges every
//! one or two samples. The first edge is allowed any lead-in; after it a
//! level held for more than [`MAX_RUN_LENGTH`] samples means the target's
//! idea of the clock is off and the run is rejected.

/// Longest run of equal samples allowed between edges once edges start
pub const MAX_RUN_LENGTH: u32 = 3;

/// Edges that must be seen to accept the lock signal
pub const REQUIRED_TRANSITIONS: u32 = 8;

/// Result of scanning a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The lock signal was seen
    Success,
    /// An edge arrived after too long a run
    DriftError {
        /// Index of the offending sample, counting MSB first from byte 0
        bit_offset: usize,
        /// Length of the run that ended at that sample
        run_length: u32,
    },
    /// The capture ended before enough edges were seen
    Incomplete {
        /// Edges seen before the capture ran out
        transitions_seen: u32,
    },
}

impl Outcome {
    /// Whether the target locked
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Outcome::Success => write!(f, "target locked"),
            Outcome::DriftError {
                bit_offset,
                run_length,
            } => write!(
                f,
                "level held for {} samples before edge at sample {}",
                run_length, bit_offset
            ),
            Outcome::Incomplete { transitions_seen } => write!(
                f,
                "only {} of {} edges seen",
                transitions_seen, REQUIRED_TRANSITIONS
            ),
        }
    }
}

/// Scanner state, fed one byte at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detector {
    expected_level: bool,
    run_length: u32,
    transitions_seen: u32,
    bits_consumed: usize,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Fresh state: MISO is expected idle-high
    pub fn new() -> Self {
        Detector {
            expected_level: true,
            run_length: 0,
            transitions_seen: 0,
            bits_consumed: 0,
        }
    }

    /// Edges counted so far
    pub fn transitions_seen(&self) -> u32 {
        self.transitions_seen
    }

    /// Samples since the last edge (or since the start)
    pub fn run_length(&self) -> u32 {
        self.run_length
    }

    /// Level the current run is at
    pub fn expected_level(&self) -> bool {
        self.expected_level
    }

    /// Consume one captured byte, MSB first
    ///
    /// Returns a verdict as soon as one is reached; the rest of the byte is
    /// not looked at.
    pub fn feed(&mut self, byte: u8) -> Option<Outcome> {
        // No edge is possible inside a byte that matches the current level
        if (byte == 0xFF && self.expected_level) || (byte == 0x00 && !self.expected_level) {
            self.run_length = self.run_length.saturating_add(8);
            self.bits_consumed = self.bits_consumed.saturating_add(8);
            return None;
        }

        for bit in (0..8).rev() {
            let level = (byte >> bit) & 1 == 1;
            let offset = self.bits_consumed;
            self.bits_consumed = self.bits_consumed.saturating_add(1);

            if level == self.expected_level {
                self.run_length = self.run_length.saturating_add(1);
                continue;
            }

            if self.transitions_seen != 0 && self.run_length > MAX_RUN_LENGTH {
                return Some(Outcome::DriftError {
                    bit_offset: offset,
                    run_length: self.run_length,
                });
            }

            self.transitions_seen += 1;
            self.run_length = 1;
            self.expected_level = level;

            if self.transitions_seen == REQUIRED_TRANSITIONS {
                return Some(Outcome::Success);
            }
        }

        None
    }

    /// Verdict once the capture is exhausted without an early result
    pub fn finish(&self) -> Outcome {
        Outcome::Incomplete {
            transitions_seen: self.transitions_seen,
        }
    }
}

/// Scan a whole capture
pub fn detect(bits: &[u8]) -> Outcome {
    let mut detector = Detector::new();
    for &byte in bits {
        if let Some(outcome) = detector.feed(byte) {
            log::debug!(
                "Detector verdict after {} samples: {}",
                detector.bits_consumed,
                outcome
            );
            return outcome;
        }
    }
    detector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    const CAPTURE_LEN: usize = 4000;

    /// Pack MSB-first samples into bytes, padding the tail with `pad`
    fn pack(levels: &[bool], len: usize, pad: bool) -> Vec<u8> {
        let mut out = vec![if pad { 0xFF } else { 0x00 }; len];
        for (i, &level) in levels.iter().enumerate() {
            let mask = 0x80 >> (i % 8);
            if level {
                out[i / 8] |= mask;
            } else {
                out[i / 8] &= !mask;
            }
        }
        out
    }

    /// A run of `lead` highs followed by runs of the given lengths,
    /// alternating low/high
    fn waveform(lead: usize, runs: &[usize]) -> Vec<bool> {
        let mut levels = vec![true; lead];
        let mut level = false;
        for &run in runs {
            levels.extend(core::iter::repeat(level).take(run));
            level = !level;
        }
        levels
    }

    #[test]
    fn test_clean_edges_succeed() {
        // 8 edges, every run between them at most 3 samples
        let levels = waveform(37, &[2, 1, 3, 2, 2, 1, 2, 2]);
        let capture = pack(&levels, CAPTURE_LEN, true);
        assert_eq!(detect(&capture), Outcome::Success);
    }

    #[test]
    fn test_long_run_is_drift() {
        // Same as above but the fourth run lasts 5 samples
        let levels = waveform(37, &[2, 1, 3, 5, 2, 1, 2, 2]);
        let capture = pack(&levels, CAPTURE_LEN, true);

        // Edge that ends the 5-sample run: 37 + 2 + 1 + 3 + 5
        assert_eq!(
            detect(&capture),
            Outcome::DriftError {
                bit_offset: 48,
                run_length: 5
            }
        );
    }

    #[test]
    fn test_scan_stops_at_drift() {
        let levels = waveform(37, &[2, 1, 3, 5, 2, 1, 2, 2]);
        let capture = pack(&levels, CAPTURE_LEN, true);

        let mut detector = Detector::new();
        let mut fed = 0;
        for &byte in &capture {
            fed += 1;
            if detector.feed(byte).is_some() {
                break;
            }
        }
        // Sample 48 lives in byte 6; nothing past it is consumed
        assert_eq!(fed, 7);
        assert_eq!(detector.transitions_seen(), 4);
    }

    #[test]
    fn test_all_high_is_incomplete() {
        let capture = vec![0xFF; CAPTURE_LEN];
        assert_eq!(
            detect(&capture),
            Outcome::Incomplete {
                transitions_seen: 0
            }
        );
    }

    #[test]
    fn test_failed_firmware_drops_low_once() {
        // Firmware that gives up clears MISO and keeps it there
        let mut capture = vec![0xFF; 100];
        capture.extend(vec![0x00; CAPTURE_LEN - 100]);
        assert_eq!(
            detect(&capture),
            Outcome::Incomplete {
                transitions_seen: 1
            }
        );
    }

    #[test]
    fn test_first_edge_ignores_lead_in() {
        // A long idle-high run before the first edge is the settling time
        let mut capture = vec![0xFF; 1000];
        capture.extend(vec![0xCC; 10]);
        assert_eq!(detect(&capture), Outcome::Success);
    }

    #[test]
    fn test_success_is_immediate() {
        // 0xAA 0xAA: edges at samples 1..=7, the eighth at sample 8
        let mut detector = Detector::new();
        assert_eq!(detector.feed(0xAA), None);
        assert_eq!(detector.transitions_seen(), 7);
        assert_eq!(detector.feed(0xAA), Some(Outcome::Success));
        assert_eq!(detector.transitions_seen(), 8);
    }

    #[test]
    fn test_run_of_three_is_tolerated() {
        // 111 000 111 000 ... with every run exactly 3 samples
        let levels = waveform(3, &[3, 3, 3, 3, 3, 3, 3, 3]);
        let capture = pack(&levels, 64, false);
        assert_eq!(detect(&capture), Outcome::Success);

        let levels = waveform(3, &[3, 4, 3]);
        let capture = pack(&levels, 64, true);
        assert!(matches!(
            detect(&capture),
            Outcome::DriftError { run_length: 4, .. }
        ));
    }

    #[test]
    fn test_fast_path_matches_bitwise() {
        // A uniform byte at the wrong level must still be inspected bit by bit
        let mut detector = Detector::new();
        assert_eq!(detector.feed(0x00), None);
        assert_eq!(detector.transitions_seen(), 1);
        assert!(!detector.expected_level());
        assert_eq!(detector.run_length(), 8);

        assert_eq!(detector.feed(0x00), None);
        assert_eq!(detector.run_length(), 16);

        assert_eq!(
            detector.feed(0xFF),
            Some(Outcome::DriftError {
                bit_offset: 16,
                run_length: 16
            })
        );
    }

    #[test]
    fn test_long_run_saturates() {
        let mut detector = Detector::new();
        assert_eq!(detector.feed(0x00), None);
        detector.run_length = u32::MAX - 4;

        assert_eq!(detector.feed(0x00), None);
        assert_eq!(detector.run_length(), u32::MAX);

        assert_eq!(
            detector.feed(0x01),
            Some(Outcome::DriftError {
                bit_offset: 23,
                run_length: u32::MAX
            })
        );
    }

    #[test]
    fn test_empty_capture() {
        assert_eq!(
            detect(&[]),
            Outcome::Incomplete {
                transitions_seen: 0
            }
        );
    }
}
