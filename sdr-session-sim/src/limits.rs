//! HackRF One front-end limits and the host-side sample rate divider search.

use std::ops::RangeInclusive;

use sdr_session_core::DriverError;

pub const SAMPLE_RATE_RANGE_HZ: RangeInclusive<f64> = 2e6..=20e6;
pub const FREQUENCY_RANGE_HZ: RangeInclusive<u64> = 1_000_000..=6_000_000_000;

pub const LNA_GAIN_MAX_DB: u32 = 40;
pub const LNA_GAIN_STEP_DB: u32 = 8;
pub const VGA_GAIN_MAX_DB: u32 = 62;
pub const VGA_GAIN_STEP_DB: u32 = 2;

/// Fractional sample rate divider range accepted by the firmware.
const DIVIDER_MAX: u32 = 31;

/// Sample rate programmed as `freq_hz / divider`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRateSetting {
    pub freq_hz: u32,
    pub divider: u32,
}

impl SampleRateSetting {
    pub fn achieved_hz(&self) -> f64 {
        self.freq_hz as f64 / self.divider as f64
    }
}

/// Pick the divider whose rounded numerator gets closest to `hz`,
/// preferring the smaller divider on ties.
pub fn sample_rate_setting(hz: f64) -> Result<SampleRateSetting, DriverError> {
    if !SAMPLE_RATE_RANGE_HZ.contains(&hz) {
        return Err(DriverError::InvalidParameter(format!(
            "sample rate {} Hz outside {}..={} Hz",
            hz,
            SAMPLE_RATE_RANGE_HZ.start(),
            SAMPLE_RATE_RANGE_HZ.end()
        )));
    }

    let mut best = SampleRateSetting {
        freq_hz: hz.round() as u32,
        divider: 1,
    };
    let mut best_diff = (best.achieved_hz() - hz).abs();
    for divider in 2..=DIVIDER_MAX {
        let candidate = SampleRateSetting {
            freq_hz: (hz * divider as f64).round() as u32,
            divider,
        };
        let diff = (candidate.achieved_hz() - hz).abs();
        if diff < best_diff {
            best = candidate;
            best_diff = diff;
        }
    }
    Ok(best)
}

pub fn check_frequency(hz: f64) -> Result<u64, DriverError> {
    if !hz.is_finite() || hz < 0.0 {
        return Err(DriverError::InvalidParameter(format!("frequency {} Hz", hz)));
    }
    let hz = hz.round() as u64;
    if !FREQUENCY_RANGE_HZ.contains(&hz) {
        return Err(DriverError::InvalidParameter(format!(
            "frequency {} Hz outside {}..={} Hz",
            hz,
            FREQUENCY_RANGE_HZ.start(),
            FREQUENCY_RANGE_HZ.end()
        )));
    }
    Ok(hz)
}

/// Rejects values above the maximum, rounds the rest down to the gain step
/// the way the firmware masks them.
pub fn check_gain(db: u32, max_db: u32, step_db: u32, stage: &str) -> Result<u32, DriverError> {
    if db > max_db {
        return Err(DriverError::InvalidParameter(format!(
            "{} gain {} dB above {} dB",
            stage, db, max_db
        )));
    }
    Ok(db - db % step_db)
}
