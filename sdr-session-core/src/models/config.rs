use serde::{Deserialize, Serialize};

use super::error::{ConfigParameter, DriverError, SdrError};

/// RF front-end settings applied to an open session in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfiguration {
    /// Sample rate in Hz (default: 10 MHz).
    pub sample_rate_hz: f64,

    /// Center frequency in Hz (default: 100 MHz).
    pub frequency_hz: f64,

    /// RX LNA (IF) gain in dB (default: 16).
    pub lna_gain_db: u32,

    /// RX VGA (baseband) gain in dB (default: 20).
    pub vga_gain_db: u32,

    /// Front-end RF amplifier (default: off).
    pub amp_enable: bool,
}

impl RadioConfiguration {
    /// Sanity checks only. Hardware limits are enforced by the driver.
    pub fn validate(&self) -> Result<(), SdrError> {
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(SdrError::Config {
                parameter: ConfigParameter::SampleRate,
                cause: DriverError::InvalidParameter(format!(
                    "sample rate must be positive: {}",
                    self.sample_rate_hz
                )),
            });
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(SdrError::Config {
                parameter: ConfigParameter::Frequency,
                cause: DriverError::InvalidParameter(format!(
                    "frequency must be positive: {}",
                    self.frequency_hz
                )),
            });
        }
        Ok(())
    }
}

impl Default for RadioConfiguration {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10e6,
            frequency_hz: 100e6,
            lna_gain_db: 16,
            vga_gain_db: 20,
            amp_enable: false,
        }
    }
}
