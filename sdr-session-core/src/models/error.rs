use std::fmt;

use thiserror::Error;

/// Failures reported by a hardware driver backend.
///
/// Backends map their native status codes onto these; the session layer
/// wraps them into `SdrError` with the operation that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("no device available")]
    NoDevice,

    #[error("device busy")]
    Busy,

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("driver not initialized")]
    NotInitialized,

    #[error("usb i/o error: {0}")]
    Io(String),

    #[error("driver error: {0}")]
    Other(String),
}

/// Radio parameter named by a `SdrError::Config` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigParameter {
    SampleRate,
    Frequency,
    LnaGain,
    VgaGain,
    AmpEnable,
}

impl fmt::Display for ConfigParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRate => f.write_str("sample rate"),
            Self::Frequency => f.write_str("frequency"),
            Self::LnaGain => f.write_str("LNA gain"),
            Self::VgaGain => f.write_str("VGA gain"),
            Self::AmpEnable => f.write_str("amp enable"),
        }
    }
}

/// Errors surfaced by the registry, sessions and the streaming engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SdrError {
    #[error("device enumeration failed: {0}")]
    Enumeration(DriverError),

    #[error("failed to open device: {0}")]
    Open(DriverError),

    #[error("no device with serial number {serial:?}")]
    NotFound { serial: String },

    #[error("failed to set {parameter}: {cause}")]
    Config {
        parameter: ConfigParameter,
        cause: DriverError,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("failed to start rx stream: {0}")]
    StreamStart(DriverError),

    #[error("failed to stop rx stream: {0}")]
    StreamStop(DriverError),

    #[error("rx callback failed: {0}")]
    CallbackFault(String),

    #[error("driver call failed: {0}")]
    Driver(DriverError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SdrError {
    pub(crate) fn invalid_state(operation: &str, state: impl fmt::Display) -> Self {
        Self::InvalidState(format!("{} not allowed while {}", operation, state))
    }

    pub(crate) fn config(parameter: ConfigParameter) -> impl FnOnce(DriverError) -> Self {
        move |cause| Self::Config { parameter, cause }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}
