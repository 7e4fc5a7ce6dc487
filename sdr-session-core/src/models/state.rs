use std::fmt;

/// Device session lifecycle.
///
/// State transitions:
/// ```text
/// (open) → Open ⇄ Streaming
///           ↓        ↓
///          Closed ←──┘   (close force-stops a running stream)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Streaming,
}

impl SessionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::Streaming => f.write_str("streaming"),
        }
    }
}

/// Streaming engine state.
///
/// `Stopping` is entered when the engine disarms on its own after a
/// callback fault, and while `stop_rx` waits for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Active,
    Stopping,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Active => f.write_str("active"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}
