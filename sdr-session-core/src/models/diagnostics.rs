use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for debugging an RX stream.
///
/// Per-cycle counters reset on each `start_rx`; `completed_cycles` does not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamDiagnostics {
    pub buffers_delivered: u64,
    pub bytes_delivered: u64,
    /// Buffers the driver handed over after the engine disarmed, or that
    /// belonged to an earlier cycle. These never reach the callback.
    pub buffers_rejected: u64,
    pub completed_cycles: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}
