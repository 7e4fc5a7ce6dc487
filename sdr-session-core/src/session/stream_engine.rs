use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::diagnostics::StreamDiagnostics;
use crate::models::error::SdrError;
use crate::models::state::StreamState;
use crate::traits::hardware_driver::{TransferCallback, TransferControl};
use crate::traits::session_observer::SessionObserver;

/// Error type returned by an RX callback.
pub type RxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// User sink for RX buffers.
///
/// The slice is only valid for the duration of the call. Returning an error
/// ends the stream; the error comes back from the next `stop_rx`.
pub type RxCallback = Box<dyn FnMut(&[u8]) -> Result<(), RxError> + Send + 'static>;

/// The single consumer slot the driver's I/O thread delivers into.
///
/// Held for the whole callback invocation, so taking this lock from a control
/// thread waits out any in-flight buffer.
struct Slot {
    generation: u64,
    armed: bool,
    callback: Option<RxCallback>,
}

struct EngineStatus {
    state: StreamState,
    fault: Option<SdrError>,
    diagnostics: StreamDiagnostics,
}

struct EngineShared {
    label: String,
    // Lock order: slot, then status.
    slot: Mutex<Slot>,
    status: Mutex<EngineStatus>,
}

/// Bridges driver buffer delivery to one user callback per stream cycle.
///
/// ```text
/// [driver I/O thread] → trampoline(gen) → [Slot: armed? gen? ] → user callback
///                                              ↑
///                         stop_rx: driver.stop_rx() → disarm (waits for slot)
/// ```
///
/// The engine does no buffering of its own. A slow callback blocks the
/// driver thread and throttles acquisition.
pub struct StreamEngine {
    shared: Arc<EngineShared>,
}

impl StreamEngine {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                label: label.into(),
                slot: Mutex::new(Slot {
                    generation: 0,
                    armed: false,
                    callback: None,
                }),
                status: Mutex::new(EngineStatus {
                    state: StreamState::Idle,
                    fault: None,
                    diagnostics: StreamDiagnostics::default(),
                }),
            }),
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.status.lock().state
    }

    /// Callback fault recorded for the current cycle, if any. Does not clear it.
    pub fn fault(&self) -> Option<SdrError> {
        self.shared.status.lock().fault.clone()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.shared.status.lock().diagnostics.clone()
    }

    /// Install `callback` for a new cycle and return the trampoline to hand
    /// to the driver.
    ///
    /// Buffers carried by trampolines from earlier cycles are rejected.
    pub(crate) fn arm(
        &self,
        callback: RxCallback,
        observer: Option<Arc<dyn SessionObserver>>,
    ) -> TransferCallback {
        let generation = {
            let mut slot = self.shared.slot.lock();
            slot.generation += 1;
            slot.armed = true;
            slot.callback = Some(callback);

            let mut status = self.shared.status.lock();
            status.state = StreamState::Active;
            status.fault = None;
            let completed_cycles = status.diagnostics.completed_cycles;
            status.diagnostics = StreamDiagnostics {
                completed_cycles,
                started_at: Some(chrono::Utc::now()),
                ..Default::default()
            };
            slot.generation
        };
        log::debug!("[{}] rx engine armed (cycle {})", self.shared.label, generation);

        let shared = Arc::clone(&self.shared);
        Arc::new(move |buffer: &[u8]| shared.deliver(generation, buffer, observer.as_deref()))
    }

    /// Mark the engine as shutting down before the driver is asked to stop.
    pub(crate) fn begin_stop(&self) {
        let mut status = self.shared.status.lock();
        if status.state == StreamState::Active {
            status.state = StreamState::Stopping;
        }
    }

    /// Remove the callback, waiting for an in-flight invocation to return.
    ///
    /// After this returns the callback of the current cycle is never invoked
    /// again, whatever the driver does. Returns the recorded callback fault.
    pub(crate) fn disarm(&self) -> Option<SdrError> {
        let (callback, fault) = {
            let mut slot = self.shared.slot.lock();
            slot.armed = false;
            let callback = slot.callback.take();

            let mut status = self.shared.status.lock();
            status.state = StreamState::Idle;
            status.diagnostics.stopped_at = Some(chrono::Utc::now());
            status.diagnostics.completed_cycles += 1;
            (callback, status.fault.take())
        };
        // User code may run in Drop; keep it outside the locks.
        drop(callback);
        log::debug!("[{}] rx engine disarmed", self.shared.label);
        fault
    }

    /// Undo `arm` after the driver refused to start.
    pub(crate) fn abort(&self) {
        let callback = {
            let mut slot = self.shared.slot.lock();
            slot.armed = false;
            let callback = slot.callback.take();

            let mut status = self.shared.status.lock();
            status.state = StreamState::Idle;
            status.fault = None;
            callback
        };
        drop(callback);
    }
}

impl EngineShared {
    fn deliver(
        &self,
        generation: u64,
        buffer: &[u8],
        observer: Option<&dyn SessionObserver>,
    ) -> TransferControl {
        let mut slot = self.slot.lock();
        if !slot.armed || slot.generation != generation {
            drop(slot);
            self.status.lock().diagnostics.buffers_rejected += 1;
            log::trace!("[{}] dropped {} byte buffer after disarm", self.label, buffer.len());
            return TransferControl::Stop;
        }
        let Some(callback) = slot.callback.as_mut() else {
            return TransferControl::Stop;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(buffer)));
        {
            let mut status = self.status.lock();
            status.diagnostics.buffers_delivered += 1;
            status.diagnostics.bytes_delivered += buffer.len() as u64;
        }

        let message = match outcome {
            Ok(Ok(())) => return TransferControl::Continue,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("callback panicked: {}", panic_message(payload.as_ref())),
        };

        // Fault: disarm here so no further buffer reaches the callback, and
        // leave the driver stop to the next stop_rx.
        slot.armed = false;
        let callback = slot.callback.take();
        let fault = SdrError::CallbackFault(message);
        {
            let mut status = self.status.lock();
            status.state = StreamState::Stopping;
            status.fault = Some(fault.clone());
        }
        drop(slot);
        drop(callback);

        log::error!("[{}] rx callback failed, stream disarmed: {}", self.label, fault);
        if let Some(observer) = observer {
            observer.on_stream_fault(&fault);
        }
        TransferControl::Stop
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
