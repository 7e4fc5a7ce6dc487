use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::lifecycle::SessionLease;
use crate::models::config::RadioConfiguration;
use crate::models::descriptor::DeviceDescriptor;
use crate::models::diagnostics::StreamDiagnostics;
use crate::models::error::{ConfigParameter, DriverError, SdrError};
use crate::models::state::{SessionState, StreamState};
use crate::session::stream_engine::{RxError, StreamEngine};
use crate::traits::hardware_driver::DeviceHandle;
use crate::traits::session_observer::SessionObserver;

/// Mutable session state, protected by `parking_lot::Mutex`.
///
/// Every control call holds this lock for its whole duration, so
/// configuration, start/stop and close on one session are serialized.
struct SessionInner {
    state: SessionState,
    /// `Some` iff `state != Closed`.
    handle: Option<Box<dyn DeviceHandle>>,
    transfer_buffer_size: Option<usize>,
    /// A driver `stop_rx` failed; the I/O thread may still be running.
    stop_pending: bool,
    lease: Option<SessionLease>,
}

impl SessionInner {
    fn handle_mut(&mut self, operation: &str) -> Result<&mut dyn DeviceHandle, SdrError> {
        let state = self.state;
        match self.handle.as_deref_mut() {
            Some(handle) => Ok(handle),
            None => Err(SdrError::invalid_state(operation, state)),
        }
    }

    fn require_open(&self, operation: &str) -> Result<(), SdrError> {
        if !self.state.is_open() {
            return Err(SdrError::invalid_state(operation, self.state));
        }
        Ok(())
    }

    /// Retry a driver stop that failed earlier before touching the handle.
    fn settle_pending_stop(&mut self, label: &str) -> Result<(), SdrError> {
        if !self.stop_pending {
            return Ok(());
        }
        let handle = self.handle_mut("stop_rx")?;
        handle.stop_rx().map_err(SdrError::StreamStop)?;
        self.stop_pending = false;
        log::info!("[{}] pending rx stop completed", label);
        Ok(())
    }

    /// The handle, once any pending driver stop has gone through.
    fn settled_handle(
        &mut self,
        operation: &str,
        label: &str,
    ) -> Result<&mut dyn DeviceHandle, SdrError> {
        self.settle_pending_stop(label)?;
        self.handle_mut(operation)
    }
}

/// An opened radio and its RX streaming engine.
///
/// Created by `DriverLifecycle::open` / `open_by_serial`. Owns the driver
/// handle exclusively; the handle is released by `close` (or on drop).
///
/// ```text
/// open → [Open] ──start_rx──▶ [Streaming] ──stop_rx──▶ [Open] ──close──▶ [Closed]
///                                  └───────────────close───────────────────▲
/// ```
pub struct DeviceSession {
    id: Uuid,
    label: String,
    descriptor: DeviceDescriptor,
    inner: Mutex<SessionInner>,
    engine: StreamEngine,
    observer: Mutex<Option<Arc<dyn SessionObserver>>>,
}

impl DeviceSession {
    pub(crate) fn new(
        descriptor: DeviceDescriptor,
        handle: Box<dyn DeviceHandle>,
        lease: SessionLease,
    ) -> Self {
        let id = Uuid::new_v4();
        let label = format!("{} {}", descriptor.serial_number, id);
        log::info!("[{}] session opened (device #{})", label, descriptor.index);
        Self {
            id,
            engine: StreamEngine::new(label.clone()),
            label,
            descriptor,
            inner: Mutex::new(SessionInner {
                state: SessionState::Open,
                handle: Some(handle),
                transfer_buffer_size: None,
                stop_pending: false,
                lease: Some(lease),
            }),
            observer: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.observer.lock() = Some(observer);
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    pub fn stream_state(&self) -> StreamState {
        self.engine.state()
    }

    /// Callback fault waiting to be reported by the next `stop_rx`.
    ///
    /// Does not block on the session lock.
    pub fn stream_fault(&self) -> Option<SdrError> {
        self.engine.fault()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.engine.diagnostics()
    }

    /// Firmware version string of the unit.
    pub fn version(&self) -> Result<String, SdrError> {
        let mut inner = self.inner.lock();
        let handle = inner.settled_handle("version", &self.label)?;
        handle.version().map_err(SdrError::Driver)
    }

    pub fn set_sample_rate(&self, hz: f64) -> Result<(), SdrError> {
        self.configure_with("set_sample_rate", ConfigParameter::SampleRate, |h| {
            h.set_sample_rate(hz)
        })
    }

    pub fn set_freq(&self, hz: f64) -> Result<(), SdrError> {
        self.configure_with("set_freq", ConfigParameter::Frequency, |h| h.set_freq(hz))
    }

    pub fn set_lna_gain(&self, db: u32) -> Result<(), SdrError> {
        self.configure_with("set_lna_gain", ConfigParameter::LnaGain, |h| h.set_lna_gain(db))
    }

    pub fn set_vga_gain(&self, db: u32) -> Result<(), SdrError> {
        self.configure_with("set_vga_gain", ConfigParameter::VgaGain, |h| h.set_vga_gain(db))
    }

    pub fn set_amp_enable(&self, enable: bool) -> Result<(), SdrError> {
        self.configure_with("set_amp_enable", ConfigParameter::AmpEnable, |h| {
            h.set_amp_enable(enable)
        })
    }

    /// Apply a whole configuration: rate, frequency, LNA, VGA, amp, in that
    /// order. Stops at the first rejected setting.
    pub fn configure(&self, config: &RadioConfiguration) -> Result<(), SdrError> {
        config.validate()?;

        let mut inner = self.inner.lock();
        inner.require_open("configure")?;
        let handle = inner.settled_handle("configure", &self.label)?;

        handle
            .set_sample_rate(config.sample_rate_hz)
            .map_err(SdrError::config(ConfigParameter::SampleRate))?;
        handle
            .set_freq(config.frequency_hz)
            .map_err(SdrError::config(ConfigParameter::Frequency))?;
        handle
            .set_lna_gain(config.lna_gain_db)
            .map_err(SdrError::config(ConfigParameter::LnaGain))?;
        handle
            .set_vga_gain(config.vga_gain_db)
            .map_err(SdrError::config(ConfigParameter::VgaGain))?;
        handle
            .set_amp_enable(config.amp_enable)
            .map_err(SdrError::config(ConfigParameter::AmpEnable))?;

        log::debug!("[{}] configured: {:?}", self.label, config);
        Ok(())
    }

    /// USB transfer size in bytes, queried once and cached.
    ///
    /// Informational: buffers handed to the RX callback may be shorter.
    pub fn transfer_buffer_size(&self) -> Result<usize, SdrError> {
        let mut inner = self.inner.lock();
        inner.settle_pending_stop(&self.label)?;
        if let Some(size) = inner.transfer_buffer_size {
            return Ok(size);
        }
        let size = inner
            .settled_handle("transfer_buffer_size", &self.label)?
            .transfer_buffer_size()
            .map_err(SdrError::Driver)?;
        inner.transfer_buffer_size = Some(size);
        Ok(size)
    }

    /// Start asynchronous RX, delivering every completed transfer to
    /// `callback` on the driver's I/O thread.
    ///
    /// The callback is invoked sequentially, never concurrently with itself,
    /// and must not call back into this session. Returning an error ends the
    /// stream; the error is reported by the next `stop_rx`.
    pub fn start_rx<F>(&self, callback: F) -> Result<(), SdrError>
    where
        F: FnMut(&[u8]) -> Result<(), RxError> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        inner.require_open("start_rx")?;
        let handle = inner.settled_handle("start_rx", &self.label)?;
        let observer = self.observer.lock().clone();
        let trampoline = self.engine.arm(Box::new(callback), observer);
        if let Err(e) = handle.start_rx(trampoline) {
            self.engine.abort();
            log::error!("[{}] driver refused rx start: {}", self.label, e);
            return Err(SdrError::StreamStart(e));
        }

        inner.state = SessionState::Streaming;
        drop(inner);

        log::info!("[{}] rx streaming started", self.label);
        self.notify_state(SessionState::Streaming);
        Ok(())
    }

    /// Stop RX and wait until the callback can no longer be invoked.
    ///
    /// Blocks for up to the driver's transfer timeout. On return the session
    /// is Open, whatever the outcome. Reports a callback fault recorded
    /// during the stream as `CallbackFault`.
    pub fn stop_rx(&self) -> Result<(), SdrError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_streaming() {
            return Err(SdrError::invalid_state("stop_rx", inner.state));
        }

        let result = self.stop_stream(&mut inner);
        inner.state = SessionState::Open;
        drop(inner);

        log::info!("[{}] rx streaming stopped", self.label);
        self.notify_state(SessionState::Open);
        result
    }

    /// Release the device. Stops a running stream first.
    ///
    /// Teardown always runs to completion and the handle is always dropped;
    /// the first error hit along the way is returned. Closing a closed
    /// session is an `InvalidState` error.
    pub fn close(&self) -> Result<(), SdrError> {
        let mut inner = self.inner.lock();
        if inner.state.is_closed() {
            return Err(SdrError::invalid_state("close", inner.state));
        }

        let mut first_error = None;

        if inner.state.is_streaming() {
            if let Err(e) = self.stop_stream(&mut inner) {
                log::warn!("[{}] implicit rx stop during close failed: {}", self.label, e);
                first_error = Some(e);
            }
        }
        if inner.stop_pending {
            if let Err(e) = inner.settle_pending_stop(&self.label) {
                log::warn!("[{}] pending rx stop failed during close: {}", self.label, e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(mut handle) = inner.handle.take() {
            if let Err(e) = handle.close() {
                log::warn!("[{}] driver close failed: {}", self.label, e);
                first_error.get_or_insert(SdrError::Driver(e));
            }
        }

        inner.state = SessionState::Closed;
        inner.transfer_buffer_size = None;
        inner.stop_pending = false;
        drop(inner.lease.take());
        drop(inner);

        log::info!("[{}] session closed", self.label);
        self.notify_state(SessionState::Closed);
        first_error.map_or(Ok(()), Err)
    }

    // --- Internal helpers ---

    fn configure_with(
        &self,
        operation: &str,
        parameter: ConfigParameter,
        apply: impl FnOnce(&mut dyn DeviceHandle) -> Result<(), DriverError>,
    ) -> Result<(), SdrError> {
        let mut inner = self.inner.lock();
        inner.require_open(operation)?;
        apply(inner.settled_handle(operation, &self.label)?).map_err(SdrError::config(parameter))?;
        log::debug!("[{}] {} ok", self.label, operation);
        Ok(())
    }

    /// Driver stop, then engine disarm. The disarm runs even if the driver
    /// stop fails, so the callback is quiesced either way.
    fn stop_stream(&self, inner: &mut SessionInner) -> Result<(), SdrError> {
        self.engine.begin_stop();
        let stop_result = match inner.handle_mut("stop_rx") {
            Ok(handle) => handle.stop_rx(),
            Err(_) => Ok(()),
        };
        let fault = self.engine.disarm();

        match stop_result {
            Err(e) => {
                inner.stop_pending = true;
                log::error!("[{}] driver rx stop failed: {}", self.label, e);
                if let Some(fault) = fault {
                    log::error!("[{}] superseded callback fault: {}", self.label, fault);
                }
                Err(SdrError::StreamStop(e))
            }
            Ok(()) => fault.map_or(Ok(()), Err),
        }
    }

    fn notify_state(&self, state: SessionState) {
        log::debug!("[{}] state → {}", self.label, state);
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_state_changed(&state);
        }
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("serial_number", &self.descriptor.serial_number)
            .field("state", &self.inner.try_lock().map(|inner| inner.state))
            .finish()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.inner.get_mut().state.is_closed() {
            return;
        }
        log::warn!("[{}] session dropped without close, closing", self.label);
        if let Err(e) = self.close() {
            log::warn!("[{}] close on drop failed: {}", self.label, e);
        }
    }
}
