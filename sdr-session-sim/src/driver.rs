//! In-process driver standing in for libhackrf.
//!
//! Units are plain structs behind `parking_lot::Mutex`; streaming units run a
//! real RX thread per unit, so session code sees the same threading as with
//! hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use sdr_session_core::{
    DeviceDescriptor, DeviceHandle, DriverError, HardwareDriver, TransferCallback,
};

use crate::device::{RadioSettings, SimDevice};
use crate::limits::{self, LNA_GAIN_MAX_DB, LNA_GAIN_STEP_DB, VGA_GAIN_MAX_DB, VGA_GAIN_STEP_DB};
use crate::rx_thread::RxWorker;

/// One-shot failures armed by tests. Each flag is cleared when it fires.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    pub fail_enumeration: bool,
    pub fail_next_open: bool,
    pub fail_next_start: bool,
    pub fail_next_stop: bool,
}

/// Number of driver calls seen, by entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimCalls {
    pub init: u32,
    pub exit: u32,
    pub list_devices: u32,
    pub open: u32,
    pub close: u32,
    pub configure: u32,
    pub start_rx: u32,
    pub stop_rx: u32,
}

struct Unit {
    device: SimDevice,
    is_open: bool,
    settings: RadioSettings,
    rx: Option<RxWorker>,
}

impl Unit {
    fn is_streaming(&self) -> bool {
        self.rx.as_ref().is_some_and(RxWorker::is_running)
    }
}

struct DriverShared {
    initialized: AtomicBool,
    units: Mutex<Vec<Arc<Mutex<Unit>>>>,
    faults: Mutex<SimFaults>,
    calls: Mutex<SimCalls>,
}

impl DriverShared {
    fn count(&self, f: impl FnOnce(&mut SimCalls)) {
        f(&mut *self.calls.lock());
    }

    fn require_initialized(&self) -> Result<(), DriverError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(DriverError::NotInitialized);
        }
        Ok(())
    }

    fn take_fault(&self, select: impl FnOnce(&mut SimFaults) -> &mut bool) -> bool {
        let mut faults = self.faults.lock();
        std::mem::take(select(&mut *faults))
    }

    fn unit(&self, serial: &str) -> Option<Arc<Mutex<Unit>>> {
        self.units
            .lock()
            .iter()
            .find(|u| u.lock().device.serial_number == serial)
            .cloned()
    }
}

/// Simulated HackRF-class driver.
///
/// ```ignore
/// let driver = Arc::new(SimDriver::new(vec![SimDevice::hackrf_one("0000000000000000a06063c8234e925f")]));
/// let lifecycle = DriverLifecycle::new(driver.clone());
/// ```
pub struct SimDriver {
    shared: Arc<DriverShared>,
}

impl SimDriver {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let units = devices.into_iter().map(new_unit).collect();
        Self {
            shared: Arc::new(DriverShared {
                initialized: AtomicBool::new(false),
                units: Mutex::new(units),
                faults: Mutex::new(SimFaults::default()),
                calls: Mutex::new(SimCalls::default()),
            }),
        }
    }

    /// Hot-plug a unit. It shows up at the end of the next listing.
    pub fn attach(&self, device: SimDevice) {
        log::debug!("sim: attached {}", device.serial_number);
        self.shared.units.lock().push(new_unit(device));
    }

    /// Unplug a unit. An open handle to it keeps working against the
    /// detached state until closed.
    pub fn detach(&self, serial: &str) -> bool {
        let mut units = self.shared.units.lock();
        let before = units.len();
        units.retain(|u| u.lock().device.serial_number != serial);
        units.len() != before
    }

    pub fn faults(&self) -> parking_lot::MutexGuard<'_, SimFaults> {
        self.shared.faults.lock()
    }

    pub fn calls(&self) -> SimCalls {
        self.shared.calls.lock().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    pub fn is_open(&self, serial: &str) -> bool {
        self.shared.unit(serial).is_some_and(|u| u.lock().is_open)
    }

    /// Whether the unit's RX thread is issuing transfers.
    pub fn is_streaming(&self, serial: &str) -> bool {
        self.shared.unit(serial).is_some_and(|u| u.lock().is_streaming())
    }

    pub fn settings(&self, serial: &str) -> Option<RadioSettings> {
        self.shared.unit(serial).map(|u| u.lock().settings.clone())
    }
}

fn new_unit(device: SimDevice) -> Arc<Mutex<Unit>> {
    Arc::new(Mutex::new(Unit {
        device,
        is_open: false,
        settings: RadioSettings::default(),
        rx: None,
    }))
}

impl HardwareDriver for SimDriver {
    fn init(&self) -> Result<(), DriverError> {
        self.shared.count(|c| c.init += 1);
        self.shared.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self) -> Result<(), DriverError> {
        self.shared.count(|c| c.exit += 1);
        self.shared.require_initialized()?;
        let busy = self.shared.units.lock().iter().any(|u| u.lock().is_open);
        if busy {
            return Err(DriverError::Busy);
        }
        self.shared.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, DriverError> {
        self.shared.count(|c| c.list_devices += 1);
        self.shared.require_initialized()?;
        if self.shared.faults.lock().fail_enumeration {
            return Err(DriverError::Io("LIBUSB_ERROR_IO".into()));
        }

        let units = self.shared.units.lock();
        Ok(units
            .iter()
            .enumerate()
            .map(|(index, unit)| {
                let unit = unit.lock();
                DeviceDescriptor {
                    serial_number: unit.device.serial_number.clone(),
                    index,
                    board_id: unit.device.board_id,
                    usb_product_id: unit.device.usb_product_id(),
                }
            })
            .collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, DriverError> {
        self.shared.count(|c| c.open += 1);
        self.shared.require_initialized()?;
        if self.shared.take_fault(|f| &mut f.fail_next_open) {
            return Err(DriverError::PermissionDenied);
        }

        let unit = self
            .shared
            .unit(&descriptor.serial_number)
            .ok_or(DriverError::NoDevice)?;
        {
            let mut guard = unit.lock();
            if guard.is_open {
                return Err(DriverError::Busy);
            }
            guard.is_open = true;
            guard.settings = RadioSettings::default();
        }

        Ok(Box::new(SimHandle {
            serial: descriptor.serial_number.clone(),
            unit,
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

/// Handle to an opened simulated unit.
struct SimHandle {
    serial: String,
    unit: Arc<Mutex<Unit>>,
    shared: Arc<DriverShared>,
    closed: bool,
}

impl SimHandle {
    fn require_usable(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Other(format!("handle for {} already closed", self.serial)));
        }
        Ok(())
    }

    /// Run a settings update, refused while the RX thread is running.
    fn configure(&mut self, update: impl FnOnce(&mut RadioSettings)) -> Result<(), DriverError> {
        self.shared.count(|c| c.configure += 1);
        self.require_usable()?;
        let mut unit = self.unit.lock();
        if unit.is_streaming() {
            return Err(DriverError::Busy);
        }
        update(&mut unit.settings);
        Ok(())
    }

    fn release(&mut self) -> Result<(), DriverError> {
        let worker = {
            let mut unit = self.unit.lock();
            unit.is_open = false;
            unit.rx.take()
        };
        self.closed = true;
        match worker {
            Some(worker) => worker.stop(),
            None => Ok(()),
        }
    }
}

impl DeviceHandle for SimHandle {
    fn close(&mut self) -> Result<(), DriverError> {
        self.shared.count(|c| c.close += 1);
        self.require_usable()?;
        self.release()
    }

    fn version(&self) -> Result<String, DriverError> {
        self.require_usable()?;
        Ok(self.unit.lock().device.firmware_version.clone())
    }

    fn set_sample_rate(&mut self, hz: f64) -> Result<(), DriverError> {
        let setting = limits::sample_rate_setting(hz)?;
        self.configure(|s| s.sample_rate_hz = setting.achieved_hz())
    }

    fn set_freq(&mut self, hz: f64) -> Result<(), DriverError> {
        let hz = limits::check_frequency(hz)?;
        self.configure(|s| s.frequency_hz = hz)
    }

    fn set_lna_gain(&mut self, db: u32) -> Result<(), DriverError> {
        let db = limits::check_gain(db, LNA_GAIN_MAX_DB, LNA_GAIN_STEP_DB, "LNA")?;
        self.configure(|s| s.lna_gain_db = db)
    }

    fn set_vga_gain(&mut self, db: u32) -> Result<(), DriverError> {
        let db = limits::check_gain(db, VGA_GAIN_MAX_DB, VGA_GAIN_STEP_DB, "VGA")?;
        self.configure(|s| s.vga_gain_db = db)
    }

    fn set_amp_enable(&mut self, enable: bool) -> Result<(), DriverError> {
        self.configure(|s| s.amp_enable = enable)
    }

    fn transfer_buffer_size(&self) -> Result<usize, DriverError> {
        self.require_usable()?;
        Ok(self.unit.lock().device.transfer_buffer_size)
    }

    fn start_rx(&mut self, callback: TransferCallback) -> Result<(), DriverError> {
        self.shared.count(|c| c.start_rx += 1);
        self.require_usable()?;
        if self.shared.take_fault(|f| &mut f.fail_next_start) {
            return Err(DriverError::Io("no free transfer buffers".into()));
        }

        let mut unit = self.unit.lock();
        if unit.is_streaming() {
            return Err(DriverError::Busy);
        }
        // A worker that stopped on its own (callback asked) is reaped here.
        if let Some(finished) = unit.rx.take() {
            finished.stop()?;
        }
        let worker = RxWorker::spawn(
            &self.serial,
            unit.device.transfer_buffer_size,
            unit.device.buffer_interval,
            callback,
        )?;
        unit.rx = Some(worker);
        log::debug!("sim: {} rx started", self.serial);
        Ok(())
    }

    fn stop_rx(&mut self) -> Result<(), DriverError> {
        self.shared.count(|c| c.stop_rx += 1);
        self.require_usable()?;
        if self.shared.take_fault(|f| &mut f.fail_next_stop) {
            return Err(DriverError::Io("LIBUSB_ERROR_TIMEOUT".into()));
        }

        let worker = {
            let mut unit = self.unit.lock();
            if unit.rx.as_ref().is_some_and(RxWorker::is_current_thread) {
                return Err(DriverError::Other("stop_rx called from the rx thread".into()));
            }
            unit.rx.take()
        };
        // Joined outside the unit lock: the RX thread may be inside the
        // callback, which can query driver state.
        if let Some(worker) = worker {
            worker.stop()?;
            log::debug!("sim: {} rx stopped", self.serial);
        }
        Ok(())
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.release() {
                log::warn!("sim: releasing {} on drop failed: {}", self.serial, e);
            }
        }
    }
}
