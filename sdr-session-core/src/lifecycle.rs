//! Process-wide driver initialization, reference counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::{DriverError, SdrError};
use crate::registry;
use crate::session::device::DeviceSession;
use crate::traits::hardware_driver::HardwareDriver;

/// Counts a session opened through a `DriverLifecycle` until it is closed.
pub(crate) struct SessionLease {
    open_sessions: Arc<AtomicUsize>,
}

impl SessionLease {
    fn acquire(open_sessions: &Arc<AtomicUsize>) -> Self {
        open_sessions.fetch_add(1, Ordering::SeqCst);
        Self {
            open_sessions: Arc::clone(open_sessions),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reference-counted init/exit around a `HardwareDriver`, and the entry
/// point for enumeration and opening sessions.
///
/// `init` initializes the driver on the first call, `exit` tears it down on
/// the last. Share one instance (behind an `Arc`) per process; separate
/// instances are independent, which keeps tests isolated.
pub struct DriverLifecycle {
    driver: Arc<dyn HardwareDriver>,
    ref_count: Mutex<usize>,
    open_sessions: Arc<AtomicUsize>,
}

impl DriverLifecycle {
    pub fn new(driver: Arc<dyn HardwareDriver>) -> Self {
        Self {
            driver,
            ref_count: Mutex::new(0),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn init(&self) -> Result<(), SdrError> {
        let mut count = self.ref_count.lock();
        if *count == 0 {
            self.driver.init().map_err(SdrError::Driver)?;
            log::info!("driver initialized");
        }
        *count += 1;
        Ok(())
    }

    /// Drop one reference. The last one tears the driver down, and is
    /// refused while sessions opened here are still open.
    pub fn exit(&self) -> Result<(), SdrError> {
        let mut count = self.ref_count.lock();
        match *count {
            0 => Err(SdrError::InvalidState("exit without matching init".into())),
            1 => {
                let open = self.open_sessions.load(Ordering::SeqCst);
                if open > 0 {
                    return Err(SdrError::InvalidState(format!(
                        "exit with {} session(s) still open",
                        open
                    )));
                }
                self.driver.exit().map_err(SdrError::Driver)?;
                *count = 0;
                log::info!("driver shut down");
                Ok(())
            }
            _ => {
                *count -= 1;
                Ok(())
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        *self.ref_count.lock() > 0
    }

    pub fn ref_count(&self) -> usize {
        *self.ref_count.lock()
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, SdrError> {
        self.require_initialized("list_devices")?;
        registry::list_devices(self.driver.as_ref())
    }

    /// Open the first listed device.
    pub fn open(&self) -> Result<DeviceSession, SdrError> {
        let first = self
            .list_devices()?
            .into_iter()
            .next()
            .ok_or(SdrError::Open(DriverError::NoDevice))?;
        self.open_descriptor(first)
    }

    /// Open the device whose serial number matches exactly. An unknown
    /// serial fails with `NotFound` without a driver open call.
    pub fn open_by_serial(&self, serial: &str) -> Result<DeviceSession, SdrError> {
        let devices = self.list_devices()?;
        let descriptor = registry::find_by_serial(&devices, serial)
            .cloned()
            .ok_or_else(|| SdrError::NotFound {
                serial: serial.to_string(),
            })?;
        self.open_descriptor(descriptor)
    }

    /// Open `descriptor`. The reference count stays locked until the lease
    /// is taken, so a concurrent final `exit` either runs first or sees the
    /// new session.
    pub fn open_descriptor(&self, descriptor: DeviceDescriptor) -> Result<DeviceSession, SdrError> {
        let count = self.ref_count.lock();
        if *count == 0 {
            return Err(SdrError::invalid_state("open", "driver not initialized"));
        }
        let handle = self.driver.open(&descriptor).map_err(|e| {
            log::error!("failed to open {}: {}", descriptor.serial_number, e);
            SdrError::Open(e)
        })?;
        let lease = SessionLease::acquire(&self.open_sessions);
        drop(count);
        Ok(DeviceSession::new(descriptor, handle, lease))
    }

    fn require_initialized(&self, operation: &str) -> Result<(), SdrError> {
        if !self.is_initialized() {
            return Err(SdrError::invalid_state(operation, "driver not initialized"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::testing::ScriptedDriver;

    fn lifecycle(serials: &[&str]) -> (Arc<ScriptedDriver>, DriverLifecycle) {
        let driver = ScriptedDriver::with_serials(serials);
        let lifecycle = DriverLifecycle::new(driver.clone());
        (driver, lifecycle)
    }

    #[test]
    fn init_and_exit_are_reference_counted() {
        let (driver, lifecycle) = lifecycle(&["a"]);
        lifecycle.init().unwrap();
        lifecycle.init().unwrap();
        assert_eq!(lifecycle.ref_count(), 2);

        lifecycle.exit().unwrap();
        assert!(lifecycle.is_initialized());
        lifecycle.exit().unwrap();
        assert!(!lifecycle.is_initialized());

        assert_eq!(driver.calls(), ["init", "exit"]);
    }

    #[test]
    fn exit_without_init_fails() {
        let (_driver, lifecycle) = lifecycle(&[]);
        assert!(lifecycle.exit().unwrap_err().is_invalid_state());
    }

    #[test]
    fn reinit_after_exit() {
        let (driver, lifecycle) = lifecycle(&[]);
        lifecycle.init().unwrap();
        lifecycle.exit().unwrap();
        lifecycle.init().unwrap();
        assert_eq!(driver.calls(), ["init", "exit", "init"]);
    }

    #[test]
    fn failed_driver_exit_keeps_reference() {
        let (driver, lifecycle) = lifecycle(&[]);
        lifecycle.init().unwrap();
        driver.faults().fail_exit = true;
        assert!(matches!(lifecycle.exit(), Err(SdrError::Driver(_))));
        assert!(lifecycle.is_initialized());

        driver.faults().fail_exit = false;
        lifecycle.exit().unwrap();
    }

    #[test]
    fn requires_init() {
        let (driver, lifecycle) = lifecycle(&["a"]);
        assert!(lifecycle.list_devices().unwrap_err().is_invalid_state());
        assert!(lifecycle.open().unwrap_err().is_invalid_state());
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn open_with_no_devices_is_open_error() {
        let (_driver, lifecycle) = lifecycle(&[]);
        lifecycle.init().unwrap();
        assert!(lifecycle.list_devices().unwrap().is_empty());
        assert!(matches!(lifecycle.open(), Err(SdrError::Open(DriverError::NoDevice))));
    }

    #[test]
    fn open_failure_is_open_error() {
        let (driver, lifecycle) = lifecycle(&["a"]);
        lifecycle.init().unwrap();
        driver.faults().fail_open = true;
        assert!(matches!(lifecycle.open(), Err(SdrError::Open(DriverError::Busy))));
        assert_eq!(lifecycle.open_sessions(), 0);
    }

    #[test]
    fn unknown_serial_never_reaches_driver_open() {
        let (driver, lifecycle) = lifecycle(&["a", "b"]);
        lifecycle.init().unwrap();
        assert_eq!(
            lifecycle.open_by_serial("c").err(),
            Some(SdrError::NotFound { serial: "c".into() })
        );
        assert!(driver.calls().iter().all(|c| !c.starts_with("open")));
    }

    #[test]
    fn open_by_serial_selects_matching_unit() {
        let (driver, lifecycle) = lifecycle(&["a", "b"]);
        lifecycle.init().unwrap();
        let session = lifecycle.open_by_serial("b").unwrap();
        assert_eq!(session.descriptor().serial_number, "b");
        assert_eq!(session.descriptor().index, 1);
        assert_eq!(driver.calls_for("b"), ["open:b"]);
        session.close().unwrap();
    }

    #[test]
    fn last_exit_refused_while_sessions_open() {
        let (_driver, lifecycle) = lifecycle(&["a"]);
        lifecycle.init().unwrap();
        let session = lifecycle.open().unwrap();
        assert_eq!(lifecycle.open_sessions(), 1);

        assert!(lifecycle.exit().unwrap_err().is_invalid_state());
        assert!(lifecycle.is_initialized());

        session.close().unwrap();
        assert_eq!(lifecycle.open_sessions(), 0);
        lifecycle.exit().unwrap();
    }

    #[test]
    fn exit_waits_for_open_in_progress() {
        let (driver, lifecycle) = lifecycle(&["a"]);
        let lifecycle = Arc::new(lifecycle);
        lifecycle.init().unwrap();
        driver.faults().open_delay = Some(Duration::from_millis(200));

        let opener = {
            let lifecycle = Arc::clone(&lifecycle);
            thread::spawn(move || lifecycle.open_by_serial("a"))
        };
        while !driver.calls().iter().any(|c| c == "open:a") {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(lifecycle.exit().unwrap_err().is_invalid_state());
        assert!(lifecycle.is_initialized());
        assert!(!driver.calls().iter().any(|c| c == "exit"));

        let session = opener.join().unwrap().unwrap();
        assert_eq!(lifecycle.open_sessions(), 1);
        session.close().unwrap();
        lifecycle.exit().unwrap();
        assert_eq!(driver.calls().last().map(String::as_str), Some("exit"));
    }

    #[test]
    fn dropped_session_releases_lease() {
        let (driver, lifecycle) = lifecycle(&["a"]);
        lifecycle.init().unwrap();
        drop(lifecycle.open().unwrap());
        assert_eq!(lifecycle.open_sessions(), 0);
        assert_eq!(driver.calls_for("a"), ["open:a", "close:a"]);
    }
}
