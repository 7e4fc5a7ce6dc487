//! Scripted driver for unit tests. Buffers are pushed by the test itself,
//! standing in for the driver's I/O thread.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::models::descriptor::{BoardId, DeviceDescriptor};
use crate::models::error::DriverError;
use crate::traits::hardware_driver::{DeviceHandle, HardwareDriver, TransferCallback, TransferControl};

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub fail_list: bool,
    pub fail_open: bool,
    pub fail_start: bool,
    /// Number of upcoming `stop_rx` calls that fail.
    pub fail_stop: usize,
    pub fail_close: bool,
    pub fail_exit: bool,
    /// Time `open` spends inside the driver after recording the call.
    pub open_delay: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    journal: Mutex<Vec<String>>,
    faults: Mutex<Faults>,
    streams: Mutex<HashMap<String, TransferCallback>>,
}

impl Shared {
    fn record(&self, entry: String) {
        self.journal.lock().push(entry);
    }
}

pub(crate) struct ScriptedDriver {
    devices: Vec<DeviceDescriptor>,
    shared: Arc<Shared>,
}

impl ScriptedDriver {
    pub fn with_serials(serials: &[&str]) -> Arc<Self> {
        let devices = serials
            .iter()
            .enumerate()
            .map(|(index, serial)| DeviceDescriptor {
                serial_number: serial.to_string(),
                index,
                board_id: BoardId::HackRfOne,
                usb_product_id: Some(0x6089),
            })
            .collect();
        Arc::new(Self {
            devices,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.journal.lock().clone()
    }

    pub fn calls_for(&self, serial: &str) -> Vec<String> {
        let suffix = format!(":{}", serial);
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }

    pub fn faults(&self) -> MutexGuard<'_, Faults> {
        self.shared.faults.lock()
    }

    /// Trampoline currently registered for `serial`, if streaming.
    pub fn trampoline(&self, serial: &str) -> Option<TransferCallback> {
        self.shared.streams.lock().get(serial).cloned()
    }

    /// Push one buffer the way the I/O thread would.
    pub fn deliver(&self, serial: &str, buffer: &[u8]) -> Option<TransferControl> {
        let trampoline = self.trampoline(serial)?;
        let control = trampoline(buffer);
        if control == TransferControl::Stop {
            self.shared.streams.lock().remove(serial);
        }
        Some(control)
    }
}

impl HardwareDriver for ScriptedDriver {
    fn init(&self) -> Result<(), DriverError> {
        self.shared.record("init".into());
        Ok(())
    }

    fn exit(&self) -> Result<(), DriverError> {
        self.shared.record("exit".into());
        if self.shared.faults.lock().fail_exit {
            return Err(DriverError::Other("exit refused".into()));
        }
        Ok(())
    }

    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, DriverError> {
        self.shared.record("list".into());
        if self.shared.faults.lock().fail_list {
            return Err(DriverError::Io("LIBUSB_ERROR_IO".into()));
        }
        Ok(self.devices.clone())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, DriverError> {
        self.shared.record(format!("open:{}", descriptor.serial_number));
        let delay = {
            let faults = self.shared.faults.lock();
            if faults.fail_open {
                return Err(DriverError::Busy);
            }
            faults.open_delay
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        Ok(Box::new(ScriptedHandle {
            serial: descriptor.serial_number.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ScriptedHandle {
    serial: String,
    shared: Arc<Shared>,
}

impl ScriptedHandle {
    fn record(&self, op: &str) {
        self.shared.record(format!("{}:{}", op, self.serial));
    }

    fn reject_if_streaming(&self) -> Result<(), DriverError> {
        if self.shared.streams.lock().contains_key(&self.serial) {
            return Err(DriverError::Busy);
        }
        Ok(())
    }
}

impl DeviceHandle for ScriptedHandle {
    fn close(&mut self) -> Result<(), DriverError> {
        self.record("close");
        if self.shared.faults.lock().fail_close {
            return Err(DriverError::Io("close failed".into()));
        }
        Ok(())
    }

    fn version(&self) -> Result<String, DriverError> {
        self.record("version");
        Ok("2024.02.1".into())
    }

    fn set_sample_rate(&mut self, _hz: f64) -> Result<(), DriverError> {
        self.record("set_sample_rate");
        self.reject_if_streaming()
    }

    fn set_freq(&mut self, _hz: f64) -> Result<(), DriverError> {
        self.record("set_freq");
        self.reject_if_streaming()
    }

    fn set_lna_gain(&mut self, db: u32) -> Result<(), DriverError> {
        self.record("set_lna_gain");
        self.reject_if_streaming()?;
        if db > 40 {
            return Err(DriverError::InvalidParameter(format!("LNA gain {} dB > 40 dB", db)));
        }
        Ok(())
    }

    fn set_vga_gain(&mut self, _db: u32) -> Result<(), DriverError> {
        self.record("set_vga_gain");
        self.reject_if_streaming()
    }

    fn set_amp_enable(&mut self, _enable: bool) -> Result<(), DriverError> {
        self.record("set_amp_enable");
        self.reject_if_streaming()
    }

    fn transfer_buffer_size(&self) -> Result<usize, DriverError> {
        self.record("transfer_buffer_size");
        Ok(262_144)
    }

    fn start_rx(&mut self, callback: TransferCallback) -> Result<(), DriverError> {
        self.record("start_rx");
        if self.shared.faults.lock().fail_start {
            return Err(DriverError::Io("no free transfers".into()));
        }
        self.shared.streams.lock().insert(self.serial.clone(), callback);
        Ok(())
    }

    fn stop_rx(&mut self) -> Result<(), DriverError> {
        self.record("stop_rx");
        {
            let mut faults = self.shared.faults.lock();
            if faults.fail_stop > 0 {
                faults.fail_stop -= 1;
                return Err(DriverError::Io("stop transfer timed out".into()));
            }
        }
        self.shared.streams.lock().remove(&self.serial);
        Ok(())
    }
}
