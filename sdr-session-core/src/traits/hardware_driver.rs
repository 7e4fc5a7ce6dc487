use std::sync::Arc;

use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::DriverError;

/// What the driver should do after handing a buffer to the trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferControl {
    /// Keep issuing transfers.
    Continue,
    /// Stop issuing new transfers. Already completed transfers may still be
    /// handed over; the engine rejects them.
    Stop,
}

/// Trampoline invoked by the driver for every completed RX transfer.
///
/// Called on the driver's own I/O thread, one buffer at a time. The buffer
/// is only valid for the duration of the call.
pub type TransferCallback = Arc<dyn Fn(&[u8]) -> TransferControl + Send + Sync + 'static>;

/// Process-level entry points of a native radio driver.
///
/// Implemented by:
/// - `SimDriver` (sdr-session-sim)
/// - Future: a libhackrf binding, an nusb backend
pub trait HardwareDriver: Send + Sync {
    /// One-time library initialization. Called by `DriverLifecycle` on the
    /// first `init`.
    fn init(&self) -> Result<(), DriverError>;

    /// Library teardown. Called by `DriverLifecycle` on the last `exit`.
    fn exit(&self) -> Result<(), DriverError>;

    /// Currently attached units, in driver order.
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, DriverError>;

    /// Open a unit. The returned handle is owned by exactly one session.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, DriverError>;
}

/// An opened unit.
///
/// Configuration calls are rejected by the driver while RX is running;
/// `DeviceSession` never issues them in that state.
pub trait DeviceHandle: Send + Sync {
    /// Release the unit. No other call is issued on this handle afterwards.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Firmware version string.
    fn version(&self) -> Result<String, DriverError>;

    fn set_sample_rate(&mut self, hz: f64) -> Result<(), DriverError>;

    fn set_freq(&mut self, hz: f64) -> Result<(), DriverError>;

    fn set_lna_gain(&mut self, db: u32) -> Result<(), DriverError>;

    fn set_vga_gain(&mut self, db: u32) -> Result<(), DriverError>;

    fn set_amp_enable(&mut self, enable: bool) -> Result<(), DriverError>;

    /// Size in bytes of one USB transfer as delivered to the trampoline.
    fn transfer_buffer_size(&self) -> Result<usize, DriverError>;

    /// Arm transfers and start delivering buffers via `callback`.
    fn start_rx(&mut self, callback: TransferCallback) -> Result<(), DriverError>;

    /// Stop issuing transfers and wait for the I/O thread to wind down.
    fn stop_rx(&mut self) -> Result<(), DriverError>;
}
