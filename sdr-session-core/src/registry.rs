//! Device enumeration. Holds no state: every call asks the driver.

use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::SdrError;
use crate::traits::hardware_driver::HardwareDriver;

/// List attached units in driver order. No devices is an empty list, not an error.
pub fn list_devices(driver: &dyn HardwareDriver) -> Result<Vec<DeviceDescriptor>, SdrError> {
    let devices = driver.list_devices().map_err(SdrError::Enumeration)?;
    log::debug!("enumerated {} device(s)", devices.len());
    Ok(devices)
}

/// Exact, case-sensitive serial number match.
pub fn find_by_serial<'a>(
    devices: &'a [DeviceDescriptor],
    serial: &str,
) -> Option<&'a DeviceDescriptor> {
    devices.iter().find(|d| d.serial_number == serial)
}
