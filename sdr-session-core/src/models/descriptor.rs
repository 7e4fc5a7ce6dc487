use serde::{Deserialize, Serialize};

/// Board family reported by the driver for an attached unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardId {
    Jawbreaker,
    HackRfOne,
    Rad1o,
    Unknown,
}

/// Identity of a physical unit as listed by the driver.
///
/// Listing a device does not open it; the serial number is the stable key
/// for re-acquiring the same unit later with `open_by_serial`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub serial_number: String,
    pub index: usize,
    pub board_id: BoardId,
    /// USB product id, kept for display and backend lookups.
    pub usb_product_id: Option<u16>,
}
