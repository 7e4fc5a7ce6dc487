use std::time::Duration;

use sdr_session_core::BoardId;

/// Default USB transfer size of HackRF firmware, in bytes.
pub const DEFAULT_TRANSFER_BUFFER_SIZE: usize = 262_144;

/// A virtual unit attached to a `SimDriver`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDevice {
    pub serial_number: String,
    pub board_id: BoardId,
    pub firmware_version: String,
    pub transfer_buffer_size: usize,
    /// Delay between completed transfers on the RX thread.
    pub buffer_interval: Duration,
}

impl SimDevice {
    pub fn hackrf_one(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            board_id: BoardId::HackRfOne,
            firmware_version: "2024.02.1".into(),
            transfer_buffer_size: DEFAULT_TRANSFER_BUFFER_SIZE,
            buffer_interval: Duration::from_millis(10),
        }
    }

    pub fn with_transfer_buffer_size(mut self, size: usize) -> Self {
        self.transfer_buffer_size = size;
        self
    }

    pub fn with_buffer_interval(mut self, interval: Duration) -> Self {
        self.buffer_interval = interval;
        self
    }

    pub fn usb_product_id(&self) -> Option<u16> {
        match self.board_id {
            BoardId::Jawbreaker => Some(0x604b),
            BoardId::HackRfOne => Some(0x6089),
            BoardId::Rad1o => Some(0xcc15),
            BoardId::Unknown => None,
        }
    }
}

/// Front-end settings as last programmed into a simulated unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioSettings {
    pub sample_rate_hz: f64,
    pub frequency_hz: u64,
    pub lna_gain_db: u32,
    pub vga_gain_db: u32,
    pub amp_enable: bool,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10e6,
            frequency_hz: 900_000_000,
            lna_gain_db: 0,
            vga_gain_db: 0,
            amp_enable: false,
        }
    }
}
