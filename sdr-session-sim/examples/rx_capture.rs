//! Stream from a simulated unit for a few seconds and report throughput.
//!
//! ```text
//! RUST_LOG=debug cargo run -p sdr-session-sim --example rx_capture -- [seconds]
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sdr_session_core::{DriverLifecycle, RadioConfiguration, SdrError};
use sdr_session_sim::{SimDevice, SimDriver};

fn main() -> Result<(), SdrError> {
    env_logger::init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);

    let driver = Arc::new(SimDriver::new(vec![
        SimDevice::hackrf_one("0000000000000000a06063c8234e925f"),
        SimDevice::hackrf_one("000000000000000075b068dc317e6d07"),
    ]));
    let lifecycle = DriverLifecycle::new(driver);
    lifecycle.init()?;

    let devices = lifecycle.list_devices()?;
    for device in &devices {
        println!("Device {}: {} ({:?})", device.index, device.serial_number, device.board_id);
    }
    let Some(first) = devices.first() else {
        println!("no devices attached");
        return lifecycle.exit();
    };

    let session = lifecycle.open_by_serial(&first.serial_number)?;
    println!("Firmware: {}", session.version()?);
    session.configure(&RadioConfiguration::default())?;
    println!("Transfer buffer size: {} bytes", session.transfer_buffer_size()?);

    let total = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&total);
    session.start_rx(move |buf: &[u8]| {
        counter.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    })?;
    thread::sleep(Duration::from_secs(seconds));
    session.stop_rx()?;

    let diagnostics = session.diagnostics();
    println!(
        "Rx total: {} bytes in {} buffers ({:.1} MB/s)",
        total.load(Ordering::Relaxed),
        diagnostics.buffers_delivered,
        diagnostics.bytes_delivered as f64 / seconds.max(1) as f64 / 1e6
    );

    session.close()?;
    lifecycle.exit()
}
