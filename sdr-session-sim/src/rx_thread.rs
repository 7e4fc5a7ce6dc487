//! Simulated USB RX transfer loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sdr_session_core::{DriverError, TransferCallback, TransferControl};

/// A running RX thread for one unit.
pub(crate) struct RxWorker {
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl RxWorker {
    pub(crate) fn spawn(
        serial: &str,
        transfer_size: usize,
        interval: Duration,
        callback: TransferCallback,
    ) -> Result<Self, DriverError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("sim-rx-{}", serial))
            .spawn(move || rx_loop(&flag, transfer_size, interval, &callback))
            .map_err(|e| DriverError::Other(format!("failed to spawn rx thread: {}", e)))?;
        Ok(Self { running, handle })
    }

    /// Whether the loop is still issuing transfers.
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    pub(crate) fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    /// Stop issuing transfers and join the thread.
    pub(crate) fn stop(self) -> Result<(), DriverError> {
        self.running.store(false, Ordering::SeqCst);
        self.handle
            .join()
            .map_err(|_| DriverError::Other("rx thread panicked".into()))
    }
}

/// One transfer per iteration. The first eight bytes of every buffer carry
/// the little-endian transfer sequence number; the rest is a byte ramp.
fn rx_loop(running: &AtomicBool, transfer_size: usize, interval: Duration, callback: &TransferCallback) {
    let mut buffer = vec![0u8; transfer_size];
    let mut sequence: u64 = 0;

    while running.load(Ordering::SeqCst) {
        fill_transfer(&mut buffer, sequence);
        if callback(&buffer) == TransferControl::Stop {
            log::debug!("rx callback requested stop after transfer {}", sequence);
            running.store(false, Ordering::SeqCst);
            break;
        }
        sequence += 1;
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
}

pub(crate) fn fill_transfer(buffer: &mut [u8], sequence: u64) {
    let header = sequence.to_le_bytes();
    let split = header.len().min(buffer.len());
    buffer[..split].copy_from_slice(&header[..split]);
    for (i, byte) in buffer[split..].iter_mut().enumerate() {
        *byte = (sequence as usize).wrapping_add(i) as u8;
    }
}

/// Sequence number stamped by the simulated RX thread, if the buffer is
/// long enough to carry one.
pub fn transfer_sequence(buffer: &[u8]) -> Option<u64> {
    let header: [u8; 8] = buffer.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(header))
}
