//! # sdr-session-sim
//!
//! Simulated HackRF-class backend for sdr-session-kit.
//!
//! Provides:
//! - `SimDriver`: `HardwareDriver` over a set of virtual units, with hot-plug,
//!   exclusive open, fault injection and call accounting
//! - `SimDevice`: description of one virtual unit
//! - `limits`: HackRF One front-end limits and sample rate divider search
//!
//! Each streaming unit runs its own RX thread (`sim-rx-<serial>`) that hands
//! `transfer_buffer_size` byte buffers to the session's trampoline, stamped
//! with a transfer sequence number (see `transfer_sequence`).
//!
//! ## Usage
//! ```ignore
//! use sdr_session_core::DriverLifecycle;
//! use sdr_session_sim::{SimDevice, SimDriver};
//!
//! let driver = Arc::new(SimDriver::new(vec![SimDevice::hackrf_one("0000000000000000a06063c8234e925f")]));
//! let lifecycle = DriverLifecycle::new(driver.clone());
//! lifecycle.init()?;
//! let session = lifecycle.open()?;
//! ```

pub mod device;
pub mod driver;
pub mod limits;
mod rx_thread;

pub use device::{RadioSettings, SimDevice, DEFAULT_TRANSFER_BUFFER_SIZE};
pub use driver::{SimCalls, SimDriver, SimFaults};
pub use rx_thread::transfer_sequence;
