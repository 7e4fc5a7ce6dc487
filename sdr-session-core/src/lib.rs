//! # sdr-session-core
//!
//! Platform-agnostic SDR session core.
//!
//! Enumerates radios, opens sessions against them, configures the RF front
//! end and runs the asynchronous RX pipeline with strict start/stop
//! semantics. Native drivers implement the `HardwareDriver` and
//! `DeviceHandle` traits and plug in through `DriverLifecycle`.
//!
//! ## Architecture
//!
//! ```text
//! sdr-session-core (this crate)
//! ├── traits/       ← HardwareDriver, DeviceHandle, SessionObserver
//! ├── models/       ← SdrError, SessionState, DeviceDescriptor, RadioConfiguration, etc.
//! ├── registry      ← device enumeration, serial lookup
//! ├── lifecycle     ← DriverLifecycle (ref-counted init/exit, open entry points)
//! ├── session/      ← DeviceSession, StreamEngine
//! └── storage/      ← JSON radio configuration files
//! ```
//!
//! ## Usage
//! ```ignore
//! let lifecycle = DriverLifecycle::new(driver);
//! lifecycle.init()?;
//! let session = lifecycle.open_by_serial("0000000000000000f77c60dc2f5a7a1f")?;
//! session.configure(&RadioConfiguration::default())?;
//! session.start_rx(|buf| { sink.extend_from_slice(buf); Ok(()) })?;
//! // ...
//! session.stop_rx()?;
//! session.close()?;
//! lifecycle.exit()?;
//! ```

pub mod lifecycle;
pub mod models;
pub mod registry;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use lifecycle::DriverLifecycle;
pub use models::config::RadioConfiguration;
pub use models::descriptor::{BoardId, DeviceDescriptor};
pub use models::diagnostics::StreamDiagnostics;
pub use models::error::{ConfigParameter, DriverError, SdrError};
pub use models::state::{SessionState, StreamState};
pub use session::device::DeviceSession;
pub use session::stream_engine::{RxCallback, RxError};
pub use storage::config_file::{read_config, write_config};
pub use traits::hardware_driver::{DeviceHandle, HardwareDriver, TransferCallback, TransferControl};
pub use traits::session_observer::SessionObserver;
