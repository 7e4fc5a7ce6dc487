pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod state;
