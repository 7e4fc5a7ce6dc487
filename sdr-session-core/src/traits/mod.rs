pub mod hardware_driver;
pub mod session_observer;
