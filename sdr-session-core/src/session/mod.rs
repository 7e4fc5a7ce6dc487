pub mod device;
pub mod stream_engine;
