pub mod config;
pub mod debug_log;
pub mod detector;
pub mod error;
pub mod host;
