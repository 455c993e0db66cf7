//! InfluxDB client for whisper-migrate.

pub mod admin;
pub mod client;
pub mod config;
pub mod health;
pub mod line;
pub mod write;

pub use admin::TargetAdmin;
pub use client::*;
pub use config::*;
pub use write::*;
