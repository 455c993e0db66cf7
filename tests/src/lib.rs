//! Shared helpers for the whisper-migrate integration tests.
//!
//! Writes and administrative statements go to in-memory mocks that
//! implement the same traits as the InfluxDB client, so every test runs the
//! production pipeline without a database.

pub mod fixtures;
pub mod mocks;
pub mod setup;
