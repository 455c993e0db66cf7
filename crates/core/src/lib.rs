//! Core types, conversion rules, and error taxonomy for whisper-migrate.

pub mod error;
pub mod limits;
pub mod point;
pub mod retention;
pub mod rules;
pub mod series;

pub use error::{Error, ErrorClass, Result};
pub use point::*;
pub use retention::*;
pub use rules::*;
pub use series::*;
