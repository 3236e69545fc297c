//! Logging infrastructure for railbench
//!
//! Everything logs through `tracing`. This crate only decides where the
//! records end up and how they are rendered.

pub mod init;
pub mod timer;

pub use init::{init_logging, init_simple_tracing};
pub use timer::JstTimer;
