pub mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod fingerprint;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod tracks;

pub use error::{FingerprintError, Result, SmartError, SmartExpectedError};

#[cfg(test)]
mod testing;

#[cfg(test)]
mod commands_test;
