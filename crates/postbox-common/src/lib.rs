//! Postbox Common - Shared types and utilities
//!
//! This crate provides the configuration, error type and small value types
//! shared by the storage layer, the protocol sessions and the daemons.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
