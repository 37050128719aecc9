//! Core types and utilities for the facever face-verification data tools.
//!
//! This crate provides the error type, the serde-backed configuration
//! structures and the logging/config helpers shared by the workspace tools.

pub mod cli;
pub mod config;
pub mod error;

pub use cli::*;
pub use config::*;
pub use error::{Error, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
