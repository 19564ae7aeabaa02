//! # satguard-core
//!
//! Core types, configuration, and utilities for SatGuard.
//!
//! This crate provides shared functionality used by the vault crate:
//!
//! - **Configuration**: Loading, validation, and persistence of config files
//! - **Types**: Device and record identifiers, platform tags
//! - **Utilities**: Path resolution, environment handling, zeroizing secrets

pub mod config;
pub mod encoding;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretBytes;
pub use types::*;
