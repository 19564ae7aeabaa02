//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Common environment variable names.
pub mod vars {
    /// SatGuard data directory override.
    pub const SATGUARD_DATA_DIR: &str = "SATGUARD_DATA_DIR";

    /// SatGuard log filter.
    pub const SATGUARD_LOG: &str = "SATGUARD_LOG";
}
