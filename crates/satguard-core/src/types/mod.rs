//! Common type definitions shared across SatGuard crates.

mod identifiers;
mod platform;

pub use identifiers::*;
pub use platform::*;
