//! Platform tags recorded on device records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system family of an enrolled device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTag {
    Ios,
    TvOs,
    MacOs,
    Linux,
    Windows,
    Other,
}

impl PlatformTag {
    /// Platform of the running binary.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            PlatformTag::Ios
        } else if cfg!(target_os = "tvos") {
            PlatformTag::TvOs
        } else if cfg!(target_os = "macos") {
            PlatformTag::MacOs
        } else if cfg!(target_os = "linux") {
            PlatformTag::Linux
        } else if cfg!(target_os = "windows") {
            PlatformTag::Windows
        } else {
            PlatformTag::Other
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformTag::Ios => "iOS",
            PlatformTag::TvOs => "tvOS",
            PlatformTag::MacOs => "macOS",
            PlatformTag::Linux => "Linux",
            PlatformTag::Windows => "Windows",
            PlatformTag::Other => "other",
        };
        f.write_str(name)
    }
}
