//! `MchatConfig`: programmatic engine configuration, per SPEC_FULL §1.1/§6.3.
//!
//! Grounded on `src/main.rs`'s `Args`/`NetConfig` pattern — a plain struct
//! with a `Default` impl, constructed via field update syntax rather than a
//! builder, the way `NetConfig { listen_port, data_dir, ..Default::default() }`
//! is built there.

use std::path::Path;

use crate::channel::CDSC_INTERVAL_SECS;
use crate::peer::KEEPALIVE_INTERVAL_SECS;
use crate::MchatError;

#[derive(Debug, Clone)]
pub struct MchatConfig {
    /// Overrides the randomly generated `NoNick<u32>` nickname.
    pub nickname: Option<String>,
    /// Start the engine with stealth mode already enabled.
    pub stealth_at_startup: bool,
    /// Keepalive interval (default 3s, §6.1).
    pub keepalive_interval_secs: u64,
    /// CDSC beacon interval (default 10s, §6.1).
    pub cdsc_interval_secs: u64,
}

impl Default for MchatConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            stealth_at_startup: false,
            keepalive_interval_secs: KEEPALIVE_INTERVAL_SECS,
            cdsc_interval_secs: CDSC_INTERVAL_SECS,
        }
    }
}

impl MchatConfig {
    /// Reserved INI-style (`key = value`) configuration file loader (§6.3).
    /// The original source's `mchat_config_parse` is declared but its
    /// semantics are left undefined by the spec; this crate keeps the shape
    /// reserved without silently no-op'ing.
    pub fn from_ini_file(_path: impl AsRef<Path>) -> Result<Self, MchatError> {
        Err(MchatError::ConfigUnsupported)
    }
}
