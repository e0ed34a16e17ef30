//! Browser backend configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Settle delay after the page reports ready, for late XHR rendering.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    pub headless: bool,
    /// Navigation and ready-state timeout.
    pub timeout: Duration,
    pub settle_delay: Duration,
    /// Explicit Chrome/Chromium binary; searched for when unset.
    pub executable: Option<PathBuf>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(30),
            settle_delay: DEFAULT_SETTLE_DELAY,
            executable: std::env::var_os("HARVEST_CHROME").map(PathBuf::from),
            chrome_args: Vec::new(),
            user_agent: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Config derived from run settings. Page loads get three times the
    /// plain request timeout.
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            timeout: settings.timeout * 3,
            user_agent: settings.user_agent.clone(),
            ..Default::default()
        }
    }
}
