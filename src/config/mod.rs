//! Configuration management for switchboard
//!
//! Values are resolved as env > TOML file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use file::SwitchboardConfigFile;

use crate::orchestrator::InitRequest;
use crate::transports::TransportSpec;
use crate::{Error, Result};

/// Default watcher poll interval in milliseconds
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 10_000;

/// Switchboard configuration
#[derive(Debug)]
pub struct Config {
    /// Root of the plugin tree
    pub plugin_dir: PathBuf,

    /// Whether the hot-reload watcher runs
    pub checking_new_plugins: bool,

    /// Watcher poll interval
    pub checking_new_plugins_timeout: Duration,

    /// Chat networks to connect to
    pub transports: Vec<TransportSpec>,
}

impl Config {
    /// Load configuration from the environment and a config file
    ///
    /// `path` overrides the standard config file location. An explicit
    /// path must exist and parse; the standard file is optional.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unusable or an
    /// environment override is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };

        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups and defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an override is malformed or the watcher
    /// is enabled with a zero interval
    pub fn resolve(
        fc: SwitchboardConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let plugin_dir = env("SWITCHBOARD_PLUGIN_DIR")
            .map(PathBuf::from)
            .or(fc.plugin_dir)
            .unwrap_or_else(default_plugin_dir);

        let checking_new_plugins = match env("SWITCHBOARD_CHECKING_NEW_PLUGINS") {
            Some(raw) => parse_flag("SWITCHBOARD_CHECKING_NEW_PLUGINS", &raw)?,
            None => fc.checking_new_plugins.unwrap_or(false),
        };

        let interval_ms = match env("SWITCHBOARD_CHECKING_NEW_PLUGINS_TIMEOUT") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "SWITCHBOARD_CHECKING_NEW_PLUGINS_TIMEOUT must be milliseconds, got {raw:?}"
                ))
            })?,
            None => fc
                .checking_new_plugins_timeout
                .unwrap_or(DEFAULT_CHECK_INTERVAL_MS),
        };

        if checking_new_plugins && interval_ms == 0 {
            return Err(Error::Config(
                "checking_new_plugins_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            plugin_dir,
            checking_new_plugins,
            checking_new_plugins_timeout: Duration::from_millis(interval_ms),
            transports: fc.transports,
        })
    }

    /// Watcher poll interval, if the watcher is enabled
    #[must_use]
    pub const fn watch_interval(&self) -> Option<Duration> {
        if self.checking_new_plugins {
            Some(self.checking_new_plugins_timeout)
        } else {
            None
        }
    }

    /// Turn the configuration into the orchestrator's startup request
    #[must_use]
    pub fn into_init_request(self) -> InitRequest {
        let watch_interval = self.watch_interval();
        InitRequest {
            plugin_dir: self.plugin_dir,
            transports: self.transports,
            watch_interval,
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

/// Default plugin directory: `~/.local/share/switchboard/plugins` on Linux
fn default_plugin_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("plugins"),
        |d| d.data_dir().join("switchboard").join("plugins"),
    )
}
