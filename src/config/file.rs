//! TOML configuration file loading
//!
//! Supports `~/.config/switchboard/config.toml` as a persistent config source.
//! Scalar fields are optional; the file is a partial overlay on top of
//! defaults and environment variables. Transport entries are parsed one by
//! one, and a malformed entry is logged and dropped without affecting the
//! rest of the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::transports::TransportSpec;
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SwitchboardConfigFile {
    /// Root of the plugin tree
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    /// Enable the hot-reload watcher
    #[serde(default)]
    pub checking_new_plugins: Option<bool>,

    /// Watcher poll interval in milliseconds
    #[serde(default)]
    pub checking_new_plugins_timeout: Option<u64>,

    /// Chat networks to connect to
    #[serde(default, deserialize_with = "deserialize_transports")]
    pub transports: Vec<TransportSpec>,
}

fn deserialize_transports<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<TransportSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<toml::Value>::deserialize(deserializer)?;

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let protocol = entry
                .get("protocol")
                .and_then(toml::Value::as_str)
                .unwrap_or("unknown")
                .to_string();

            match entry.try_into::<TransportSpec>() {
                Ok(spec) => Some(spec),
                Err(e) => {
                    tracing::error!(
                        index,
                        protocol = %protocol,
                        error = %e,
                        "invalid transport entry, skipping"
                    );
                    None
                }
            }
        })
        .collect())
}

/// Read and parse a config file the user pointed at explicitly
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or parsed
pub fn read_config_file(path: &Path) -> Result<SwitchboardConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("failed to parse config file {}: {e}", path.display()))
    })?;

    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file from the standard path
///
/// Returns `SwitchboardConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SwitchboardConfigFile {
    let Some(path) = config_file_path() else {
        return SwitchboardConfigFile::default();
    };

    if !path.exists() {
        return SwitchboardConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            SwitchboardConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/switchboard/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("switchboard").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::TransportKind;

    #[test]
    fn parse_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
                plugin_dir = "/srv/bot/plugins"
                checking_new_plugins = true
                checking_new_plugins_timeout = 2500

                [[transports]]
                protocol = "irc"
                nick = "switchbot"
                channel = "#bots"
                host = "irc.example.net"

                [transports.options]
                port = 6667
                use_ssl = false
            "##,
        )
        .unwrap();

        let file = read_config_file(&path).unwrap();
        assert_eq!(file.plugin_dir, Some(PathBuf::from("/srv/bot/plugins")));
        assert_eq!(file.checking_new_plugins, Some(true));
        assert_eq!(file.checking_new_plugins_timeout, Some(2500));
        assert_eq!(file.transports.len(), 1);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let file = read_config_file(&path).unwrap();
        assert!(file.plugin_dir.is_none());
        assert!(file.checking_new_plugins.is_none());
        assert!(file.transports.is_empty());
    }

    #[test]
    fn malformed_transport_entry_is_skipped() {
        let file: SwitchboardConfigFile = toml::from_str(
            r##"
                plugin_dir = "/srv/bot/plugins"
                checking_new_plugins = true

                [[transports]]
                protocol = "irc"
                nick = "switchbot"
                channel = "#bots"
                host = "irc.example.net"
                options = { port = 6667, use_ssl = false }

                [[transports]]
                protocol = "campfire"
                login = "bot"
                token = "t0ken"
                room_id = "42"
                subdomain = "acme"

                [[transports]]
                protocol = "irc"
                channel = "#nonick"
                host = "irc.example.net"

                [[transports]]
                protocol = "xmpp"
                login = "bot@example.org"
                password = "hunter2"
                room = "lobby@conference.example.org"
                host = "example.org"
                resource = "switchboard"
            "##,
        )
        .unwrap();

        assert_eq!(file.plugin_dir, Some(PathBuf::from("/srv/bot/plugins")));
        assert_eq!(file.checking_new_plugins, Some(true));

        let kinds: Vec<TransportKind> = file.transports.iter().map(TransportSpec::kind).collect();
        assert_eq!(kinds, vec![TransportKind::Irc, TransportKind::Xmpp]);
    }

    #[test]
    fn unknown_protocol_is_skipped() {
        let file: SwitchboardConfigFile = toml::from_str(
            r#"
                [[transports]]
                protocol = "telex"
                host = "telex.example"
            "#,
        )
        .unwrap();

        assert!(file.transports.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let err = read_config_file(Path::new("/nonexistent/switchboard.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "checking_new_plugins = \"sometimes\"").unwrap();

        assert!(read_config_file(&path).is_err());
    }

    #[test]
    fn config_path_ends_with_file_name() {
        if let Some(path) = config_file_path() {
            assert!(path.ends_with("switchboard/config.toml"));
        }
    }
}
