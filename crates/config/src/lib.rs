//! Layered configuration for lisu.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults;
//! 2. `config.toml` in the user's config directory (e.g.
//!    `~/.config/lisu/config.toml`), when present;
//! 3. an explicit file passed on the command line (TOML, YAML or JSON, by
//!    extension);
//! 4. `LISU_` environment variables, with `__` separating nested keys
//!    (`LISU_SERVER__BASE_URL=http://...`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Prefix of environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "LISU_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the Lisu server. No server is contacted while unset.
    pub base_url: Option<String>,
    /// Per-request timeout, in seconds.
    pub timeout: u64,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { base_url: None, timeout: 30 }
    }
}
impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Delay between a connectivity change and the retry of failed loads.
    pub retry_debounce_ms: u64,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        Self { retry_debounce_ms: 250 }
    }
}
impl RemoteConfig {
    pub fn retry_debounce(&self) -> Duration {
        Duration::from_millis(self.retry_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    pub level: String,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Config {
    /// Load and validate the configuration from every source.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NotFound`] if `explicit` does not exist.
    /// - [`ErrorKind::Load`] if a source is malformed.
    /// - [`ErrorKind::Invalid`] if the merged configuration is unusable.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(user_config_file().as_deref(), explicit, ENV_PREFIX)
    }

    fn load_from(user: Option<&Path>, explicit: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(user) = user {
            tracing::trace!(path = %user.display(), "Reading user configuration");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::Invalid(format!(
                    "unsupported configuration format: {}",
                    path.display()
                ))),
            };
        }
        let config: Self = figment
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.server.base_url {
            let url = Url::parse(base_url).or_raise(|| ErrorKind::Invalid(format!("server.base_url: {base_url}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                exn::bail!(ErrorKind::Invalid(format!("server.base_url must be http or https: {base_url}")));
            }
        }
        if self.server.timeout == 0 {
            exn::bail!(ErrorKind::Invalid("server.timeout must be at least one second".to_string()));
        }
        if self.log.level.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("log.level must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Location of the per-user configuration file, if the platform has one.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "lisu").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    // Nothing in the test environment sets variables under this prefix.
    const NO_ENV: &str = "LISU_CONFIG_TESTS_UNSET_";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_from(None, None, NO_ENV).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.timeout(), Duration::from_secs(30));
        assert_eq!(config.remote.retry_debounce(), Duration::from_millis(250));
        assert_eq!(config.log.level, "info");
    }

    #[rstest]
    #[case("lisu.toml", "[server]\nbase_url = \"http://nas:8080\"\n[remote]\nretry_debounce_ms = 100\n")]
    #[case("lisu.yaml", "server:\n  base_url: http://nas:8080\nremote:\n  retry_debounce_ms: 100\n")]
    #[case("lisu.json", r#"{"server": {"base_url": "http://nas:8080"}, "remote": {"retry_debounce_ms": 100}}"#)]
    fn test_explicit_file_formats(#[case] name: &str, #[case] contents: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, name, contents);
        let config = Config::load_from(None, Some(&path), NO_ENV).unwrap();
        assert_eq!(config.server.base_url.as_deref(), Some("http://nas:8080"));
        assert_eq!(config.server.timeout, 30, "unset keys keep their defaults");
        assert_eq!(config.remote.retry_debounce_ms, 100);
    }

    #[test]
    fn test_explicit_file_overrides_user_file() {
        let dir = TempDir::new().unwrap();
        let user = write(&dir, "config.toml", "[server]\nbase_url = \"http://old\"\ntimeout = 5\n");
        let explicit = write(&dir, "override.toml", "[server]\nbase_url = \"https://new\"\n");
        let config = Config::load_from(Some(&user), Some(&explicit), NO_ENV).unwrap();
        assert_eq!(config.server.base_url.as_deref(), Some("https://new"));
        assert_eq!(config.server.timeout, 5);
    }

    #[test]
    fn test_missing_user_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(Some(&dir.path().join("absent.toml")), None, NO_ENV).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(None, Some(&dir.path().join("absent.toml")), NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "lisu.ini", "[server]\n");
        let err = Config::load_from(None, Some(&path), NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "lisu.toml", "[server]\ntimeout = \"soon\"\n");
        let err = Config::load_from(None, Some(&path), NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[rstest]
    #[case("[server]\nbase_url = \"ftp://nas\"\n")]
    #[case("[server]\nbase_url = \"nas:8080/lisu\"\n")]
    #[case("[server]\nbase_url = \"not a url\"\n")]
    #[case("[server]\ntimeout = 0\n")]
    #[case("[log]\nlevel = \"  \"\n")]
    fn test_invalid_values(#[case] contents: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "lisu.toml", contents);
        let err = Config::load_from(None, Some(&path), NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{contents}");
    }
}
