//! Application configuration: base URLs, remote profiles, idle timeout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::DEFAULT_IDLE_TIMEOUT;

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "ROUTE_CLAP_CONFIG_DIR";

/// Configuration of one application, as stored in `<app>.yml`.
///
/// ```yaml
/// url: https://api.example.com
/// idle_timeout: 60
/// remotes:
///   staging:
///     url: https://staging.example.com
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct AppConfig {
    #[serde(default)]
    pub url: Option<String>,
    /// Seconds
    #[serde(default)]
    pub idle_timeout: Option<u64>,
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteProfile>,
}

impl AppConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn remote(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.remotes
            .insert(name.into(), RemoteProfile { url: url.into() });
        self
    }

    fn base_url(&self, app: &str) -> Result<String, ConfigError> {
        self.url.clone().ok_or_else(|| ConfigError::MissingUrl {
            app: app.to_owned(),
        })
    }

    fn remote_url(&self, app: &str, remote: &str) -> Result<String, ConfigError> {
        self.remotes
            .get(remote)
            .map(|r| r.url.clone())
            .ok_or_else(|| ConfigError::UnknownRemote {
                app: app.to_owned(),
                remote: remote.to_owned(),
            })
    }
}

/// A named alternative server for an application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProfile {
    pub url: String,
}

/// Resolves where an application's routes live.
pub trait ConfigResolver: Send + Sync {
    fn resolve_base_url(&self, app: &str) -> Result<String, ConfigError>;

    fn resolve_remote_url(&self, app: &str, remote: &str) -> Result<String, ConfigError>;

    fn idle_timeout(&self, _app: &str) -> Duration {
        DEFAULT_IDLE_TIMEOUT
    }
}

/// In-memory configuration, keyed by application name.
impl ConfigResolver for BTreeMap<String, AppConfig> {
    fn resolve_base_url(&self, app: &str) -> Result<String, ConfigError> {
        lookup(self, app)?.base_url(app)
    }

    fn resolve_remote_url(&self, app: &str, remote: &str) -> Result<String, ConfigError> {
        lookup(self, app)?.remote_url(app, remote)
    }

    fn idle_timeout(&self, app: &str) -> Duration {
        self.get(app)
            .and_then(|c| c.idle_timeout)
            .map_or(DEFAULT_IDLE_TIMEOUT, Duration::from_secs)
    }
}

fn lookup<'a>(
    configs: &'a BTreeMap<String, AppConfig>,
    app: &str,
) -> Result<&'a AppConfig, ConfigError> {
    configs.get(app).ok_or_else(|| ConfigError::UnknownApp {
        app: app.to_owned(),
    })
}

/// Configuration read from `<dir>/<app>.yml`.
///
/// `<APP>_URL` in the environment takes precedence over the file's `url`.
#[derive(Debug, Clone)]
pub struct FileConfig {
    dir: PathBuf,
}

impl FileConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$ROUTE_CLAP_CONFIG_DIR`, else `$HOME/etc`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::new(dir));
        }
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(Path::new(&home).join("etc")))
    }

    pub fn path_for(&self, app: &str) -> PathBuf {
        self.dir.join(format!("{app}.yml"))
    }

    /// Load `<app>.yml`. A missing file is an empty configuration.
    pub fn load(&self, app: &str) -> Result<AppConfig, ConfigError> {
        let path = self.path_for(app);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no configuration file");
                return Ok(AppConfig::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }
}

impl ConfigResolver for FileConfig {
    fn resolve_base_url(&self, app: &str) -> Result<String, ConfigError> {
        if let Ok(url) = std::env::var(url_env_key(app)) {
            return Ok(url);
        }
        self.load(app)?.base_url(app)
    }

    fn resolve_remote_url(&self, app: &str, remote: &str) -> Result<String, ConfigError> {
        self.load(app)?.remote_url(app, remote)
    }

    fn idle_timeout(&self, app: &str) -> Duration {
        self.load(app)
            .ok()
            .and_then(|c| c.idle_timeout)
            .map_or(DEFAULT_IDLE_TIMEOUT, Duration::from_secs)
    }
}

/// `my-app` → `MY_APP_URL`
pub fn url_env_key(app: &str) -> String {
    let mut key: String = app
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    key.push_str("_URL");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, app: &str, text: &str) {
        std::fs::write(dir.join(format!("{app}.yml")), text).unwrap();
    }

    #[test]
    fn file_config_reads_url_remotes_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "rc-test-widgets",
            "url: http://main\nidle_timeout: 7\nremotes:\n  staging:\n    url: http://staging\n",
        );

        let config = FileConfig::new(dir.path());
        assert_eq!(
            config.resolve_base_url("rc-test-widgets").unwrap(),
            "http://main"
        );
        assert_eq!(
            config
                .resolve_remote_url("rc-test-widgets", "staging")
                .unwrap(),
            "http://staging"
        );
        assert_eq!(
            config.idle_timeout("rc-test-widgets"),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn file_config_reports_unknown_remote() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "rc-test-remote", "url: http://main\n");

        let err = FileConfig::new(dir.path())
            .resolve_remote_url("rc-test-remote", "prod")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRemote { .. }));
    }

    #[test]
    fn file_config_treats_missing_file_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::new(dir.path());
        assert_eq!(config.load("rc-test-absent").unwrap(), AppConfig::default());
        assert!(matches!(
            config.resolve_base_url("rc-test-absent"),
            Err(ConfigError::MissingUrl { .. })
        ));
        assert_eq!(config.idle_timeout("rc-test-absent"), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn file_config_reports_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "rc-test-bad", "url: [unclosed\n");

        let err = FileConfig::new(dir.path()).load("rc-test-bad").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn in_memory_config_resolves_by_app() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "widgets".to_string(),
            AppConfig::new("http://w").remote("dev", "http://dev"),
        );

        assert_eq!(configs.resolve_base_url("widgets").unwrap(), "http://w");
        assert_eq!(
            configs.resolve_remote_url("widgets", "dev").unwrap(),
            "http://dev"
        );
        assert!(matches!(
            configs.resolve_base_url("gadgets"),
            Err(ConfigError::UnknownApp { .. })
        ));
    }

    #[test]
    fn url_env_key_uppercases_and_replaces_punctuation() {
        assert_eq!(url_env_key("my-app"), "MY_APP_URL");
        assert_eq!(url_env_key("Widgets2"), "WIDGETS2_URL");
    }
}
