use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sources::snapshot::CsvLayout;
use crate::subsonic_rs::{SubsonicCredentials, SubsonicServer, normalize_base_url};

pub const ENV_USER: &str = "SUBSONIC_USER";
pub const ENV_PASSWORD: &str = "SUBSONIC_PASSWORD";
pub const ENV_TOKEN: &str = "SUBSONIC_TOKEN";
pub const ENV_SALT: &str = "SUBSONIC_SALT";

const DEFAULT_CONFIG: &str = r#"# Subsonic REST root (Navidrome: http://host:4533/rest)
base_url = "http://localhost:4533/rest"
api_version = "1.16.1"
client_name = "csv2pl"

# Folder holding timestamped export folders (e.g. "export_05-03-25_1830/")
exports_root = "~/playlists/exports"
# Folder holding .xlsx diff sheets named after their playlist
diffs_root = "~/playlists/diffs"

# "*" processes everything, otherwise case-insensitive substrings of playlist names
include_playlists = ["*"]

csv_artist_sep = ";"
dedupe = true
prefer_exact_artist_title = true
dry_run = false

[csv_headers]
track = 0
album = 1
artists = 2
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: no config directory on this platform")]
    NoConfigDir,
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(
        "Auth not configured. Set SUBSONIC_USER and either SUBSONIC_PASSWORD (+ optional SUBSONIC_SALT) or SUBSONIC_TOKEN + SUBSONIC_SALT"
    )]
    MissingCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,

    #[serde(default)]
    exports_root: Option<String>,
    #[serde(default)]
    diffs_root: Option<String>,

    #[serde(default = "default_include")]
    pub include_playlists: Vec<String>,

    #[serde(default)]
    pub csv_headers: CsvLayout,
    #[serde(default = "default_artist_sep")]
    pub csv_artist_sep: String,

    #[serde(default = "default_true")]
    pub dedupe: bool,
    #[serde(default = "default_true")]
    pub prefer_exact_artist_title: bool,
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_connect_timeout", with = "humantime_serde_compat")]
    pub connect_timeout: Duration,
    #[serde(default = "default_read_timeout", with = "humantime_serde_compat")]
    pub read_timeout: Duration,
    #[serde(default = "default_write_timeout", with = "humantime_serde_compat")]
    pub write_timeout: Duration,

    /// Upper bound on catalog requests per second.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// How many searches may be in flight for one playlist. 1 keeps resolution sequential.
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
    /// Retries per catalog call after the first failure. 0 disables retrying.
    #[serde(default)]
    pub retry_attempts: usize,
}

fn default_api_version() -> String {
    "1.16.1".to_string()
}

fn default_client_name() -> String {
    "csv2pl".to_string()
}

fn default_include() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_artist_sep() -> String {
    ";".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_resolve_concurrency() -> usize {
    1
}

/// Durations are written as humantime strings ("30s", "1m 30s").
mod humantime_serde_compat {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-sync").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;

        Self::from_file(&config_path)
    }

    /// Writes the commented template to the default path unless a file is already there.
    pub fn create_default() -> color_eyre::Result<PathBuf> {
        use color_eyre::eyre::{OptionExt, WrapErr};

        let path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        if path.exists() {
            log::info!("Config already exists at {}", path.display());
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        normalize_base_url(&self.base_url).map_err(|e| ConfigError::Invalid {
            key: "base_url",
            reason: e.to_string(),
        })?;
        if self.requests_per_second == 0 {
            return Err(ConfigError::Invalid {
                key: "requests_per_second",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.resolve_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "resolve_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.csv_artist_sep.is_empty() {
            return Err(ConfigError::Invalid {
                key: "csv_artist_sep",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get expanded exports path
    pub fn exports_root(&self) -> Result<PathBuf, ConfigError> {
        self.exports_root
            .as_deref()
            .map(|p| self.expand_path(p))
            .ok_or(ConfigError::Invalid {
                key: "exports_root",
                reason: "required for snapshot initialization".to_string(),
            })
    }

    /// Get expanded diffs path
    pub fn diffs_root(&self) -> Result<PathBuf, ConfigError> {
        self.diffs_root
            .as_deref()
            .map(|p| self.expand_path(p))
            .ok_or(ConfigError::Invalid {
                key: "diffs_root",
                reason: "required for diff updates".to_string(),
            })
    }

    /// Assembles connection details, reading credentials from the environment.
    pub fn subsonic_server(&self) -> Result<SubsonicServer, ConfigError> {
        let credentials = SubsonicCredentials::from_parts(
            std::env::var(ENV_USER).ok(),
            std::env::var(ENV_PASSWORD).ok(),
            std::env::var(ENV_TOKEN).ok(),
            std::env::var(ENV_SALT).ok(),
        )
        .ok_or(ConfigError::MissingCredentials)?;

        self.subsonic_server_with(credentials)
    }

    pub fn subsonic_server_with(
        &self,
        credentials: SubsonicCredentials,
    ) -> Result<SubsonicServer, ConfigError> {
        let base_url = normalize_base_url(&self.base_url).map_err(|e| ConfigError::Invalid {
            key: "base_url",
            reason: e.to_string(),
        })?;

        Ok(SubsonicServer {
            base_url,
            credentials,
            api_version: self.api_version.clone(),
            client_name: self.client_name.clone(),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }
}
