use crate::notifier::Channel;
use crate::scraper::Query;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "estate_watch.toml";
pub const CONFIG_PATH_ENV: &str = "ESTATE_WATCH_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The TOML file as written. Channel fields hold env var NAMES; the webhook
/// URLs themselves are secrets and only live in the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    /// Seconds without a sighting before a listing counts as removed.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,
    /// Hard ceiling on pages fetched per query.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log notifications instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_removed_channel")]
    pub removed_channel: String,
    #[serde(default)]
    pub store: StoreConfig,
    /// Processed in file order; a listing is attributed to the first group
    /// that sees it.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            redis_prefix: default_redis_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub new_channel: String,
    pub update_channel: String,
    /// Overrides the run-level `removed_channel` for listings this group claimed.
    #[serde(default)]
    pub removed_channel: Option<String>,
    #[serde(default)]
    pub queries: Vec<Query>,
}

/// A set of queries sharing the same pair of notification channels.
#[derive(Debug, Clone)]
pub struct QueryGroup {
    pub name: String,
    pub queries: Vec<Query>,
    pub new_channel: Channel,
    pub update_channel: Channel,
    pub removed_channel: Option<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Sqlite { path: PathBuf },
    Redis { url: String, prefix: String },
}

/// Fully resolved configuration: env vars looked up, values validated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub staleness_secs: i64,
    pub max_pages: usize,
    pub page_size: u64,
    pub request_timeout: Duration,
    pub dry_run: bool,
    pub removed_channel: Channel,
    pub store: StoreSettings,
    pub groups: Vec<QueryGroup>,
}

fn default_staleness_secs() -> i64 {
    259_200
}

fn default_max_pages() -> usize {
    500
}

fn default_page_size() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

pub fn default_log_level() -> String {
    "info".to_string()
}

fn default_removed_channel() -> String {
    "SOLD_WEBHOOK".to_string()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("listings.sqlite3")
}

fn default_redis_prefix() -> String {
    "estate".to_string()
}

/// Config path: first CLI argument, else `$ESTATE_WATCH_CONFIG`, else the default.
pub fn config_path(cli_arg: Option<String>) -> PathBuf {
    cli_arg
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validates the file and resolves every env var it names, using `env`
    /// for lookups.
    pub fn resolve<F>(&self, env: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.groups.is_empty() {
            return Err(ConfigError::Invalid("no query groups configured".into()));
        }
        if self.staleness_secs <= 0 {
            return Err(ConfigError::Invalid("staleness_secs must be positive".into()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }

        let channel = |var: &str| -> Result<Channel, ConfigError> {
            match env(var).filter(|v| !v.trim().is_empty()) {
                Some(url) => Ok(Channel::new(var, url)),
                None if self.dry_run => Ok(Channel::new(var, "")),
                None => Err(ConfigError::MissingEnv(var.to_string())),
            }
        };

        let mut groups = Vec::with_capacity(self.groups.len());
        for g in &self.groups {
            if g.queries.is_empty() {
                return Err(ConfigError::Invalid(format!("group '{}' has no queries", g.name)));
            }
            for q in &g.queries {
                Url::parse(&q.url).map_err(|e| {
                    ConfigError::Invalid(format!("group '{}': bad url {}: {e}", g.name, q.url))
                })?;
            }
            groups.push(QueryGroup {
                name: g.name.clone(),
                queries: g.queries.clone(),
                new_channel: channel(&g.new_channel)?,
                update_channel: channel(&g.update_channel)?,
                removed_channel: g
                    .removed_channel
                    .as_deref()
                    .map(|var| channel(var))
                    .transpose()?,
            });
        }

        let store = match self.store.backend {
            StoreBackend::Sqlite => StoreSettings::Sqlite {
                path: self.store.sqlite_path.clone(),
            },
            StoreBackend::Redis => StoreSettings::Redis {
                url: redis_url(&env)?,
                prefix: self.store.redis_prefix.clone(),
            },
        };

        Ok(AppConfig {
            staleness_secs: self.staleness_secs,
            max_pages: self.max_pages,
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            dry_run: self.dry_run,
            removed_channel: channel(&self.removed_channel)?,
            store,
            groups,
        })
    }
}

/// `REDIS_URL`, or one assembled from `REDIS_HOST` / `REDIS_PORT` / `REDIS_PASSWORD`.
fn redis_url<F>(env: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("REDIS_URL").filter(|u| !u.is_empty()) {
        return Ok(url);
    }

    let host = env("REDIS_HOST")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv("REDIS_URL or REDIS_HOST".into()))?;
    let port = env("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("REDIS_PORT is not a port: {port}")))?;

    let mut url = Url::parse(&format!("redis://{host}:{port}"))
        .map_err(|e| ConfigError::Invalid(format!("bad REDIS_HOST {host}: {e}")))?;
    if let Some(password) = env("REDIS_PASSWORD").filter(|p| !p.is_empty()) {
        url.set_password(Some(&password))
            .map_err(|_| ConfigError::Invalid("cannot set redis password".into()))?;
    }
    Ok(url.to_string())
}
