//! Layered configuration for the BFF.
//!
//! Precedence, later layers winning:
//! 1. built-in defaults
//! 2. TOML file (`$STAYBOOK_CONFIG`, else `~/.staybook/bff.toml`)
//! 3. `STAYBOOK_*` environment variables
//!
//! The upstream URL and the service credential have no default and must be
//! supplied by one of the last two layers.

use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
pub const DEFAULT_PUBLIC_MAX_AGE: u64 = 3600;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DEVICE_NAME: &str = "staybook-web";

const ENV_PREFIX: &str = "STAYBOOK";
const CONFIG_FILE: &str = "bff.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid value for {var}: '{value}' (expected {expected})")]
    InvalidValue {
        var: String,
        value: String,
        expected: &'static str,
    },
}

/// The privileged credential the proxy presents upstream.
///
/// Never printed: `Debug` shows the username only.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceCredential {
    username: String,
    password: String,
}

impl ServiceCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BffConfig {
    pub upstream_url: Url,
    pub service: ServiceCredential,
    pub bind: SocketAddr,
    /// `max-age` for public catalog responses, in seconds.
    pub public_max_age: u64,
    pub upstream_timeout: Duration,
    /// Sent upstream when a login request names no device.
    pub device_name: String,
}

impl BffConfig {
    /// Defaults for everything but the two required settings.
    pub fn new(upstream_url: Url, service: ServiceCredential) -> Self {
        Self {
            upstream_url,
            service,
            bind: DEFAULT_BIND,
            public_max_age: DEFAULT_PUBLIC_MAX_AGE,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
        }
    }

    /// Load from the process environment and the default file location.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load(|key| std::env::var(key).ok())
    }
}

/// File layer. Every field is optional so a partial file only overrides
/// what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    upstream_url: Option<String>,
    bind: Option<String>,
    public_max_age_secs: Option<u64>,
    upstream_timeout_secs: Option<u64>,
    device_name: Option<String>,
    service: Option<FileService>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileService {
    username: Option<String>,
    password: Option<String>,
}

/// Accumulates the layers; every field stays a raw string until `finish`
/// so errors can name the setting that carried the bad value.
#[derive(Debug, Default)]
struct Layered {
    upstream_url: Option<(String, String)>,
    username: Option<String>,
    password: Option<String>,
    bind: Option<(String, String)>,
    public_max_age: Option<(String, String)>,
    upstream_timeout: Option<(String, String)>,
    device_name: Option<String>,
}

/// Builder for [`BffConfig`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    skip_file: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of the `$STAYBOOK_CONFIG` / home default.
    /// Unlike the default location it must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn skip_file_layer(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Merge the layers. `env` looks up one variable by full name.
    pub fn load<F>(self, env: F) -> Result<BffConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layered = Layered::default();
        if !self.skip_file {
            let explicit = self
                .file
                .or_else(|| env(&env_key("CONFIG")).map(PathBuf::from));
            let file = match explicit {
                Some(path) => Some(read_file(&path)?),
                None => match default_config_path() {
                    Some(path) if path.exists() => Some(read_file(&path)?),
                    _ => None,
                },
            };
            if let Some((path, file)) = file {
                layered.apply_file(&path, file);
            }
        }
        layered.apply_env(&env);
        layered.finish()
    }
}

impl Layered {
    fn apply_file(&mut self, path: &Path, file: FileConfig) {
        let origin = |key: &str| format!("{}:{key}", path.display());
        if let Some(value) = file.upstream_url {
            self.upstream_url = Some((origin("upstream_url"), value));
        }
        if let Some(value) = file.bind {
            self.bind = Some((origin("bind"), value));
        }
        if let Some(value) = file.public_max_age_secs {
            self.public_max_age = Some((origin("public_max_age_secs"), value.to_string()));
        }
        if let Some(value) = file.upstream_timeout_secs {
            self.upstream_timeout = Some((origin("upstream_timeout_secs"), value.to_string()));
        }
        if file.device_name.is_some() {
            self.device_name = file.device_name;
        }
        if let Some(service) = file.service {
            if service.username.is_some() {
                self.username = service.username;
            }
            if service.password.is_some() {
                self.password = service.password;
            }
        }
    }

    fn apply_env<F>(&mut self, env: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            let key = env_key(name);
            env(&key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key, value))
        };
        if let Some(pair) = lookup("UPSTREAM_URL") {
            self.upstream_url = Some(pair);
        }
        if let Some((_, value)) = lookup("SERVICE_USERNAME") {
            self.username = Some(value);
        }
        if let Some((_, value)) = lookup("SERVICE_PASSWORD") {
            self.password = Some(value);
        }
        if let Some(pair) = lookup("BIND") {
            self.bind = Some(pair);
        }
        if let Some(pair) = lookup("PUBLIC_MAX_AGE_SECS") {
            self.public_max_age = Some(pair);
        }
        if let Some(pair) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.upstream_timeout = Some(pair);
        }
        if let Some((_, value)) = lookup("DEVICE_NAME") {
            self.device_name = Some(value);
        }
    }

    fn finish(self) -> Result<BffConfig, ConfigError> {
        let (var, raw_url) = self.upstream_url.ok_or(ConfigError::Missing("upstream_url"))?;
        let upstream_url = parse_upstream_url(&var, &raw_url)?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("service.username"))?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("service.password"))?;

        let mut config = BffConfig::new(upstream_url, ServiceCredential::new(username, password));
        if let Some((var, value)) = self.bind {
            config.bind = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var,
                value,
                expected: "a socket address such as 127.0.0.1:8080",
            })?;
        }
        if let Some((var, value)) = self.public_max_age {
            config.public_max_age = parse_secs(var, value)?;
        }
        if let Some((var, value)) = self.upstream_timeout {
            let secs = parse_secs(var.clone(), value.clone())?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    var,
                    value,
                    expected: "a positive number of seconds",
                });
            }
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(device_name) = self.device_name {
            config.device_name = device_name;
        }
        Ok(config)
    }
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}_{name}")
}

/// `~/.staybook/bff.toml`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".staybook").join(CONFIG_FILE))
}

fn read_file(path: &Path) -> Result<(PathBuf, FileConfig), ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((path.to_path_buf(), file))
}

fn parse_upstream_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        var: var.to_string(),
        value: raw.to_string(),
        expected: "an http(s) URL",
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}

fn parse_secs(var: String, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value,
            expected: "a whole number of seconds",
        })
}
