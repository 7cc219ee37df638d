//! Configuration types and loading
//!
//! Config precedence: environment variables > config file > defaults. The
//! config file itself is optional; without one the service runs purely from
//! the environment. `ACCESS_CODE` and `CLIENT_SECRET` are read only from the
//! environment and never from the TOML file.

use common::Secret;
use numbers_auth::Identity;
use numbers_upstream::{ErrorPolicy, TypeCode, UpstreamTypeRegistry};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "average-proxy.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Sliding window settings
#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_size")]
    pub size: usize,
}

/// Auth and numbers endpoints
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub prime_url: Option<String>,
    #[serde(default)]
    pub fibo_url: Option<String>,
    #[serde(default)]
    pub even_url: Option<String>,
    #[serde(default)]
    pub rand_url: Option<String>,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Report genuine fetch failures as 502 instead of an unchanged window
    #[serde(default)]
    pub strict_fetch_errors: bool,
}

/// Registered identity sent to the auth endpoint
#[derive(Debug, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(skip)]
    pub access_code: Option<Secret<String>>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9876))
}

fn default_max_connections() -> usize {
    1000
}

fn default_window_size() -> usize {
    numbers_window::DEFAULT_WINDOW_SIZE
}

fn default_auth_timeout() -> u64 {
    numbers_auth::DEFAULT_AUTH_TIMEOUT.as_secs()
}

fn default_fetch_timeout() -> u64 {
    numbers_upstream::DEFAULT_FETCH_TIMEOUT.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: default_window_size(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            auth_url: None,
            prime_url: None,
            fibo_url: None,
            even_url: None,
            rand_url: None,
            auth_timeout_secs: default_auth_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            strict_fetch_errors: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as `load` with an injectable environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> common::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables onto file values. Blank values count as
    /// unset.
    fn apply_env<F>(&mut self, env: F) -> common::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            env(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let overlays: [(&str, &mut Option<String>); 9] = [
            ("AUTH_URL", &mut self.upstream.auth_url),
            ("PRIME_URL", &mut self.upstream.prime_url),
            ("FIBO_URL", &mut self.upstream.fibo_url),
            ("EVEN_URL", &mut self.upstream.even_url),
            ("RAND_URL", &mut self.upstream.rand_url),
            ("EMAIL", &mut self.identity.email),
            ("NAME", &mut self.identity.name),
            ("ROLL_NO", &mut self.identity.roll_no),
            ("CLIENT_ID", &mut self.identity.client_id),
        ];
        for (key, slot) in overlays {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }

        if let Some(value) = lookup("ACCESS_CODE") {
            self.identity.access_code = Some(Secret::new(value));
        }
        if let Some(value) = lookup("CLIENT_SECRET") {
            self.identity.client_secret = Some(Secret::new(value));
        }

        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.server.listen_addr = addr.parse().map_err(|e| {
                common::Error::Config(format!("LISTEN_ADDR {addr:?} is not a socket address: {e}"))
            })?;
        }

        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if self.window.size == 0 {
            return Err(common::Error::Config(
                "window size must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.upstream.auth_timeout_secs == 0 || self.upstream.fetch_timeout_secs == 0 {
            return Err(common::Error::Config(
                "auth_timeout_secs and fetch_timeout_secs must be greater than 0".into(),
            ));
        }

        self.auth_url()?;
        self.registry()?;
        self.identity()?;
        Ok(())
    }

    pub fn auth_url(&self) -> common::Result<&str> {
        required_url(self.upstream.auth_url.as_deref(), "AUTH_URL")
    }

    /// Type code registry built from the four numbers endpoints.
    pub fn registry(&self) -> common::Result<UpstreamTypeRegistry> {
        let endpoints = [
            (TypeCode::Prime, self.upstream.prime_url.as_deref(), "PRIME_URL"),
            (TypeCode::Fibonacci, self.upstream.fibo_url.as_deref(), "FIBO_URL"),
            (TypeCode::Even, self.upstream.even_url.as_deref(), "EVEN_URL"),
            (TypeCode::Random, self.upstream.rand_url.as_deref(), "RAND_URL"),
        ];
        let mut resolved = Vec::with_capacity(endpoints.len());
        for (code, url, name) in endpoints {
            resolved.push((code, required_url(url, name)?.to_string()));
        }
        Ok(UpstreamTypeRegistry::new(resolved))
    }

    /// The six identity fields, all required.
    pub fn identity(&self) -> common::Result<Identity> {
        let id = &self.identity;
        Ok(Identity {
            email: required(id.email.as_ref(), "EMAIL")?,
            name: required(id.name.as_ref(), "NAME")?,
            roll_no: required(id.roll_no.as_ref(), "ROLL_NO")?,
            access_code: id
                .access_code
                .clone()
                .filter(|s| !s.is_blank())
                .ok_or(common::Error::Missing("ACCESS_CODE"))?,
            client_id: required(id.client_id.as_ref(), "CLIENT_ID")?,
            client_secret: id
                .client_secret
                .clone()
                .filter(|s| !s.is_blank())
                .ok_or(common::Error::Missing("CLIENT_SECRET"))?,
        })
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.auth_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.fetch_timeout_secs)
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_strict(self.upstream.strict_fetch_errors)
    }

    /// Resolve config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file if it exists. `None` means environment-only config.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

fn required(value: Option<&String>, name: &'static str) -> common::Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or(common::Error::Missing(name))
}

fn required_url<'a>(value: Option<&'a str>, name: &'static str) -> common::Result<&'a str> {
    let url = value
        .filter(|v| !v.trim().is_empty())
        .ok_or(common::Error::Missing(name))?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(url)
}
