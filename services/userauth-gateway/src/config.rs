//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The service secret is read
//! from `USER_API_SECRET` or `[auth] api_secret_file`, never from the TOML
//! itself. A missing config file is fine as long as the environment supplies
//! the key and secret.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "hub-userauth-gateway.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Signing and handshake settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Service key id stamped into every credential
    #[serde(default)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: Option<Secret<String>>,
    /// Path to a file containing the service secret (alternative to USER_API_SECRET)
    #[serde(default)]
    pub api_secret_file: Option<PathBuf>,
    #[serde(default = "default_challenge_timeout_ms")]
    pub challenge_timeout_ms: u64,
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_ttl_secs: u64,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: None,
            api_secret_file: None,
            challenge_timeout_ms: default_challenge_timeout_ms(),
            credential_ttl_secs: default_credential_ttl_secs(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_connections() -> usize {
    1000
}

fn default_challenge_timeout_ms() -> u64 {
    hub_auth::DEFAULT_CHALLENGE_TIMEOUT.as_millis() as u64
}

fn default_credential_ttl_secs() -> u64 {
    hub_auth::DEFAULT_CREDENTIAL_TTL.as_secs()
}

fn default_token_ttl_secs() -> u64 {
    hub_auth::DEFAULT_TOKEN_TTL.as_secs()
}

impl AuthConfig {
    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file (if present), then overlay the
    /// environment and validate.
    ///
    /// Secret resolution order:
    /// 1. USER_API_SECRET env var
    /// 2. api_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(key) = std::env::var("USER_API_KEY") {
            self.auth.api_key = key.trim().to_owned();
        }

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| common::Error::Config(format!("PORT is not a valid port: {port}")))?;
            self.server.listen_addr.set_port(port);
        }

        if let Ok(secret) = std::env::var("USER_API_SECRET") {
            self.auth.api_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = self.auth.api_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            self.auth.api_secret = Some(Secret::new(secret.trim().to_owned()));
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        match &self.auth.api_secret {
            Some(secret) if !secret.is_blank() => {}
            _ => return Err(common::Error::MissingSecret("USER_API_SECRET")),
        }
        if self.auth.api_key.trim().is_empty() {
            return Err(common::Error::Config(
                "api_key (USER_API_KEY) must not be empty".into(),
            ));
        }
        if self.auth.challenge_timeout_ms == 0 {
            return Err(common::Error::Config(
                "challenge_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.auth.credential_ttl_secs == 0 {
            return Err(common::Error::Config(
                "credential_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(common::Error::Config(
                "token_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
