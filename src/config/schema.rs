//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::auth::AuthSettings;
use crate::error::{Error, Result};

/// Shortest session token the gate will issue
pub const MIN_TOKEN_LENGTH: usize = 32;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub shared: SharedConfig,

    /// Username to bcrypt hash
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

/// Server configuration for the HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Authentication gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Realm advertised in the `WWW-Authenticate` challenge
    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default = "default_token_length")]
    pub token_length: usize,

    /// Lower bound of the delay applied to every failed authentication
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the delay applied to every failed authentication
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    /// Session lifetime in seconds, 0 keeps sessions for the life of the process
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How often expired sessions are swept, 0 disables the sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_cookie_name() -> String {
    "gatehouse_session".to_string()
}

fn default_realm() -> String {
    "Authorization Required".to_string()
}

fn default_token_length() -> usize {
    MIN_TOKEN_LENGTH
}

fn default_delay_min_ms() -> u64 {
    100
}

fn default_delay_max_ms() -> u64 {
    200
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}

fn default_max_sessions() -> usize {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            realm: default_realm(),
            token_length: default_token_length(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl AuthConfig {
    /// Runtime settings for the authentication gate
    pub fn settings(&self) -> AuthSettings {
        AuthSettings {
            cookie_name: self.cookie_name.clone(),
            realm: self.realm.clone(),
            token_length: self.token_length,
            delay_min: Duration::from_millis(self.delay_min_ms),
            delay_max: Duration::from_millis(self.delay_max_ms),
        }
    }

    /// Session lifetime, `None` when sessions never expire
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Request-scoped shared data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Number of independently locked partitions, 1 is a single global lock
    #[serde(default = "default_shards")]
    pub shards: usize,
}

fn default_shards() -> usize {
    1
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
        }
    }
}

impl Config {
    /// Reject settings the gate cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.auth.token_length < MIN_TOKEN_LENGTH {
            return Err(Error::Config(format!(
                "auth.token_length must be at least {}, got {}",
                MIN_TOKEN_LENGTH, self.auth.token_length
            )));
        }
        if self.auth.delay_min_ms > self.auth.delay_max_ms {
            return Err(Error::Config(format!(
                "auth.delay_min_ms ({}) is greater than auth.delay_max_ms ({})",
                self.auth.delay_min_ms, self.auth.delay_max_ms
            )));
        }
        if self.auth.max_sessions == 0 {
            return Err(Error::Config("auth.max_sessions must be positive".to_string()));
        }
        if !is_cookie_name(&self.auth.cookie_name) {
            return Err(Error::Config(format!(
                "auth.cookie_name '{}' is not a valid cookie name",
                self.auth.cookie_name
            )));
        }
        if self.shared.shards == 0 {
            return Err(Error::Config("shared.shards must be positive".to_string()));
        }
        Ok(())
    }
}

fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
