//! Error types for Gatehouse

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found. Run 'gatehouse init' first.")]
    ConfigNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Unknown user '{0}'")]
    UnknownUser(String),

    /// The key is absent from an active shared-data scope
    #[error("Key '{0}' not found in shared data")]
    KeyNotFound(String),

    /// No shared-data scope is active for the request
    #[error("No shared data scope for request {0}")]
    ScopeNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this is one of the not-found kinds returned by the shared data store
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_) | Error::ScopeNotFound(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
