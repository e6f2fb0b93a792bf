//! Gatehouse - session and Basic auth middleware for axum services
//!
//! The [`auth`] module gates routes behind cookie sessions with an HTTP
//! Basic fallback, and [`shared`] gives each request a scoped key/value
//! store so independent middleware stages can hand data down the chain.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod decorators;
pub mod error;
pub mod shared;

pub use auth::{AuthGate, AuthSettings, CredentialVerifier, HashStore, SessionRegistry};
pub use config::Config;
pub use error::Error;
pub use shared::{SharedDataStore, SharedScope};
