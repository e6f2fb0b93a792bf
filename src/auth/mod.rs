//! Authentication and session management

pub mod middleware;
pub mod session;
pub mod token;
pub mod verifier;

pub use middleware::{
    basic_credentials, logout, require_auth, session_cookie, unauthorized, AuthGate, AuthOutcome,
    AuthSettings,
};
pub use session::{SessionEntry, SessionRegistry};
pub use token::{generate_token, random_delay};
pub use verifier::{BcryptVerifier, CredentialVerifier, HashStore, MemoryHashStore, PlainVerifier};
