//! Pluggable credential verification
//!
//! Backends expose credentials in one of two shapes. A [`HashStore`] hands
//! back the stored bcrypt hash and leaves the comparison to the caller,
//! while a [`CredentialVerifier`] answers the yes/no question itself.
//! [`BcryptVerifier`] turns the first shape into the second, and the gate
//! only ever talks to a `CredentialVerifier`.
//!
//! Implementations are shared by every in-flight request and must be safe
//! to call concurrently.

use std::collections::HashMap;

use bcrypt::HashParts;

use crate::error::{Error, Result};

/// Backend that can look up the stored password hash for a user
pub trait HashStore: Send + Sync {
    /// Returns `Error::UnknownUser` when the user does not exist
    fn get_hash(&self, username: &str) -> Result<String>;

    /// bcrypt cost of the stored hashes, if the store knows it
    fn hash_cost(&self) -> Option<u32> {
        None
    }
}

/// Backend that checks a username/password pair itself
pub trait CredentialVerifier: Send + Sync {
    /// False for an unknown user and for a wrong password alike
    fn verify(&self, username: &str, password: &str) -> bool;
}

const DUMMY_PASSWORD: &str = "gatehouse-unknown-user";

/// Adapts a [`HashStore`] into a [`CredentialVerifier`] with bcrypt
///
/// A failed lookup still runs bcrypt against a dummy hash of the store's
/// cost, so an unknown user takes as long as a wrong password.
#[derive(Debug, Clone)]
pub struct BcryptVerifier<H> {
    store: H,
    dummy_hash: String,
}

impl<H: HashStore> BcryptVerifier<H> {
    pub fn new(store: H) -> Self {
        let cost = store.hash_cost().unwrap_or(bcrypt::DEFAULT_COST);
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)
            .or_else(|_| bcrypt::hash(DUMMY_PASSWORD, bcrypt::DEFAULT_COST))
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build dummy hash: {}", e);
                String::new()
            });
        Self { store, dummy_hash }
    }
}

impl<H: HashStore> CredentialVerifier for BcryptVerifier<H> {
    fn verify(&self, username: &str, password: &str) -> bool {
        let hash = match self.store.get_hash(username) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::debug!("Hash lookup failed: {}", e);
                let _ = bcrypt::verify(password, &self.dummy_hash);
                return false;
            }
        };

        match bcrypt::verify(password, &hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(username, "Stored hash is unusable: {}", e);
                false
            }
        }
    }
}

/// In-memory username to bcrypt hash table
#[derive(Debug, Clone, Default)]
pub struct MemoryHashStore {
    hashes: HashMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an already computed bcrypt hash
    pub fn with_hash(mut self, username: impl Into<String>, hash: impl Into<String>) -> Self {
        self.hashes.insert(username.into(), hash.into());
        self
    }

    /// Hash `password` at `cost` and add the user
    pub fn with_password(self, username: impl Into<String>, password: &str, cost: u32) -> Result<Self> {
        let hash = bcrypt::hash(password, cost)?;
        Ok(self.with_hash(username, hash))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryHashStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl HashStore for MemoryHashStore {
    fn get_hash(&self, username: &str) -> Result<String> {
        self.hashes
            .get(username)
            .cloned()
            .ok_or_else(|| Error::UnknownUser(username.to_string()))
    }

    /// Highest cost among the stored hashes
    fn hash_cost(&self) -> Option<u32> {
        self.hashes
            .values()
            .filter_map(|hash| hash.parse::<HashParts>().ok())
            .map(|parts| parts.get_cost())
            .max()
    }
}

/// Verifier for a single fixed username/password pair
#[derive(Debug, Clone)]
pub struct PlainVerifier {
    username: String,
    password: String,
}

impl PlainVerifier {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialVerifier for PlainVerifier {
    fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both comparisons so a wrong username costs the same as a wrong password
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
