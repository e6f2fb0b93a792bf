//! Session registry
//!
//! The registry is the set of tokens that currently count as "logged in".
//! Holding a registered token is the whole credential: no user or role is
//! attached. Entries only record when they were issued so the registry can
//! stay bounded, either by age (TTL) or by evicting the oldest session once
//! `max_sessions` is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::AuthConfig;

const DEFAULT_MAX_SESSIONS: usize = 100_000;

/// Bookkeeping for a registered token
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// When the token was issued
    pub issued_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            issued_at: Utc::now(),
        }
    }

    /// Check if the entry has outlived `ttl`
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        Utc::now()
            .signed_duration_since(self.issued_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, SessionEntry>,
    /// Tokens in issue order, may hold tokens already removed from `entries`
    order: VecDeque<String>,
}

impl Inner {
    fn evict_oldest(&mut self) -> Option<String> {
        while let Some(token) = self.order.pop_front() {
            if self.entries.remove(&token).is_some() {
                return Some(token);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order.retain(|token| entries.contains_key(token));
    }
}

/// Concurrency-safe set of valid session tokens
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
    ttl: Option<Duration>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create a registry whose sessions live as long as the process
    pub fn new() -> Self {
        Self::with_limits(None, DEFAULT_MAX_SESSIONS)
    }

    /// Create a registry with an optional TTL and a hard size cap
    pub fn with_limits(ttl: Option<Duration>, max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::with_limits(config.session_ttl(), config.max_sessions)
    }

    /// Check whether `token` is a live session
    pub async fn contains(&self, token: &str) -> bool {
        self.inner
            .read()
            .await
            .entries
            .get(token)
            .is_some_and(|entry| !entry.is_expired(self.ttl))
    }

    /// Register a freshly issued token, evicting the oldest session when full
    pub async fn insert(&self, token: String) {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&token) {
            return;
        }
        while inner.entries.len() >= self.max_sessions {
            if inner.evict_oldest().is_none() {
                break;
            }
            tracing::debug!("Session registry full, evicted oldest session");
        }
        inner.order.push_back(token.clone());
        inner.entries.insert(token, SessionEntry::new());
    }

    /// Forget a session, returns whether it was registered
    pub async fn remove(&self, token: &str) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.entries.remove(token).is_some();
        if inner.order.len() > 2 * inner.entries.len() + 64 {
            inner.compact_order();
        }
        removed
    }

    /// Drop expired sessions, returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| !entry.is_expired(ttl));
        inner.compact_order();
        before - inner.entries.len()
    }

    /// Run `sweep_expired` every `every` until the task is aborted
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = registry.sweep_expired().await;
                if removed > 0 {
                    tracing::info!(removed, "Swept expired sessions");
                }
            }
        })
    }

    /// Get session count
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
            max_sessions: self.max_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_contains() {
        let registry = SessionRegistry::new();
        assert!(!registry.contains("abc").await);

        registry.insert("abc".to_string()).await;
        assert!(registry.contains("abc").await);
        assert!(!registry.contains("abd").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_single_entry() {
        let registry = SessionRegistry::new();
        registry.insert("abc".to_string()).await;
        registry.insert("abc".to_string()).await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let registry = SessionRegistry::new();
        registry.insert("abc".to_string()).await;

        assert!(registry.remove("abc").await);
        assert!(!registry.remove("abc").await);
        assert!(!registry.contains("abc").await);
    }

    #[tokio::test]
    async fn test_session_expiration() {
        let registry = SessionRegistry::with_limits(Some(Duration::from_secs(60)), 10);
        registry.insert("old".to_string()).await;
        registry.insert("new".to_string()).await;

        // Manually age one session for testing
        {
            let mut inner = registry.inner.write().await;
            if let Some(entry) = inner.entries.get_mut("old") {
                entry.issued_at = Utc::now() - chrono::Duration::minutes(2);
            }
        }

        assert!(!registry.contains("old").await);
        assert!(registry.contains("new").await);

        assert_eq!(registry.sweep_expired().await, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let registry = SessionRegistry::new();
        registry.insert("abc".to_string()).await;
        {
            let mut inner = registry.inner.write().await;
            if let Some(entry) = inner.entries.get_mut("abc") {
                entry.issued_at = Utc::now() - chrono::Duration::days(365);
            }
        }
        assert!(registry.contains("abc").await);
        assert_eq!(registry.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let registry = SessionRegistry::with_limits(None, 2);
        registry.insert("first".to_string()).await;
        registry.insert("second".to_string()).await;
        registry.insert("third".to_string()).await;

        assert_eq!(registry.len().await, 2);
        assert!(!registry.contains("first").await);
        assert!(registry.contains("second").await);
        assert!(registry.contains("third").await);
    }

    #[tokio::test]
    async fn test_capacity_skips_removed_tokens() {
        let registry = SessionRegistry::with_limits(None, 2);
        registry.insert("first".to_string()).await;
        registry.insert("second".to_string()).await;
        registry.remove("first").await;
        registry.insert("third".to_string()).await;
        registry.insert("fourth".to_string()).await;

        assert!(!registry.contains("second").await);
        assert!(registry.contains("third").await);
        assert!(registry.contains("fourth").await);
    }

    #[tokio::test]
    async fn test_clone_shares_sessions() {
        let registry = SessionRegistry::new();
        let other = registry.clone();
        registry.insert("abc".to_string()).await;
        assert!(other.contains("abc").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired() {
        let registry = SessionRegistry::with_limits(Some(Duration::from_secs(1)), 10);
        registry.insert("abc".to_string()).await;
        {
            let mut inner = registry.inner.write().await;
            if let Some(entry) = inner.entries.get_mut("abc") {
                entry.issued_at = Utc::now() - chrono::Duration::seconds(5);
            }
        }

        let handle = registry.spawn_sweeper(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert!(registry.is_empty().await);
        handle.abort();
    }
}
