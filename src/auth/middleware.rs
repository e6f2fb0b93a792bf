//! Authentication gate middleware
//!
//! A request passes the gate if it carries a registered session cookie.
//! Otherwise the gate falls back to HTTP Basic credentials: a successful
//! check issues a new session token and sets it as a cookie, so later
//! requests skip the (expensive) password hashing. Every failure is
//! answered the same way after a random delay, so callers cannot tell an
//! unknown user from a wrong password or a broken backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::auth::session::SessionRegistry;
use crate::auth::token::{generate_token, random_delay};
use crate::auth::verifier::CredentialVerifier;
use crate::config::AuthConfig;

const DEFAULT_CHALLENGE: &str = "Basic realm=\"Authorization Required\"";

/// Runtime settings of the gate
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Name of the session cookie
    pub cookie_name: String,
    /// Realm advertised in the Basic challenge
    pub realm: String,
    /// Length of issued session tokens
    pub token_length: usize,
    /// Failed attempts are delayed by a random duration in `[delay_min, delay_max]`
    pub delay_min: Duration,
    pub delay_max: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthConfig::default().settings()
    }
}

impl AuthSettings {
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.delay_min = min;
        self.delay_max = max;
        self
    }
}

/// Result of running a request's headers through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A registered session cookie was presented
    Session,
    /// Basic credentials were valid and this token was registered
    Issued(String),
    Rejected,
}

/// Shared state of the authentication middleware
#[derive(Clone)]
pub struct AuthGate {
    registry: SessionRegistry,
    verifier: Arc<dyn CredentialVerifier>,
    settings: Arc<AuthSettings>,
}

impl AuthGate {
    pub fn new<V>(verifier: V, registry: SessionRegistry, settings: AuthSettings) -> Self
    where
        V: CredentialVerifier + 'static,
    {
        Self::from_arc(Arc::new(verifier), registry, settings)
    }

    pub fn from_arc(
        verifier: Arc<dyn CredentialVerifier>,
        registry: SessionRegistry,
        settings: AuthSettings,
    ) -> Self {
        Self {
            registry,
            verifier,
            settings: Arc::new(settings),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Decide whether the request may pass, registering a session on a fresh login
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        if let Some(token) = session_cookie(headers, &self.settings.cookie_name) {
            if self.registry.contains(&token).await {
                return AuthOutcome::Session;
            }
        }

        let Some((username, password)) = basic_credentials(headers) else {
            tracing::debug!("No usable Basic credentials");
            return AuthOutcome::Rejected;
        };

        if !self.verify(username.clone(), password).await {
            tracing::warn!(username = %username, "Authentication failed");
            return AuthOutcome::Rejected;
        }

        let token = generate_token(self.settings.token_length);
        self.registry.insert(token.clone()).await;
        tracing::info!(username = %username, "Issued session");
        AuthOutcome::Issued(token)
    }

    /// Run the verifier off the async workers, hashing is CPU bound
    async fn verify(&self, username: String, password: String) -> bool {
        let verifier = Arc::clone(&self.verifier);
        match tokio::task::spawn_blocking(move || verifier.verify(&username, &password)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!("Credential verification task failed: {}", e);
                false
            }
        }
    }

    /// `Set-Cookie` value for a newly issued session, without Max-Age
    pub fn session_cookie_header(&self, token: &str) -> Option<HeaderValue> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.settings.cookie_name, token
        );
        HeaderValue::from_str(&cookie)
            .map_err(|e| tracing::error!("Invalid session cookie: {}", e))
            .ok()
    }

    /// Delay, then answer with the uniform 401 challenge
    pub async fn reject(&self) -> Response {
        let delay = random_delay(self.settings.delay_min, self.settings.delay_max);
        tokio::time::sleep(delay).await;
        unauthorized(&self.settings.realm)
    }
}

/// 401 response carrying the Basic challenge
pub fn unauthorized(realm: &str) -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CHALLENGE));
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    response
}

/// Read the value of cookie `name` from the request headers
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Decode `Authorization: Basic ...` into a username/password pair
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware for requiring authentication
pub async fn require_auth(State(gate): State<AuthGate>, req: Request, next: Next) -> Response {
    match gate.authenticate(req.headers()).await {
        AuthOutcome::Session => next.run(req).await,
        AuthOutcome::Issued(token) => {
            let cookie = gate.session_cookie_header(&token);
            let mut response = next.run(req).await;
            if let Some(cookie) = cookie {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
        AuthOutcome::Rejected => gate.reject().await,
    }
}

/// End the presented session and expire the cookie
pub async fn logout(State(gate): State<AuthGate>, headers: HeaderMap) -> Response {
    let name = &gate.settings().cookie_name;
    if let Some(token) = session_cookie(&headers, name) {
        if gate.registry().remove(&token).await {
            tracing::info!("Session ended");
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    let expired = format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name);
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}
