//! axum integration of the shared data store

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::store::{RequestId, SharedDataStore, SharedValue};
use crate::error::Result;

/// Handle on the current request's scope, available to every handler
/// behind `with_shared_data`
#[derive(Debug, Clone)]
pub struct SharedScope {
    store: SharedDataStore,
    id: RequestId,
}

impl SharedScope {
    pub fn new(store: SharedDataStore, id: RequestId) -> Self {
        Self { store, id }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn insert<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.store.insert(self.id, key, value);
    }

    pub fn insert_shared(&self, key: impl Into<String>, value: SharedValue) {
        self.store.insert_shared(self.id, key, value);
    }

    pub fn get(&self, key: &str) -> Option<SharedValue> {
        self.store.get(self.id, key)
    }

    pub fn get_as<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.store.get_as(self.id, key)
    }

    pub fn delete(&self, key: &str) -> Result<SharedValue> {
        self.store.delete(self.id, key)
    }
}

/// Rejection when a handler asks for a scope outside `with_shared_data`
#[derive(Debug)]
pub struct MissingSharedScope;

impl IntoResponse for MissingSharedScope {
    fn into_response(self) -> Response {
        tracing::error!("SharedScope extracted outside with_shared_data, check the layer order");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

impl<S> FromRequestParts<S> for SharedScope
where
    S: Send + Sync,
{
    type Rejection = MissingSharedScope;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SharedScope>()
            .cloned()
            .ok_or(MissingSharedScope)
    }
}

/// Middleware opening a shared data scope for the rest of the chain
///
/// The scope is closed when the inner service finishes, panics, or the
/// request future is dropped.
pub async fn with_shared_data(
    State(store): State<SharedDataStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let guard = store.enter();
    let id = guard.id();
    req.extensions_mut().insert(id);
    req.extensions_mut().insert(SharedScope::new(store, id));

    let response = next.run(req).await;
    drop(guard);
    response
}
