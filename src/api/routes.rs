//! API route handlers

use axum::{response::IntoResponse, Json};
use serde::Serialize;

use crate::decorators::GENERIC_DATA_KEY;
use crate::shared::SharedScope;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Service details handed down the protected chain as generic data
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl AppInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub request_id: String,
    pub app: Option<AppInfo>,
}

// Health check

pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("healthy"))
}

// Protected routes

pub async fn secured() -> impl IntoResponse {
    "Secured info..."
}

pub async fn whoami(scope: SharedScope) -> impl IntoResponse {
    let app = scope
        .get_as::<AppInfo>(GENERIC_DATA_KEY)
        .map(|info| info.as_ref().clone());

    if app.is_none() {
        tracing::warn!(request_id = %scope.id(), "No app info in shared data");
    }

    Json(ApiResponse::ok(WhoAmI {
        request_id: scope.id().to_string(),
        app,
    }))
}
