//! Stateless decorators that sit around the gate and the shared data scope

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::Result;
use crate::shared::{SharedScope, SharedValue};

/// Shared data key of the resource lent by [`lend_resource`]
pub const DB_SESSION_KEY: &str = "db-session";

/// Shared data key of the value inserted by [`with_generic_data`]
pub const GENERIC_DATA_KEY: &str = "generic-data";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Allow cross-origin requests from anywhere
pub async fn with_cors(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Log `<method> <remote addr> <uri>` for every request
pub async fn log_request(req: Request, next: Next) -> Response {
    let remote = remote_addr(&req);
    tracing::info!("{} {} {}", req.method(), remote, req.uri());
    next.run(req).await
}

/// Client address, preferring proxy headers over the socket address
pub fn remote_addr(req: &Request) -> String {
    let headers = req.headers();
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return format!("{} (X-Real-IP)", ip);
    }
    if let Some(ip) = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return format!("{} (X-Forwarded-For)", ip);
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Mark a response as JSON
pub fn header_json(headers: &mut HeaderMap) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
}

pub async fn with_json_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    header_json(response.headers_mut());
    response
}

/// Source of per-request resources such as database sessions
pub trait ResourceLender: Send + Sync {
    /// Borrow a resource for one request
    fn acquire(&self) -> Result<SharedValue>;

    /// Give the resource back once the request is done
    fn release(&self, _resource: SharedValue) {}
}

/// Returns the lent resource even if the inner handler panics
struct Lease {
    lender: Arc<dyn ResourceLender>,
    scope: SharedScope,
    resource: Option<SharedValue>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(e) = self.scope.delete(DB_SESSION_KEY) {
            tracing::debug!("Lent resource already gone from shared data: {}", e);
        }
        if let Some(resource) = self.resource.take() {
            self.lender.release(resource);
        }
    }
}

/// Lend a resource to the rest of the chain under [`DB_SESSION_KEY`]
///
/// Must run inside `with_shared_data`. Outside it the `SharedScope`
/// extractor fails the request with a 500 and logs the broken layer order.
pub async fn lend_resource(
    State(lender): State<Arc<dyn ResourceLender>>,
    scope: SharedScope,
    req: Request,
    next: Next,
) -> Response {
    let resource = match lender.acquire() {
        Ok(resource) => resource,
        Err(e) => {
            tracing::error!("Failed to acquire resource: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
        }
    };

    scope.insert_shared(DB_SESSION_KEY, Arc::clone(&resource));
    let _lease = Lease {
        lender,
        scope,
        resource: Some(resource),
    };
    next.run(req).await
}

/// Make `value` readable by the rest of the chain under [`GENERIC_DATA_KEY`]
///
/// Must run inside `with_shared_data`. Outside it the `SharedScope`
/// extractor fails the request with a 500 and logs the broken layer order.
pub async fn with_generic_data<T>(
    State(value): State<T>,
    scope: SharedScope,
    req: Request,
    next: Next,
) -> Response
where
    T: Clone + Send + Sync + 'static,
{
    scope.insert(GENERIC_DATA_KEY, value);
    let response = next.run(req).await;
    if let Err(e) = scope.delete(GENERIC_DATA_KEY) {
        tracing::debug!("Generic data already removed: {}", e);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri("/bar");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_remote_addr_prefers_real_ip() {
        let req = request_with(&[("X-Real-IP", "10.0.0.1"), ("X-Forwarded-For", "10.0.0.2")]);
        assert_eq!(remote_addr(&req), "10.0.0.1 (X-Real-IP)");
    }

    #[test]
    fn test_remote_addr_first_forwarded_hop() {
        let req = request_with(&[("X-Forwarded-For", "203.0.113.7, 10.0.0.2")]);
        assert_eq!(remote_addr(&req), "203.0.113.7 (X-Forwarded-For)");
    }

    #[test]
    fn test_remote_addr_connect_info() {
        let mut req = request_with(&[]);
        let addr: SocketAddr = "127.0.0.1:4242".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(remote_addr(&req), "127.0.0.1:4242");
    }

    #[test]
    fn test_remote_addr_unknown() {
        assert_eq!(remote_addr(&request_with(&[])), "-");
    }

    #[test]
    fn test_header_json() {
        let mut headers = HeaderMap::new();
        header_json(&mut headers);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
    }
}
