//! End-to-end tests against a real listener

use gatehouse::api::{create_router, serve, AppState};
use gatehouse::config::Config;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Helper to start the server on an ephemeral port
async fn start_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let mut config = Config::default();
    config.users.insert(
        "admin".to_string(),
        bcrypt::hash("secret", 4).expect("Failed to hash password"),
    );
    let state = AppState::from_config(&config).expect("Invalid config");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = serve(listener, create_router(state)).await;
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_login_flow_over_http() {
    let (base, server) = start_test_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/secured", base);

    // No credentials
    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Basic realm=\"Authorization Required\""
    );

    // Correct credentials
    let response = client
        .get(&url)
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
        .expect("Missing session cookie");
    assert!(cookie.starts_with("gatehouse_session="));
    assert_eq!(response.text().await.unwrap(), "Secured info...");

    // Cookie only
    let response = client
        .get(&url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("set-cookie").is_none());

    // Wrong password is delayed
    let start = Instant::now();
    let response = client
        .get(&url)
        .basic_auth("admin", Some("wrongpass"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert!(start.elapsed() >= Duration::from_millis(100));

    server.abort();
}
