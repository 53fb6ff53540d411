//! The gateway served over real TCP connections.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, HOST};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use portico_config::{PorticoConfig, RouteGroupConfig, TokenConfig};
use portico_middleware::routing::{FnHandler, HandlerRequest};
use portico_middleware::{Response, ResponseExt};
use portico_server::{Gateway, Server, ShutdownSignal};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    server: JoinHandle<()>,
}

async fn start() -> Running {
    let mut config = PorticoConfig::development();
    config.health.probes.clear();
    config.server.request_timeout_ms = 200;
    config.server.shutdown_timeout_secs = 5;
    config.authentication.tokens.push(TokenConfig {
        token: "admin-token".to_string(),
        subject: "alice".to_string(),
        name: None,
        roles: vec!["Admin".to_string()],
    });
    config.routes.groups.push(RouteGroupConfig {
        name: "public".to_string(),
        policy: None,
        anonymous: true,
    });

    let gateway = Gateway::builder(config)
        .route(
            "users",
            Method::GET,
            "/users/{id}",
            FnHandler::new(|input: HandlerRequest| async move {
                let id = input.params.get("id").cloned().unwrap_or_default();
                Ok(Response::with_body(StatusCode::OK, "text/plain", id))
            }),
        )
        .route(
            "public",
            Method::GET,
            "/slow",
            FnHandler::new(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(Response::with_body(StatusCode::OK, "text/plain", "late"))
            }),
        )
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let server = tokio::spawn(Server::new(gateway).serve(listener, shutdown.clone()));
    Running {
        addr,
        shutdown,
        server,
    }
}

async fn get(addr: SocketAddr, path: &str, token: Option<&str>) -> (StatusCode, String) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(connection);

    let mut request = http::Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, "localhost");
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = sender
        .send_request(request.body(Empty::<Bytes>::new()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn stop(running: Running) {
    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.server)
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_health_is_served_anonymously() {
    let running = start().await;

    let (status, body) = get(running.addr, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let report: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["status"], "Healthy");

    stop(running).await;
}

#[tokio::test]
async fn test_gated_route_requires_credentials() {
    let running = start().await;

    let (status, body) = get(running.addr, "/users/42", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("AUTHENTICATION_REQUIRED"));

    let (status, body) = get(running.addr, "/users/42", Some("admin-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "42");

    stop(running).await;
}

#[tokio::test]
async fn test_slow_handler_times_out() {
    let running = start().await;

    let (status, body) = get(running.addr, "/slow", None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body.contains("REQUEST_TIMEOUT"));

    stop(running).await;
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let running = start().await;

    let (status, _) = get(running.addr, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    stop(running).await;
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let running = start().await;
    let addr = running.addr;
    stop(running).await;

    assert!(TcpStream::connect(addr).await.is_err());
}
