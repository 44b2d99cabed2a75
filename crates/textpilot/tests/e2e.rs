// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: HTTP gateway over the loopback engine.
//!
//! Each test gets its own temporary sessions directory, so tests are
//! independent and order-insensitive.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use textpilot_gateway::{build_router, GatewayState};
use textpilot_loopback::LoopbackFactory;
use textpilot_session::{RegistryConfig, SessionRegistry, SessionState};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Stack {
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    app: Router,
}

fn stack(dir: &Path) -> Stack {
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(LoopbackFactory::new(Duration::from_millis(50))),
        RegistryConfig::new(dir),
    ));
    let shutdown = CancellationToken::new();
    let app = build_router(
        GatewayState::new(Arc::clone(&registry), shutdown.clone()),
        &["*".to_string()],
    );
    Stack {
        registry,
        shutdown,
        app,
    }
}

async fn json_call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(Method::POST).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn open_events(app: &Router, session_id: &str) -> BodyDataStream {
    let request = Request::builder()
        .uri(format!("/clients/{session_id}/events"))
        .header(header::ACCEPT, "text/event-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().into_data_stream()
}

/// Reads frames into `seen` until it contains `needle`.
async fn read_until(stream: &mut BodyDataStream, seen: &mut String, needle: &str) {
    tokio::time::timeout(TIMEOUT, async {
        while !seen.contains(needle) {
            let chunk = stream
                .next()
                .await
                .expect("event stream ended early")
                .unwrap();
            seen.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got:\n{seen}"));
}

#[tokio::test]
async fn pairing_messaging_and_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    let (status, id) = json_call(&stack.app, post("/clients/connect", None)).await;
    assert_eq!(status, StatusCode::OK);
    let id = id.as_str().unwrap().to_string();
    assert!(dir.path().join(&id).join("session.db").is_file());

    let mut events = open_events(&stack.app, &id).await;
    let mut seen = String::new();
    read_until(&mut events, &mut seen, r#""data":"connected""#).await;
    let buffer = seen.find("event: buffer").unwrap();
    let qr = seen.find("event: qr_code").unwrap();
    assert!(buffer < qr);

    let (status, sent) = json_call(
        &stack.app,
        post(
            &format!("/clients/{id}/messages/send"),
            Some(json!({"jid": "4915112345678@s.whatsapp.net", "text": "ping"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["isFromMe"], true);
    assert!(sent["senderId"].as_str().unwrap().starts_with("1555"));

    read_until(&mut events, &mut seen, r#""isFromMe":false"#).await;
    assert!(seen.contains(r#""chatId":"4915112345678@s.whatsapp.net""#));

    let (status, chats) = json_call(
        &stack.app,
        Request::builder()
            .uri(format!("/clients/{id}/chats"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chats[0]["jid"], "4915112345678@s.whatsapp.net");
    assert_eq!(chats[0]["pfp"], "");

    let (status, _) = json_call(&stack.app, post(&format!("/clients/{id}/disconnect"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let rest = tokio::time::timeout(TIMEOUT, events.count()).await;
    assert!(rest.is_ok(), "event stream should end after disconnect");
    assert!(stack.registry.is_empty().await);
}

#[tokio::test]
async fn paired_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let first = stack(dir.path());
        let (_, id) = json_call(&first.app, post("/clients/connect", None)).await;
        let id = id.as_str().unwrap().to_string();
        let session = first.registry.require(&id).await.unwrap();
        let mut state = session.subscribe_state();
        tokio::time::timeout(TIMEOUT, state.wait_for(|s| *s == SessionState::Connected))
            .await
            .unwrap()
            .unwrap();
        first.shutdown.cancel();
        first.registry.shutdown_all().await;
        id
    };
    std::fs::create_dir_all(dir.path().join("not-paired")).unwrap();

    let second = stack(dir.path());
    let summary = second.registry.reload_all().await.unwrap();
    assert_eq!(summary.restored, vec![id.clone()]);
    assert_eq!(summary.skipped, vec!["not-paired".to_string()]);

    let mut events = open_events(&second.app, &id).await;
    let mut seen = String::new();
    read_until(&mut events, &mut seen, r#""data":"connected""#).await;
    assert!(!seen.contains("event: qr_code"));
}
