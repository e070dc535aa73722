use axum::{
    routing::{get, post},
    Router,
};
use operator_desk_core::config::ServerConfig;
use std::path::Path;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    active_users_handler, clear_handler, end_handler, events_handler, health_handler,
    history_handler, rename_handler, send_handler,
};
use crate::state::AppState;

/// Operator-facing routes, plus the dashboard assets when a directory is given
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/active-users", get(active_users_handler))
        .route("/api/history/:user_id", get(history_handler))
        .route("/api/send", post(send_handler))
        .route("/api/end", post(end_handler))
        .route("/api/clear", post(clear_handler))
        .route("/api/rename", post(rename_handler))
        .route("/api/events", get(events_handler))
        .route("/api/health", get(health_handler));

    if let Some(dir) = static_dir {
        tracing::info!("Serving dashboard from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    config: &ServerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state, config.static_dir.as_deref().map(Path::new));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use operator_desk_core::bus::OutboundMessage;
    use operator_desk_core::config::RelayConfig;
    use operator_desk_core::engine::{Outbound, RelayEngine};
    use operator_desk_core::store::UserId;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubOutbound {
        fail: AtomicBool,
        sent: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl Outbound for StubOutbound {
        async fn deliver(&self, message: OutboundMessage) -> operator_desk_core::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(operator_desk_core::Error::Delivery(
                    "Forbidden: bot was blocked by the user".to_string(),
                ));
            }
            self.sent.lock().push(message);
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        outbound: Arc<StubOutbound>,
    }

    impl Harness {
        fn new() -> Self {
            let outbound = Arc::new(StubOutbound::default());
            let mut relay = RelayConfig::default();
            relay.greetings.session_start.clear();
            relay.greetings.first_message.clear();
            let engine = Arc::new(RelayEngine::new(relay, outbound.clone()));
            let (shutdown, _) = broadcast::channel(1);
            Self {
                state: AppState::new(engine, shutdown),
                outbound,
            }
        }

        fn uid(raw: &str) -> UserId {
            UserId::parse(raw).unwrap()
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            self.call(request).await
        }

        async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
            let request = Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.call(request).await
        }

        async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = build_router(self.state.clone(), None)
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[tokio::test]
    async fn test_active_users_in_insertion_order() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("3"), "a");
        h.state.engine.receive_message(&Harness::uid("1"), "b");

        let (status, body) = h.get("/api/active-users").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "active": ["3", "1"] }));
    }

    #[tokio::test]
    async fn test_history_for_known_and_unknown_user() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");

        let (status, body) = h.get("/api/history/42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"][0]["text"], "hello");
        assert_eq!(body["history"][0]["sender"], "user");
        assert!(body["history"][0]["timestamp"].is_string());

        let (status, body) = h.get("/api/history/nobody").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "history": [] }));

        let (status, body) = h.get("/api/history/%20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "history": [] }));
    }

    #[tokio::test]
    async fn test_send_success() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");

        let (status, body) = h.post("/api/send", r#"{"userId":"42","text":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
        assert_eq!(h.outbound.sent.lock()[0].content, "hi");
        assert_eq!(h.state.engine.history(&Harness::uid("42")).len(), 2);
    }

    #[tokio::test]
    async fn test_send_accepts_numeric_user_id() {
        let h = Harness::new();
        let (status, _) = h.post("/api/send", r#"{"userId":42,"text":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.outbound.sent.lock()[0].chat_id, "42");
    }

    #[tokio::test]
    async fn test_send_delivery_failure() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");
        h.outbound.fail.store(true, Ordering::SeqCst);

        let (status, body) = h.post("/api/send", r#"{"userId":"42","text":"hi"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "delivery");
        assert!(body["error"].as_str().unwrap().contains("blocked"));
        assert_eq!(h.state.engine.history(&Harness::uid("42")).len(), 1);
    }

    #[tokio::test]
    async fn test_send_validation_errors() {
        let h = Harness::new();

        for body in [
            r#"{"text":"hi"}"#,
            r#"{"userId":"42"}"#,
            r#"{"userId":"","text":"hi"}"#,
            r#"{"userId":"42","text":""}"#,
            "not json",
        ] {
            let (status, response) = h.post("/api/send", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(response["kind"], "validation");
        }
        assert!(h.outbound.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_end_removes_user() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");

        let (status, body) = h.post("/api/end", r#"{"userId":"42"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(h.state.engine.active_users().is_empty());
        assert_eq!(h.outbound.sent.lock()[0].content, "Chat ended.");
    }

    #[tokio::test]
    async fn test_end_requires_user_id() {
        let h = Harness::new();
        let (status, body) = h.post("/api/end", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("userId"));
    }

    #[tokio::test]
    async fn test_clear_keeps_user_active() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");

        let (status, _) = h.post("/api/clear", r#"{"userId":"42"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.state.engine.history(&Harness::uid("42")).is_empty());
        assert_eq!(h.state.engine.active_users(), vec![Harness::uid("42")]);
    }

    #[tokio::test]
    async fn test_rename_paths() {
        let h = Harness::new();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");
        h.state.engine.receive_message(&Harness::uid("7"), "yo");

        let (status, body) = h
            .post("/api/rename", r#"{"oldUserId":"ghost","newUserId":"x"}"#)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        let (status, body) = h
            .post("/api/rename", r#"{"oldUserId":"42","newUserId":"7"}"#)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");

        let (status, _) = h.post("/api/rename", r#"{"oldUserId":"42"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .post("/api/rename", r#"{"oldUserId":"42","newUserId":"alice"}"#)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            h.state.engine.active_users(),
            vec![Harness::uid("alice"), Harness::uid("7")]
        );
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new();
        h.state.engine.start_session(&Harness::uid("42"));

        let (status, body) = h.get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "active": 1 }));
    }

    #[tokio::test]
    async fn test_events_stream_is_sse() {
        let h = Harness::new();
        let request = Request::get("/api/events").body(Body::empty()).unwrap();
        let response = build_router(h.state.clone(), None)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"));
        assert_eq!(h.state.engine.hub().observer_count(), 1);

        let mut body = response.into_body().into_data_stream();
        h.state.engine.receive_message(&Harness::uid("42"), "hello");

        let mut text = String::new();
        while !text.contains("event: newMessage") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            text.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        assert!(text.contains("event: newUser"));
        assert!(text.contains(r#""text":"hello""#));

        // The stream finishes once shutdown fires
        h.state.shutdown.send(()).unwrap();
        let end = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_static_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>desk</h1>").unwrap();
        let h = Harness::new();

        let response = build_router(h.state.clone(), Some(dir.path()))
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>desk</h1>");
    }
}
