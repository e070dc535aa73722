use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use operator_desk_core::bus::RelayEvent;
use operator_desk_core::store::UserId;
use operator_desk_core::Error;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::{AppState, RenameRequest, SendRequest, UserRequest};

const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

/// Error returned by every command endpoint
///
/// Serialized as `{"success": false, "error": ..., "kind": ...}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Delivery(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self.0);
        }
        let body = json!({
            "success": false,
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn success() -> ApiResult {
    Ok(Json(json!({ "success": true })))
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, ApiError> {
    field.ok_or_else(|| ApiError(Error::Validation(format!("{} is required", name))))
}

pub async fn active_users_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "active": state.engine.active_users() }))
}

/// History of one user; an id that cannot name a user has none
pub async fn history_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let history = match UserId::parse(&user_id) {
        Ok(user_id) => state.engine.history(&user_id),
        Err(_) => Vec::new(),
    };
    Json(json!({ "history": history }))
}

pub async fn send_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let user_id = required(req.user_id, "userId")?;
    let text = required(req.text, "text")?;
    state.engine.send(user_id, text).await?;
    success()
}

pub async fn end_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let user_id = required(req.user_id, "userId")?;
    state.engine.end(user_id).await?;
    success()
}

pub async fn clear_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let user_id = required(req.user_id, "userId")?;
    state.engine.clear(&user_id);
    success()
}

pub async fn rename_handler(
    State(state): State<AppState>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let old_user_id = required(req.old_user_id, "oldUserId")?;
    let new_user_id = required(req.new_user_id, "newUserId")?;
    state.engine.rename(&old_user_id, &new_user_id)?;
    success()
}

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active": state.engine.active_users().len(),
    }))
}

/// Live relay events; one SSE event per relay event, named after it
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine.subscribe().into_inner();
    tracing::debug!("Observer connected ({} total)", state.engine.hub().observer_count());

    let mut shutdown = state.shutdown.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(to_sse_event(&event))),
        Err(e) => {
            tracing::warn!("Observer lagged behind: {}", e);
            None
        }
    });
    // Open streams would otherwise hold graceful shutdown forever
    let stream = futures::StreamExt::take_until(stream, async move {
        let _ = shutdown.recv().await;
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE).text("ping"))
}

fn to_sse_event(event: &RelayEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}
