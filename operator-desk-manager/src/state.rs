use operator_desk_core::engine::RelayEngine;
use operator_desk_core::store::UserId;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
    /// Fires once on shutdown; ends open event streams
    pub shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(engine: Arc<RelayEngine>, shutdown: broadcast::Sender<()>) -> Self {
        Self { engine, shutdown }
    }
}

// Request bodies keep every field optional so a missing field surfaces as a
// validation error with a readable message instead of a bare 422.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub user_id: Option<UserId>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub old_user_id: Option<UserId>,
    pub new_user_id: Option<UserId>,
}
