//! HTTP surface. `/chat` always answers 200 with `{status, reply}`; the
//! caller's message shape is resolved to plain text here and nowhere else.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::engine::{Engine, InboundTurn, TurnOutcome, TurnStatus};
use crate::metrics::Metrics;
use crate::model::{MessageRecord, Metadata, Sender};
use crate::persona::NEUTRAL_REPLY;
use crate::session::sweeper;

pub const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_FORCE_REASON: &str = "Manual completion";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub metrics: Option<Metrics>,
    /// When set, `x-api-key` must match; otherwise any non-empty key is accepted.
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            metrics: None,
            api_key: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    fn check_key(&self, headers: &HeaderMap) -> Result<(), &'static str> {
        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if presented.is_empty() {
            return Err("Missing x-api-key header");
        }
        match &self.api_key {
            Some(expected) if expected != presented => Err("Invalid API key"),
            _ => Ok(()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/stats", get(stats))
        .route("/admin/cleanup", post(admin_cleanup))
        .route("/admin/force-complete/{session_id}", post(admin_force_complete));
    if let Some(m) = &state.metrics {
        app = app.merge(m.router());
    }
    app.layer(CorsLayer::very_permissive()).with_state(state)
}

// ---------- inbound shapes ----------

/// Caller message: a string, a number, or an object (a message record or
/// any other map).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageInput {
    Text(String),
    Number(serde_json::Number),
    Object(serde_json::Map<String, Value>),
}

impl MessageInput {
    /// Plain text plus any timestamp the caller attached.
    pub fn resolve(self) -> (String, Option<i64>) {
        match self {
            MessageInput::Text(s) => (s, None),
            MessageInput::Number(n) => (n.to_string(), None),
            MessageInput::Object(m) => {
                let timestamp = m.get("timestamp").and_then(Value::as_i64);
                let text = ["text", "content", "message", "body"]
                    .iter()
                    .find_map(|k| m.get(*k).and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(m).to_string());
                (text, timestamp)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl HistoryEntry {
    fn into_record(self) -> Option<MessageRecord> {
        let text = self.text.filter(|t| !t.trim().is_empty())?;
        let sender = match self.sender.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("user") | Some("agent") | Some("responder") => Sender::Responder,
            _ => Sender::Adversary,
        };
        Some(MessageRecord::new(sender, text, self.timestamp.unwrap_or(0)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, alias = "session_id")]
    pub session_id: Option<Value>,
    #[serde(default)]
    pub message: Option<MessageInput>,
    #[serde(default, alias = "conversation_history")]
    pub conversation_history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl ChatRequest {
    pub fn into_turn(self) -> InboundTurn {
        let session_id = match self.session_id {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let (text, timestamp) = self
            .message
            .map(MessageInput::resolve)
            .unwrap_or_default();
        let history = self
            .conversation_history
            .unwrap_or_default()
            .into_iter()
            .filter_map(HistoryEntry::into_record)
            .collect();
        InboundTurn {
            session_id,
            text,
            history,
            metadata: self.metadata,
            timestamp,
        }
    }
}

// ---------- handlers ----------

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.engine.store().stats();
    Json(json!({
        "status": "healthy",
        "active_sessions": stats.active_sessions,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<TurnOutcome> {
    if let Err(reason) = state.check_key(&headers) {
        warn!(target: "turn", reason, "chat rejected");
        return Json(TurnOutcome {
            status: TurnStatus::Error,
            reply: reason.to_string(),
        });
    }
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "turn", error = %e, "malformed chat body");
            return Json(TurnOutcome {
                status: TurnStatus::Error,
                reply: NEUTRAL_REPLY.to_string(),
            });
        }
    };
    Json(state.engine.handle_turn(req.into_turn()).await)
}

async fn stats(State(state): State<AppState>) -> Json<crate::session::SessionStats> {
    Json(state.engine.store().stats())
}

async fn admin_cleanup(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if let Err(reason) = state.check_key(&headers) {
        return Json(json!({ "status": "error", "message": reason }));
    }
    let engine = state.engine.clone();
    let report = sweeper::run_once(engine.store(), &engine.config().retention);
    info!(
        target: "sweep",
        completed = report.completed.len(),
        evicted = report.evicted,
        archived = report.archived,
        "admin cleanup"
    );
    Json(json!({
        "status": "success",
        "completed_sessions": report.completed,
        "stale_sessions_cleaned": report.evicted,
        "sessions_archived": report.archived,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct ForceCompleteReq {
    #[serde(default)]
    reason: Option<String>,
}

async fn admin_force_complete(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    if let Err(reason) = state.check_key(&headers) {
        return Json(json!({ "status": "error", "message": reason }));
    }
    let reason = serde_json::from_slice::<ForceCompleteReq>(&body)
        .ok()
        .and_then(|r| r.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FORCE_REASON.to_string());
    if state.engine.store().force_complete(&session_id, &reason) {
        info!(target: "session", session_id = %session_id, reason = %reason, "force-completed by operator");
        Json(json!({
            "status": "success",
            "message": format!("Session {session_id} completed"),
        }))
    } else {
        Json(json!({ "status": "error", "message": "Session not found" }))
    }
}
