//! Plexus's request-processing pipeline: dialect ingress, routing, provider dispatch, and
//! dialect egress, wired up as an [`axum::Router`].

pub mod accounting;
pub mod classifier;
pub mod cooldown;
pub mod dispatcher;
pub mod egress;
pub mod error;
mod http_client;
pub mod ingress;
pub mod provider;
pub mod router;
pub mod tracer;
pub mod unified;

use std::sync::Arc;
use std::sync::RwLock;

use axum::extract::{Path, State};
use axum::response::sse::{Sse, KeepAlive};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use config::Config;
use futures::stream::StreamExt;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::cooldown::CooldownManager;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{LlmError, Result};
use crate::router::Router;
use crate::tracer::TracerSink;

/// Everything a request handler needs: the shared dispatch collaborators plus the live,
/// hot-reloadable configuration snapshot.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Arc<Config>>>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cooldown = CooldownManager::new(config.resilience.cooldown.clone());
        let accounting = accounting::Accounting::spawn(config.pricing.clone());
        let tracer_sink = TracerSink::spawn();
        let router = Arc::new(Router::new());
        let dispatcher = Dispatcher::new(router, cooldown, accounting, tracer_sink);

        Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            dispatcher,
        }
    }

    /// The configuration snapshot in effect right now. Cloning the `Arc` is the only thing a
    /// request does under the lock; the snapshot itself is read for the entire request.
    pub fn config_snapshot(&self) -> Arc<Config> {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// Atomically publish a new configuration snapshot. In-flight requests keep using the
    /// snapshot they already captured.
    pub fn replace_config(&self, config: Config) {
        *self.config.write().expect("config lock poisoned") = Arc::new(config);
    }
}

pub fn app(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/chat/completions", post(openai_chat))
        .route("/v1/responses", post(openai_responses))
        .route("/v1/messages", post(anthropic_messages))
        .route("/v1beta/models/{model}", post(gemini_generate))
        .route("/config", get(get_config).post(post_config))
        .route("/state", get(get_state).post(post_state))
        .route("/logs", get(list_logs))
        .route("/logs/{id}", get(get_log).delete(delete_log))
        .with_state(state)
}

async fn dispatch_and_respond(state: &AppState, request: crate::unified::UnifiedRequest) -> Result<axum::response::Response> {
    let config = state.config_snapshot();
    match state.dispatcher.dispatch(request, config.as_ref()).await? {
        DispatchOutcome::NonStreaming(body) => Ok(Json(body).into_response()),
        DispatchOutcome::Streaming(frames) => {
            let events = frames.map(|frame| Ok::<_, std::convert::Infallible>(frame.into_axum_event()));
            Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
        }
    }
}

async fn openai_chat(State(state): State<AppState>, Json(body): Json<Value>) -> Result<axum::response::Response> {
    let request_id = Uuid::new_v4();
    let (request, warnings) = ingress::openai_chat::translate(&body, request_id)?;
    log_warnings(request_id, &warnings);
    dispatch_and_respond(&state, request).await
}

async fn openai_responses(State(state): State<AppState>, Json(body): Json<Value>) -> Result<axum::response::Response> {
    let request_id = Uuid::new_v4();
    let (request, warnings) = ingress::openai_responses::translate(&body, request_id)?;
    log_warnings(request_id, &warnings);
    dispatch_and_respond(&state, request).await
}

async fn anthropic_messages(State(state): State<AppState>, Json(body): Json<Value>) -> Result<axum::response::Response> {
    let request_id = Uuid::new_v4();
    let (request, warnings) = ingress::anthropic::translate(&body, request_id)?;
    log_warnings(request_id, &warnings);
    dispatch_and_respond(&state, request).await
}

/// Handles both `:generateContent` and `:streamGenerateContent`; the method suffix lives on the
/// end of the path segment since Gemini encodes streaming in the URL rather than the body.
async fn gemini_generate(State(state): State<AppState>, Path(model_and_method): Path<String>, Json(body): Json<Value>) -> Result<axum::response::Response> {
    let request_id = Uuid::new_v4();
    let (model, stream) = match model_and_method.split_once(':') {
        Some((model, "streamGenerateContent")) => (model, true),
        Some((model, "generateContent")) => (model, false),
        Some((model, other)) => return Err(LlmError::InvalidRequest(format!("unsupported Gemini method `{other}`"))),
        None => (model_and_method.as_str(), false),
    };
    let (request, warnings) = ingress::gemini::translate(&body, model, stream, request_id)?;
    log_warnings(request_id, &warnings);
    dispatch_and_respond(&state, request).await
}

fn log_warnings(request_id: Uuid, warnings: &[String]) {
    for warning in warnings {
        log::warn!("request {request_id}: {warning}");
    }
}

/// Fetch the live configuration snapshot. Secrets (API keys) are never serialized; `config`
/// derives no `Serialize` for exactly this reason, so this returns a redacted summary instead.
async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let config = state.config_snapshot();
    let providers: Vec<Value> = config
        .llm
        .providers
        .iter()
        .map(|p| json!({"name": p.name, "type": p.r#type.to_string(), "enabled": p.enabled}))
        .collect();
    Json(json!({
        "providers": providers,
        "models": config.llm.models.keys().collect::<Vec<_>>(),
        "auto_enabled": config.llm.auto.enabled,
    }))
}

/// Replace the configuration snapshot wholesale from a posted YAML document.
async fn post_config(State(state): State<AppState>, body: String) -> Result<Json<Value>> {
    let config: Config = serde_yaml::from_str(&body).map_err(|err| LlmError::InvalidRequest(err.to_string()))?;
    config.validate().map_err(|err| LlmError::ConfigError(err.to_string()))?;
    state.replace_config(config);
    Ok(Json(json!({"status": "reloaded"})))
}

async fn get_state(State(state): State<AppState>) -> Json<Value> {
    let config = state.config_snapshot();
    let providers: Vec<Value> = config
        .llm
        .providers
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "enabled": p.enabled,
                "on_cooldown": state.dispatcher.cooldown.is_on_cooldown(&p.name, jiff::Timestamp::now()),
            })
        })
        .collect();
    Json(json!({"providers": providers}))
}

/// Administrative state mutations: `{"action": "clear_cooldown", "provider": "..."}` or
/// `{"action": "clear_all_cooldowns"}`.
async fn post_state(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>> {
    match body["action"].as_str() {
        Some("clear_cooldown") => {
            let provider = body["provider"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidRequest("missing `provider`".into()))?;
            state.dispatcher.cooldown.clear(provider);
            Ok(Json(json!({"status": "cleared", "provider": provider})))
        }
        Some("clear_all_cooldowns") => {
            state.dispatcher.cooldown.clear_all();
            Ok(Json(json!({"status": "cleared_all"})))
        }
        other => Err(LlmError::InvalidRequest(format!("unsupported action {other:?}"))),
    }
}

/// Debug trace and classifier-log retrieval is backed by the external persistence layer (out of
/// scope per §1); this surface reports that no local store is wired up rather than faking one.
async fn list_logs() -> Json<Value> {
    Json(json!({"logs": [], "note": "debug trace persistence is provided by the external store"}))
}

async fn get_log(Path(id): Path<String>) -> Result<Json<Value>> {
    let _ = id;
    Err(LlmError::Internal("debug trace persistence is provided by the external store".into()))
}

async fn delete_log(Path(id): Path<String>) -> Json<Value> {
    json_deleted(id)
}

fn json_deleted(id: String) -> Json<Value> {
    Json(json!({"status": "not_persisted_locally", "id": id}))
}
