use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::controller::{ChatController, ChatView, ControllerState};
use crate::error::{RemoteCallFailure, TurnRejected};
use crate::models::ChatModel;
use crate::render::{render_message, render_page, PageModel};
use crate::session::{Message, SessionStore};
use crate::settings::{ModelId, SessionConfig, SessionConfigPatch};

/// The single browser session this process serves.
#[derive(Debug, Default)]
pub struct ChatSession {
    pub store: SessionStore,
    pub controller: ChatController,
    /// Error from the last turn, shown once on the next page load.
    pub notice: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<ChatSession>>,
    pub model: Arc<dyn ChatModel>,
}

impl AppState {
    pub fn new(config: SessionConfig, model: Arc<dyn ChatModel>) -> Self {
        let session = ChatSession { store: SessionStore::new(config), ..Default::default() };
        Self { session: Arc::new(Mutex::new(session)), model }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] TurnRejected),
    #[error("turn task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Rejected(TurnRejected::EmptyInput) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Rejected(TurnRejected::Busy) => StatusCode::CONFLICT,
            ApiError::Rejected(TurnRejected::MissingApiKey) => StatusCode::PRECONDITION_FAILED,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Collects what one turn shows: rendered messages and the error banner text.
#[derive(Debug, Default)]
pub struct TurnTranscript {
    pub rendered: Vec<String>,
    pub error: Option<String>,
    pub history_len: usize,
}

impl ChatView for TurnTranscript {
    fn show_message(&mut self, message: &Message) {
        self.rendered.push(render_message(message.role, &message.content));
    }

    fn show_error(&mut self, error: &RemoteCallFailure) {
        self.error = Some(format!("Error: {error}"));
    }
}

async fn run_turn(state: AppState, input: String) -> Result<TurnTranscript, TurnRejected> {
    let mut view = TurnTranscript::default();
    let turn = {
        let mut session = state.session.lock().await;
        if !session.store.api_key_configured() {
            return Err(TurnRejected::MissingApiKey);
        }
        let ChatSession { store, controller, .. } = &mut *session;
        controller.begin_turn(store, &input, &mut view)?
    };

    // Lock is released here so the page stays responsive while the reply is pending.
    let result = state.model.complete(turn.api_key(), turn.request()).await;

    let mut session = state.session.lock().await;
    let ChatSession { store, controller, .. } = &mut *session;
    controller.finish_turn(store, turn, result, &mut view);
    view.history_len = store.history().len();
    Ok(view)
}

async fn submit_turn(state: &AppState, input: String) -> Result<TurnTranscript, ApiError> {
    // Spawned so the controller gets back to Idle even if the client hangs up.
    match tokio::spawn(run_turn(state.clone(), input)).await {
        Ok(result) => Ok(result?),
        Err(e) => {
            state.session.lock().await.controller.abandon_turn();
            Err(e.into())
        }
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let mut session = state.session.lock().await;
    let notice = session.notice.take();
    let page = PageModel {
        config: session.store.config(),
        history: session.store.history(),
        error: notice.as_deref(),
        awaiting_reply: session.controller.state() == ControllerState::AwaitingReply,
    };
    Html(render_page(&page))
}

#[derive(Debug, Deserialize)]
pub struct ConfigForm {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl ConfigForm {
    fn into_patch(self) -> Result<SessionConfigPatch, ApiError> {
        let model = self
            .model
            .map(|m| m.parse::<ModelId>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        Ok(SessionConfigPatch { api_key: self.api_key, model, max_tokens: self.max_tokens })
    }
}

async fn apply_config(state: &AppState, patch: SessionConfigPatch) -> ConfigResponse {
    let mut session = state.session.lock().await;
    session.store.set_config(patch);
    let config = session.store.config();
    info!(
        model = %config.model,
        max_tokens = config.max_tokens,
        api_key_configured = config.api_key_configured(),
        "config updated"
    );
    ConfigResponse::from(config)
}

async fn post_config(
    State(state): State<AppState>,
    Form(form): Form<ConfigForm>,
) -> Result<Redirect, ApiError> {
    apply_config(&state, form.into_patch()?).await;
    Ok(Redirect::to("/"))
}

async fn post_clear(State(state): State<AppState>) -> Redirect {
    clear_history(&state).await;
    Redirect::to("/")
}

async fn clear_history(state: &AppState) {
    let mut session = state.session.lock().await;
    session.store.clear();
    info!("conversation cleared");
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
}

async fn post_chat(
    State(state): State<AppState>,
    Form(form): Form<ChatForm>,
) -> Result<Redirect, ApiError> {
    match submit_turn(&state, form.message).await {
        Ok(transcript) => {
            if let Some(err) = transcript.error {
                state.session.lock().await.notice = Some(err);
            }
        }
        Err(ApiError::Rejected(reason)) => debug!(%reason, "chat submission ignored"),
        Err(e) => return Err(e),
    }
    Ok(Redirect::to("/"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub api_key_configured: bool,
    pub model: ModelId,
    pub max_tokens: u32,
    pub models: Vec<String>,
}

impl From<&SessionConfig> for ConfigResponse {
    fn from(config: &SessionConfig) -> Self {
        Self {
            api_key_configured: config.api_key_configured(),
            model: config.model,
            max_tokens: config.max_tokens,
            models: ModelId::ALL.iter().map(|m| m.as_str().to_string()).collect(),
        }
    }
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let session = state.session.lock().await;
    Json(ConfigResponse::from(session.store.config()))
}

async fn patch_config(
    State(state): State<AppState>,
    Json(patch): Json<SessionConfigPatch>,
) -> Json<ConfigResponse> {
    Json(apply_config(&state, patch).await)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
}

async fn list_messages(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse { messages: session.store.history().to_vec() })
}

async fn delete_messages(State(state): State<AppState>) -> StatusCode {
    clear_history(&state).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub rendered: Vec<String>,
    pub error: Option<String>,
    pub history_len: usize,
}

async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let t = submit_turn(&state, body.content).await?;
    Ok(Json(SendMessageResponse {
        rendered: t.rendered,
        error: t.error,
        history_len: t.history_len,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/config", post(post_config))
        .route("/clear", post(post_clear))
        .route("/chat", post(post_chat))
        .route("/v1/session/config", get(get_config).patch(patch_config))
        .route(
            "/v1/session/messages",
            get(list_messages).post(send_message).delete(delete_messages),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "chat page available");
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
