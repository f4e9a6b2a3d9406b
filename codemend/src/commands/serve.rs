//! `codemend serve`: the generate / execute pipeline over HTTP.
//!
//! Engine calls are blocking, so every request runs on tokio's blocking
//! pool with its own executor. Ctrl+C stops accepting connections and
//! cancels in-flight runs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use codemend_agent::LlmCollaborator;
use codemend_core::config::EngineConfig;
use codemend_core::{Repairer, Synthesizer};
use codemend_executor::{warn_on_err, SessionLog};
use codemend_sandbox::{CancelToken, ExecutionResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{engine_config, finish_session, open_executor, open_session, run_with_repair};
use crate::interrupt::Interrupt;

pub struct ServeArgs {
    pub host: String,
    pub port: u16,
    pub max_retries: Option<u32>,
    pub runtime: Option<PathBuf>,
    pub timeout: Option<u64>,
}

/// Synthesizer and repairer in one shareable object.
pub(crate) trait CodeCollaborator: Synthesizer + Repairer + Send + Sync {
    fn as_repairer(&self) -> &dyn Repairer;
}

impl<T: Synthesizer + Repairer + Send + Sync> CodeCollaborator for T {
    fn as_repairer(&self) -> &dyn Repairer {
        self
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub cfg: Arc<EngineConfig>,
    /// `None` when no API key is configured; `/generate` then answers 503.
    pub collaborator: Option<Arc<dyn CodeCollaborator>>,
    pub cancel: CancelToken,
    /// Write a session log per `/generate` request
    pub sessions: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRequest {
    pub request: String,
    #[serde(default = "default_true")]
    pub execute: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GenerateResponse {
    pub generated_code: String,
    pub explanation: String,
    pub dependencies: Vec<String>,
    pub execution_result: Option<ExecutionResult>,
    /// Code that produced `execution_result`; differs from
    /// `generated_code` when a repair was applied.
    pub final_code: Option<String>,
    pub attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteRequest {
    pub code: String,
    #[serde(default = "default_true")]
    pub install_deps: bool,
}

fn default_true() -> bool {
    true
}

/// Error body shaped as `{"detail": "..."}`.
#[derive(Debug)]
pub(crate) struct ApiError(StatusCode, String);

impl ApiError {
    fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/execute", post(execute))
        .with_state(state)
}

pub fn run(args: ServeArgs, interrupt: &Interrupt) -> Result<i32> {
    let cfg = engine_config(args.runtime, args.timeout, args.max_retries);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    let collaborator = LlmCollaborator::from_env()
        .map(|c| Arc::new(c) as Arc<dyn CodeCollaborator>);
    if collaborator.is_none() {
        tracing::warn!("No API key configured; /generate will answer 503");
    }
    let state = AppState {
        cfg: Arc::new(cfg),
        collaborator,
        cancel: interrupt.token(),
        sessions: true,
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(serve(addr, state))?;
    Ok(0)
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let shutdown = state.cancel.clone();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "codemend server listening");
    eprintln!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !shutdown.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            tracing::info!("Shutting down server");
        })
        .await
        .context("Server error")
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "codemend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "codemend" }))
}

async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Some(collaborator) = state.collaborator.clone() else {
        return Err(ApiError(
            StatusCode::SERVICE_UNAVAILABLE,
            "no API key configured".to_string(),
        ));
    };
    if req.request.trim().is_empty() {
        return Err(ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            "request must not be empty".to_string(),
        ));
    }

    tokio::task::spawn_blocking(move || generate_blocking(&state, collaborator.as_ref(), req))
        .await
        .map_err(ApiError::internal)?
        .map(Json)
}

fn generate_blocking(
    state: &AppState,
    collaborator: &dyn CodeCollaborator,
    req: GenerateRequest,
) -> Result<GenerateResponse, ApiError> {
    let mut session: Option<SessionLog> = if state.sessions {
        open_session(&req.request)
    } else {
        None
    };

    let candidate = match collaborator.synthesize(&req.request) {
        Ok(c) => c,
        Err(e) => {
            if let Some(log) = &session {
                warn_on_err("error", log.log_error("generate", &e.to_string()));
                warn_on_err("finish", log.finish(Some("generation failed")));
            }
            return Err(ApiError(StatusCode::BAD_GATEWAY, e.to_string()));
        }
    };
    if let Some(log) = &session {
        warn_on_err(
            "code version",
            log.save_code(&candidate.source, &candidate.explanation, 1),
        );
    }

    let mut response = GenerateResponse {
        generated_code: candidate.source.clone(),
        explanation: candidate.explanation,
        dependencies: candidate.declared_dependencies,
        execution_result: None,
        final_code: None,
        attempts: None,
    };
    if !req.execute {
        finish_session(session.as_ref(), None);
        return Ok(response);
    }

    let mut executor =
        open_executor(&state.cfg).map_err(|e| ApiError::internal(format!("{:#}", e)))?;
    let outcome = run_with_repair(
        &mut executor,
        Some(collaborator.as_repairer()),
        state.cfg.max_retries,
        true,
        &req.request,
        &candidate.source,
        session.as_mut(),
        &state.cancel,
    )
    .map_err(|e| ApiError::internal(format!("{:#}", e)))?;

    let Some(outcome) = outcome else {
        finish_session(session.as_ref(), None);
        return Err(cancelled());
    };
    finish_session(session.as_ref(), Some(&outcome));
    response.final_code = Some(outcome.final_code);
    response.attempts = Some(outcome.attempts);
    response.execution_result = Some(outcome.result);
    Ok(response)
}

async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    tokio::task::spawn_blocking(move || -> Result<ExecutionResult, ApiError> {
        let mut executor =
            open_executor(&state.cfg).map_err(|e| ApiError::internal(format!("{:#}", e)))?;
        match executor.run(&req.code, req.install_deps, &state.cancel) {
            Ok(result) => Ok(result),
            Err(codemend_sandbox::Error::Cancelled) => Err(cancelled()),
            Err(e) => Err(ApiError::internal(e)),
        }
    })
    .await
    .map_err(ApiError::internal)?
    .map(Json)
}

fn cancelled() -> ApiError {
    ApiError(
        StatusCode::SERVICE_UNAVAILABLE,
        "cancelled: server is shutting down".to_string(),
    )
}
