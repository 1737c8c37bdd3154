//! Prediction HTTP service.
//!
//! Routes:
//! - `GET /` liveness string
//! - `POST /predict/` JSON object `{ "<ticker>": <return>, ... }` to
//!   `{ "res": [<prediction>], "error_msg": "" }`
//!
//! The config and model are loaded once and shared read-only between requests.
//! Request problems are reported in the body with HTTP 200; `res` is empty and
//! `error_msg` says what was wrong.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{RowIndex, Table};
use crate::error::AppError;
use crate::model::{ModelArtifact, Regressor};
use crate::pipeline::validate::{ValidationRules, check_data};

pub const LIVENESS: &str = "Hello, stock-forecast up!";

/// Immutable state shared by every request.
#[derive(Debug)]
pub struct ServeState {
    config: Config,
    artifact: ModelArtifact,
}

impl ServeState {
    pub fn new(config: Config, artifact: ModelArtifact) -> Result<Self, AppError> {
        if artifact.target != config.target {
            return Err(AppError::input(format!(
                "Model was trained for '{}' but the config targets '{}'.",
                artifact.target, config.target
            )));
        }
        Ok(Self { config, artifact })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub res: Vec<f64>,
    pub error_msg: String,
}

impl PredictResponse {
    fn ok(prediction: f64) -> Self {
        Self {
            res: vec![prediction],
            error_msg: String::new(),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            res: Vec::new(),
            error_msg: msg.into(),
        }
    }
}

pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict/", post(predict))
        .route("/predict", post(predict))
        .with_state(state)
}

pub async fn home() -> &'static str {
    LIVENESS
}

pub async fn predict(State(state): State<Arc<ServeState>>, body: Bytes) -> Json<PredictResponse> {
    let model = state.artifact.model();
    let response = match parse_feature_vector(&body, model.feature_names()) {
        Ok(row) => match model.predict(&row) {
            Ok(preds) => preds
                .first()
                .map(|p| PredictResponse::ok(*p))
                .unwrap_or_else(|| PredictResponse::error("Model returned no prediction.")),
            Err(e) => PredictResponse::error(e.to_string()),
        },
        Err(msg) => PredictResponse::error(msg),
    };
    debug!(ok = response.error_msg.is_empty(), "handled prediction request");
    Json(response)
}

/// Turn a request body into a one-row table in the model's feature order.
///
/// The error is the message returned to the client.
pub fn parse_feature_vector(body: &[u8], features: &[String]) -> Result<Table, String> {
    let object: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {e}"))?;

    let missing: Vec<&str> = features
        .iter()
        .filter(|f| !object.contains_key(f.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(format!("Missing features: {}", missing.join(", ")));
    }
    let mut unexpected: Vec<&str> = object
        .keys()
        .filter(|k| !features.contains(*k))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(format!("Unexpected features: {}", unexpected.join(", ")));
    }

    let mut columns = Vec::with_capacity(features.len());
    for name in features {
        let value = object[name.as_str()]
            .as_f64()
            .ok_or_else(|| format!("Feature ({name}) must be a number"))?;
        columns.push((name.clone(), vec![value]));
    }

    let row = Table::from_columns(RowIndex::Positional(1), columns).map_err(|e| e.to_string())?;
    let report = check_data(&row, ValidationRules::feature_vector(), false);
    if !report.is_clean() {
        return Err(report.summary());
    }
    Ok(row)
}

/// Serve until the process is stopped.
pub async fn serve(state: Arc<ServeState>, addr: SocketAddr) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::external(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, features = state.artifact.feature_names.len(), "serving predictions");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppError::external(format!("Server error: {e}")))
}

/// Blocking entry point: build a runtime and serve.
pub fn run(config: Config, artifact: ModelArtifact) -> Result<(), AppError> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::input(format!("Invalid server address: {e}")))?;
    let state = Arc::new(ServeState::new(config, artifact)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::external(format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(serve(state, addr))
}
