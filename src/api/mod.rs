//! HTTP API: transaction submission, health, payer info

use crate::config::ApiConfig;
use crate::error::{BuildError, RelayerError};
use crate::relay::FeePayer;
use crate::tx::EthereumMessage;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub fee_payer: FeePayer,
    pub fee_denom: Arc<str>,
    pub payer_address: Arc<str>,
    pub reply_timeout: Duration,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/payer", get(get_payer))
        .route("/v1/transactions", post(submit_transaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

/// Health check endpoint - basic liveness
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let worker_running = !state.fee_payer.is_closed();
    let status = if worker_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if worker_running { "ok" } else { "worker stopped" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            queued: state.fee_payer.queued(),
        }),
    )
}

/// Fee payer account
async fn get_payer(State(state): State<AppState>) -> impl IntoResponse {
    Json(PayerResponse {
        address: state.payer_address.to_string(),
        fee_denom: state.fee_denom.to_string(),
    })
}

/// Relay a signed EVM transaction and wait for the node's verdict
async fn submit_transaction(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let message = EthereumMessage::decode_hex(&request.raw)?;
    debug!(hash = ?message.hash(), from = ?message.from(), "Received transaction");

    let receipt = state
        .fee_payer
        .submit(message, &*state.fee_denom)
        .await?;
    debug!(request_id = %receipt.id(), "Queued for relay");

    match receipt.wait_timeout(state.reply_timeout).await {
        Some(Ok(hash)) => Ok(Json(SubmitResponse {
            hash: format!("{:?}", hash),
        })),
        Some(Err(e)) => Err(e.into()),
        None => Err(ApiError::Timeout),
    }
}

/// Error returned to API callers
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayerError),
    Timeout,
}

impl From<RelayerError> for ApiError {
    fn from(e: RelayerError) -> Self {
        ApiError::Relay(e)
    }
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        ApiError::Relay(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse {
                    error: "timed out waiting for relay".to_string(),
                    code: None,
                    codespace: None,
                    retryable: true,
                },
            ),
            ApiError::Relay(e) => {
                let status = match &e {
                    RelayerError::Build(_) => StatusCode::BAD_REQUEST,
                    RelayerError::SequenceMismatch { .. } => StatusCode::CONFLICT,
                    RelayerError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    RelayerError::Query { .. } | RelayerError::Transport(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    RelayerError::WorkerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    RelayerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let (code, codespace) = match e.abci_code() {
                    Some((code, codespace)) => (Some(code), Some(codespace.to_string())),
                    None => (None, None),
                };
                (
                    status,
                    ErrorResponse {
                        error: e.to_string(),
                        code,
                        codespace,
                        retryable: e.is_retryable_by_caller(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// Request/response types

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    raw: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    hash: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    codespace: Option<String>,
    retryable: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    queued: usize,
}

#[derive(Serialize)]
struct PayerResponse {
    address: String,
    fee_denom: String,
}
