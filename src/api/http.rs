use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::blockchain::Parser;
use crate::error::ScannerError;
use crate::logging::{ErrorLogger, LogContext};
use crate::models::Transaction;
use crate::storage::SubscriptionStore;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Scanner(#[from] ScannerError),
    #[error("Request exceeded the {0:?} deadline")]
    DeadlineExceeded(Duration),
    #[error("Server error: {0}")]
    Server(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Scanner(ScannerError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Scanner(ScannerError::Upstream(_))
            | ApiError::Scanner(ScannerError::MalformedResponse(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Scanner(ScannerError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Scanner(ScannerError::Config(_)) | ApiError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Scanner(e) => e.kind(),
            ApiError::DeadlineExceeded(_) => "deadline_exceeded",
            ApiError::Server(_) => "server_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Scanner(ref e) = self {
            ErrorLogger::log_error(e, Some(LogContext::new("api", "request")));
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentBlockResponse {
    pub current_block: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub subscribers: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub block_range: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    // Missing field is treated as blank so it reports as invalid input
    #[serde(default)]
    pub address: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub parser: Arc<dyn Parser>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Process-wide shutdown token; each request works on a child of it
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
    pub default_block_range: u64,
}

impl AppState {
    /// Run `operation` under the request deadline, cancelling `cancel` if it expires
    async fn with_deadline<T, F>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, ApiError>
    where
        F: Future<Output = crate::error::Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, operation).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => {
                cancel.cancel();
                Err(ApiError::DeadlineExceeded(self.request_timeout))
            }
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/block/current", get(get_current_block))
        .route("/api/v1/address/subscribe", post(subscribe))
        .route("/api/v1/address/:address/transactions", get(get_address_transactions))
        .route("/api/v1/subscription/:address/transactions", get(get_observed_transactions))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// HTTP API server
pub struct ApiServer {
    state: AppState,
    bind_address: String,
}

impl ApiServer {
    pub fn new(state: AppState, bind_address: String) -> Self {
        Self { state, bind_address }
    }

    /// Serve until the state's shutdown token is cancelled
    pub async fn start(self) -> Result<(), ApiError> {
        let listener = TcpListener::bind(&self.bind_address).await.map_err(|e| {
            ApiError::Server(format!("Failed to bind to {}: {}", self.bind_address, e))
        })?;

        log::info!("HTTP API server starting on {}", self.bind_address);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        log::info!("HTTP API server stopped");
        Ok(())
    }
}

/// GET /api/v1/block/current
pub async fn get_current_block(
    State(state): State<AppState>,
) -> Result<Json<CurrentBlockResponse>, ApiError> {
    let cancel = state.shutdown.child_token();
    let current_block = state
        .with_deadline(&cancel, state.parser.current_block(&cancel))
        .await?;

    Ok(Json(CurrentBlockResponse { current_block }))
}

/// GET /api/v1/address/:address/transactions?blockRange=n
pub async fn get_address_transactions(
    Path(address): Path<String>,
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let block_range = params
        .block_range
        .unwrap_or_else(|| i64::try_from(state.default_block_range).unwrap_or(i64::MAX));

    let cancel = state.shutdown.child_token();
    let transactions = state
        .with_deadline(&cancel, state.parser.scan_address(&cancel, &address, block_range))
        .await?;

    Ok(Json(transactions))
}

/// GET /api/v1/subscription/:address/transactions
pub async fn get_observed_transactions(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.parser.observed_transactions(&address)?))
}

/// POST /api/v1/address/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(state.parser.subscribe(&request.address)?))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        subscribers: state.subscriptions.all_subscribers().len(),
    })
}
