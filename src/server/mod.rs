//! HTTP API
//!
//! JSON endpoints over the forecast, market and news services.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ForecastError;
use crate::service::Services;
use crate::types::ForecastRequest;

/// Error body `{"error": msg}` with a status derived from the error kind
pub struct ApiError(ForecastError);

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &ForecastError) -> StatusCode {
    match err {
        ForecastError::Validation(_) | ForecastError::InsufficientData { .. } => {
            StatusCode::BAD_REQUEST
        }
        ForecastError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Create the API router with all endpoints
pub fn create_router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/market", get(market))
        .route("/news", get(news))
        .route("/health", get(health))
        .with_state(services)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /predict - Ensemble forecast for one ticker
async fn predict(
    State(services): State<Arc<Services>>,
    Json(request): Json<ForecastRequest>,
) -> Result<Response, ApiError> {
    let result = services.forecast.forecast(&request).await?;
    Ok(Json(result.as_ref()).into_response())
}

/// GET /market - Index snapshot and top movers
async fn market(State(services): State<Arc<Services>>) -> Result<Response, ApiError> {
    let snapshot = services.market.snapshot().await?;
    Ok(Json(snapshot.as_ref()).into_response())
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    symbol: Option<String>,
}

/// GET /news?symbol=AAPL
async fn news(
    State(services): State<Arc<Services>>,
    Query(query): Query<NewsQuery>,
) -> Result<Response, ApiError> {
    let items = services.news.news(query.symbol.as_deref()).await?;
    Ok(Json(items.as_ref()).into_response())
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Bind and serve until the process exits
pub async fn start_server(services: Arc<Services>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(services);
    let addr = format!("{}:{}", host, port);

    tracing::info!("Pricecast API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
