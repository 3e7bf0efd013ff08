use std::net::SocketAddr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::KnightError;
use crate::service::JobService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitPathRequest {
    start_position: Option<String>,
    end_position: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitPathResponse {
    tracking_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultQuery {
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// HTTP routes for submitting requests and polling results.
pub fn router(service: JobService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/knightpath", get(get_result_handler).post(submit_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Serve the API on `addr` until `shutdown` is cancelled.
pub async fn run_api(
    addr: SocketAddr,
    service: JobService,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting HTTP API");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn submit_handler(
    State(service): State<JobService>,
    Json(payload): Json<SubmitPathRequest>,
) -> Response {
    let (Some(start), Some(end)) = (payload.start_position, payload.end_position) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Please pass a valid startPosition and endPosition in the request body.",
        );
    };

    match service.submit(&start, &end).await {
        Ok(tracking_id) => (StatusCode::OK, Json(SubmitPathResponse { tracking_id })).into_response(),
        Err(KnightError::InvalidPosition(raw)) => error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid board position {raw:?}: expected A-H followed by 1-8"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to store request");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store request")
        }
    }
}

async fn get_result_handler(
    State(service): State<JobService>,
    Query(query): Query<ResultQuery>,
) -> Response {
    let request_id = match query.request_id {
        Some(id) if !id.is_empty() => id,
        _ => {
            tracing::warn!("requestId not provided in query string");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Please provide a valid requestId in the query string.",
            );
        }
    };

    match service.get_result(&request_id).await {
        Ok(Some(result)) => {
            tracing::debug!(request_id = %request_id, "Result found");
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No result found for request id: {request_id}"),
        ),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to read result");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read result")
        }
    }
}
