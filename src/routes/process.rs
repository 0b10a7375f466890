//! Processing endpoints: single requests, batches, and the operation
//! catalog.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    AppState,
    error::ServiceError,
    middleware::TraceId,
    processor::{BatchRequest, BatchResponse, OperationDescriptor, ProcessingRequest,
                ProcessingResponse},
};

fn reject(rejection: JsonRejection) -> ServiceError {
    ServiceError::Validation(rejection.body_text())
}

/// `POST /v1/process` — run one request through the canonical path.
#[tracing::instrument(name = "process.single", skip_all)]
pub async fn process(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    payload: Result<Json<ProcessingRequest>, JsonRejection>,
) -> Result<Json<ProcessingResponse>, ServiceError> {
    let Json(mut request) = payload.map_err(reject)?;
    if request.trace_id.is_none() {
        request.trace_id = Some(trace_id.0.clone());
    }

    let cancel = CancellationToken::new();
    let response = state.processor.process(request, &cancel).await?;
    Ok(Json(response))
}

/// `POST /v1/batch` — bounded-concurrency fan-out with per-item isolation.
#[tracing::instrument(name = "process.batch", skip_all)]
pub async fn process_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ServiceError> {
    let Json(request) = payload.map_err(reject)?;
    let cancel = CancellationToken::new();
    let response = state.batch.process_batch(request, &cancel).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub operations: Vec<OperationDescriptor>,
}

/// `GET /v1/operations` — declarative list of supported operations,
/// derived from the registry.
pub async fn operations(State(state): State<AppState>) -> Json<OperationsResponse> {
    Json(OperationsResponse {
        operations: state.processor.registry().descriptors(),
    })
}
