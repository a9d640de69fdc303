use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::cep::AddressResolver;
use super::domain::ContractRequest;
use super::service::{ContractService, ContractServiceError};
use super::store::{ContractRepository, RepositoryError};

/// Router builder exposing the contract intake and reporting endpoints.
pub fn contract_router<R, A>(service: Arc<ContractService<R, A>>) -> Router
where
    R: ContractRepository + 'static,
    A: AddressResolver + 'static,
{
    Router::new()
        .route("/api/v1/contracts", post(create_handler::<R, A>))
        .route("/api/v1/contracts/status", get(status_handler::<R, A>))
        .route(
            "/api/v1/contracts/:contract_id",
            get(detail_handler::<R, A>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R, A>(
    State(service): State<Arc<ContractService<R, A>>>,
    axum::Json(request): axum::Json<ContractRequest>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AddressResolver + 'static,
{
    match service.create(request).await {
        Ok(contract_id) => {
            let payload = json!({
                "message": "contract, holder, and installments created",
                "contract_id": contract_id,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, A>(
    State(service): State<Arc<ContractService<R, A>>>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AddressResolver + 'static,
{
    match service.status_report(None) {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<R, A>(
    State(service): State<Arc<ContractService<R, A>>>,
    Path(contract_id): Path<i64>,
) -> Response
where
    R: ContractRepository + 'static,
    A: AddressResolver + 'static,
{
    match service.get(contract_id) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(ContractServiceError::Persistence(RepositoryError::NotFound(id))) => {
            let payload = json!({ "error": format!("contract {id} not found") });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

/// Each error kind keeps its own status so callers can distinguish bad input
/// from upstream or storage failures.
fn error_response(error: ContractServiceError) -> Response {
    let (status, body) = match &error {
        ContractServiceError::Validation(source) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "invalid contract request", "details": source.to_string() }),
        ),
        ContractServiceError::AddressResolution { details } => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "postal code invalid or not found", "details": details }),
        ),
        ContractServiceError::ExternalService { details } => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": "failed to reach the address service", "details": details }),
        ),
        ContractServiceError::Persistence(source) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "database error", "details": source.to_string() }),
        ),
        ContractServiceError::Unexpected(details) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "unexpected error", "details": details }),
        ),
    };

    (status, axum::Json(body)).into_response()
}
