//! # API Handlers
//!
//! HTTP endpoint handlers for the OAuth connector service.

pub mod authorize;
pub mod integrations;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ErrorType, validation_error};
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness plus database reachability
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    db::health_check(&state.db).await.map_err(|err| {
        tracing::warn!(error = %err, "Health check failed");
        ApiError::from(ErrorType::ServiceUnavailable)
    })?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// `accountId` query parameter shared by the account-scoped endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountQuery {
    /// Account (UUID) the connection belongs to
    #[serde(rename = "accountId")]
    #[param(rename = "accountId", value_type = String)]
    pub account_id: Option<String>,
}

impl AccountQuery {
    pub fn account_id(&self) -> Result<Uuid, ApiError> {
        let raw = self
            .account_id
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                validation_error(
                    "Missing accountId",
                    serde_json::json!({ "accountId": "Required query parameter is missing" }),
                )
            })?;
        Uuid::parse_str(raw).map_err(|_| {
            validation_error(
                "Invalid accountId",
                serde_json::json!({ "accountId": "Must be a valid UUID" }),
            )
        })
    }
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("Refusing to redirect to a location that is not a valid header value");
            ApiError::from(ErrorType::InternalServerError).into_response()
        }
    }
}

#[cfg(test)]
mod tests;
