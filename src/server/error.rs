use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::AggregationServiceError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("No Property ID provided. Use clientId or propertyId.")]
    MissingProperty,

    #[error("No analytics Property ID configured for this client")]
    ClientWithoutProperty { client_id: String },

    #[error("Client not found")]
    ClientNotFound { client_id: String },

    #[error("Failed to fetch analytics data")]
    Aggregation(#[from] AggregationServiceError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_)
            | AppError::MissingProperty
            | AppError::ClientWithoutProperty { .. } => StatusCode::BAD_REQUEST,
            AppError::ClientNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Aggregation(
                AggregationServiceError::MissingPropertyId
                | AggregationServiceError::InvalidDateRange(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Aggregation(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        match &self {
            AppError::ClientWithoutProperty { client_id }
            | AppError::ClientNotFound { client_id } => {
                body["clientId"] = json!(client_id);
            }
            AppError::Aggregation(e) => {
                body["details"] = json!(e.to_string());
                if let Some(property_id) = e.property_id() {
                    body["propertyId"] = json!(property_id);
                }
            }
            _ => {}
        }

        if status.is_server_error() {
            tracing::warn!("request failed: {self}: {body}");
        }
        (status, Json(body)).into_response()
    }
}
