use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use salondesk_infra::StoreError;
use salondesk_till::MovementKind;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "internal storage failure",
            )
        }
    }
}

pub fn parse_movement_kind(s: &str) -> Result<MovementKind, axum::response::Response> {
    MovementKind::parse(s).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_movement_kind",
            "kind must be one of: opening, closing, client_payment, supplier_purchase, \
             positive_adjustment, negative_adjustment, withdrawal",
        )
    })
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
