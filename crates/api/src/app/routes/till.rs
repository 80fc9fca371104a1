use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use salondesk_core::SessionId;
use salondesk_infra::{PageRequest, ReportQuery};
use salondesk_till::{CloseTill, OpenTill};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::StaffContext;

pub fn router() -> Router {
    Router::new()
        .route("/open", post(open_till))
        .route("/close", post(close_till))
        .route("/movements", post(record_movement))
        .route("/current", get(current_till))
        .route("/sessions/:id/summary", get(session_summary))
        .route("/history", get(history))
        .route("/report", get(report))
        .route("/expense-categories", get(expense_categories))
}

pub async fn open_till(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<dto::OpenTillRequest>,
) -> axum::response::Response {
    let cmd = OpenTill {
        opening_amount: body.opening_amount,
        staff_id: staff.staff_id(),
        notes: body.notes,
    };
    match services.till.open_session(cmd).await {
        Ok(session) => (StatusCode::OK, Json(dto::session_to_json(&session))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn close_till(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<dto::CloseTillRequest>,
) -> axum::response::Response {
    let cmd = CloseTill {
        session_id: body.session_id,
        closing_amount: body.closing_amount,
        staff_id: staff.staff_id(),
        notes: body.notes,
    };
    match services.till.close_session(cmd).await {
        Ok(summary) => (StatusCode::OK, Json(dto::summary_to_json(&summary))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    let cmd = body.into_command(staff.staff_id());
    match services.till.record_movement(cmd).await {
        Ok((movement, balance)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "movement": dto::movement_to_json(&movement),
                "balance": balance,
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn current_till(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.till.current_session().await {
        Ok(Some(current)) => (StatusCode::OK, Json(dto::current_to_json(&current))).into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({ "open": false })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn session_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let session_id: SessionId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "session id must be a UUID",
            )
        }
    };
    match services.till.session_summary(session_id).await {
        Ok(summary) => (StatusCode::OK, Json(dto::summary_to_json(&summary))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::HistoryParams>,
) -> axum::response::Response {
    let page = PageRequest {
        page: params.page,
        page_size: params.page_size,
    };
    match services.till.history(page).await {
        Ok(page) => (StatusCode::OK, Json(dto::history_to_json(&page))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn report(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ReportParams>,
) -> axum::response::Response {
    let kind = match params.kind.as_deref() {
        Some(s) => match errors::parse_movement_kind(s) {
            Ok(kind) => Some(kind),
            Err(resp) => return resp,
        },
        None => None,
    };
    let query = ReportQuery {
        date_from: params.date_from,
        date_to: params.date_to,
        kind,
        staff_id: params.staff_id,
    };
    match services.till.report(query).await {
        Ok(report) => (StatusCode::OK, Json(dto::report_to_json(&report))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn expense_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.till.expense_categories().await {
        Ok(categories) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "items": categories.iter().map(dto::category_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use salondesk_core::{ClientId, Money, StaffId};
    use salondesk_till::{MovementKind, PaymentMethod};

    fn services() -> Extension<Arc<AppServices>> {
        Extension(Arc::new(AppServices::in_memory()))
    }

    fn staff() -> Extension<StaffContext> {
        Extension(StaffContext::new(StaffId::new(), vec![]))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn open_req(cents: i64) -> Json<dto::OpenTillRequest> {
        Json(dto::OpenTillRequest {
            opening_amount: Money::from_cents(cents),
            notes: None,
        })
    }

    fn movement_req(
        kind: MovementKind,
        cents: i64,
        description: &str,
        client_id: Option<ClientId>,
    ) -> Json<dto::RecordMovementRequest> {
        Json(dto::RecordMovementRequest {
            kind,
            amount: Money::from_cents(cents),
            description: Some(description.to_string()),
            payment_method: PaymentMethod::Cash,
            client_id,
            appointment_id: None,
            supplier: None,
            expense_category_id: None,
        })
    }

    #[tokio::test]
    async fn open_then_current_reflects_balance() {
        let services = services();

        let resp = open_till(services.clone(), staff(), open_req(150_000)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "open");
        assert_eq!(body["opening_amount"], "1500.00");

        let resp = current_till(services).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["open"], true);
        assert_eq!(body["balance"], "1500.00");
    }

    #[tokio::test]
    async fn second_open_is_a_conflict() {
        let services = services();
        open_till(services.clone(), staff(), open_req(10_000)).await;
        let resp = open_till(services, staff(), open_req(20_000)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"], "conflict");
    }

    #[tokio::test]
    async fn full_shift_over_http_shapes() {
        let services = services();
        let staff_ctx = staff();

        let resp = open_till(services.clone(), staff_ctx.clone(), open_req(100_000)).await;
        let session_id = body_json(resp).await["id"].as_str().unwrap().to_string();

        let resp = record_movement(
            services.clone(),
            staff_ctx.clone(),
            movement_req(
                MovementKind::ClientPayment,
                50_000,
                "corte",
                Some(ClientId::new()),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["balance"], "1500.00");

        let resp = record_movement(
            services.clone(),
            staff_ctx.clone(),
            movement_req(MovementKind::SupplierPurchase, 20_000, "shampoo", None),
        )
        .await;
        assert_eq!(body_json(resp).await["balance"], "1300.00");

        let resp = close_till(
            services.clone(),
            staff_ctx,
            Json(dto::CloseTillRequest {
                session_id: session_id.parse().unwrap(),
                closing_amount: Money::from_cents(125_000),
                notes: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["computed_balance"], "1300.00");
        assert_eq!(body["declared_closing_amount"], "1250.00");
        assert_eq!(body["discrepancy"], "-50.00");

        // The summary read returns the same shape afterwards.
        let resp = session_summary(services.clone(), Path(session_id)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["discrepancy"], "-50.00");

        let resp = current_till(services).await;
        assert_eq!(body_json(resp).await["open"], false);
    }

    #[tokio::test]
    async fn movement_without_open_session_is_a_conflict() {
        let resp = record_movement(
            services(),
            staff(),
            movement_req(
                MovementKind::ClientPayment,
                1_000,
                "corte",
                Some(ClientId::new()),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn system_kind_movement_is_rejected() {
        let services = services();
        open_till(services.clone(), staff(), open_req(10_000)).await;
        let resp = record_movement(
            services,
            staff(),
            movement_req(MovementKind::Opening, 1_000, "nope", None),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn summary_of_unknown_session_is_not_found() {
        let resp = session_summary(services(), Path(SessionId::new().to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summary_with_malformed_id_is_rejected() {
        let resp = session_summary(services(), Path("not-a-uuid".to_string())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid_id");
    }

    #[tokio::test]
    async fn report_rejects_inverted_range() {
        let today = Utc::now().date_naive();
        let resp = report(
            services(),
            Query(dto::ReportParams {
                date_from: today + Duration::days(1),
                date_to: today,
                kind: None,
                staff_id: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn report_rejects_unknown_kind() {
        let today = Utc::now().date_naive();
        let resp = report(
            services(),
            Query(dto::ReportParams {
                date_from: today,
                date_to: today,
                kind: Some("venta".to_string()),
                staff_id: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid_movement_kind");
    }

    #[tokio::test]
    async fn history_defaults_and_clamps() {
        let services = services();
        let resp = history(
            services,
            Query(dto::HistoryParams {
                page: Some(0),
                page_size: Some(500),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 100);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn expense_categories_are_listed() {
        let resp = expense_categories(services()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["maintenance", "other", "services", "supplies"]);
    }
}
