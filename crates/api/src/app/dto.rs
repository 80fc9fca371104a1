use chrono::NaiveDate;
use serde::Deserialize;

use salondesk_core::{AppointmentId, ClientId, ExpenseCategoryId, Money, SessionId, StaffId};
use salondesk_infra::{CurrentTill, ExpenseCategory, HistoryPage, TillReport};
use salondesk_till::{
    Movement, MovementKind, MovementRefs, MovementTotals, PaymentMethod, RecordMovement, Session,
    SessionSummary,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenTillRequest {
    pub opening_amount: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseTillRequest {
    pub session_id: SessionId,
    pub closing_amount: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub kind: MovementKind,
    pub amount: Money,
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub client_id: Option<ClientId>,
    pub appointment_id: Option<AppointmentId>,
    pub supplier: Option<String>,
    pub expense_category_id: Option<ExpenseCategoryId>,
}

impl RecordMovementRequest {
    /// Stamp the request with the authenticated staff identity.
    pub fn into_command(self, staff_id: StaffId) -> RecordMovement {
        RecordMovement {
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            payment_method: self.payment_method,
            staff_id,
            refs: MovementRefs {
                client_id: self.client_id,
                appointment_id: self.appointment_id,
                supplier: self.supplier,
                expense_category_id: self.expense_category_id,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub kind: Option<String>,
    pub staff_id: Option<StaffId>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn session_to_json(s: &Session) -> serde_json::Value {
    serde_json::json!({
        "id": s.id,
        "status": s.status,
        "opened_at": s.opened_at,
        "opening_amount": s.opening_amount,
        "opened_by": s.opened_by,
        "closed_at": s.closed_at,
        "closing_amount": s.closing_amount,
        "closed_by": s.closed_by,
        "notes": s.notes,
    })
}

pub fn movement_to_json(m: &Movement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id,
        "session_id": m.session_id,
        "kind": m.kind,
        "amount": m.amount,
        "description": m.description,
        "payment_method": m.payment_method,
        "recorded_at": m.recorded_at,
        "recorded_by": m.recorded_by,
        "client_id": m.refs.client_id,
        "appointment_id": m.refs.appointment_id,
        "supplier": m.refs.supplier,
        "expense_category_id": m.refs.expense_category_id,
    })
}

fn totals_to_json(t: &MovementTotals) -> serde_json::Value {
    serde_json::json!({
        "income": t.income,
        "expense": t.expense,
        "net": t.net,
    })
}

pub fn summary_to_json(summary: &SessionSummary) -> serde_json::Value {
    serde_json::json!({
        "session": session_to_json(&summary.session),
        "movements": summary.movements.iter().map(movement_to_json).collect::<Vec<_>>(),
        "computed_balance": summary.computed_balance,
        "declared_closing_amount": summary.declared_closing_amount,
        "discrepancy": summary.discrepancy,
        "breakdown": summary.breakdown,
        "totals": totals_to_json(&summary.totals),
    })
}

pub fn current_to_json(current: &CurrentTill) -> serde_json::Value {
    serde_json::json!({
        "open": true,
        "session": session_to_json(&current.session),
        "movements": current.movements.iter().map(movement_to_json).collect::<Vec<_>>(),
        "balance": current.balance,
    })
}

pub fn history_to_json(page: &HistoryPage) -> serde_json::Value {
    serde_json::json!({
        "sessions": page.entries.iter().map(|e| {
            serde_json::json!({
                "session": session_to_json(&e.session),
                "movement_count": e.movement_count,
                "final_balance": e.final_balance,
            })
        }).collect::<Vec<_>>(),
        "page": page.page,
        "page_size": page.page_size,
        "total": page.total,
        "pages": page.pages,
    })
}

pub fn report_to_json(report: &TillReport) -> serde_json::Value {
    serde_json::json!({
        "movements": report.movements.iter().map(movement_to_json).collect::<Vec<_>>(),
        "total_sessions": report.total_sessions,
        "total_movements": report.total_movements,
        "totals": totals_to_json(&report.totals),
    })
}

pub fn category_to_json(c: &ExpenseCategory) -> serde_json::Value {
    serde_json::json!({
        "id": c.id,
        "name": c.name,
        "active": c.active,
    })
}
