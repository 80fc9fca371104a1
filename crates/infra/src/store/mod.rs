//! The `TillStore` seam: trait, error model, and read shapes.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use salondesk_core::{DomainError, ExpenseCategoryId, Money, SessionId, StaffId};
use salondesk_till::{
    CloseTill, Movement, MovementKind, MovementTotals, OpenTill, RecordMovement, Session,
    SessionSummary,
};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryTillStore;
pub use postgres::PostgresTillStore;

/// Storage-layer error.
///
/// `Conflict` and `NotFound` carry the till invariants out of the atomic
/// check-then-act sequences; `Storage` wraps underlying store failures.
/// Mutations are all-or-nothing, so a failed call is safe to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invariant conflict: a session is already open, or none is.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The referenced session does not exist (or is not the open one).
    #[error("not found")]
    NotFound,

    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying store failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => StoreError::Validation(msg),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::NotFound => StoreError::NotFound,
            DomainError::InvalidId(msg) => StoreError::Validation(msg),
        }
    }
}

/// Live view of the open till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTill {
    pub session: Session,
    /// Movements ordered by recorded_at descending (newest first).
    pub movements: Vec<Movement>,
    pub balance: Money,
}

/// One row of the session history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session: Session,
    pub movement_count: u64,
    pub final_balance: Money,
}

/// Offset-paginated history of sessions, opened_at descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub pages: u64,
}

/// Pagination input. Invalid values are clamped rather than rejected — this
/// is a display convenience, not a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Clamped (page, page_size): page ≥ 1, 1 ≤ page_size ≤ 100.
    pub fn clamped(self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        (page, page_size)
    }
}

/// Movement report query over sessions opened within a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub kind: Option<MovementKind>,
    pub staff_id: Option<StaffId>,
}

impl ReportQuery {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.date_from > self.date_to {
            return Err(StoreError::Validation(
                "date_from must not be after date_to".to_string(),
            ));
        }
        Ok(())
    }
}

/// Report result: the filtered movement listing plus aggregate totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TillReport {
    /// Movements ordered by recorded_at descending.
    pub movements: Vec<Movement>,
    pub total_sessions: u64,
    pub total_movements: u64,
    pub totals: MovementTotals,
}

/// Expense-category lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: ExpenseCategoryId,
    pub name: String,
    pub active: bool,
}

/// Durable, append-only till ledger.
///
/// All mutating operations execute as single atomic transactions: the
/// open-session check and the subsequent insert/update are indivisible, so a
/// movement can never attach to a session that closed concurrently and two
/// concurrent opens cannot both succeed. Reads never mutate state.
#[async_trait]
pub trait TillStore: Send + Sync {
    /// Open the till. Conflict if a session is already open. Atomically
    /// persists the session and its Opening movement.
    async fn open_session(&self, cmd: OpenTill) -> Result<Session, StoreError>;

    /// Close the currently open session. NotFound unless `cmd.session_id`
    /// is the open session. Atomically records the Closing movement and
    /// flips the session to Closed; returns the full summary.
    async fn close_session(&self, cmd: CloseTill) -> Result<SessionSummary, StoreError>;

    /// Append a movement to the open session. Conflict when no session is
    /// open. Returns the movement and the new running balance.
    async fn record_movement(&self, cmd: RecordMovement)
        -> Result<(Movement, Money), StoreError>;

    /// The open session with its movements (newest first), or None.
    async fn current_session(&self) -> Result<Option<CurrentTill>, StoreError>;

    /// Full detail for any session, open or closed.
    async fn session_summary(&self, session_id: SessionId)
        -> Result<SessionSummary, StoreError>;

    /// Paginated past sessions, opened_at descending.
    async fn history(&self, page: PageRequest) -> Result<HistoryPage, StoreError>;

    /// Movement listing + totals over a date range.
    async fn report(&self, query: ReportQuery) -> Result<TillReport, StoreError>;

    /// Active expense categories, ordered by name.
    async fn expense_categories(&self) -> Result<Vec<ExpenseCategory>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_clamps_instead_of_erroring() {
        assert_eq!(PageRequest::default().clamped(), (1, 10));
        assert_eq!(
            PageRequest { page: Some(0), page_size: Some(0) }.clamped(),
            (1, 1)
        );
        assert_eq!(
            PageRequest { page: Some(3), page_size: Some(500) }.clamped(),
            (3, 100)
        );
    }

    #[test]
    fn inverted_report_range_is_a_validation_error() {
        let q = ReportQuery {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            kind: None,
            staff_id: None,
        };
        assert!(matches!(q.validate(), Err(StoreError::Validation(_))));
    }
}
