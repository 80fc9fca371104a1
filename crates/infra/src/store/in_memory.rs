//! In-memory `TillStore`.
//!
//! Backs tests and database-less development runs. A single mutex is the
//! serialization point: each operation holds it for its whole check-then-act
//! sequence, giving the same observable atomicity contract as the Postgres
//! transactions.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use salondesk_core::{ExpenseCategoryId, Money, SessionId};
use salondesk_till::{
    running_balance, CloseTill, Movement, MovementKind, OpenTill, RecordMovement, Session,
    SessionSummary,
};

use super::{
    CurrentTill, ExpenseCategory, HistoryEntry, HistoryPage, PageRequest, ReportQuery, StoreError,
    TillReport, TillStore,
};

#[derive(Debug, Default)]
struct State {
    sessions: Vec<Session>,
    /// Append-only, in insertion order (which is recorded_at order).
    movements: Vec<Movement>,
    categories: Vec<ExpenseCategory>,
}

#[derive(Debug, Default)]
pub struct InMemoryTillStore {
    inner: Mutex<State>,
}

impl InMemoryTillStore {
    pub fn new() -> Self {
        let mut state = State::default();
        for name in ["maintenance", "other", "services", "supplies"] {
            state.categories.push(ExpenseCategory {
                id: ExpenseCategoryId::new(),
                name: name.to_string(),
                active: true,
            });
        }
        Self {
            inner: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Storage("till store mutex poisoned".to_string()))
    }
}

fn session_movements(state: &State, session_id: SessionId) -> Vec<Movement> {
    state
        .movements
        .iter()
        .filter(|m| m.session_id == session_id)
        .cloned()
        .collect()
}

#[async_trait]
impl TillStore for InMemoryTillStore {
    async fn open_session(&self, cmd: OpenTill) -> Result<Session, StoreError> {
        cmd.validate()?;
        let mut state = self.lock()?;
        if state.sessions.iter().any(|s| s.is_open()) {
            return Err(StoreError::Conflict(
                "a till session is already open".to_string(),
            ));
        }
        let session = Session::open(&cmd, Utc::now());
        let opening = Movement::system(
            session.id,
            MovementKind::Opening,
            session.opening_amount,
            session.opened_by,
            session.opened_at,
        );
        state.sessions.push(session.clone());
        state.movements.push(opening);
        Ok(session)
    }

    async fn close_session(&self, cmd: CloseTill) -> Result<SessionSummary, StoreError> {
        cmd.validate()?;
        let mut state = self.lock()?;
        let idx = state
            .sessions
            .iter()
            .position(|s| s.id == cmd.session_id && s.is_open())
            .ok_or(StoreError::NotFound)?;

        let closed_at = Utc::now();
        let mut session = state.sessions[idx].clone();
        session.close(cmd.staff_id, cmd.closing_amount, cmd.notes, closed_at)?;

        let closing = Movement::system(
            session.id,
            MovementKind::Closing,
            cmd.closing_amount,
            cmd.staff_id,
            closed_at,
        );
        state.sessions[idx] = session.clone();
        state.movements.push(closing);

        let movements = session_movements(&state, session.id);
        Ok(SessionSummary::build(session, movements)?)
    }

    async fn record_movement(
        &self,
        cmd: RecordMovement,
    ) -> Result<(Movement, Money), StoreError> {
        cmd.validate()?;
        let mut state = self.lock()?;
        let session_id = state
            .sessions
            .iter()
            .find(|s| s.is_open())
            .map(|s| s.id)
            .ok_or_else(|| StoreError::Conflict("no till session is open".to_string()))?;

        let movement = Movement::from_command(session_id, cmd, Utc::now());
        state.movements.push(movement.clone());

        let balance = running_balance(&session_movements(&state, session_id))?;
        Ok((movement, balance))
    }

    async fn current_session(&self) -> Result<Option<CurrentTill>, StoreError> {
        let state = self.lock()?;
        let Some(session) = state.sessions.iter().find(|s| s.is_open()).cloned() else {
            return Ok(None);
        };
        let mut movements = session_movements(&state, session.id);
        let balance = running_balance(&movements)?;
        movements.reverse();
        Ok(Some(CurrentTill {
            session,
            movements,
            balance,
        }))
    }

    async fn session_summary(&self, session_id: SessionId) -> Result<SessionSummary, StoreError> {
        let state = self.lock()?;
        let session = state
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let movements = session_movements(&state, session_id);
        Ok(SessionSummary::build(session, movements)?)
    }

    async fn history(&self, page: PageRequest) -> Result<HistoryPage, StoreError> {
        let (page_no, page_size) = page.clamped();
        let state = self.lock()?;

        let mut sessions = state.sessions.clone();
        sessions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));

        let total = sessions.len() as u64;
        let pages = total.div_ceil(page_size as u64);
        let offset = (page_no as usize - 1) * page_size as usize;

        let mut entries = Vec::new();
        for session in sessions.into_iter().skip(offset).take(page_size as usize) {
            let movements = session_movements(&state, session.id);
            let final_balance = running_balance(&movements)?;
            entries.push(HistoryEntry {
                session,
                movement_count: movements.len() as u64,
                final_balance,
            });
        }

        Ok(HistoryPage {
            entries,
            page: page_no,
            page_size,
            total,
            pages,
        })
    }

    async fn report(&self, query: ReportQuery) -> Result<TillReport, StoreError> {
        query.validate()?;
        let state = self.lock()?;

        let in_range: HashSet<SessionId> = state
            .sessions
            .iter()
            .filter(|s| {
                let opened = s.opened_at.date_naive();
                opened >= query.date_from && opened <= query.date_to
            })
            .map(|s| s.id)
            .collect();

        let mut movements: Vec<Movement> = state
            .movements
            .iter()
            .filter(|m| in_range.contains(&m.session_id))
            .filter(|m| query.kind.is_none_or(|k| m.kind == k))
            .filter(|m| query.staff_id.is_none_or(|s| m.recorded_by == s))
            .cloned()
            .collect();

        let totals = salondesk_till::movement_totals(&movements)?;
        let total_sessions = movements
            .iter()
            .map(|m| m.session_id)
            .collect::<HashSet<_>>()
            .len() as u64;
        let total_movements = movements.len() as u64;
        movements.reverse();

        Ok(TillReport {
            movements,
            total_sessions,
            total_movements,
            totals,
        })
    }

    async fn expense_categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        let state = self.lock()?;
        let mut categories: Vec<ExpenseCategory> = state
            .categories
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}
