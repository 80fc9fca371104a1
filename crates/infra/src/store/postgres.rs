//! Postgres-backed `TillStore`.
//!
//! Every mutation runs as one transaction, so the open-session check and the
//! dependent insert/update are indivisible:
//!
//! - `open_session` relies on the partial unique index over
//!   `till_sessions(status) WHERE status = 'open'`; a concurrent open loses
//!   the race at the database and surfaces as `Conflict` (code 23505).
//! - `close_session` and `record_movement` take `SELECT ... FOR UPDATE` on
//!   the open session row, so a movement can never attach after a concurrent
//!   close.
//!
//! Reads use plain pool queries and never block writers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use salondesk_core::{
    AppointmentId, ClientId, ExpenseCategoryId, Money, MovementId, SessionId, StaffId,
};
use salondesk_till::{
    movement_totals, running_balance, CloseTill, Movement, MovementKind, MovementRefs, OpenTill,
    PaymentMethod, RecordMovement, Session, SessionStatus, SessionSummary,
};

use super::{
    CurrentTill, ExpenseCategory, HistoryEntry, HistoryPage, PageRequest, ReportQuery, StoreError,
    TillReport, TillStore,
};

#[derive(Debug, Clone)]
pub struct PostgresTillStore {
    pool: Arc<PgPool>,
}

impl PostgresTillStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const MOVEMENT_COLUMNS: &str = "id, session_id, kind, amount_cents, description, \
     payment_method, recorded_at, recorded_by, client_id, appointment_id, supplier, \
     expense_category_id";

const SESSION_COLUMNS: &str = "id, opened_at, opening_amount_cents, opened_by, closed_at, \
     closing_amount_cents, closed_by, status, notes";

#[async_trait]
impl TillStore for PostgresTillStore {
    #[instrument(skip(self, cmd), err)]
    async fn open_session(&self, cmd: OpenTill) -> Result<Session, StoreError> {
        cmd.validate()?;
        let session = Session::open(&cmd, Utc::now());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO till_sessions (id, opened_at, opening_amount_cents, opened_by, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.opened_at)
        .bind(session.opening_amount.cents())
        .bind(session.opened_by.as_uuid())
        .bind(session.status.as_str())
        .bind(&session.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("a till session is already open".to_string())
            } else {
                map_sqlx_error("insert_session", e)
            }
        })?;

        let opening = Movement::system(
            session.id,
            MovementKind::Opening,
            session.opening_amount,
            session.opened_by,
            session.opened_at,
        );
        insert_movement(&mut tx, &opening).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(session_id = %session.id, "till session opened");
        Ok(session)
    }

    #[instrument(skip(self, cmd), err)]
    async fn close_session(&self, cmd: CloseTill) -> Result<SessionSummary, StoreError> {
        cmd.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM till_sessions \
             WHERE id = $1 AND status = 'open' FOR UPDATE"
        ))
        .bind(cmd.session_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_open_session", e))?;

        let mut session: Session = match row {
            Some(row) => SessionRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to read session row: {e}")))?
                .try_into()?,
            None => return Err(StoreError::NotFound),
        };

        let closed_at = Utc::now();
        session.close(cmd.staff_id, cmd.closing_amount, cmd.notes, closed_at)?;

        sqlx::query(
            r#"
            UPDATE till_sessions
            SET status = 'closed',
                closed_at = $2,
                closing_amount_cents = $3,
                closed_by = $4,
                notes = $5
            WHERE id = $1
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(closed_at)
        .bind(cmd.closing_amount.cents())
        .bind(cmd.staff_id.as_uuid())
        .bind(&session.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("close_session", e))?;

        let closing = Movement::system(
            session.id,
            MovementKind::Closing,
            cmd.closing_amount,
            cmd.staff_id,
            closed_at,
        );
        insert_movement(&mut tx, &closing).await?;

        let movements = fetch_session_movements(&mut *tx, session.id).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let summary = SessionSummary::build(session, movements)?;
        tracing::info!(
            session_id = %summary.session.id,
            computed_balance = %summary.computed_balance,
            discrepancy = ?summary.discrepancy,
            "till session closed"
        );
        Ok(summary)
    }

    #[instrument(skip(self, cmd), err)]
    async fn record_movement(
        &self,
        cmd: RecordMovement,
    ) -> Result<(Movement, Money), StoreError> {
        cmd.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Lock the open session row for the duration of the append so a
        // concurrent close cannot slip between the check and the insert.
        let row = sqlx::query("SELECT id FROM till_sessions WHERE status = 'open' FOR UPDATE")
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_open_session", e))?;

        let session_id = match row {
            Some(row) => SessionId::from_uuid(
                row.try_get::<Uuid, _>("id")
                    .map_err(|e| StoreError::Storage(format!("failed to read session id: {e}")))?,
            ),
            None => {
                return Err(StoreError::Conflict(
                    "no till session is open".to_string(),
                ))
            }
        };

        let movement = Movement::from_command(session_id, cmd, Utc::now());
        insert_movement(&mut tx, &movement).await?;

        let movements = fetch_session_movements(&mut *tx, session_id).await?;
        let balance = running_balance(&movements)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(
            movement_id = %movement.id,
            kind = movement.kind.as_str(),
            balance = %balance,
            "movement recorded"
        );
        Ok((movement, balance))
    }

    #[instrument(skip(self), err)]
    async fn current_session(&self) -> Result<Option<CurrentTill>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM till_sessions WHERE status = 'open'"
        ))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_open_session", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let session: Session = SessionRow::from_row(&row)
            .map_err(|e| StoreError::Storage(format!("failed to read session row: {e}")))?
            .try_into()?;

        let mut movements = fetch_session_movements(&*self.pool, session.id).await?;
        let balance = running_balance(&movements)?;
        movements.reverse();

        Ok(Some(CurrentTill {
            session,
            movements,
            balance,
        }))
    }

    #[instrument(skip(self), err)]
    async fn session_summary(&self, session_id: SessionId) -> Result<SessionSummary, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM till_sessions WHERE id = $1"
        ))
        .bind(session_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_session", e))?;

        let session: Session = match row {
            Some(row) => SessionRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to read session row: {e}")))?
                .try_into()?,
            None => return Err(StoreError::NotFound),
        };

        let movements = fetch_session_movements(&*self.pool, session_id).await?;
        Ok(SessionSummary::build(session, movements)?)
    }

    #[instrument(skip(self), err)]
    async fn history(&self, page: PageRequest) -> Result<HistoryPage, StoreError> {
        let (page_no, page_size) = page.clamped();
        let offset = (page_no as i64 - 1) * page_size as i64;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM till_sessions")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_sessions", e))?
            .try_get("total")
            .map_err(|e| StoreError::Storage(format!("failed to read session count: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM till_sessions \
             ORDER BY opened_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_history_page", e))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let session: Session = SessionRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to read session row: {e}")))?
                .try_into()?;
            sessions.push(session);
        }

        // Grouped sums by (session, kind); the sign is applied in Rust via
        // the shared classification so SQL never re-encodes the sign table.
        let ids: Vec<Uuid> = sessions.iter().map(|s| *s.id.as_uuid()).collect();
        let sum_rows = sqlx::query(
            r#"
            SELECT session_id, kind, COUNT(*) AS movement_count,
                   SUM(amount_cents)::BIGINT AS total_cents
            FROM till_movements
            WHERE session_id = ANY($1)
            GROUP BY session_id, kind
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sum_history_movements", e))?;

        let mut entries: Vec<HistoryEntry> = sessions
            .into_iter()
            .map(|session| HistoryEntry {
                session,
                movement_count: 0,
                final_balance: Money::ZERO,
            })
            .collect();

        for row in sum_rows {
            let session_id: Uuid = row
                .try_get("session_id")
                .map_err(|e| StoreError::Storage(format!("failed to read sum row: {e}")))?;
            let kind: String = row
                .try_get("kind")
                .map_err(|e| StoreError::Storage(format!("failed to read sum row: {e}")))?;
            let count: i64 = row
                .try_get("movement_count")
                .map_err(|e| StoreError::Storage(format!("failed to read sum row: {e}")))?;
            let total_cents: i64 = row
                .try_get("total_cents")
                .map_err(|e| StoreError::Storage(format!("failed to read sum row: {e}")))?;

            let kind = MovementKind::parse(&kind)
                .map_err(|e| StoreError::Storage(format!("corrupt movement kind: {e}")))?;

            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.session.id.as_uuid() == &session_id)
            {
                entry.movement_count += count as u64;
                entry.final_balance =
                    apply_effect(entry.final_balance, kind, Money::from_cents(total_cents))?;
            }
        }

        Ok(HistoryPage {
            entries,
            page: page_no,
            page_size,
            total: total as u64,
            pages: (total as u64).div_ceil(page_size as u64),
        })
    }

    #[instrument(skip(self), err)]
    async fn report(&self, query: ReportQuery) -> Result<TillReport, StoreError> {
        query.validate()?;

        let rows = sqlx::query(
            r#"
            SELECT m.id, m.session_id, m.kind, m.amount_cents, m.description,
                   m.payment_method, m.recorded_at, m.recorded_by, m.client_id,
                   m.appointment_id, m.supplier, m.expense_category_id
            FROM till_movements m
            JOIN till_sessions s ON s.id = m.session_id
            WHERE s.opened_at::date >= $1 AND s.opened_at::date <= $2
              AND ($3::text IS NULL OR m.kind = $3)
              AND ($4::uuid IS NULL OR m.recorded_by = $4)
            ORDER BY m.recorded_at DESC, m.id DESC
            "#,
        )
        .bind(query.date_from)
        .bind(query.date_to)
        .bind(query.kind.map(|k| k.as_str()))
        .bind(query.staff_id.map(|s| *s.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_report_movements", e))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let movement: Movement = MovementRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to read movement row: {e}")))?
                .try_into()?;
            movements.push(movement);
        }

        let totals = movement_totals(&movements)?;
        let total_sessions = movements
            .iter()
            .map(|m| m.session_id)
            .collect::<std::collections::HashSet<_>>()
            .len() as u64;

        Ok(TillReport {
            total_sessions,
            total_movements: movements.len() as u64,
            totals,
            movements,
        })
    }

    #[instrument(skip(self), err)]
    async fn expense_categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, active FROM expense_categories WHERE active ORDER BY name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_expense_categories", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(ExpenseCategory {
                    id: ExpenseCategoryId::from_uuid(row.try_get("id").map_err(read_err)?),
                    name: row.try_get("name").map_err(read_err)?,
                    active: row.try_get("active").map_err(read_err)?,
                })
            })
            .collect()
    }
}

fn read_err(e: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("failed to read row: {e}"))
}

fn apply_effect(acc: Money, kind: MovementKind, amount: Money) -> Result<Money, StoreError> {
    use salondesk_till::BalanceEffect;
    match kind.balance_effect() {
        BalanceEffect::Increase => acc.checked_add(amount),
        BalanceEffect::Decrease => acc.checked_sub(amount),
        BalanceEffect::Neutral => Some(acc),
    }
    .ok_or_else(|| StoreError::Storage("balance arithmetic overflow".to_string()))
}

async fn insert_movement(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    movement: &Movement,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO till_movements (
            id, session_id, kind, amount_cents, description, payment_method,
            recorded_at, recorded_by, client_id, appointment_id, supplier,
            expense_category_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.session_id.as_uuid())
    .bind(movement.kind.as_str())
    .bind(movement.amount.cents())
    .bind(&movement.description)
    .bind(movement.payment_method.as_str())
    .bind(movement.recorded_at)
    .bind(movement.recorded_by.as_uuid())
    .bind(movement.refs.client_id.map(|id| *id.as_uuid()))
    .bind(movement.refs.appointment_id.map(|id| *id.as_uuid()))
    .bind(&movement.refs.supplier)
    .bind(movement.refs.expense_category_id.map(|id| *id.as_uuid()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

/// Movements of one session, recorded_at ascending (id breaks ties).
async fn fetch_session_movements<'e, E>(
    executor: E,
    session_id: SessionId,
) -> Result<Vec<Movement>, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM till_movements \
         WHERE session_id = $1 ORDER BY recorded_at ASC, id ASC"
    ))
    .bind(session_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("fetch_session_movements", e))?;

    rows.into_iter()
        .map(|row| {
            MovementRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to read movement row: {e}")))?
                .try_into()
        })
        .collect()
}

/// Map SQLx errors to StoreError. Unique violations (Postgres 23505) are
/// conflicts: the one-open-session index lost a race.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(format!("concurrent till mutation detected in {operation}"));
    }
    StoreError::Storage(format!("sqlx error in {operation}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct SessionRow {
    id: Uuid,
    opened_at: DateTime<Utc>,
    opening_amount_cents: i64,
    opened_by: Uuid,
    closed_at: Option<DateTime<Utc>>,
    closing_amount_cents: Option<i64>,
    closed_by: Option<Uuid>,
    status: String,
    notes: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SessionRow {
            id: row.try_get("id")?,
            opened_at: row.try_get("opened_at")?,
            opening_amount_cents: row.try_get("opening_amount_cents")?,
            opened_by: row.try_get("opened_by")?,
            closed_at: row.try_get("closed_at")?,
            closing_amount_cents: row.try_get("closing_amount_cents")?,
            closed_by: row.try_get("closed_by")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, StoreError> {
        let status = SessionStatus::parse(&row.status)
            .map_err(|e| StoreError::Storage(format!("corrupt session row: {e}")))?;
        Ok(Session {
            id: SessionId::from_uuid(row.id),
            opened_at: row.opened_at,
            opening_amount: Money::from_cents(row.opening_amount_cents),
            opened_by: StaffId::from_uuid(row.opened_by),
            closed_at: row.closed_at,
            closing_amount: row.closing_amount_cents.map(Money::from_cents),
            closed_by: row.closed_by.map(StaffId::from_uuid),
            status,
            notes: row.notes,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    session_id: Uuid,
    kind: String,
    amount_cents: i64,
    description: Option<String>,
    payment_method: String,
    recorded_at: DateTime<Utc>,
    recorded_by: Uuid,
    client_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    supplier: Option<String>,
    expense_category_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            kind: row.try_get("kind")?,
            amount_cents: row.try_get("amount_cents")?,
            description: row.try_get("description")?,
            payment_method: row.try_get("payment_method")?,
            recorded_at: row.try_get("recorded_at")?,
            recorded_by: row.try_get("recorded_by")?,
            client_id: row.try_get("client_id")?,
            appointment_id: row.try_get("appointment_id")?,
            supplier: row.try_get("supplier")?,
            expense_category_id: row.try_get("expense_category_id")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, StoreError> {
        let corrupt = |e| StoreError::Storage(format!("corrupt movement row: {e}"));
        Ok(Movement {
            id: MovementId::from_uuid(row.id),
            session_id: SessionId::from_uuid(row.session_id),
            kind: MovementKind::parse(&row.kind).map_err(corrupt)?,
            amount: Money::from_cents(row.amount_cents),
            description: row.description,
            payment_method: PaymentMethod::parse(&row.payment_method).map_err(corrupt)?,
            recorded_at: row.recorded_at,
            recorded_by: StaffId::from_uuid(row.recorded_by),
            refs: MovementRefs {
                client_id: row.client_id.map(ClientId::from_uuid),
                appointment_id: row.appointment_id.map(AppointmentId::from_uuid),
                supplier: row.supplier,
                expense_category_id: row.expense_category_id.map(ExpenseCategoryId::from_uuid),
            },
        })
    }
}
