//! Schema bootstrap for the till ledger.
//!
//! Applied at startup; every statement is idempotent so repeated runs are
//! harmless. The partial unique index over `status = 'open'` is what makes
//! the one-open-session invariant hold under concurrency.

use sqlx::PgPool;

use crate::store::StoreError;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS till_sessions (
        id UUID PRIMARY KEY,
        opened_at TIMESTAMPTZ NOT NULL,
        opening_amount_cents BIGINT NOT NULL,
        opened_by UUID NOT NULL,
        closed_at TIMESTAMPTZ,
        closing_amount_cents BIGINT,
        closed_by UUID,
        status TEXT NOT NULL,
        notes TEXT
    )
    "#,
    // At most one open session system-wide.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS till_sessions_single_open
        ON till_sessions (status) WHERE status = 'open'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS till_movements (
        id UUID PRIMARY KEY,
        session_id UUID NOT NULL REFERENCES till_sessions (id),
        kind TEXT NOT NULL,
        amount_cents BIGINT NOT NULL,
        description TEXT,
        payment_method TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        recorded_by UUID NOT NULL,
        client_id UUID,
        appointment_id UUID,
        supplier TEXT,
        expense_category_id UUID
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS till_movements_by_session
        ON till_movements (session_id, recorded_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS expense_categories (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    INSERT INTO expense_categories (id, name)
    VALUES
        (gen_random_uuid(), 'maintenance'),
        (gen_random_uuid(), 'other'),
        (gen_random_uuid(), 'services'),
        (gen_random_uuid(), 'supplies')
    ON CONFLICT (name) DO NOTHING
    "#,
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Storage(format!("schema bootstrap failed: {e}")))?;
    }
    tracing::debug!("till schema ensured");
    Ok(())
}
