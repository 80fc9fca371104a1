//! The shared balance routine.
//!
//! Every consumer (live view, close path, history, reports) folds movements
//! through this one routine, so the views can never diverge.

use serde::{Deserialize, Serialize};

use salondesk_core::{DomainError, DomainResult, Money};

use crate::movement::{BalanceEffect, Movement, MovementKind, PaymentMethod};
use crate::session::Session;

fn overflow() -> DomainError {
    DomainError::validation("balance arithmetic overflow")
}

/// Running balance over a session's movements.
///
/// The Opening movement carries the opening amount, so the balance is simply
/// Σ increase-kind amounts − Σ decrease-kind amounts; Closing entries are
/// neutral. Checked arithmetic: overflow is an error, never a wrap.
pub fn running_balance(movements: &[Movement]) -> DomainResult<Money> {
    movements.iter().try_fold(Money::ZERO, |acc, m| {
        match m.kind.balance_effect() {
            BalanceEffect::Increase => acc.checked_add(m.amount),
            BalanceEffect::Decrease => acc.checked_sub(m.amount),
            BalanceEffect::Neutral => Some(acc),
        }
        .ok_or_else(overflow)
    })
}

/// Aggregate totals over a movement set (report "ingresos"/"egresos").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub income: Money,
    pub expense: Money,
    pub net: Money,
}

pub fn movement_totals(movements: &[Movement]) -> DomainResult<MovementTotals> {
    let mut income = Money::ZERO;
    let mut expense = Money::ZERO;
    for m in movements {
        match m.kind.balance_effect() {
            BalanceEffect::Increase => income = income.checked_add(m.amount).ok_or_else(overflow)?,
            BalanceEffect::Decrease => {
                expense = expense.checked_add(m.amount).ok_or_else(overflow)?
            }
            BalanceEffect::Neutral => {}
        }
    }
    let net = income.checked_sub(expense).ok_or_else(overflow)?;
    Ok(MovementTotals { income, expense, net })
}

/// Per-kind / per-payment-method rollup of a session's movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindBreakdown {
    pub kind: MovementKind,
    pub payment_method: PaymentMethod,
    pub count: u64,
    pub total: Money,
}

pub fn kind_breakdown(movements: &[Movement]) -> DomainResult<Vec<KindBreakdown>> {
    let mut rows: Vec<KindBreakdown> = Vec::new();
    for m in movements {
        match rows
            .iter_mut()
            .find(|r| r.kind == m.kind && r.payment_method == m.payment_method)
        {
            Some(row) => {
                row.count += 1;
                row.total = row.total.checked_add(m.amount).ok_or_else(overflow)?;
            }
            None => rows.push(KindBreakdown {
                kind: m.kind,
                payment_method: m.payment_method,
                count: 1,
                total: m.amount,
            }),
        }
    }
    rows.sort_by_key(|r| (r.kind.as_str(), r.payment_method.as_str()));
    Ok(rows)
}

/// Full session detail: returned by the close operation and by the summary
/// read at any later time, in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: Session,
    /// Movements ordered by recorded_at ascending.
    pub movements: Vec<Movement>,
    pub computed_balance: Money,
    pub declared_closing_amount: Option<Money>,
    /// declared − computed; None while the session is still open.
    pub discrepancy: Option<Money>,
    pub breakdown: Vec<KindBreakdown>,
    pub totals: MovementTotals,
}

impl SessionSummary {
    /// Derive a summary from a session and its full movement list
    /// (ascending). The discrepancy is data for manual reconciliation, never
    /// an error.
    pub fn build(session: Session, movements: Vec<Movement>) -> DomainResult<Self> {
        let computed_balance = running_balance(&movements)?;
        let declared_closing_amount = session.closing_amount;
        let discrepancy = declared_closing_amount
            .map(|declared| declared.checked_sub(computed_balance).ok_or_else(overflow))
            .transpose()?;
        let breakdown = kind_breakdown(&movements)?;
        let totals = movement_totals(&movements)?;
        Ok(Self {
            session,
            movements,
            computed_balance,
            declared_closing_amount,
            discrepancy,
            breakdown,
            totals,
        })
    }
}
