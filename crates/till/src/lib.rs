//! `salondesk-till` — the cash-register ledger domain.
//!
//! A till session runs from opening to closing; every cash-affecting event in
//! between is an append-only movement bound to that session. This crate holds
//! the pure domain model: the session state machine, the movement kind
//! classification, command validation, and the single balance routine every
//! consumer (live view, close, history, reports) shares.

pub mod balance;
pub mod movement;
pub mod session;

pub use balance::{
    kind_breakdown, movement_totals, running_balance, KindBreakdown, MovementTotals,
    SessionSummary,
};
pub use movement::{BalanceEffect, Movement, MovementKind, MovementRefs, PaymentMethod, RecordMovement};
pub use session::{CloseTill, OpenTill, Session, SessionStatus};
