//! `salondesk-infra` — durable storage for the till ledger.
//!
//! The [`store::TillStore`] trait is the seam between the domain and its
//! persistence: a Postgres implementation for production and an in-memory
//! implementation with the same atomicity contract for tests and
//! database-less development runs.

pub mod schema;
pub mod store;


pub use store::{
    CurrentTill, ExpenseCategory, HistoryEntry, HistoryPage, InMemoryTillStore, PageRequest,
    PostgresTillStore, ReportQuery, StoreError, TillReport, TillStore,
};
