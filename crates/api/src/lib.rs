//! `salondesk-api` — HTTP surface of the till.
//!
//! Thin Axum layer: middleware authenticates and attaches the acting staff
//! context, handlers translate JSON to domain commands and map store errors
//! to status codes. All till semantics live below, behind
//! [`salondesk_infra::TillStore`].

pub mod app;
pub mod context;
pub mod middleware;
