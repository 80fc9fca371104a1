//! `salondesk-observability` — process-wide tracing/logging setup.

mod tracing_init;

pub use tracing_init::init;
