//! Store selection and shared application state.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use salondesk_infra::{schema, InMemoryTillStore, PostgresTillStore, TillStore};

/// Everything the handlers need, behind `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub till: Arc<dyn TillStore>,
}

impl AppServices {
    pub fn in_memory() -> Self {
        Self {
            till: Arc::new(InMemoryTillStore::new()),
        }
    }
}

/// Pick the store from the environment: Postgres when `DATABASE_URL` is set,
/// the in-memory store otherwise (development only; state is lost on
/// restart).
pub async fn build_services() -> AppServices {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            schema::ensure_schema(&pool)
                .await
                .expect("schema bootstrap failed");
            tracing::info!("using postgres till store");
            AppServices {
                till: Arc::new(PostgresTillStore::new(pool)),
            }
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory till store");
            AppServices::in_memory()
        }
    }
}
