use axum::{routing::get, Router};

pub mod system;
pub mod till;

/// All authenticated routes.
pub fn router() -> Router {
    Router::new()
        .nest("/till", till::router())
        .route("/whoami", get(system::whoami))
}
