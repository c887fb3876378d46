pub mod enroll;
pub mod health;
pub mod passkey;
pub mod types;

use axum::response::{IntoResponse, Json};
use serde_json::json;

/// Root handler; a cheap liveness probe with service identity.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
