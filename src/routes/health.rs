use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use diesel::{sql_query, RunQueryDsl};
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match state.db() {
        Ok(mut conn) => match sql_query("SELECT 1").execute(&mut conn) {
            Ok(_) => "connected",
            Err(err) => {
                tracing::warn!(error = %err, "health check query failed");
                "disconnected"
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            "disconnected"
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "OK",
            "message": "Vault API is running",
            "timestamp": Utc::now().to_rfc3339(),
            "database": database,
        })),
    )
}
