use crate::{
    handlers::{AppState, SERVER_NAME},
    models::HealthStatus,
};
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        server: SERVER_NAME.to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        verification: state.verification_label().to_string(),
    })
}
