use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the store head and the number of live player sessions.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.store().version().await, state.session_count())
}
