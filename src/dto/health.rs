use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (always "ok" while the process serves requests).
    pub status: String,
    /// Version of the latest batch committed to the session store.
    pub store_version: u64,
    /// Players currently holding a server-side session.
    pub sessions: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(store_version: u64, sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            store_version,
            sessions,
        }
    }
}
