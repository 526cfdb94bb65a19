use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Snapshot of a store subtree, sent on connect and after every change touching it.
pub struct StoreValueEvent {
    /// Watched path, slash separated.
    pub path: String,
    /// Store version the value was read at.
    pub version: u64,
    /// Current value of the subtree (`null` when absent).
    #[schema(value_type = Object)]
    pub value: Value,
}
