use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{ServerEvent, StoreValueEvent},
    error::ServiceError,
    state::SharedState,
    store::{Change, SharedStore, StorePath, Subscription},
};

/// SSE event name carrying [`StoreValueEvent`] payloads.
pub const VALUE_EVENT: &str = "value";

/// Subscribe to the subtree at `raw_path` (slash separated, empty for the root).
pub async fn subscribe(state: &SharedState, raw_path: &str) -> Result<Subscription, ServiceError> {
    let path = StorePath::parse(raw_path)?;
    let subscription = state.store().subscribe(path).await?;
    Ok(subscription)
}

/// Wrap one store change into the `value` event of `path`.
pub fn value_event(path: &StorePath, change: Change) -> serde_json::Result<ServerEvent> {
    ServerEvent::json(
        Some(VALUE_EVENT.to_string()),
        &StoreValueEvent {
            path: path.to_string(),
            version: change.version,
            value: change.value,
        },
    )
}

/// Convert a store subscription into an SSE response: the current value first, then one
/// event per change, until the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let path = subscription.path().clone();
        let mut changes = subscription.into_stream();
        loop {
            let change = tokio::select! {
                _ = tx.closed() => break,
                next = changes.next() => match next {
                    Some(change) => change,
                    None => break,
                },
            };

            let payload = match value_event(&path, change) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to encode store value");
                    continue;
                }
            };
            let mut event = Event::default().data(payload.data);
            if let Some(name) = payload.event {
                event = event.event(name);
            }
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
            debug!(path = %path, "store value forwarded");
        }

        info!(path = %path, "store SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn value_event_carries_path_and_version() {
        let path = StorePath::parse("level1/status").unwrap();
        let event = value_event(
            &path,
            Change {
                version: 7,
                value: json!("voting"),
            },
        )
        .unwrap();

        assert_eq!(event.event.as_deref(), Some(VALUE_EVENT));
        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data, json!({"path": "/level1/status", "version": 7, "value": "voting"}));
    }
}
