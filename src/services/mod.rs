/// OpenAPI documentation generation.
pub mod documentation;
/// Level3: elimination guess rounds.
pub mod elimination_guess_service;
/// Gift suitability rating round.
pub mod gift_rating_service;
/// Health check service.
pub mod health_service;
/// Level1: majority vote.
pub mod majority_vote_service;
/// Global phase controller and full reset.
pub mod phase_service;
/// Leaderboard and gift insights.
pub mod results_service;
/// Join, leave and admin election.
pub mod roster_service;
/// Score deltas committed as store-side increments.
pub mod score_ledger;
/// Level2: secret attribution.
pub mod secret_attribution_service;
/// Server-Sent Events forwarding of store subscriptions.
pub mod sse_service;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::{ClientSnapshot, PartyClient},
    error::ServiceError,
    store::{Batch, BatchOutcome},
};

/// Snapshot for an action reserved to the admin. Other callers are logged, not refused.
pub(crate) async fn admin_snapshot(client: &PartyClient, action: &'static str) -> ClientSnapshot {
    let snapshot = client.snapshot().await;
    if !snapshot.is_admin() {
        warn!(
            action,
            player_id = snapshot.user_id().unwrap_or("anonymous"),
            "admin action invoked by a non-admin client"
        );
    }
    snapshot
}

/// Write `batch` and log what the store did with it.
pub(crate) async fn commit(
    client: &PartyClient,
    action: &'static str,
    batch: Batch,
) -> Result<BatchOutcome, ServiceError> {
    let token = batch.token().map(ToString::to_string);
    let outcome = client.store().write_batch(batch).await?;
    match outcome {
        BatchOutcome::Applied { version } => debug!(action, version, "action applied"),
        BatchOutcome::Duplicate => {
            info!(action, token = token.as_deref().unwrap_or_default(), "action already applied; skipped")
        }
    }
    Ok(outcome)
}

/// Fresh marker written whenever a level starts over.
pub(crate) fn new_run_marker() -> String {
    Uuid::new_v4().simple().to_string()
}
