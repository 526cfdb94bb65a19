use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_ratings, state::state_machine::GamePhase, store::BatchOutcome,
};

/// Target phase for the admin's phase controls.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PhaseRequest {
    pub phase: GamePhase,
}

/// Full reset request; the reset only happens with `confirm: true`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// The caller's ratings of every other player's gift.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GiftRatingsRequest {
    /// Player id to a rating from 1 to 5.
    #[validate(custom(function = "validate_ratings"))]
    pub ratings: BTreeMap<String, u8>,
}

/// Result of a state-changing action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// False when the same action had already been applied by someone else.
    pub applied: bool,
    /// Store version produced by the write, when it was applied.
    pub version: Option<u64>,
}

impl From<BatchOutcome> for ActionResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            applied: outcome.is_applied(),
            version: outcome.version(),
        }
    }
}
