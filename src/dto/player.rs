use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_not_blank, validate_secrets},
    state::{game::Player, state_machine::GamePhase},
};

/// Payload used to join the party.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(custom(function = "validate_not_blank"), length(max = 40))]
    pub name: String,
    /// Exactly two secrets, used by the secret attribution level.
    #[validate(length(equal = 2), custom(function = "validate_secrets"))]
    pub secrets: Vec<String>,
}

/// Public projection of a player record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub score: i64,
    pub joined_at: u64,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
            joined_at: player.joined_at,
        }
    }
}

/// Returned after joining; `player.id` goes into the `x-player-id` header from then on.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub player: PlayerSummary,
    pub is_admin: bool,
}

/// What the calling player currently sees of the session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub player: PlayerSummary,
    pub is_admin: bool,
    pub phase: GamePhase,
    pub players: Vec<PlayerSummary>,
    /// Store version the view reflects.
    pub version: u64,
}
