use serde::Serialize;
use utoipa::ToSchema;

/// One line of the final standings.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Competition rank: tied scores share a rank and the next rank is skipped.
    pub rank: usize,
    pub player_id: String,
    pub name: String,
    pub score: i64,
}

/// Average gift ratings given and received by one player.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GiftStats {
    pub player_id: String,
    pub name: String,
    /// How well this player's gift suits the others, on average (0 when nothing was rated).
    pub avg_given: f64,
    /// How well the others' gifts suit this player, on average (0 when nothing was rated).
    pub avg_received: f64,
}

/// A player singled out by one of the gift highlights.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GiftHighlight {
    pub player_id: String,
    pub name: String,
    pub average: f64,
}

/// How well one giver's gift suits a given receiver.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GiftRecommendation {
    pub giver_id: String,
    pub giver_name: String,
    /// Rating from 1 to 5, or 0 when the giver never rated this receiver.
    pub score: u8,
}

/// Best matching gifts for one receiver, best first.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReceiverRecommendations {
    pub receiver_id: String,
    pub receiver_name: String,
    pub gifts: Vec<GiftRecommendation>,
}

/// Everything the results screen shows about the gift round.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GiftInsightsResponse {
    pub players: Vec<GiftStats>,
    pub most_versatile: Option<GiftHighlight>,
    pub most_niche: Option<GiftHighlight>,
    pub easiest_to_gift: Option<GiftHighlight>,
    pub hardest_to_gift: Option<GiftHighlight>,
    pub recommendations: Vec<ReceiverRecommendations>,
}
