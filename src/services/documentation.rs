use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Party Sync Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::store::read_value,
        crate::routes::store::watch_value,
        crate::routes::players::join,
        crate::routes::players::me,
        crate::routes::players::leave,
        crate::routes::players::leaderboard,
        crate::routes::players::gift_insights,
        crate::routes::players::config,
        crate::routes::game::start_game,
        crate::routes::game::start_level1,
        crate::routes::game::advance,
        crate::routes::game::jump,
        crate::routes::game::reset,
        crate::routes::game::submit_gift_ratings,
        crate::routes::levels::level1_start,
        crate::routes::levels::level1_vote,
        crate::routes::levels::level1_reveal,
        crate::routes::levels::level1_next,
        crate::routes::levels::level2_start,
        crate::routes::levels::level2_vote,
        crate::routes::levels::level2_votes,
        crate::routes::levels::level2_show_votes,
        crate::routes::levels::level2_reopen,
        crate::routes::levels::level2_reveal,
        crate::routes::levels::level2_next,
        crate::routes::levels::level3_start_round,
        crate::routes::levels::level3_guess,
        crate::routes::levels::level3_next_round,
        crate::routes::levels::level3_finish,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::StoreValueEvent,
            crate::dto::player::JoinRequest,
            crate::dto::player::JoinResponse,
            crate::dto::player::PlayerSummary,
            crate::dto::player::SessionView,
            crate::dto::game::PhaseRequest,
            crate::dto::game::ResetRequest,
            crate::dto::game::GiftRatingsRequest,
            crate::dto::game::ActionResponse,
            crate::dto::level::VoteOptionRequest,
            crate::dto::level::VoteTargetRequest,
            crate::dto::level::GuessRequest,
            crate::dto::results::LeaderboardEntry,
            crate::dto::results::GiftInsightsResponse,
            crate::services::secret_attribution_service::VoteShare,
            crate::services::elimination_guess_service::GuessOutcome,
            crate::state::state_machine::GamePhase,
            crate::config::GameConfig,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "store", description = "Raw reads of the shared session tree"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "Joining, leaving and session views"),
        (name = "game", description = "Global phase controls and the gift rating round"),
        (name = "level1", description = "Majority vote"),
        (name = "level2", description = "Secret attribution"),
        (name = "level3", description = "Elimination guess"),
        (name = "results", description = "Standings and gift insights"),
    )
)]
pub struct ApiDoc;
