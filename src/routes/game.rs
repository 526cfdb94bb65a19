use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::game::{ActionResponse, GiftRatingsRequest, PhaseRequest, ResetRequest},
    error::AppError,
    routes::session::PlayerSession,
    services::{gift_rating_service, phase_service},
    state::SharedState,
};

/// Routes driving the global phase and the gift rating round.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/start", post(start_game))
        .route("/game/level1", post(start_level1))
        .route("/game/advance", post(advance))
        .route("/game/jump", post(jump))
        .route("/game/reset", post(reset))
        .route("/gift-ratings", post(submit_gift_ratings))
}

/// Leave the lobby for the gift rating round.
#[utoipa::path(
    post,
    path = "/game/start",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 200, description = "Gift rating round opened", body = ActionResponse),
        (status = 409, description = "Not in the lobby")
    )
)]
pub async fn start_game(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = phase_service::start_game(&client).await?;
    Ok(Json(outcome.into()))
}

/// Enter level1 once every player rated the gifts.
#[utoipa::path(
    post,
    path = "/game/level1",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 200, description = "Level1 entered", body = ActionResponse),
        (status = 409, description = "Gift round unfinished")
    )
)]
pub async fn start_level1(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = phase_service::start_level1(&client).await?;
    Ok(Json(outcome.into()))
}

/// Move to the phase directly following the current one.
#[utoipa::path(
    post,
    path = "/game/advance",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = PhaseRequest,
    responses(
        (status = 200, description = "Phase advanced", body = ActionResponse),
        (status = 409, description = "Not the next phase, or the current one is unfinished")
    )
)]
pub async fn advance(
    PlayerSession(client): PlayerSession,
    Json(payload): Json<PhaseRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = phase_service::advance_to(&client, payload.phase).await?;
    Ok(Json(outcome.into()))
}

/// Developer override: switch to any phase.
#[utoipa::path(
    post,
    path = "/game/jump",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = PhaseRequest,
    responses((status = 200, description = "Phase forced", body = ActionResponse))
)]
pub async fn jump(
    PlayerSession(client): PlayerSession,
    Json(payload): Json<PhaseRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = phase_service::jump_to(&client, payload.phase).await?;
    Ok(Json(outcome.into()))
}

/// Wipe every player, score and level, returning everyone to the lobby.
#[utoipa::path(
    post,
    path = "/game/reset",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Session reset", body = ActionResponse),
        (status = 428, description = "Reset not confirmed; the body carries the warning")
    )
)]
pub async fn reset(
    State(state): State<SharedState>,
    PlayerSession(client): PlayerSession,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let player_id = client.snapshot().await.user_id().map(str::to_string);
    let outcome = phase_service::reset_all(&client, |_| payload.confirm).await?;
    if let Some(player_id) = player_id {
        state.end_session(&player_id);
    }
    Ok(Json(outcome.into()))
}

/// Submit the caller's rating of every other player's gift.
#[utoipa::path(
    post,
    path = "/gift-ratings",
    tag = "game",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = GiftRatingsRequest,
    responses(
        (status = 200, description = "Ratings stored", body = ActionResponse),
        (status = 400, description = "Ratings missing, out of range or naming unknown players"),
        (status = 409, description = "Not in the gift rating round")
    )
)]
pub async fn submit_gift_ratings(
    PlayerSession(client): PlayerSession,
    Valid(Json(payload)): Valid<Json<GiftRatingsRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = gift_rating_service::submit_ratings(&client, payload.ratings).await?;
    Ok(Json(outcome.into()))
}
