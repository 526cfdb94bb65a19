use axum::{
    Json, Router,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        game::ActionResponse,
        level::{GuessRequest, VoteOptionRequest, VoteTargetRequest},
    },
    error::AppError,
    routes::session::PlayerSession,
    services::{
        elimination_guess_service::{self, GuessOutcome},
        majority_vote_service,
        secret_attribution_service::{self, VoteShare},
    },
    state::SharedState,
};

/// Routes for the three minigames.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/level1/start", post(level1_start))
        .route("/level1/vote", post(level1_vote))
        .route("/level1/reveal", post(level1_reveal))
        .route("/level1/next", post(level1_next))
        .route("/level2/start", post(level2_start))
        .route("/level2/vote", post(level2_vote))
        .route("/level2/votes", get(level2_votes))
        .route("/level2/show-votes", post(level2_show_votes))
        .route("/level2/reopen", post(level2_reopen))
        .route("/level2/reveal", post(level2_reveal))
        .route("/level2/next", post(level2_next))
        .route("/level3/start-round", post(level3_start_round))
        .route("/level3/guess", post(level3_guess))
        .route("/level3/next-round", post(level3_next_round))
        .route("/level3/finish", post(level3_finish))
}

#[utoipa::path(
    post,
    path = "/level1/start",
    tag = "level1",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Voting opened", body = ActionResponse))
)]
/// Open voting on the first question.
pub async fn level1_start(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(majority_vote_service::start_level(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level1/vote",
    tag = "level1",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = VoteOptionRequest,
    responses(
        (status = 200, description = "Vote recorded", body = ActionResponse),
        (status = 400, description = "Unknown option"),
        (status = 409, description = "Voting is closed")
    )
)]
/// Vote for the option most players will pick.
pub async fn level1_vote(
    PlayerSession(client): PlayerSession,
    Json(payload): Json<VoteOptionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = majority_vote_service::vote(&client, payload.option).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/level1/reveal",
    tag = "level1",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Votes revealed and majority voters scored", body = ActionResponse))
)]
/// Reveal the votes and credit the majority.
pub async fn level1_reveal(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(majority_vote_service::reveal(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level1/next",
    tag = "level1",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Next question or level complete", body = ActionResponse))
)]
/// Move on to the next question.
pub async fn level1_next(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(majority_vote_service::next_question(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level2/start",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 200, description = "Voting opened", body = ActionResponse),
        (status = 409, description = "Questions not generated yet")
    )
)]
/// Open voting on the first secret.
pub async fn level2_start(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(secret_attribution_service::start_level(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level2/vote",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = VoteTargetRequest,
    responses(
        (status = 200, description = "Guess recorded", body = ActionResponse),
        (status = 400, description = "Target is not in the roster")
    )
)]
/// Guess who owns the secret on screen.
pub async fn level2_vote(
    PlayerSession(client): PlayerSession,
    Valid(Json(payload)): Valid<Json<VoteTargetRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = secret_attribution_service::vote(&client, &payload.target).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/level2/votes",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Guesses per suspected owner", body = [VoteShare]))
)]
/// Distribution of guesses for the current secret.
pub async fn level2_votes(PlayerSession(client): PlayerSession) -> Json<Vec<VoteShare>> {
    Json(secret_attribution_service::vote_distribution(&client.view().await))
}

#[utoipa::path(
    post,
    path = "/level2/show-votes",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Guesses shown, owner still hidden", body = ActionResponse))
)]
/// Show the guesses before the truth.
pub async fn level2_show_votes(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(secret_attribution_service::show_votes(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level2/reopen",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 200, description = "Voting reopened on the same secret", body = ActionResponse),
        (status = 409, description = "Guesses were cast or the guesses are not shown")
    )
)]
/// Reopen voting when nobody guessed.
pub async fn level2_reopen(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(secret_attribution_service::reopen_voting(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level2/reveal",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Owner revealed and correct guessers scored", body = ActionResponse))
)]
/// Reveal the owner of the secret.
pub async fn level2_reveal(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(secret_attribution_service::reveal_truth(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level2/next",
    tag = "level2",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Next secret or level complete", body = ActionResponse))
)]
/// Move on to the next secret.
pub async fn level2_next(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(secret_attribution_service::next_question(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level3/start-round",
    tag = "level3",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Round started", body = ActionResponse))
)]
/// Draw a target and start the round.
pub async fn level3_start_round(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(elimination_guess_service::start_round(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level3/guess",
    tag = "level3",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess outcome", body = GuessOutcome),
        (status = 400, description = "Guess outside the open range"),
        (status = 409, description = "Not the caller's turn")
    )
)]
/// Guess a number on the caller's turn.
pub async fn level3_guess(
    PlayerSession(client): PlayerSession,
    Valid(Json(payload)): Valid<Json<GuessRequest>>,
) -> Result<Json<GuessOutcome>, AppError> {
    let outcome = elimination_guess_service::guess(&client, payload.guess).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/level3/next-round",
    tag = "level3",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Next round or game complete", body = ActionResponse))
)]
/// Move on to the next round.
pub async fn level3_next_round(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(elimination_guess_service::next_round(&client).await?.into()))
}

#[utoipa::path(
    post,
    path = "/level3/finish",
    tag = "level3",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses((status = 200, description = "Results shown", body = ActionResponse))
)]
/// Leave the completed level for the results.
pub async fn level3_finish(
    PlayerSession(client): PlayerSession,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(elimination_guess_service::finish_game(&client).await?.into()))
}
