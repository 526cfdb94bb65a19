use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::GameConfig,
    dto::{
        player::{JoinRequest, JoinResponse, PlayerSummary, SessionView},
        results::{GiftInsightsResponse, LeaderboardEntry},
    },
    error::AppError,
    routes::session::PlayerSession,
    services::{results_service, roster_service},
    state::{
        SYNC_TIMEOUT, SharedState,
        game::Roster,
        paths::{self, PLAYERS},
    },
    store::SharedStore,
};

/// Routes for joining, leaving and the roster-wide standings.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(join))
        .route("/players/me", get(me).delete(leave))
        .route("/leaderboard", get(leaderboard))
        .route("/gift-insights", get(gift_insights))
        .route("/config", get(config))
}

/// Join the party as a new player.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Player joined", body = JoinResponse),
        (status = 400, description = "Blank name or secrets")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let client = state.open_client().await?;
    let player = roster_service::join(&client, &payload.name, payload.secrets).await?;

    let listed = client.wait_until(|view, _| view.roster.contains(&player.id));
    let snapshot = match timeout(SYNC_TIMEOUT, listed).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            warn!(player_id = %player.id, "join not yet visible in the roster");
            client.snapshot().await
        }
    };

    state.register_session(player.id.clone(), client);
    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            player: PlayerSummary::from(&player),
            is_admin: snapshot.is_admin(),
        }),
    ))
}

/// Describe the session as the calling player sees it.
#[utoipa::path(
    get,
    path = "/players/me",
    tag = "players",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 200, description = "Session view", body = SessionView),
        (status = 401, description = "Unknown or departed player")
    )
)]
pub async fn me(PlayerSession(client): PlayerSession) -> Result<Json<SessionView>, AppError> {
    let snapshot = client.snapshot().await;
    let player = snapshot.require_user()?;
    Ok(Json(SessionView {
        player: PlayerSummary::from(player),
        is_admin: snapshot.is_admin(),
        phase: snapshot.view.phase,
        players: snapshot
            .view
            .roster
            .by_join_order()
            .into_iter()
            .map(PlayerSummary::from)
            .collect(),
        version: snapshot.view.version,
    }))
}

/// Leave the party; the next earliest joiner becomes admin if needed.
#[utoipa::path(
    delete,
    path = "/players/me",
    tag = "players",
    params(("x-player-id" = String, Header, description = "Id returned at join time")),
    responses(
        (status = 204, description = "Player removed"),
        (status = 401, description = "Unknown or departed player")
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    PlayerSession(client): PlayerSession,
) -> Result<StatusCode, AppError> {
    let player_id = client.snapshot().await.require_user()?.id.clone();
    roster_service::leave(&client).await?;
    state.end_session(&player_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Current standings, best score first.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "results",
    responses((status = 200, description = "Standings", body = [LeaderboardEntry]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let roster = read_roster(&state).await?;
    Ok(Json(results_service::leaderboard(&roster)))
}

/// Gift round statistics and recommendations.
#[utoipa::path(
    get,
    path = "/gift-insights",
    tag = "results",
    responses((status = 200, description = "Gift insights", body = GiftInsightsResponse))
)]
pub async fn gift_insights(
    State(state): State<SharedState>,
) -> Result<Json<GiftInsightsResponse>, AppError> {
    let roster = read_roster(&state).await?;
    Ok(Json(results_service::gift_insights(&roster)))
}

/// Question content and scoring the server was started with.
#[utoipa::path(
    get,
    path = "/config",
    tag = "game",
    responses((status = 200, description = "Game configuration", body = GameConfig))
)]
pub async fn config(State(state): State<SharedState>) -> Json<GameConfig> {
    Json(state.config().clone())
}

async fn read_roster(state: &SharedState) -> Result<Roster, AppError> {
    let value = state.store().read(paths::root(PLAYERS)?).await?;
    Ok(Roster::from_value(&value))
}
