use serde_json::json;
use tracing::{info, warn};

use crate::{
    client::{LocalView, PartyClient},
    error::ServiceError,
    services::{admin_snapshot, commit, gift_rating_service, new_run_marker},
    state::{
        paths::{self, GAME_STATE, RESETTABLE_ROOTS},
        state_machine::{GamePhase, Level1Status, Level2Status, Level3Status},
    },
    store::{ActionToken, Batch, BatchOutcome, StoreResult},
};

/// Shown to the admin before a full reset is applied.
pub const RESET_WARNING: &str =
    "Resetting removes every player and score and returns everyone to the lobby.";

/// How much of a level subtree is wiped when the level is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelReset {
    /// Clean sub-state: progress, votes and round data are cleared.
    Full,
    /// Only status, index and run are reset.
    Status,
}

/// Move the session to `target`, which must directly follow the current phase.
///
/// Entering a level writes its clean sub-state in the same batch. Leaving a level is
/// only allowed once it is complete, and leaving the gift round once everyone rated.
pub async fn advance_to(
    client: &PartyClient,
    target: GamePhase,
) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "advance_to").await;
    let view = &snapshot.view;
    let from = view.phase;
    from.advance(target)?;
    ensure_finished(view, from)?;

    let mut batch = Batch::new().set(paths::root(GAME_STATE)?, json!(target));
    batch = reset_level(batch, target, LevelReset::Full)?;
    if let Some(level) = paths::level_root(from) {
        batch = batch.with_token(ActionToken::new(
            level,
            level_run(view, from),
            format!("advance-{}", target.as_str()),
        ));
    }

    let outcome = commit(client, "advance_to", batch).await?;
    if outcome.is_applied() {
        info!(from = from.as_str(), to = target.as_str(), "phase advanced");
    }
    Ok(outcome)
}

/// `lobby -> gift_rating`.
pub async fn start_game(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    advance_to(client, GamePhase::GiftRating).await
}

/// `gift_rating -> level1`, once every player submitted their ratings.
pub async fn start_level1(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    advance_to(client, GamePhase::Level1).await
}

/// Developer override: switch to any phase, resetting the target level's status.
pub async fn jump_to(
    client: &PartyClient,
    target: GamePhase,
) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "jump_to").await;
    warn!(
        from = snapshot.view.phase.as_str(),
        to = target.as_str(),
        "forcing phase change"
    );
    let batch = Batch::new().set(paths::root(GAME_STATE)?, json!(target));
    let batch = reset_level(batch, target, LevelReset::Status)?;
    commit(client, "jump_to", batch).await
}

/// Wipe the whole session after `confirm` accepted [`RESET_WARNING`], then log out locally.
pub async fn reset_all<F>(client: &PartyClient, confirm: F) -> Result<BatchOutcome, ServiceError>
where
    F: FnOnce(&str) -> bool,
{
    let snapshot = admin_snapshot(client, "reset_all").await;
    if !confirm(RESET_WARNING) {
        info!("full reset declined");
        return Err(ServiceError::ConfirmationRequired(RESET_WARNING.into()));
    }

    let mut batch = Batch::new();
    for root in RESETTABLE_ROOTS {
        batch = batch.delete(paths::root(root)?);
    }
    batch = batch.set(paths::root(GAME_STATE)?, json!(GamePhase::Lobby));

    let outcome = commit(client, "reset_all", batch).await?;
    warn!(
        player_id = snapshot.user_id().unwrap_or("anonymous"),
        players = snapshot.view.roster.len(),
        "session reset"
    );
    client.sign_out().await?;
    Ok(outcome)
}

/// Refuse to leave `phase` while its gate is still open.
fn ensure_finished(view: &LocalView, phase: GamePhase) -> Result<(), ServiceError> {
    let finished = match phase {
        GamePhase::Lobby => true,
        GamePhase::GiftRating => gift_rating_service::all_finished(view),
        GamePhase::Level1 => view.level1.status == Level1Status::LevelComplete,
        GamePhase::Level2 => view.level2.status == Level2Status::LevelComplete,
        GamePhase::Level3 => view.level3.status == Level3Status::GameComplete,
        GamePhase::Result => false,
    };
    if finished {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "{} is not finished yet",
            phase.as_str()
        )))
    }
}

fn level_run(view: &LocalView, phase: GamePhase) -> Option<&str> {
    match phase {
        GamePhase::Level1 => view.level1.run.as_deref(),
        GamePhase::Level2 => view.level2.run.as_deref(),
        GamePhase::Level3 => view.level3.run.as_deref(),
        _ => None,
    }
}

/// Append the writes that put `phase`'s subtree back to its intro sub-state.
fn reset_level(mut batch: Batch, phase: GamePhase, reset: LevelReset) -> StoreResult<Batch> {
    let Some(level) = paths::level_root(phase) else {
        return Ok(batch);
    };
    let (index_field, cleared): (&str, &[&str]) = match phase {
        GamePhase::Level1 => ("currentQuestionIndex", &["votes"]),
        GamePhase::Level2 => (
            "currentQuestionIndex",
            &["votes", "reopened", "questions", "questionsVersion"],
        ),
        _ => (
            "round",
            &["target", "range", "turnOrder", "turn", "history", "boom"],
        ),
    };

    batch = batch
        .set(paths::level_field(level, "status")?, json!("intro"))
        .set(paths::level_field(level, index_field)?, json!(0))
        .set(paths::level_field(level, "run")?, json!(new_run_marker()));
    if reset == LevelReset::Full {
        for field in cleared {
            batch = batch.delete(paths::level_field(level, field)?);
        }
    }
    Ok(batch)
}
