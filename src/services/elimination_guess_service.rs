//! Level3: players take turns guessing numbers while avoiding a hidden target.

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    client::{LocalView, PartyClient},
    config::RoundConfig,
    error::ServiceError,
    services::{admin_snapshot, commit, phase_service, score_ledger::ScoreDeltas},
    state::{
        game::{GuessRange, GuessRecord, Level3State, PlayerId, Roster},
        paths::{self, LEVEL3},
        state_machine::{GamePhase, Level3Event, Level3Status, StatusMachine},
    },
    store::{ActionToken, Batch, BatchOutcome},
};

/// Result of a guess as seen by the guesser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GuessOutcome {
    /// The guess hit the target and ended the round.
    Hit,
    /// Safe guess; the range shrank to `range`.
    Miss { range: GuessRange },
}

/// Pick the hidden target strictly inside `(1, range)`.
pub fn pick_target<R: Rng + ?Sized>(range: u32, rng: &mut R) -> u32 {
    rng.random_range(2..range.max(3))
}

/// Shrink `range` around a missed `guess`.
pub fn narrow(range: GuessRange, guess: u32, target: u32) -> GuessRange {
    if guess > target {
        GuessRange { max: guess, ..range }
    } else {
        GuessRange { min: guess, ..range }
    }
}

/// Player after `current` in `order`, wrapping around; the first one if `current` is unknown.
pub fn next_turn<'a>(order: &'a [PlayerId], current: &str) -> Option<&'a PlayerId> {
    let next = order
        .iter()
        .position(|id| id == current)
        .map_or(0, |index| (index + 1) % order.len());
    order.get(next)
}

/// Score changes of a detonation: penalty for the guesser, reward for everyone else.
pub fn boom_deltas(roster: &Roster, guesser: &str, round: &RoundConfig) -> ScoreDeltas {
    let mut deltas = ScoreDeltas::new();
    for id in roster.ids() {
        if id == guesser {
            deltas.credit(id, round.penalty);
        } else {
            deltas.credit(id, round.reward);
        }
    }
    deltas
}

/// `intro -> playing`: draw a target and fix the turn order from the current scores.
pub async fn start_round(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level3.start_round").await;
    let view = &snapshot.view;
    let level = active_level(view)?;
    let next = level.status.apply(Level3Event::StartRound)?;
    let round = round_config(client, level.round)?;

    let turn_order = view.roster.ids_by_ascending_score();
    let Some(first) = turn_order.first().cloned() else {
        return Err(ServiceError::InvalidState(
            "cannot start a round without players".into(),
        ));
    };
    let target = {
        let mut rng = rand::rng();
        pick_target(round.range, &mut rng)
    };

    let batch = Batch::new()
        .set(paths::level_field(LEVEL3, "status")?, json!(next))
        .set(paths::level_field(LEVEL3, "target")?, json!(target))
        .set(
            paths::level_field(LEVEL3, "range")?,
            json!(GuessRange {
                min: 1,
                max: round.range
            }),
        )
        .set(paths::level_field(LEVEL3, "turnOrder")?, json!(turn_order))
        .set(paths::level_field(LEVEL3, "turn")?, json!(first))
        .delete(paths::level_field(LEVEL3, "history")?)
        .delete(paths::level_field(LEVEL3, "boom")?)
        .with_token(token(level, format!("r{}-start", level.round)));
    let outcome = commit(client, "level3.start_round", batch).await?;
    if outcome.is_applied() {
        info!(round = level.round, range = round.range, players = turn_order.len(), "level3 round started");
    }
    Ok(outcome)
}

/// Guess `n` on the local player's turn.
///
/// Two guesses at the same turn position race on one token; the loser gets
/// [`ServiceError::InvalidState`] and nothing is written.
pub async fn guess(client: &PartyClient, n: u32) -> Result<GuessOutcome, ServiceError> {
    let snapshot = client.snapshot().await;
    let me = snapshot.require_user()?;
    let view = &snapshot.view;
    let level = active_level(view)?;
    if level.status != Level3Status::Playing {
        return Err(ServiceError::InvalidState("no level3 round is being played".into()));
    }
    if level.turn.as_deref() != Some(me.id.as_str()) {
        return Err(ServiceError::InvalidState(format!("it is not {}'s turn", me.name)));
    }
    let (Some(range), Some(target)) = (level.range, level.target) else {
        return Err(ServiceError::InvalidState("level3 round has no target".into()));
    };
    if !range.admits(n) {
        return Err(ServiceError::InvalidInput(format!(
            "guess must lie strictly between {} and {}",
            range.min, range.max
        )));
    }

    let step = token(level, format!("r{}-g{}", level.round, level.history.len()));
    let (batch, result) = if n == target {
        let next = level.status.apply(Level3Event::Detonate)?;
        let round = round_config(client, level.round)?;
        let batch = Batch::new()
            .set(paths::level_field(LEVEL3, "status")?, json!(next))
            .set(paths::level_field(LEVEL3, "boom")?, json!(me.id));
        let batch = boom_deltas(&view.roster, &me.id, round).apply_to(batch)?;
        (batch, GuessOutcome::Hit)
    } else {
        let narrowed = narrow(range, n, target);
        let mut history = level.history.clone();
        history.push(GuessRecord {
            name: me.name.clone(),
            guess: n,
        });
        let mut batch = Batch::new()
            .set(paths::level_field(LEVEL3, "range")?, json!(narrowed))
            .set(paths::level_field(LEVEL3, "history")?, json!(history));
        if let Some(next) = next_turn(&level.turn_order, &me.id) {
            batch = batch.set(paths::level_field(LEVEL3, "turn")?, json!(next));
        }
        (batch, GuessOutcome::Miss { range: narrowed })
    };

    match commit(client, "level3.guess", batch.with_token(step)).await? {
        BatchOutcome::Applied { .. } => {
            info!(player_id = %me.id, guess = n, hit = result == GuessOutcome::Hit, "level3 guess");
            Ok(result)
        }
        BatchOutcome::Duplicate => Err(ServiceError::InvalidState(
            "this turn was already played".into(),
        )),
    }
}

/// From `boom` or `round_complete`: the next round's intro, or `game_complete`.
pub async fn next_round(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level3.next_round").await;
    let level = active_level(&snapshot.view)?;
    let has_more = level.round + 1 < client.config().level3.rounds.len();
    let next = level.status.apply(Level3Event::NextRound { has_more })?;

    let mut batch = Batch::new().set(paths::level_field(LEVEL3, "status")?, json!(next));
    if has_more {
        batch = batch.set(paths::level_field(LEVEL3, "round")?, json!(level.round + 1));
    }
    commit(
        client,
        "level3.next_round",
        batch.with_token(token(level, format!("r{}-next", level.round))),
    )
    .await
}

/// Leave the completed level for the results screen.
pub async fn finish_game(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    phase_service::advance_to(client, GamePhase::Result).await
}

fn round_config(client: &PartyClient, round: usize) -> Result<&RoundConfig, ServiceError> {
    let config = client.config();
    if let Some(found) = config.round(round) {
        return Ok(found);
    }
    warn!(round, configured = config.level3.rounds.len(), "no config for level3 round; using the first");
    config
        .round(0)
        .ok_or_else(|| ServiceError::InvalidState("no level3 rounds are configured".into()))
}

fn active_level(view: &LocalView) -> Result<&Level3State, ServiceError> {
    if view.phase == GamePhase::Level3 {
        Ok(&view.level3)
    } else {
        Err(ServiceError::InvalidState(format!(
            "level3 is not active (phase is {})",
            view.phase.as_str()
        )))
    }
}

fn token(level: &Level3State, step: impl std::fmt::Display) -> ActionToken {
    ActionToken::new(LEVEL3, level.run.as_deref(), step)
}
