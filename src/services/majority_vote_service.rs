//! Level1: everyone picks the option they think most players will pick.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde_json::json;
use tracing::info;

use crate::{
    client::PartyClient,
    config::MajorityQuestion,
    error::ServiceError,
    services::{admin_snapshot, commit, score_ledger::ScoreDeltas},
    state::{
        game::{Level1State, PlayerId},
        paths::{self, LEVEL1},
        state_machine::{GamePhase, Level1Event, Level1Status, StatusMachine},
    },
    store::{ActionToken, Batch, BatchOutcome},
};

/// Vote counts for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Votes per option index; options nobody picked are absent.
    pub counts: BTreeMap<usize, usize>,
    /// Every option at the maximum count. Empty when nobody voted.
    pub winners: BTreeSet<usize>,
}

impl Tally {
    pub fn is_winner(&self, option: usize) -> bool {
        self.winners.contains(&option)
    }
}

/// Count the votes; all options tied at the top win.
pub fn tally(votes: &IndexMap<PlayerId, usize>) -> Tally {
    let mut counts = BTreeMap::new();
    for option in votes.values() {
        *counts.entry(*option).or_insert(0usize) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    let winners = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(option, _)| *option)
        .collect();
    Tally { counts, winners }
}

/// `intro -> voting`.
pub async fn start_level(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level1.start").await;
    let level = active_level(snapshot.view.phase, &snapshot.view.level1)?;
    let next = level.status.apply(Level1Event::Start)?;

    let batch = Batch::new()
        .set(paths::level_field(LEVEL1, "status")?, json!(next))
        .with_token(token(level, "start"));
    commit(client, "level1.start", batch).await
}

/// Record the local player's pick for the current question.
pub async fn vote(client: &PartyClient, option: usize) -> Result<BatchOutcome, ServiceError> {
    let snapshot = client.snapshot().await;
    let me = snapshot.require_user()?;
    let level = active_level(snapshot.view.phase, &snapshot.view.level1)?;
    if level.status != Level1Status::Voting {
        return Err(ServiceError::InvalidState("level1 is not accepting votes".into()));
    }
    let question = current_question(client, level)?;
    if option >= question.options.len() {
        return Err(ServiceError::InvalidInput(format!(
            "option {option} does not exist (question has {})",
            question.options.len()
        )));
    }

    let batch = Batch::new().set(paths::vote(LEVEL1, &me.id)?, json!(option));
    commit(client, "level1.vote", batch).await
}

/// `voting -> revealed`, crediting every voter who picked a winning option.
pub async fn reveal(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level1.reveal").await;
    let view = &snapshot.view;
    let level = active_level(view.phase, &view.level1)?;
    let next = level.status.apply(Level1Event::Reveal)?;

    let tally = tally(&level.votes);
    let points = client.config().level1.points_per_win;
    let mut deltas = ScoreDeltas::new();
    for (voter, option) in &level.votes {
        if tally.is_winner(*option) && view.roster.contains(voter) {
            deltas.credit(voter, points);
        }
    }

    let batch = Batch::new().set(paths::level_field(LEVEL1, "status")?, json!(next));
    let batch = deltas
        .apply_to(batch)?
        .with_token(token(level, format!("q{}-reveal", level.current_question_index)));
    let outcome = commit(client, "level1.reveal", batch).await?;
    if outcome.is_applied() {
        info!(
            question = level.current_question_index,
            winners = ?tally.winners,
            scored = deltas.iter().count(),
            "level1 votes revealed"
        );
    }
    Ok(outcome)
}

/// From `revealed`: next question with a clean ballot, or `level_complete` after the last.
pub async fn next_question(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level1.next").await;
    let level = active_level(snapshot.view.phase, &snapshot.view.level1)?;
    let index = level.current_question_index;
    let has_more = index + 1 < client.config().level1.questions.len();
    let next = level.status.apply(Level1Event::NextQuestion { has_more })?;

    let mut batch = Batch::new().set(paths::level_field(LEVEL1, "status")?, json!(next));
    if has_more {
        batch = batch
            .set(
                paths::level_field(LEVEL1, "currentQuestionIndex")?,
                json!(index + 1),
            )
            .delete(paths::level_field(LEVEL1, "votes")?);
    }
    commit(
        client,
        "level1.next",
        batch.with_token(token(level, format!("q{index}-next"))),
    )
    .await
}

/// The question currently on screen.
pub fn current_question<'a>(
    client: &'a PartyClient,
    level: &Level1State,
) -> Result<&'a MajorityQuestion, ServiceError> {
    client
        .config()
        .question(level.current_question_index)
        .ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "no level1 question at index {}",
                level.current_question_index
            ))
        })
}

fn active_level(phase: GamePhase, level: &Level1State) -> Result<&Level1State, ServiceError> {
    if phase == GamePhase::Level1 {
        Ok(level)
    } else {
        Err(ServiceError::InvalidState(format!(
            "level1 is not active (phase is {})",
            phase.as_str()
        )))
    }
}

fn token(level: &Level1State, step: impl std::fmt::Display) -> ActionToken {
    ActionToken::new(LEVEL1, level.run.as_deref(), step)
}
