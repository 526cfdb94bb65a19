//! Level2: a secret is shown and everyone guesses whose it is.

use std::collections::BTreeMap;

use rand::{Rng, seq::SliceRandom};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    client::{LocalView, PartyClient},
    error::ServiceError,
    services::{admin_snapshot, commit, score_ledger::ScoreDeltas},
    state::{
        game::{Level2State, PlayerId, Roster, SecretQuestion},
        paths::{self, LEVEL2},
        state_machine::{GamePhase, Level2Event, Level2Status, StatusMachine},
    },
    store::{ActionToken, Batch, BatchOutcome},
};

/// Build the question list: every first secret shuffled, then every second secret shuffled.
pub fn generate_questions<R: Rng + ?Sized>(roster: &Roster, rng: &mut R) -> Vec<SecretQuestion> {
    let players = roster.by_join_order();
    let mut questions = Vec::new();
    for index in 0..2 {
        let mut round: Vec<SecretQuestion> = players
            .iter()
            .filter_map(|player| {
                player.secret(index).map(|text| SecretQuestion {
                    text: text.to_string(),
                    owner_id: player.id.clone(),
                    owner_name: player.name.clone(),
                })
            })
            .collect();
        round.shuffle(rng);
        questions.extend(round);
    }
    questions
}

/// Generate and store the questions unless this level run already has them.
///
/// Returns `None` when there is nothing to do. Concurrent callers race on a token scoped
/// to the level run, so only one list is ever written per run.
pub async fn ensure_questions(
    client: &PartyClient,
) -> Result<Option<BatchOutcome>, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.ensure_questions").await;
    let view = &snapshot.view;
    if view.phase != GamePhase::Level2
        || view.level2.status != Level2Status::Intro
        || !view.level2.questions.is_empty()
    {
        return Ok(None);
    }

    let questions = {
        let mut rng = rand::rng();
        generate_questions(&view.roster, &mut rng)
    };
    if questions.is_empty() {
        return Err(ServiceError::InvalidState(
            "no player has a secret to attribute".into(),
        ));
    }

    // The phase echo can arrive before the level subtree, so read the run marker fresh.
    let run = client
        .store()
        .read(paths::level_field(LEVEL2, "run")?)
        .await?;
    let batch = Batch::new()
        .set(paths::level_field(LEVEL2, "questions")?, json!(questions))
        .set(paths::level_field(LEVEL2, "questionsVersion")?, run.clone())
        .with_token(ActionToken::new(LEVEL2, run.as_str(), "questions"));
    let outcome = commit(client, "level2.ensure_questions", batch).await?;
    if outcome.is_applied() {
        info!(count = questions.len(), "level2 questions generated");
    }
    Ok(Some(outcome))
}

/// `intro -> voting`, once the questions exist.
pub async fn start_level(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.start").await;
    let level = active_level(&snapshot.view)?;
    if level.questions.is_empty() {
        return Err(ServiceError::InvalidState(
            "level2 questions are not ready yet".into(),
        ));
    }
    let next = level.status.apply(Level2Event::Start)?;

    let batch = Batch::new()
        .set(paths::level_field(LEVEL2, "status")?, json!(next))
        .with_token(token(level, "start"));
    commit(client, "level2.start", batch).await
}

/// Record who the local player thinks owns the current secret.
pub async fn vote(client: &PartyClient, target: &str) -> Result<BatchOutcome, ServiceError> {
    let snapshot = client.snapshot().await;
    let me = snapshot.require_user()?;
    let level = active_level(&snapshot.view)?;
    if level.status != Level2Status::Voting {
        return Err(ServiceError::InvalidState("level2 is not accepting votes".into()));
    }
    if !snapshot.view.roster.contains(target) {
        return Err(ServiceError::InvalidInput(format!(
            "player {target} is not in the roster"
        )));
    }

    let batch = Batch::new().set(paths::vote(LEVEL2, &me.id)?, json!(target));
    commit(client, "level2.vote", batch).await
}

/// How many guesses one player received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteShare {
    pub player_id: PlayerId,
    pub name: String,
    pub votes: usize,
}

/// Guesses per suspected owner, most suspected first.
pub fn vote_distribution(view: &LocalView) -> Vec<VoteShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for target in view.level2.votes.values() {
        *counts.entry(target.as_str()).or_default() += 1;
    }
    let mut shares: Vec<VoteShare> = counts
        .into_iter()
        .map(|(id, votes)| VoteShare {
            player_id: id.to_string(),
            name: view
                .roster
                .get(id)
                .map_or_else(|| id.to_string(), |player| player.name.clone()),
            votes,
        })
        .collect();
    shares.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.name.cmp(&b.name)));
    shares
}

/// `voting -> votes_revealed`: guesses become visible, the owner stays hidden.
pub async fn show_votes(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.show_votes").await;
    let level = active_level(&snapshot.view)?;
    let next = level.status.apply(Level2Event::ShowVotes)?;

    let batch = Batch::new()
        .set(paths::level_field(LEVEL2, "status")?, json!(next))
        .with_token(token(
            level,
            format!("q{}-show-{}", level.current_question_index, level.reopened),
        ));
    commit(client, "level2.show_votes", batch).await
}

/// `votes_revealed -> voting` when nobody guessed, giving the secret another ballot.
pub async fn reopen_voting(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.reopen_voting").await;
    let level = active_level(&snapshot.view)?;
    if level.status == Level2Status::VotesRevealed && !level.votes.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "{} guesses were cast; reveal the truth instead",
            level.votes.len()
        )));
    }
    let next = level.status.apply(Level2Event::ReopenVoting {
        ballot_empty: level.votes.is_empty(),
    })?;

    let index = level.current_question_index;
    let batch = Batch::new()
        .set(paths::level_field(LEVEL2, "status")?, json!(next))
        .increment(paths::level_field(LEVEL2, "reopened")?, 1)
        .with_token(token(level, format!("q{index}-reopen-{}", level.reopened)));
    commit(client, "level2.reopen_voting", batch).await
}

/// Points for the current question: every correct guesser except the owner.
pub fn truth_deltas(level: &Level2State, roster: &Roster, points: i64) -> ScoreDeltas {
    let mut deltas = ScoreDeltas::new();
    let Some(question) = level.current_question() else {
        return deltas;
    };
    for (voter, guess) in &level.votes {
        if *guess == question.owner_id && *voter != question.owner_id && roster.contains(voter) {
            deltas.credit(voter, points);
        }
    }
    deltas
}

/// `votes_revealed -> truth_revealed`, crediting the correct guessers.
pub async fn reveal_truth(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.reveal_truth").await;
    let view = &snapshot.view;
    let level = active_level(view)?;
    let next = level.status.apply(Level2Event::RevealTruth)?;
    let question = level.current_question().ok_or_else(|| {
        ServiceError::InvalidState(format!(
            "no level2 question at index {}",
            level.current_question_index
        ))
    })?;

    let deltas = truth_deltas(level, &view.roster, client.config().level2.points_per_win);
    let batch = Batch::new().set(paths::level_field(LEVEL2, "status")?, json!(next));
    let batch = deltas.apply_to(batch)?.with_token(token(
        level,
        format!("q{}-truth", level.current_question_index),
    ));
    let outcome = commit(client, "level2.reveal_truth", batch).await?;
    if outcome.is_applied() {
        info!(
            question = level.current_question_index,
            owner = %question.owner_id,
            correct = deltas.iter().count(),
            "level2 truth revealed"
        );
    }
    Ok(outcome)
}

/// From `truth_revealed`: next secret with a clean ballot, or `level_complete`.
pub async fn next_question(client: &PartyClient) -> Result<BatchOutcome, ServiceError> {
    let snapshot = admin_snapshot(client, "level2.next").await;
    let level = active_level(&snapshot.view)?;
    let index = level.current_question_index;
    let has_more = index + 1 < level.questions.len();
    let next = level.status.apply(Level2Event::NextQuestion { has_more })?;

    let mut batch = Batch::new().set(paths::level_field(LEVEL2, "status")?, json!(next));
    if has_more {
        batch = batch
            .set(
                paths::level_field(LEVEL2, "currentQuestionIndex")?,
                json!(index + 1),
            )
            .delete(paths::level_field(LEVEL2, "votes")?)
            .delete(paths::level_field(LEVEL2, "reopened")?);
    }
    commit(
        client,
        "level2.next",
        batch.with_token(token(level, format!("q{index}-next"))),
    )
    .await
}

fn active_level(view: &LocalView) -> Result<&Level2State, ServiceError> {
    if view.phase == GamePhase::Level2 {
        Ok(&view.level2)
    } else {
        Err(ServiceError::InvalidState(format!(
            "level2 is not active (phase is {})",
            view.phase.as_str()
        )))
    }
}

fn token(level: &Level2State, step: impl std::fmt::Display) -> ActionToken {
    ActionToken::new(LEVEL2, level.run.as_deref(), step)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        services::phase_service,
        state::game::Player,
        store::MemoryStore,
        test_support::{self, catch_up, read, settle, user_id},
    };

    fn player(id: &str, joined_at: u64, secrets: &[&str]) -> Player {
        Player {
            id: id.into(),
            name: id.to_uppercase(),
            secrets: secrets.iter().map(|secret| secret.to_string()).collect(),
            score: 0,
            joined_at,
            gift_suitability: BTreeMap::new(),
        }
    }

    #[test]
    fn first_secrets_come_before_second_secrets() {
        let roster: Roster = [
            player("a", 1, &["a1", "a2"]),
            player("b", 2, &["b1", "b2"]),
            player("c", 3, &["c1", ""]),
        ]
        .into_iter()
        .collect();
        let mut rng = StdRng::seed_from_u64(7);

        let questions = generate_questions(&roster, &mut rng);

        assert_eq!(questions.len(), 5);
        let mut first: Vec<&str> = questions[..3].iter().map(|q| q.text.as_str()).collect();
        first.sort_unstable();
        assert_eq!(first, ["a1", "b1", "c1"]);
        let mut second: Vec<&str> = questions[3..].iter().map(|q| q.text.as_str()).collect();
        second.sort_unstable();
        assert_eq!(second, ["a2", "b2"]);
        let c1 = questions.iter().find(|q| q.text == "c1").unwrap();
        assert_eq!((c1.owner_id.as_str(), c1.owner_name.as_str()), ("c", "C"));
    }

    #[test]
    fn same_seed_same_order() {
        let roster: Roster = (0..8)
            .map(|i| player(&format!("p{i}"), i, &["x", "y"]))
            .collect();
        let a = generate_questions(&roster, &mut StdRng::seed_from_u64(42));
        let b = generate_questions(&roster, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn owner_never_scores_on_own_secret() {
        let roster: Roster = [
            player("a", 1, &["a1", "a2"]),
            player("b", 2, &["b1", "b2"]),
            player("c", 3, &["c1", "c2"]),
        ]
        .into_iter()
        .collect();
        let level = Level2State {
            questions: vec![SecretQuestion {
                text: "a1".into(),
                owner_id: "a".into(),
                owner_name: "A".into(),
            }],
            votes: [("a", "a"), ("b", "a"), ("c", "b")]
                .into_iter()
                .map(|(voter, guess)| (voter.to_string(), guess.to_string()))
                .collect(),
            ..Level2State::default()
        };

        let deltas = truth_deltas(&level, &roster, 20);

        assert_eq!(deltas.get("a"), 0);
        assert_eq!(deltas.get("b"), 20);
        assert_eq!(deltas.get("c"), 0);
    }

    async fn level2_party(names: &[&str]) -> (Arc<MemoryStore>, Vec<Arc<PartyClient>>) {
        let store = test_support::store();
        let mut clients = Vec::new();
        for name in names {
            clients.push(test_support::join(&store, name).await);
        }
        catch_up(&clients[0], &store).await;
        phase_service::jump_to(&clients[0], GamePhase::Level2)
            .await
            .unwrap();
        (store, clients)
    }

    #[tokio::test]
    async fn admin_generates_questions_on_entering_the_level() {
        let (store, clients) = level2_party(&["Ada", "Bob"]).await;

        let view = settle(&clients[1], |view, _| view.level2.questions.len() == 4)
            .await
            .view;
        assert!(view.level2.questions_version.is_some());
        assert_eq!(view.level2.questions_version, view.level2.run);
        assert_eq!(view.level2.status, Level2Status::Intro);

        // A later call finds the list in place and leaves it alone.
        catch_up(&clients[0], &store).await;
        let version = store.version().await;
        assert_eq!(ensure_questions(&clients[0]).await.unwrap(), None);
        assert_eq!(store.version().await, version);
    }

    #[tokio::test]
    async fn full_question_cycle_scores_correct_guessers() {
        let (store, clients) = level2_party(&["Ada", "Bob", "Cy"]).await;
        let ids = futures::future::join_all(clients.iter().map(|c| user_id(c))).await;
        let admin = &clients[0];
        settle(admin, |view, _| !view.level2.questions.is_empty()).await;

        start_level(admin).await.unwrap();
        for client in &clients {
            catch_up(client, &store).await;
        }
        let owner = admin.view().await.level2.questions[0].owner_id.clone();
        for client in &clients {
            vote(client, &owner).await.unwrap();
        }
        catch_up(admin, &store).await;

        let shares = vote_distribution(&admin.view().await);
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].votes, 3);

        let err = reveal_truth(admin).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        show_votes(admin).await.unwrap();
        catch_up(admin, &store).await;
        reveal_truth(admin).await.unwrap();

        for id in &ids {
            let expected = if *id == owner { 0 } else { 20 };
            assert_eq!(read(&store, &format!("players/{id}/score")).await, expected);
        }

        catch_up(admin, &store).await;
        next_question(admin).await.unwrap();
        let view = catch_up(admin, &store).await.view;
        assert_eq!(view.level2.current_question_index, 1);
        assert_eq!(view.level2.status, Level2Status::Voting);
        assert!(view.level2.votes.is_empty());
    }

    #[tokio::test]
    async fn empty_ballot_can_be_reopened_once_per_show() {
        let (store, clients) = level2_party(&["Ada", "Bob"]).await;
        let admin = &clients[0];
        settle(admin, |view, _| !view.level2.questions.is_empty()).await;
        start_level(admin).await.unwrap();
        catch_up(admin, &store).await;

        show_votes(admin).await.unwrap();
        catch_up(admin, &store).await;
        assert!(reopen_voting(admin).await.unwrap().is_applied());
        let view = catch_up(admin, &store).await.view;
        assert_eq!(view.level2.status, Level2Status::Voting);
        assert_eq!(view.level2.reopened, 1);

        // The second show of the same question is a new step.
        assert!(show_votes(admin).await.unwrap().is_applied());
        let view = catch_up(admin, &store).await.view;
        assert_eq!(view.level2.status, Level2Status::VotesRevealed);
    }

    #[tokio::test]
    async fn ballot_with_guesses_cannot_be_reopened() {
        let (store, clients) = level2_party(&["Ada", "Bob"]).await;
        let admin = &clients[0];
        settle(admin, |view, _| !view.level2.questions.is_empty()).await;
        start_level(admin).await.unwrap();
        for client in &clients {
            catch_up(client, &store).await;
        }
        let bob = user_id(&clients[1]).await;
        vote(admin, &bob).await.unwrap();
        catch_up(admin, &store).await;
        show_votes(admin).await.unwrap();
        catch_up(admin, &store).await;

        let err = reopen_voting(admin).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(read(&store, "level2/status").await, json!("votes_revealed"));
    }

    #[tokio::test]
    async fn votes_must_name_a_roster_member() {
        let (store, clients) = level2_party(&["Ada"]).await;
        let admin = &clients[0];
        settle(admin, |view, _| !view.level2.questions.is_empty()).await;
        start_level(admin).await.unwrap();
        catch_up(admin, &store).await;

        let err = vote(admin, "nobody").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
