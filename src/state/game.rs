//! Domain records mirrored from the shared store.
//!
//! Every struct here deserialises leniently from whatever the store currently holds:
//! absent fields fall back to their defaults so a freshly reset subtree reads as the
//! starting sub-state of its level.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use crate::state::state_machine::{GamePhase, Level1Status, Level2Status, Level3Status};

/// Opaque identifier minted at join time.
pub type PlayerId = String;

/// Player record stored under `players/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub score: i64,
    /// Store-assigned join timestamp; drives admin election.
    #[serde(rename = "joinedAt", default)]
    pub joined_at: u64,
    /// Ratings (1..=5) of how well this player's gift suits each other player.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gift_suitability: BTreeMap<PlayerId, u8>,
}

impl Player {
    /// The `index`-th secret, if it was provided and is not blank.
    pub fn secret(&self, index: usize) -> Option<&str> {
        self.secrets
            .get(index)
            .map(String::as_str)
            .filter(|secret| !secret.trim().is_empty())
    }
}

/// All players currently present, keyed by id in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    players: IndexMap<PlayerId, Player>,
}

impl Roster {
    /// Build a roster from the raw `players` subtree, skipping malformed entries.
    pub fn from_value(value: &Value) -> Self {
        let mut players = IndexMap::new();
        if let Value::Object(entries) = value {
            for (id, raw) in entries {
                match serde_json::from_value::<Player>(raw.clone()) {
                    Ok(player) if player.id == *id => {
                        players.insert(id.clone(), player);
                    }
                    Ok(player) => {
                        debug!(key = %id, record_id = %player.id, "ignoring player stored under a foreign key");
                    }
                    Err(err) => {
                        debug!(key = %id, error = %err, "ignoring malformed player record");
                    }
                }
            }
        }
        Self { players }
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.keys()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Players ordered by join time (earliest first), ties broken by id.
    pub fn by_join_order(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        players
    }

    /// The admin is whoever joined first among the players still present.
    pub fn elect_admin(&self) -> Option<&Player> {
        self.players
            .values()
            .min_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)))
    }

    pub fn is_admin(&self, id: &str) -> bool {
        self.elect_admin().is_some_and(|admin| admin.id == id)
    }

    /// Ids ordered by ascending score; equal scores keep join order.
    pub fn ids_by_ascending_score(&self) -> Vec<PlayerId> {
        let mut players = self.by_join_order();
        players.sort_by_key(|player| player.score);
        players.into_iter().map(|player| player.id.clone()).collect()
    }
}

impl FromIterator<Player> for Roster {
    fn from_iter<T: IntoIterator<Item = Player>>(iter: T) -> Self {
        Self {
            players: iter
                .into_iter()
                .map(|player| (player.id.clone(), player))
                .collect(),
        }
    }
}

/// Sub-state of the majority vote level (`level1`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Level1State {
    pub current_question_index: usize,
    pub status: Level1Status,
    pub votes: IndexMap<PlayerId, usize>,
    pub run: Option<String>,
}

/// One secret to attribute, with its true owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretQuestion {
    pub text: String,
    pub owner_id: PlayerId,
    pub owner_name: String,
}

/// Sub-state of the secret attribution level (`level2`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Level2State {
    pub questions: Vec<SecretQuestion>,
    pub questions_version: Option<String>,
    pub current_question_index: usize,
    pub status: Level2Status,
    /// Voter id to the id of the player they believe owns the secret.
    pub votes: IndexMap<PlayerId, PlayerId>,
    /// Times voting on the current secret was reopened after an empty ballot.
    pub reopened: u32,
    pub run: Option<String>,
}

impl Level2State {
    pub fn current_question(&self) -> Option<&SecretQuestion> {
        self.questions.get(self.current_question_index)
    }
}

/// Open interval of still allowed guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GuessRange {
    pub min: u32,
    pub max: u32,
}

impl GuessRange {
    /// Whether `guess` lies strictly between the bounds.
    pub fn admits(&self, guess: u32) -> bool {
        guess > self.min && guess < self.max
    }
}

/// A safe guess kept in the round history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub name: String,
    pub guess: u32,
}

/// Sub-state of the elimination guess level (`level3`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Level3State {
    pub round: usize,
    pub status: Level3Status,
    pub target: Option<u32>,
    pub range: Option<GuessRange>,
    pub turn_order: Vec<PlayerId>,
    pub turn: Option<PlayerId>,
    pub history: Vec<GuessRecord>,
    pub boom: Option<PlayerId>,
    pub run: Option<String>,
}

/// Players who have submitted their gift ratings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GiftRatingState {
    pub finished: HashSet<PlayerId>,
}

impl GiftRatingState {
    pub fn from_value(value: &Value) -> Self {
        let finished = match value {
            Value::Object(entries) => entries
                .iter()
                .filter(|(_, flag)| flag.as_bool().unwrap_or(false))
                .map(|(id, _)| id.clone())
                .collect(),
            _ => HashSet::new(),
        };
        Self { finished }
    }
}

/// Deserialize a level subtree, falling back to its starting sub-state.
pub fn level_from_value<T>(value: &Value, level: &'static str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    if value.is_null() {
        return T::default();
    }
    serde_json::from_value(value.clone()).unwrap_or_else(|err| {
        debug!(level, error = %err, "unreadable level state; using defaults");
        T::default()
    })
}

/// Read the global phase, treating an absent or unknown value as the lobby.
pub fn phase_from_value(value: &Value) -> GamePhase {
    serde_json::from_value(value.clone()).unwrap_or_default()
}
