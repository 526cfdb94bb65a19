use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Global phase selecting which minigame is active.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Players join and wait for the host.
    #[default]
    Lobby,
    /// Everyone rates how well their gift suits the others.
    GiftRating,
    /// Majority vote.
    Level1,
    /// Secret attribution.
    Level2,
    /// Elimination guess.
    Level3,
    /// Final leaderboard.
    Result,
}

impl GamePhase {
    /// Every phase in play order.
    pub const ALL: [GamePhase; 6] = [
        GamePhase::Lobby,
        GamePhase::GiftRating,
        GamePhase::Level1,
        GamePhase::Level2,
        GamePhase::Level3,
        GamePhase::Result,
    ];

    /// The phase that follows in normal play.
    pub fn successor(self) -> Option<GamePhase> {
        let index = Self::ALL.iter().position(|phase| *phase == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Move forward to `to`, which must be the direct successor.
    pub fn advance(self, to: GamePhase) -> Result<GamePhase, InvalidTransition<GamePhase, GamePhase>> {
        if self.successor() == Some(to) {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                event: to,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GamePhase::Lobby => "lobby",
            GamePhase::GiftRating => "gift_rating",
            GamePhase::Level1 => "level1",
            GamePhase::Level2 => "level2",
            GamePhase::Level3 => "level3",
            GamePhase::Result => "result",
        }
    }
}

/// Error returned when an event cannot be applied in the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition<S: Debug, E: Debug> {
    /// Status the machine was in when the event was received.
    pub from: S,
    /// The rejected event.
    pub event: E,
}

/// Per-level status machine: a pure transition table over a status enum.
pub trait StatusMachine: Copy + Debug + Sized {
    type Event: Debug + Clone;

    /// Next status for `event`, or `None` when the event is not valid here.
    fn transition(self, event: &Self::Event) -> Option<Self>;

    /// Like [`StatusMachine::transition`] but reporting the rejected pair.
    fn apply(self, event: Self::Event) -> Result<Self, InvalidTransition<Self, Self::Event>> {
        self.transition(&event)
            .ok_or(InvalidTransition { from: self, event })
    }
}

/// Status of the majority vote level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Level1Status {
    #[default]
    Intro,
    Voting,
    Revealed,
    LevelComplete,
}

/// Admin actions driving [`Level1Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level1Event {
    Start,
    Reveal,
    /// `has_more` is false when the current question was the last one.
    NextQuestion { has_more: bool },
}

impl StatusMachine for Level1Status {
    type Event = Level1Event;

    fn transition(self, event: &Level1Event) -> Option<Self> {
        let next = match (self, event) {
            (Level1Status::Intro, Level1Event::Start) => Level1Status::Voting,
            (Level1Status::Voting, Level1Event::Reveal) => Level1Status::Revealed,
            (Level1Status::Revealed, Level1Event::NextQuestion { has_more: true }) => {
                Level1Status::Voting
            }
            (Level1Status::Revealed, Level1Event::NextQuestion { has_more: false }) => {
                Level1Status::LevelComplete
            }
            _ => return None,
        };
        Some(next)
    }
}

/// Status of the secret attribution level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Level2Status {
    #[default]
    Intro,
    Voting,
    /// Guesses are visible but the owner is not; discussion time.
    VotesRevealed,
    TruthRevealed,
    LevelComplete,
}

/// Admin actions driving [`Level2Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level2Event {
    Start,
    ShowVotes,
    /// Back to voting after the guesses were shown; only allowed when nobody voted.
    ReopenVoting { ballot_empty: bool },
    RevealTruth,
    NextQuestion { has_more: bool },
}

impl StatusMachine for Level2Status {
    type Event = Level2Event;

    fn transition(self, event: &Level2Event) -> Option<Self> {
        let next = match (self, event) {
            (Level2Status::Intro, Level2Event::Start) => Level2Status::Voting,
            (Level2Status::Voting, Level2Event::ShowVotes) => Level2Status::VotesRevealed,
            (Level2Status::VotesRevealed, Level2Event::ReopenVoting { ballot_empty: true }) => {
                Level2Status::Voting
            }
            (Level2Status::VotesRevealed, Level2Event::RevealTruth) => Level2Status::TruthRevealed,
            (Level2Status::TruthRevealed, Level2Event::NextQuestion { has_more: true }) => {
                Level2Status::Voting
            }
            (Level2Status::TruthRevealed, Level2Event::NextQuestion { has_more: false }) => {
                Level2Status::LevelComplete
            }
            _ => return None,
        };
        Some(next)
    }
}

/// Status of the elimination guess level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Level3Status {
    #[default]
    Intro,
    Playing,
    /// Someone guessed the target; scores for the round are settled.
    Boom,
    RoundComplete,
    GameComplete,
}

/// Actions driving [`Level3Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level3Event {
    StartRound,
    /// A guess hit the hidden target.
    Detonate,
    NextRound { has_more: bool },
}

impl StatusMachine for Level3Status {
    type Event = Level3Event;

    fn transition(self, event: &Level3Event) -> Option<Self> {
        let next = match (self, event) {
            (Level3Status::Intro, Level3Event::StartRound) => Level3Status::Playing,
            (Level3Status::Playing, Level3Event::Detonate) => Level3Status::Boom,
            (
                Level3Status::Boom | Level3Status::RoundComplete,
                Level3Event::NextRound { has_more: true },
            ) => Level3Status::Intro,
            (
                Level3Status::Boom | Level3Status::RoundComplete,
                Level3Event::NextRound { has_more: false },
            ) => Level3Status::GameComplete,
            _ => return None,
        };
        Some(next)
    }
}
