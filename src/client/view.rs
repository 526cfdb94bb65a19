use serde_json::Value;

use crate::state::{
    game::{
        GiftRatingState, Level1State, Level2State, Level3State, Player, Roster, level_from_value,
        phase_from_value,
    },
    paths,
    state_machine::GamePhase,
};

/// Subtrees a client mirrors, each with its own subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedPath {
    Players,
    Phase,
    GiftRatingsFinished,
    Level1,
    Level2,
    Level3,
}

impl WatchedPath {
    pub const ALL: [WatchedPath; 6] = [
        WatchedPath::Players,
        WatchedPath::Phase,
        WatchedPath::GiftRatingsFinished,
        WatchedPath::Level1,
        WatchedPath::Level2,
        WatchedPath::Level3,
    ];

    pub fn root(self) -> &'static str {
        match self {
            WatchedPath::Players => paths::PLAYERS,
            WatchedPath::Phase => paths::GAME_STATE,
            WatchedPath::GiftRatingsFinished => paths::GIFT_RATINGS_FINISHED,
            WatchedPath::Level1 => paths::LEVEL1,
            WatchedPath::Level2 => paths::LEVEL2,
            WatchedPath::Level3 => paths::LEVEL3,
        }
    }
}

/// Eventually consistent projection of the shared session held by one client.
///
/// Every field is refreshed independently from its own subscription, so two fields
/// may briefly reflect different store versions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalView {
    /// Highest store version applied to any field.
    pub version: u64,
    /// Store version of the roster snapshot currently held.
    pub roster_version: u64,
    pub phase: GamePhase,
    pub roster: Roster,
    pub gift: GiftRatingState,
    pub level1: Level1State,
    pub level2: Level2State,
    pub level3: Level3State,
}

impl LocalView {
    /// Replace one field with the value observed at `version`.
    pub fn apply(&mut self, path: WatchedPath, version: u64, value: &Value) {
        self.version = self.version.max(version);
        match path {
            WatchedPath::Players => {
                self.roster = Roster::from_value(value);
                self.roster_version = version;
            }
            WatchedPath::Phase => self.phase = phase_from_value(value),
            WatchedPath::GiftRatingsFinished => self.gift = GiftRatingState::from_value(value),
            WatchedPath::Level1 => self.level1 = level_from_value(value, paths::LEVEL1),
            WatchedPath::Level2 => self.level2 = level_from_value(value, paths::LEVEL2),
            WatchedPath::Level3 => self.level3 = level_from_value(value, paths::LEVEL3),
        }
    }

    pub fn admin(&self) -> Option<&Player> {
        self.roster.elect_admin()
    }
}
