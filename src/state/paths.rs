//! Fixed locations of the party session inside the shared store.

use crate::{
    state::state_machine::GamePhase,
    store::{ACTIONS_ROOT, StorePath, StoreResult},
};

pub const PLAYERS: &str = "players";
pub const GAME_STATE: &str = "gameState";
pub const GIFT_RATINGS_FINISHED: &str = "gift_ratings_finished";
pub const LEVEL1: &str = "level1";
pub const LEVEL2: &str = "level2";
pub const LEVEL3: &str = "level3";

/// Every top-level subtree cleared by a full reset.
pub const RESETTABLE_ROOTS: [&str; 6] = [
    PLAYERS,
    LEVEL1,
    LEVEL2,
    LEVEL3,
    GIFT_RATINGS_FINISHED,
    ACTIONS_ROOT,
];

/// Path of a top-level subtree.
pub fn root(name: &str) -> StoreResult<StorePath> {
    StorePath::root().child(name)
}

pub fn player(id: &str) -> StoreResult<StorePath> {
    root(PLAYERS)?.child(id)
}

pub fn player_field(id: &str, field: &str) -> StoreResult<StorePath> {
    player(id)?.child(field)
}

pub fn score(id: &str) -> StoreResult<StorePath> {
    player_field(id, "score")
}

pub fn gift_finished(id: &str) -> StoreResult<StorePath> {
    root(GIFT_RATINGS_FINISHED)?.child(id)
}

/// A field inside a level subtree, e.g. `level1/status`.
pub fn level_field(level: &str, field: &str) -> StoreResult<StorePath> {
    root(level)?.child(field)
}

pub fn vote(level: &str, voter: &str) -> StoreResult<StorePath> {
    level_field(level, "votes")?.child(voter)
}

/// Subtree owned by a level phase, if `phase` is one.
pub fn level_root(phase: GamePhase) -> Option<&'static str> {
    match phase {
        GamePhase::Level1 => Some(LEVEL1),
        GamePhase::Level2 => Some(LEVEL2),
        GamePhase::Level3 => Some(LEVEL3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        assert_eq!(score("abc").unwrap().to_string(), "/players/abc/score");
        assert_eq!(vote(LEVEL2, "p1").unwrap().to_string(), "/level2/votes/p1");
        assert_eq!(level_root(GamePhase::Level3), Some(LEVEL3));
        assert_eq!(level_root(GamePhase::Result), None);
    }

    #[test]
    fn rejects_ids_that_escape_their_segment() {
        assert!(player("a/b").is_err());
    }
}
