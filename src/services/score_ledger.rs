use indexmap::IndexMap;

use crate::{
    state::{game::PlayerId, paths},
    store::{Batch, StoreResult},
};

/// Score changes for one action, applied by the store as increments.
///
/// Deltas never go through the cached score: concurrent actions touching the same
/// player therefore both land.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreDeltas {
    deltas: IndexMap<PlayerId, i64>,
}

impl ScoreDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to whatever was already credited to `player`.
    pub fn credit(&mut self, player: &str, delta: i64) -> &mut Self {
        *self.deltas.entry(player.to_string()).or_default() += delta;
        self
    }

    pub fn get(&self, player: &str) -> i64 {
        self.deltas.get(player).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.values().all(|delta| *delta == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, i64)> {
        self.deltas.iter().map(|(id, delta)| (id, *delta))
    }

    /// Append one increment per non-zero delta to `batch`.
    pub fn apply_to(&self, mut batch: Batch) -> StoreResult<Batch> {
        for (player, delta) in self.iter().filter(|(_, delta)| *delta != 0) {
            batch = batch.increment(paths::score(player)?, delta);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Mutation;

    #[test]
    fn credits_accumulate_per_player() {
        let mut deltas = ScoreDeltas::new();
        deltas.credit("a", 10).credit("b", -20).credit("a", 5);
        assert_eq!(deltas.get("a"), 15);
        assert_eq!(deltas.get("b"), -20);
        assert_eq!(deltas.get("c"), 0);
    }

    #[test]
    fn zero_deltas_produce_no_mutation() {
        let mut deltas = ScoreDeltas::new();
        deltas.credit("a", 10).credit("a", -10).credit("b", 3);

        let batch = deltas.apply_to(Batch::new()).unwrap();
        let mutations: Vec<_> = batch
            .mutations()
            .map(|(path, mutation)| (path.to_string(), mutation.clone()))
            .collect();
        assert_eq!(
            mutations,
            vec![("/players/b/score".to_string(), Mutation::Increment(3))]
        );
    }

    #[test]
    fn empty_when_everything_cancels_out() {
        let mut deltas = ScoreDeltas::new();
        assert!(deltas.is_empty());
        deltas.credit("a", 4).credit("a", -4);
        assert!(deltas.is_empty());
    }
}
