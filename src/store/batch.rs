use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::store::{error::StoreError, path::StorePath};

/// Reserved subtree where applied action tokens are recorded.
pub const ACTIONS_ROOT: &str = "actions";

/// A single change applied to one path of the shared tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Replace the subtree. `null` and empty containers delete it.
    Set(Value),
    /// Remove the subtree.
    Delete,
    /// Add a signed delta to the integer stored at the path (absent counts as 0).
    Increment(i64),
    /// Store a strictly increasing timestamp (milliseconds) minted by the store.
    ServerTimestamp,
}

/// Idempotency key for an action that must be applied at most once per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionToken(String);

impl ActionToken {
    /// Build a token from its parts, e.g. `("level1", run, "q0-reveal")`.
    pub fn new(scope: &str, run: Option<&str>, step: impl fmt::Display) -> Self {
        let run = run.unwrap_or("initial");
        let raw = format!("{scope}:{run}:{step}");
        // Tokens become path segments under `actions/`.
        Self(raw.replace(['/', '.', '#', '$', '[', ']'], "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path under which the store records that this token was applied.
    pub fn marker_path(&self) -> Result<StorePath, StoreError> {
        StorePath::root().child(ACTIONS_ROOT)?.child(&self.0)
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of mutations applied and observed as one atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    mutations: IndexMap<StorePath, Mutation>,
    token: Option<ActionToken>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mutation. A later mutation on the same path replaces the earlier one.
    pub fn push(&mut self, path: StorePath, mutation: Mutation) -> &mut Self {
        self.mutations.insert(path, mutation);
        self
    }

    pub fn set(mut self, path: StorePath, value: Value) -> Self {
        self.push(path, Mutation::Set(value));
        self
    }

    pub fn delete(mut self, path: StorePath) -> Self {
        self.push(path, Mutation::Delete);
        self
    }

    pub fn increment(mut self, path: StorePath, delta: i64) -> Self {
        self.push(path, Mutation::Increment(delta));
        self
    }

    pub fn server_timestamp(mut self, path: StorePath) -> Self {
        self.push(path, Mutation::ServerTimestamp);
        self
    }

    /// Apply this batch at most once: the store skips it when the token was seen before.
    pub fn with_token(mut self, token: ActionToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn token(&self) -> Option<&ActionToken> {
        self.token.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&StorePath, &Mutation)> {
        self.mutations.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &StorePath> {
        self.mutations.keys()
    }
}

/// What the store did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was committed as the given store version.
    Applied { version: u64 },
    /// The batch carried a token that was already applied; nothing was written.
    Duplicate,
}

impl BatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BatchOutcome::Applied { .. })
    }

    /// Store version of the commit, `None` for a skipped duplicate.
    pub fn version(&self) -> Option<u64> {
        match self {
            BatchOutcome::Applied { version } => Some(*version),
            BatchOutcome::Duplicate => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_sanitised_into_a_single_segment() {
        let token = ActionToken::new("level2", Some("a.b/c"), "q1-reveal");
        assert_eq!(token.as_str(), "level2:a_b_c:q1-reveal");
        assert_eq!(
            token.marker_path().unwrap().to_string(),
            "/actions/level2:a_b_c:q1-reveal"
        );
    }

    #[test]
    fn later_mutation_on_same_path_wins() {
        let path = StorePath::parse("level1/status").unwrap();
        let batch = Batch::new()
            .set(path.clone(), Value::from("voting"))
            .set(path.clone(), Value::from("revealed"));

        assert_eq!(batch.len(), 1);
        let (_, mutation) = batch.mutations().next().unwrap();
        assert_eq!(mutation, &Mutation::Set(Value::from("revealed")));
    }
}
