pub mod game;
pub mod paths;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    client::{MemoryIdentitySlot, PartyClient},
    config::GameConfig,
    error::ServiceError,
    state::game::PlayerId,
    store::MemoryStore,
};

pub type SharedState = Arc<AppState>;
/// Longest a request waits for its client to observe the latest store version.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(2);

/// Server state: the session store plus one reactor per joined player.
///
/// HTTP callers are identified by the player id returned at join time; each id maps to
/// the [`PartyClient`] acting for that player.
pub struct AppState {
    store: MemoryStore,
    config: Arc<GameConfig>,
    sessions: DashMap<PlayerId, Arc<PartyClient>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] around an empty store.
    pub fn new(config: GameConfig) -> SharedState {
        Self::with_store(MemoryStore::new(), config)
    }

    /// Construct the state around an existing store.
    pub fn with_store(store: MemoryStore, config: GameConfig) -> SharedState {
        Arc::new(Self {
            store,
            config: Arc::new(config),
            sessions: DashMap::new(),
        })
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Connect a fresh, not yet joined client to the session.
    pub async fn open_client(&self) -> Result<Arc<PartyClient>, ServiceError> {
        PartyClient::connect(
            Arc::new(self.store.clone()),
            Arc::clone(&self.config),
            Arc::new(MemoryIdentitySlot::new()),
        )
        .await
    }

    /// Route later requests carrying `player_id` to `client`.
    pub fn register_session(&self, player_id: PlayerId, client: Arc<PartyClient>) {
        info!(player_id = %player_id, "session registered");
        self.sessions.insert(player_id, client);
    }

    /// Client acting for `player_id`, caught up with the store.
    ///
    /// Sessions whose player left the roster are dropped.
    pub async fn session(&self, player_id: &str) -> Result<Arc<PartyClient>, ServiceError> {
        let client = self
            .sessions
            .get(player_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServiceError::Unauthorized(format!("unknown player {player_id}")))?;

        self.catch_up(&client).await;
        if client.user().await.is_none() {
            debug!(player_id, "dropping session of a logged out player");
            self.sessions.remove(player_id);
            return Err(ServiceError::Unauthorized(format!(
                "player {player_id} is no longer in the session"
            )));
        }
        Ok(client)
    }

    /// Wait until `client` observed every batch committed so far, so a request acts on
    /// the state earlier requests produced. Gives up after [`SYNC_TIMEOUT`].
    pub async fn catch_up(&self, client: &PartyClient) {
        let head = self.store.version().await;
        if timeout(SYNC_TIMEOUT, client.observe(head)).await.is_err() {
            warn!(head, "client view is lagging behind the store");
        }
    }

    /// Forget the session of `player_id`, returning its client if there was one.
    pub fn end_session(&self, player_id: &str) -> Option<Arc<PartyClient>> {
        self.sessions.remove(player_id).map(|(_, client)| client)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        services::{majority_vote_service, phase_service, roster_service},
        state::state_machine::GamePhase,
    };

    #[tokio::test]
    async fn sessions_follow_the_roster() {
        let state = AppState::new(GameConfig::default());
        let client = state.open_client().await.unwrap();
        let player = roster_service::join(&client, "Ada", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        state.register_session(player.id.clone(), client.clone());

        assert!(state.session(&player.id).await.is_ok());
        assert!(matches!(
            state.session("nobody").await,
            Err(ServiceError::Unauthorized(_))
        ));

        roster_service::leave(&client).await.unwrap();
        assert!(matches!(
            state.session(&player.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn repeated_vote_does_not_stall_sessions() {
        let state = AppState::new(GameConfig::default());
        let client = state.open_client().await.unwrap();
        let player = roster_service::join(&client, "Ada", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        state.register_session(player.id.clone(), client.clone());

        let client = state.session(&player.id).await.unwrap();
        phase_service::jump_to(&client, GamePhase::Level1).await.unwrap();
        let client = state.session(&player.id).await.unwrap();
        majority_vote_service::start_level(&client).await.unwrap();
        let client = state.session(&player.id).await.unwrap();
        majority_vote_service::vote(&client, 1).await.unwrap();
        let client = state.session(&player.id).await.unwrap();
        majority_vote_service::vote(&client, 1).await.unwrap();

        let started = Instant::now();
        state.session(&player.id).await.unwrap();
        assert!(started.elapsed() < SYNC_TIMEOUT / 4);
    }
}
