//! Per-player reactor mirroring the shared session.
//!
//! A [`PartyClient`] subscribes to every subtree of the session on connect and keeps a
//! [`LocalView`] up to date from the store echoes. Writes never touch the view directly:
//! a client only sees its own action once the store fans it back out.

mod identity;
mod view;

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
};

use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub use self::identity::{FileIdentitySlot, IdentityError, IdentitySlot, MemoryIdentitySlot};
pub use self::view::{LocalView, WatchedPath};

use crate::{
    config::GameConfig,
    error::ServiceError,
    services::secret_attribution_service,
    state::{
        game::Player,
        paths,
        state_machine::{GamePhase, Level2Status},
    },
    store::{Change, SharedStore, Subscription},
};

/// The player this client joined as, with the store version of the join.
#[derive(Debug, Clone)]
struct LocalUser {
    player: Player,
    /// Roster snapshots older than this predate the join and cannot log us out.
    since_version: u64,
}

struct ClientState {
    view: LocalView,
    user: Option<LocalUser>,
}

/// Point-in-time copy of what a client knows.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    pub view: LocalView,
    pub user: Option<Player>,
}

impl ClientSnapshot {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|player| player.id.as_str())
    }

    /// Whether the local user is the elected admin of the current roster.
    pub fn is_admin(&self) -> bool {
        self.user_id()
            .is_some_and(|id| self.view.roster.is_admin(id))
    }

    pub fn require_user(&self) -> Result<&Player, ServiceError> {
        self.user
            .as_ref()
            .ok_or_else(|| ServiceError::Unauthorized("this client has not joined".into()))
    }
}

/// Event-driven client: one task per watched subtree feeding a shared local view.
pub struct PartyClient {
    store: Arc<dyn SharedStore>,
    config: Arc<GameConfig>,
    identity: Arc<dyn IdentitySlot>,
    state: RwLock<ClientState>,
    updates: watch::Sender<u64>,
    /// Store version each subscription has accounted for.
    observed: Vec<watch::Receiver<u64>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    generating_questions: AtomicBool,
}

impl PartyClient {
    /// Subscribe to the session, resuming the identity saved in `identity` if any.
    pub async fn connect(
        store: Arc<dyn SharedStore>,
        config: Arc<GameConfig>,
        identity: Arc<dyn IdentitySlot>,
    ) -> Result<Arc<Self>, ServiceError> {
        let resumed = identity.load().unwrap_or_else(|err| {
            warn!(error = %err, "ignoring unreadable identity");
            None
        });

        let mut subscriptions = Vec::with_capacity(WatchedPath::ALL.len());
        for watched in WatchedPath::ALL {
            let subscription = store.subscribe(paths::root(watched.root())?).await?;
            subscriptions.push((watched, subscription));
        }

        let mut view = LocalView::default();
        for (watched, subscription) in &subscriptions {
            let current = subscription.current();
            view.apply(*watched, current.version, &current.value);
        }

        let observed = subscriptions
            .iter()
            .map(|(_, subscription)| subscription.observed())
            .collect();

        if let Some(player) = &resumed {
            info!(player_id = %player.id, name = %player.name, "resuming saved identity");
        }
        let (updates, _rx) = watch::channel(0);
        let client = Arc::new(Self {
            store,
            config,
            identity,
            state: RwLock::new(ClientState {
                view,
                user: resumed.map(|player| LocalUser {
                    player,
                    since_version: 0,
                }),
            }),
            updates,
            observed,
            tasks: Mutex::new(Vec::new()),
            generating_questions: AtomicBool::new(false),
        });

        {
            let mut state = client.state.write().await;
            client.reconcile_user(&mut state);
        }

        let handles = subscriptions
            .into_iter()
            .map(|(watched, subscription)| {
                tokio::spawn(Self::follow(Arc::downgrade(&client), watched, subscription))
            })
            .collect();
        *client.tasks.lock().unwrap_or_else(PoisonError::into_inner) = handles;

        client.drive_admin_duties().await;
        Ok(client)
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub async fn snapshot(&self) -> ClientSnapshot {
        let state = self.state.read().await;
        ClientSnapshot {
            view: state.view.clone(),
            user: state.user.as_ref().map(|user| user.player.clone()),
        }
    }

    pub async fn view(&self) -> LocalView {
        self.state.read().await.view.clone()
    }

    /// The local player, refreshed from every roster change.
    pub async fn user(&self) -> Option<Player> {
        self.state
            .read()
            .await
            .user
            .as_ref()
            .map(|user| user.player.clone())
    }

    pub async fn is_admin(&self) -> bool {
        let state = self.state.read().await;
        state
            .user
            .as_ref()
            .is_some_and(|user| state.view.roster.is_admin(&user.player.id))
    }

    /// Counter bumped after every applied change.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Wait until `predicate` holds for the local view and user.
    pub async fn wait_until<F>(&self, mut predicate: F) -> ClientSnapshot
    where
        F: FnMut(&LocalView, Option<&Player>) -> bool,
    {
        let mut updates = self.updates.subscribe();
        loop {
            {
                let state = self.state.read().await;
                let user = state.user.as_ref().map(|user| &user.player);
                if predicate(&state.view, user) {
                    return ClientSnapshot {
                        view: state.view.clone(),
                        user: user.cloned(),
                    };
                }
            }
            if updates.changed().await.is_err() {
                return self.snapshot().await;
            }
        }
    }

    /// Wait until every watched subtree has accounted for store version `version`,
    /// whether or not that commit changed it.
    pub async fn observe(&self, version: u64) {
        for observed in &self.observed {
            let mut observed = observed.clone();
            // A closed feed has nothing left to deliver.
            let _ = observed.wait_for(|seen| *seen >= version).await;
        }
    }

    /// Adopt `player` as the local identity once its join batch committed at `since_version`.
    pub(crate) async fn sign_in(&self, player: Player, since_version: u64) {
        if let Err(err) = self.identity.save(&player) {
            warn!(player_id = %player.id, error = %err, "failed to persist identity");
        }
        let mut state = self.state.write().await;
        state.user = Some(LocalUser {
            player,
            since_version,
        });
        drop(state);
        self.updates.send_modify(|seen| *seen += 1);
    }

    /// Forget the local identity.
    pub(crate) async fn sign_out(&self) -> Result<(), IdentityError> {
        let previous = self.state.write().await.user.take();
        if let Some(user) = previous {
            info!(player_id = %user.player.id, "logged out locally");
        }
        self.updates.send_modify(|seen| *seen += 1);
        self.identity.clear()
    }

    async fn follow(client: Weak<Self>, watched: WatchedPath, mut subscription: Subscription) {
        while let Some(change) = subscription.next_change().await {
            let Some(client) = client.upgrade() else {
                break;
            };
            client.apply_change(watched, change).await;
        }
        debug!(path = %subscription.path(), "subscription closed");
    }

    async fn apply_change(self: &Arc<Self>, watched: WatchedPath, change: Change) {
        {
            let mut state = self.state.write().await;
            state.view.apply(watched, change.version, &change.value);
            if watched == WatchedPath::Players {
                self.reconcile_user(&mut state);
            }
        }
        self.updates.send_modify(|seen| *seen += 1);

        if matches!(
            watched,
            WatchedPath::Players | WatchedPath::Phase | WatchedPath::Level2
        ) {
            self.drive_admin_duties().await;
        }
    }

    /// Keep the local identity in line with the roster snapshot just applied.
    fn reconcile_user(&self, state: &mut ClientState) {
        let ClientState { view, user } = state;
        let Some(local) = user.as_mut() else {
            return;
        };

        match view.roster.get(&local.player.id) {
            Some(record) => {
                if *record != local.player {
                    local.player = record.clone();
                    if let Err(err) = self.identity.save(&local.player) {
                        warn!(player_id = %local.player.id, error = %err, "failed to persist identity");
                    }
                }
            }
            None if view.roster_version >= local.since_version => {
                info!(player_id = %local.player.id, "player left the roster; logging out locally");
                *user = None;
                if let Err(err) = self.identity.clear() {
                    warn!(error = %err, "failed to clear identity");
                }
            }
            None => {}
        }
    }

    /// Work the elected admin does without being asked: generating the level2 questions.
    async fn drive_admin_duties(self: &Arc<Self>) {
        let due = {
            let state = self.state.read().await;
            let is_admin = state
                .user
                .as_ref()
                .is_some_and(|user| state.view.roster.is_admin(&user.player.id));
            is_admin
                && state.view.phase == GamePhase::Level2
                && state.view.level2.status == Level2Status::Intro
                && state.view.level2.questions.is_empty()
        };
        if !due || self.generating_questions.swap(true, Ordering::AcqRel) {
            return;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            match secret_attribution_service::ensure_questions(&client).await {
                Ok(Some(outcome)) => debug!(?outcome, "level2 questions ensured"),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "failed to generate level2 questions"),
            }
            client.generating_questions.store(false, Ordering::Release);
        });
    }
}

impl Drop for PartyClient {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
