use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    client::PartyClient,
    error::ServiceError,
    state::{
        game::{Player, Roster},
        paths,
    },
    store::Batch,
};

/// Number of secrets every player hands in when joining.
pub const SECRET_COUNT: usize = 2;

/// Reject blank names and missing or blank secrets before anything is written.
pub fn validate_join(name: &str, secrets: &[String]) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::InvalidInput("name must not be blank".into()));
    }
    if secrets.len() != SECRET_COUNT {
        return Err(ServiceError::InvalidInput(format!(
            "exactly {SECRET_COUNT} secrets are required (got {})",
            secrets.len()
        )));
    }
    if let Some(index) = secrets.iter().position(|secret| secret.trim().is_empty()) {
        return Err(ServiceError::InvalidInput(format!(
            "secret {} must not be blank",
            index + 1
        )));
    }
    Ok(())
}

/// Add a new player to the roster and adopt it as this client's identity.
///
/// `joinedAt` is minted by the store so admin election does not depend on client clocks.
/// When the write fails nothing is kept locally.
pub async fn join(
    client: &PartyClient,
    name: &str,
    secrets: Vec<String>,
) -> Result<Player, ServiceError> {
    validate_join(name, &secrets)?;
    if let Some(existing) = client.user().await {
        return Err(ServiceError::InvalidState(format!(
            "this client already joined as {}",
            existing.name
        )));
    }

    let mut player = Player {
        id: Uuid::new_v4().simple().to_string(),
        name: name.trim().to_string(),
        secrets: secrets
            .iter()
            .map(|secret| secret.trim().to_string())
            .collect(),
        score: 0,
        joined_at: 0,
        gift_suitability: Default::default(),
    };

    let joined_at = paths::player_field(&player.id, "joinedAt")?;
    let batch = Batch::new()
        .set(
            paths::player(&player.id)?,
            json!({
                "id": player.id,
                "name": player.name,
                "secrets": player.secrets,
                "score": 0,
            }),
        )
        .server_timestamp(joined_at.clone());
    let outcome = client.store().write_batch(batch).await?;

    match client.store().read(joined_at).await {
        Ok(value) => player.joined_at = value.as_u64().unwrap_or_default(),
        Err(err) => warn!(player_id = %player.id, error = %err, "could not read back join timestamp"),
    }

    info!(player_id = %player.id, name = %player.name, joined_at = player.joined_at, "player joined");
    client
        .sign_in(player.clone(), outcome.version().unwrap_or_default())
        .await;
    Ok(player)
}

/// Remove the local player from the roster and forget the local identity.
pub async fn leave(client: &PartyClient) -> Result<(), ServiceError> {
    let snapshot = client.snapshot().await;
    let player = snapshot.require_user()?;
    client
        .store()
        .write_batch(Batch::new().delete(paths::player(&player.id)?))
        .await?;
    info!(player_id = %player.id, name = %player.name, "player left");
    client.sign_out().await?;
    Ok(())
}

/// Current admin of `roster`, if anyone is present.
pub fn admin(roster: &Roster) -> Option<&Player> {
    roster.elect_admin()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::{
        client::{IdentitySlot, MemoryIdentitySlot},
        config::GameConfig,
        store::{MemoryStore, SharedStore},
        test_support::{self, FailingStore, catch_up, read, settle, user_id},
    };

    #[tokio::test]
    async fn join_writes_record_and_persists_identity() {
        let store = test_support::store();
        let slot = MemoryIdentitySlot::new();
        let client = test_support::connect_with(store.clone(), GameConfig::default(), slot.clone()).await;

        let player = join(&client, "  Ada ", vec!["tea".into(), "snow".into()])
            .await
            .unwrap();

        assert_eq!(player.name, "Ada");
        assert!(player.joined_at > 0);
        let record = read(&store, &format!("players/{}", player.id)).await;
        assert_eq!(record["name"], "Ada");
        assert_eq!(record["score"], 0);
        assert_eq!(record["joinedAt"].as_u64(), Some(player.joined_at));
        assert_eq!(slot.load().unwrap().unwrap().id, player.id);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_a_write() {
        let store = test_support::store();
        let client = test_support::connect(&store).await;

        let err = join(&client, "   ", vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = join(&client, "Ada", vec!["a".into(), " ".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = join(&client, "Ada", vec!["a".into()]).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        assert_eq!(read(&store, "players").await, Value::Null);
        assert!(client.user().await.is_none());
    }

    #[tokio::test]
    async fn failed_write_keeps_nothing_locally() {
        let backing = MemoryStore::new();
        let slot = MemoryIdentitySlot::new();
        let client = test_support::connect_with(
            Arc::new(FailingStore::new(backing.clone())),
            GameConfig::default(),
            slot.clone(),
        )
        .await;

        let err = join(&client, "Ada", vec!["a".into(), "b".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert!(client.user().await.is_none());
        assert!(slot.load().unwrap().is_none());
        assert_eq!(backing.read(test_support::path("players")).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn earliest_joiner_is_admin_everywhere() {
        let store = test_support::store();
        let ada = test_support::join(&store, "Ada").await;
        let bob = test_support::join(&store, "Bob").await;
        let ada_id = user_id(&ada).await;

        let view = catch_up(&bob, &store).await.view;
        assert_eq!(admin(&view.roster).unwrap().id, ada_id);
        catch_up(&ada, &store).await;
        assert!(ada.is_admin().await);
        assert!(!bob.is_admin().await);
    }

    #[tokio::test]
    async fn leaving_admin_hands_over_to_next_joiner() {
        let store = test_support::store();
        let ada = test_support::join(&store, "Ada").await;
        let bob = test_support::join(&store, "Bob").await;
        let ada_id = user_id(&ada).await;

        leave(&ada).await.unwrap();

        assert!(ada.user().await.is_none());
        settle(&bob, |view, _| !view.roster.contains(&ada_id)).await;
        assert!(bob.is_admin().await);
    }

    #[tokio::test]
    async fn removed_record_logs_the_client_out() {
        let store = test_support::store();
        let slot = MemoryIdentitySlot::new();
        let ada = test_support::connect_with(store.clone(), GameConfig::default(), slot.clone()).await;
        join(&ada, "Ada", vec!["a".into(), "b".into()]).await.unwrap();
        let id = user_id(&ada).await;

        store
            .write(test_support::path(&format!("players/{id}")), Value::Null)
            .await
            .unwrap();

        let snapshot = settle(&ada, |_, user| user.is_none()).await;
        assert!(!snapshot.view.roster.contains(&id));
        assert!(slot.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn restart_resumes_identity_and_refreshes_score() {
        let store = test_support::store();
        let slot = MemoryIdentitySlot::new();
        let first = test_support::connect_with(store.clone(), GameConfig::default(), slot.clone()).await;
        let joined = join(&first, "Ada", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        drop(first);

        store
            .write_batch(Batch::new().increment(paths::score(&joined.id).unwrap(), 15))
            .await
            .unwrap();

        let resumed = test_support::connect_with(store.clone(), GameConfig::default(), slot.clone()).await;
        let player = resumed.user().await.unwrap();
        assert_eq!(player.id, joined.id);
        assert_eq!(player.name, "Ada");
        assert_eq!(player.score, 15);
        assert_eq!(slot.load().unwrap().unwrap().score, 15);
    }
}
