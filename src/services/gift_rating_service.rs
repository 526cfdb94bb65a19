use std::collections::BTreeMap;

use serde_json::json;
use tracing::info;

use crate::{
    client::{LocalView, PartyClient},
    error::ServiceError,
    services::commit,
    state::{
        game::{PlayerId, Roster},
        paths,
        state_machine::GamePhase,
    },
    store::{Batch, BatchOutcome},
};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Check that `ratings` covers every other roster member exactly, with values in range.
pub fn validate_ratings(
    roster: &Roster,
    rater: &str,
    ratings: &BTreeMap<PlayerId, u8>,
) -> Result<(), ServiceError> {
    if ratings.contains_key(rater) {
        return Err(ServiceError::InvalidInput(
            "players cannot rate their own gift".into(),
        ));
    }
    if let Some(unknown) = ratings.keys().find(|id| !roster.contains(id)) {
        return Err(ServiceError::InvalidInput(format!(
            "player {unknown} is not in the roster"
        )));
    }
    if let Some((id, rating)) = ratings
        .iter()
        .find(|(_, rating)| !(MIN_RATING..=MAX_RATING).contains(*rating))
    {
        return Err(ServiceError::InvalidInput(format!(
            "rating for {id} must be between {MIN_RATING} and {MAX_RATING} (got {rating})"
        )));
    }
    if let Some(missing) = roster
        .ids()
        .find(|id| id.as_str() != rater && !ratings.contains_key(*id))
    {
        return Err(ServiceError::InvalidInput(format!(
            "missing rating for player {missing}"
        )));
    }
    Ok(())
}

/// Record how well the local player's gift suits each other player and mark them finished.
pub async fn submit_ratings(
    client: &PartyClient,
    ratings: BTreeMap<PlayerId, u8>,
) -> Result<BatchOutcome, ServiceError> {
    let snapshot = client.snapshot().await;
    let me = snapshot.require_user()?;
    if snapshot.view.phase != GamePhase::GiftRating {
        return Err(ServiceError::InvalidState(format!(
            "gift ratings are only accepted during gift_rating (currently {})",
            snapshot.view.phase.as_str()
        )));
    }
    validate_ratings(&snapshot.view.roster, &me.id, &ratings)?;

    let batch = Batch::new()
        .set(paths::player_field(&me.id, "gift_suitability")?, json!(ratings))
        .set(paths::gift_finished(&me.id)?, json!(true));
    let outcome = commit(client, "submit_ratings", batch).await?;
    info!(player_id = %me.id, rated = ratings.len(), "gift ratings submitted");
    Ok(outcome)
}

/// Whether every current roster member finished rating. An empty roster is never finished.
pub fn all_finished(view: &LocalView) -> bool {
    !view.roster.is_empty()
        && view
            .roster
            .ids()
            .all(|id| view.gift.finished.contains(id))
}

/// `(finished, total)` counted over current roster members only.
pub fn progress(view: &LocalView) -> (usize, usize) {
    let finished = view
        .roster
        .ids()
        .filter(|id| view.gift.finished.contains(*id))
        .count();
    (finished, view.roster.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::phase_service,
        test_support::{self, catch_up, read, user_id},
    };

    fn ratings(entries: &[(&str, u8)]) -> BTreeMap<PlayerId, u8> {
        entries
            .iter()
            .map(|(id, rating)| (id.to_string(), *rating))
            .collect()
    }

    #[tokio::test]
    async fn round_finishes_once_everyone_submitted() {
        let store = test_support::store();
        let ada = test_support::join(&store, "Ada").await;
        let bob = test_support::join(&store, "Bob").await;
        let (a, b) = (user_id(&ada).await, user_id(&bob).await);
        catch_up(&ada, &store).await;
        phase_service::start_game(&ada).await.unwrap();
        catch_up(&ada, &store).await;
        catch_up(&bob, &store).await;

        submit_ratings(&ada, ratings(&[(&b, 4)])).await.unwrap();
        let view = catch_up(&bob, &store).await.view;
        assert!(!all_finished(&view));
        assert_eq!(progress(&view), (1, 2));

        submit_ratings(&bob, ratings(&[(&a, 2)])).await.unwrap();
        let view = catch_up(&ada, &store).await.view;
        assert!(all_finished(&view));
        assert_eq!(read(&store, &format!("players/{a}/gift_suitability/{b}")).await, 4);
    }

    #[tokio::test]
    async fn incomplete_or_invalid_ratings_are_rejected() {
        let store = test_support::store();
        let ada = test_support::join(&store, "Ada").await;
        let bob = test_support::join(&store, "Bob").await;
        let _cy = test_support::join(&store, "Cy").await;
        let (a, b) = (user_id(&ada).await, user_id(&bob).await);
        catch_up(&ada, &store).await;
        phase_service::start_game(&ada).await.unwrap();
        let roster = catch_up(&ada, &store).await.view.roster;

        assert!(validate_ratings(&roster, &a, &ratings(&[(&b, 5)])).is_err());
        assert!(validate_ratings(&roster, &a, &ratings(&[(&a, 5), (&b, 5)])).is_err());
        assert!(validate_ratings(&roster, &a, &ratings(&[(&b, 6)])).is_err());
        assert!(validate_ratings(&roster, &a, &ratings(&[(&b, 3), ("ghost", 3)])).is_err());

        let err = submit_ratings(&ada, ratings(&[(&b, 0)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(read(&store, "gift_ratings_finished").await, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn ratings_outside_the_round_are_refused() {
        let store = test_support::store();
        let ada = test_support::join(&store, "Ada").await;
        let err = submit_ratings(&ada, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn empty_roster_is_never_finished() {
        assert!(!all_finished(&LocalView::default()));
    }
}
