use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{client::PartyClient, error::AppError, state::SharedState};

/// Header carrying the id returned by `POST /players`.
pub const PLAYER_HEADER: &str = "x-player-id";

/// The calling player's client, resolved from [`PLAYER_HEADER`].
pub struct PlayerSession(pub Arc<PartyClient>);

impl FromRequestParts<SharedState> for PlayerSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let player_id = parts
            .headers
            .get(PLAYER_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {PLAYER_HEADER} header")))?;
        let client = state.session(player_id).await?;
        Ok(Self(client))
    }
}
