use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod game;
pub mod health;
pub mod levels;
pub mod players;
pub mod session;
pub mod store;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(store::router())
        .merge(players::router())
        .merge(game::router())
        .merge(levels::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
