pub mod documents;
pub mod favorites;
pub mod health;
pub mod shares;
pub mod trash;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups. Only the upload route
/// lifts axum's default body limit.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config().upload_body_limit();
    Router::new()
        .merge(health::routes())
        .merge(documents::routes(upload_limit))
        .merge(trash::routes())
        .merge(favorites::routes())
        .merge(shares::routes())
        .with_state(state)
}
