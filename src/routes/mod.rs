pub mod auth;
pub mod content;
pub mod media;
pub mod oauth;
pub mod profile;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every route, without state.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/media/{*path}", get(media::serve))
        .merge(auth::router())
        .merge(content::router())
        .merge(oauth::router())
        .merge(profile::router())
}

/// The full application: routes, upload limit, request tracing and state.
pub fn app(state: AppState) -> Router {
    let upload_limit = state.config.storage.max_upload_mb * 1024 * 1024;
    router()
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
