use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::notice::{redirect_with, Notice};
use crate::oauth::{accounts, linker, Platform};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/instagram_login", get(instagram_login))
        .route("/instagram_callback", get(instagram_callback))
        .route("/facebook_login", get(facebook_login))
        .route("/facebook_callback", get(facebook_callback))
        .route("/disconnect_platform/{platform}", post(disconnect_platform))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

async fn start(state: &AppState, user: &CurrentUser, platform: Platform) -> Response {
    match linker::authorize(state, &user.session, platform).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::warn!(platform = %platform, "cannot start OAuth flow: {}", e);
            redirect_with(
                &user.profile_path(),
                Notice::error(format!(
                    "{} linking is not available",
                    platform.display_name()
                )),
            )
        }
    }
}

async fn finish(
    state: &AppState,
    user: &CurrentUser,
    platform: Platform,
    query: CallbackQuery,
) -> AppResult<Response> {
    let outcome = linker::complete(
        state,
        &user.id,
        &user.session,
        platform,
        query.code.as_deref(),
        query.state.as_deref(),
    )
    .await?;
    Ok(redirect_with(&user.profile_path(), outcome.notice(platform)))
}

/// GET /instagram_login
async fn instagram_login(State(state): State<AppState>, user: CurrentUser) -> Response {
    start(&state, &user, Platform::Instagram).await
}

/// GET /instagram_callback?code=..&state=..
async fn instagram_callback(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    finish(&state, &user, Platform::Instagram, query).await
}

/// GET /facebook_login
async fn facebook_login(State(state): State<AppState>, user: CurrentUser) -> Response {
    start(&state, &user, Platform::Facebook).await
}

/// GET /facebook_callback?code=..&state=..
async fn facebook_callback(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    finish(&state, &user, Platform::Facebook, query).await
}

/// POST /disconnect_platform/{platform}: clear the linked flag, keep the row.
async fn disconnect_platform(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(tag): Path<String>,
) -> AppResult<Response> {
    let back = user.profile_path();
    let Ok(platform) = tag.parse::<Platform>() else {
        return Ok(redirect_with(
            &back,
            Notice::error(format!("No {} account found", tag)),
        ));
    };

    let conn = state.db.get()?;
    let notice = if accounts::set_linked(&conn, &user.id, platform, false)? {
        tracing::info!(username = %user.username, platform = %platform, "unlinked account");
        Notice::success(format!(
            "{} account disconnected successfully",
            platform.display_name()
        ))
    } else {
        Notice::error(format!("No {} account found", platform.display_name()))
    };
    Ok(redirect_with(&back, notice))
}
