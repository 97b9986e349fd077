use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditAction};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::graph::repository as graph;
use crate::graph::DisconnectOutcome;
use crate::identity::repository::{self as identity, ProfileUpdate};
use crate::media::MediaKind;
use crate::notice::{redirect_with, Flash, Notice};
use crate::profile;
use crate::state::AppState;
use crate::sync;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members", get(members).post(search_members))
        .route("/update_profile", post(update_profile))
        .route("/connect/{username}", post(connect))
        .route("/disconnect/{username}", post(disconnect))
        .route("/sync", post(sync_linked_accounts))
        .route("/{username}", get(show_profile))
}

#[derive(Deserialize, Default)]
struct MemberSearch {
    #[serde(default)]
    search_query: Option<String>,
}

/// GET /{username}
async fn show_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    flash: Flash,
) -> AppResult<Response> {
    if state.config.sync.on_profile_view {
        let target = {
            let conn = state.db.get()?;
            identity::find_profile_by_username(&conn, &username)?
        };
        if let Some(target) = target {
            sync::refresh_user(&state, &target.user_id).await?;
        }
    }

    let conn = state.db.get()?;
    let view = profile::assemble(&conn, &user.id, &username)?.ok_or(AppError::NotFound)?;
    let body = Json(json!({
        "view": view,
        "notice": flash.0,
    }));
    Ok(flash.respond(body))
}

fn member_listing(
    state: &AppState,
    user: &CurrentUser,
    search: &MemberSearch,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let members = identity::search_members(&conn, &user.id, search.search_query.as_deref())?;
    let viewer = identity::find_profile(&conn, &user.id)?.ok_or(AppError::NotFound)?;
    let connected: Vec<String> = graph::active_edges(&conn, &user.id)?
        .into_iter()
        .map(|edge| edge.connected_user_id)
        .collect();

    Ok(Json(json!({
        "members": members,
        "viewer": viewer,
        "connected_user_ids": connected,
    })))
}

/// GET /members?search_query=..
async fn members(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(search): Query<MemberSearch>,
) -> AppResult<Json<serde_json::Value>> {
    member_listing(&state, &user, &search)
}

/// POST /members (form field `search_query`)
async fn search_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(search): Form<MemberSearch>,
) -> AppResult<Json<serde_json::Value>> {
    member_listing(&state, &user, &search)
}

/// POST /update_profile (multipart: `full_name`, `bio`, `picture`)
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut update = ProfileUpdate::default();
    let mut picture = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "full_name" => update.full_name = Some(field.text().await?),
            "bio" => update.bio = Some(field.text().await?),
            "picture" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    picture = Some((file_name, bytes));
                }
            }
            _ => {}
        }
    }

    // The upload is only written once the whole form has been read.
    if let Some((file_name, bytes)) = &picture {
        let path = state
            .media
            .save_upload(MediaKind::ProfilePicture, file_name.as_deref(), bytes)
            .await?;
        update.picture_path = Some(path);
    }

    let updated: AppResult<_> = state.db.get().map_err(AppError::from).and_then(|conn| {
        let profile =
            identity::update_profile(&conn, &user.id, &update)?.ok_or(AppError::NotFound)?;
        Ok((conn, profile))
    });
    let (conn, profile) = match updated {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(path) = &update.picture_path {
                state.media.discard(path).await;
            }
            return Err(e);
        }
    };
    audit::record(
        &conn,
        &user.id,
        AuditAction::UpdateProfile,
        Some(json!({ "profile_score": profile.profile_score })),
    );
    tracing::info!(username = %user.username, score = profile.profile_score, "profile updated");

    Ok(redirect_with(
        &user.profile_path(),
        Notice::success("Profile updated"),
    ))
}

/// POST /connect/{username}
async fn connect(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let Some(target) = identity::find_profile_by_username(&conn, &username)? else {
        return Ok(redirect_with("/members", Notice::error("User not found")));
    };

    let outcome = graph::connect(&conn, &user.id, &target.user_id)?;
    if outcome.changed() {
        audit::record(
            &conn,
            &user.id,
            AuditAction::Connect,
            Some(json!({ "target": target.username })),
        );
        tracing::info!(username = %user.username, target = %target.username, "connected");
    }

    Ok(redirect_with(
        &format!("/{}", target.username),
        outcome.notice(&target.username),
    ))
}

/// POST /disconnect/{username}
async fn disconnect(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let Some(target) = identity::find_profile_by_username(&conn, &username)? else {
        return Ok(redirect_with(
            "/members",
            DisconnectOutcome::NotConnected.notice(),
        ));
    };

    let outcome = graph::disconnect(&conn, &user.id, &target.user_id)?;
    if outcome == DisconnectOutcome::Removed {
        tracing::info!(username = %user.username, target = %target.username, "disconnected");
    }

    Ok(redirect_with(
        &format!("/{}", target.username),
        outcome.notice(),
    ))
}

/// POST /sync: refresh the caller's cached platform data now.
async fn sync_linked_accounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    let report = sync::refresh_user(&state, &user.id).await?;
    tracing::info!(
        username = %user.username,
        refreshed = report.refreshed,
        unchanged = report.unchanged,
        "on-demand sync"
    );

    let notice = if report.refreshed > 0 {
        Notice::success(format!("Refreshed {} linked account(s)", report.refreshed))
    } else {
        Notice::info("No linked account data changed")
    };
    Ok(redirect_with(&user.profile_path(), notice))
}
