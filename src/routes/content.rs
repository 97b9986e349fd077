use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditAction};
use crate::content::domain::{ensure_owner, validate_new, validate_update};
use crate::content::repository as posts;
use crate::content::ContentType;
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::media::MediaKind;
use crate::notice::{redirect_with, Flash, Notice};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", get(create_page).post(create))
        .route("/update/{id}", get(edit_page).post(update))
        .route("/delete/{id}", post(delete))
}

#[derive(Deserialize)]
struct UpdateForm {
    #[serde(default)]
    content: Option<String>,
}

/// Fields of the multipart create form.
#[derive(Default)]
struct Submission {
    content_type: Option<String>,
    content: Option<String>,
    file_name: Option<String>,
    file: Option<Vec<u8>>,
}

async fn read_submission(mut multipart: Multipart) -> AppResult<Submission> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "content_type" => submission.content_type = Some(field.text().await?),
            "content" => submission.content = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    submission.file_name = file_name;
                    submission.file = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }
    Ok(submission)
}

/// Active post that `user` owns. Missing is 404, foreign is 403.
fn owned_post(state: &AppState, user: &CurrentUser, id: &str) -> AppResult<Post> {
    let conn = state.db.get()?;
    let post = posts::find_post(&conn, id)?.ok_or(AppError::NotFound)?;
    ensure_owner(&post, &user.id).inspect_err(|_| {
        tracing::warn!(username = %user.username, post_id = id, "refused post mutation by non-owner");
    })?;
    Ok(post)
}

/// GET /create: the caller's post statistics.
async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let stats = posts::stats(&conn, &user.id)?;
    let body = Json(json!({
        "stats": stats,
        "notice": flash.0,
    }));
    Ok(flash.respond(body))
}

/// POST /create (multipart: `content_type`, `content`, `file`)
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let submission = read_submission(multipart).await?;
    let content_type: ContentType = submission
        .content_type
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("content_type is required".into()))?
        .parse()?;

    let content = match validate_new(
        content_type,
        submission.content.as_deref(),
        submission.file.is_some(),
    ) {
        Ok(content) => content,
        Err(e) => return Ok(redirect_with("/create", Notice::warning(e.to_string()))),
    };

    let media_path = match (content_type.has_media(), &submission.file) {
        (true, Some(bytes)) => Some(
            state
                .media
                .save_upload(MediaKind::PostMedia, submission.file_name.as_deref(), bytes)
                .await?,
        ),
        _ => None,
    };

    let created: AppResult<_> = state.db.get().map_err(AppError::from).and_then(|conn| {
        let post_id = posts::create_post(
            &conn,
            &user.id,
            content_type,
            content.as_deref(),
            media_path.as_deref(),
        )?;
        Ok((conn, post_id))
    });
    let (conn, post_id) = match created {
        Ok(created) => created,
        Err(e) => {
            if let Some(path) = &media_path {
                state.media.discard(path).await;
            }
            return Err(e);
        }
    };
    audit::record(
        &conn,
        &user.id,
        AuditAction::Post,
        Some(json!({ "post_id": post_id, "content_type": content_type })),
    );
    tracing::info!(username = %user.username, post_id = %post_id, %content_type, "post created");

    Ok(redirect_with(
        "/create",
        Notice::success(format!(
            "{} post created successfully.",
            content_type.label()
        )),
    ))
}

/// GET /update/{id}: the post, for its owner.
async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    flash: Flash,
) -> AppResult<Response> {
    let post = owned_post(&state, &user, &id)?;
    let body = Json(json!({
        "post": post,
        "notice": flash.0,
    }));
    Ok(flash.respond(body))
}

/// POST /update/{id}: replace the text body or caption.
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<UpdateForm>,
) -> AppResult<Response> {
    let post = owned_post(&state, &user, &id)?;

    let content = match validate_update(post.content_type, form.content.as_deref()) {
        Ok(content) => content,
        Err(e) => {
            return Ok(redirect_with(
                &format!("/update/{}", id),
                Notice::warning(e.to_string()),
            ))
        }
    };

    let conn = state.db.get()?;
    posts::update_content(&conn, &post.id, &content)?;
    tracing::info!(username = %user.username, post_id = %post.id, "post updated");

    Ok(redirect_with(
        &user.profile_path(),
        Notice::success(format!(
            "Your {} post was updated successfully.",
            post.content_type
        )),
    ))
}

/// POST /delete/{id}
async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = owned_post(&state, &user, &id)?;

    let conn = state.db.get()?;
    posts::soft_delete(&conn, &post.id)?;
    tracing::info!(username = %user.username, post_id = %post.id, "post deleted");

    Ok(redirect_with(
        &user.profile_path(),
        Notice::success("Post deleted successfully."),
    ))
}
