// Content store: posts with a fixed type tag and an explicit lifecycle.
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::content::domain::ContentType;
use crate::db::models::{Lifecycle, Post};

const POST_SELECT: &str = "SELECT p.id, p.user_id, u.username, p.content_type, p.content, \
     p.media_path, p.state, p.created_at, p.updated_at \
     FROM posts p JOIN users u ON u.id = p.user_id";

const RECENT_LIMIT: usize = 5;

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author: row.get(2)?,
        content_type: row.get(3)?,
        content: row.get(4)?,
        media_path: row.get(5)?,
        state: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Per-owner post counts shown on the create page.
#[derive(Debug, Clone, Serialize)]
pub struct PostStats {
    pub total: i64,
    pub text: i64,
    pub image: i64,
    pub video: i64,
    pub recent: Vec<Post>,
    pub latest: Option<Post>,
}

pub fn create_post(
    conn: &Connection,
    user_id: &str,
    content_type: ContentType,
    content: Option<&str>,
    media_path: Option<&str>,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, user_id, content_type, content, media_path, state) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, user_id, content_type, content, media_path, Lifecycle::Active],
    )?;
    Ok(id)
}

/// Active post by id. Deleted posts are treated as missing.
pub fn find_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1 AND p.state = ?2", POST_SELECT),
        params![post_id, Lifecycle::Active],
        post_from_row,
    )
    .optional()
}

/// Replace the text body or caption. The type tag is never touched.
pub fn update_content(conn: &Connection, post_id: &str, content: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE posts SET content = ?1, updated_at = datetime('now') \
         WHERE id = ?2 AND state = ?3",
        params![content, post_id, Lifecycle::Active],
    )?;
    Ok(changed > 0)
}

pub fn soft_delete(conn: &Connection, post_id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE posts SET state = ?1, updated_at = datetime('now') \
         WHERE id = ?2 AND state = ?3",
        params![Lifecycle::Deleted, post_id, Lifecycle::Active],
    )?;
    Ok(changed > 0)
}

/// Active posts of `user_id`, newest first.
pub fn list_by_owner(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE p.user_id = ?1 AND p.state = ?2 \
         ORDER BY p.created_at DESC, p.rowid DESC",
        POST_SELECT
    ))?;
    let posts = stmt
        .query_map(params![user_id, Lifecycle::Active], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn stats(conn: &Connection, user_id: &str) -> rusqlite::Result<PostStats> {
    let (total, text, image, video) = conn.query_row(
        "SELECT COUNT(*), \
                COALESCE(SUM(content_type = 'text'), 0), \
                COALESCE(SUM(content_type = 'image'), 0), \
                COALESCE(SUM(content_type = 'video'), 0) \
         FROM posts WHERE user_id = ?1 AND state = ?2",
        params![user_id, Lifecycle::Active],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let mut recent = list_by_owner(conn, user_id)?;
    recent.truncate(RECENT_LIMIT);
    let latest = recent.first().cloned();

    Ok(PostStats {
        total,
        text,
        image,
        video,
        recent,
        latest,
    })
}

/// Newest active posts written by anyone `user_id` has an active edge to.
pub fn recent_from_connections_of(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE p.state = ?2 AND p.user_id IN ( \
             SELECT connected_user_id FROM connections WHERE user_id = ?1 AND state = ?2 \
         ) \
         ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?3",
        POST_SELECT
    ))?;
    let posts = stmt
        .query_map(
            params![user_id, Lifecycle::Active, limit as i64],
            post_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
