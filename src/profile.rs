//! Read-only profile view composed from independent queries.

use rusqlite::Connection;
use serde::Serialize;

use crate::content::repository as posts;
use crate::db::models::{LinkedAccount, Post, Profile};
use crate::graph::repository as graph;
use crate::identity::repository as identity;
use crate::oauth::accounts;

/// Posts pulled from the target's connections.
pub const CONNECTION_FEED_LIMIT: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub viewer: Profile,
    pub is_own_profile: bool,
    /// Whether the viewer has an active edge to the target.
    pub is_connected: bool,
    pub posts: Vec<Post>,
    /// Cached provider data as stored. The route refreshes it first.
    pub linked_accounts: Vec<LinkedAccount>,
    pub recent_connection_posts: Vec<Post>,
    pub connected_users: Vec<String>,
}

/// Assemble the view of `username` as seen by `viewer_id`.
/// `None` when either identity is missing.
pub fn assemble(
    conn: &Connection,
    viewer_id: &str,
    username: &str,
) -> rusqlite::Result<Option<ProfileView>> {
    let Some(profile) = identity::find_profile_by_username(conn, username)? else {
        return Ok(None);
    };
    let Some(viewer) = identity::find_profile(conn, viewer_id)? else {
        return Ok(None);
    };

    let target_id = profile.user_id.clone();
    Ok(Some(ProfileView {
        is_own_profile: viewer.user_id == target_id,
        is_connected: graph::is_connected(conn, viewer_id, &target_id)?,
        posts: posts::list_by_owner(conn, &target_id)?,
        linked_accounts: accounts::linked_accounts(conn, &target_id)?,
        recent_connection_posts: posts::recent_from_connections_of(
            conn,
            &target_id,
            CONNECTION_FEED_LIMIT,
        )?,
        connected_users: graph::connected_usernames(conn, &target_id)?,
        profile,
        viewer,
    }))
}
