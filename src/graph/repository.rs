// Social graph store: one directed edge per (user, target) pair.
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{ConnectionEdge, Lifecycle};
use crate::graph::domain::{ConnectOutcome, DisconnectOutcome};

fn edge_state(
    conn: &Connection,
    user_id: &str,
    target_id: &str,
) -> rusqlite::Result<Option<Lifecycle>> {
    conn.query_row(
        "SELECT state FROM connections WHERE user_id = ?1 AND connected_user_id = ?2",
        params![user_id, target_id],
        |row| row.get(0),
    )
    .optional()
}

/// Create the edge, reactivate a deleted one, or leave an active one alone.
pub fn connect(
    conn: &Connection,
    user_id: &str,
    target_id: &str,
) -> rusqlite::Result<ConnectOutcome> {
    if user_id == target_id {
        return Ok(ConnectOutcome::SelfConnection);
    }

    match edge_state(conn, user_id, target_id)? {
        Some(Lifecycle::Active) => Ok(ConnectOutcome::AlreadyConnected),
        Some(Lifecycle::Deleted) => {
            conn.execute(
                "UPDATE connections SET state = ?1 \
                 WHERE user_id = ?2 AND connected_user_id = ?3",
                params![Lifecycle::Active, user_id, target_id],
            )?;
            Ok(ConnectOutcome::Reactivated)
        }
        None => {
            let changed = conn.execute(
                "INSERT INTO connections (id, user_id, connected_user_id, state) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(user_id, connected_user_id) DO NOTHING",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    user_id,
                    target_id,
                    Lifecycle::Active
                ],
            )?;
            // A concurrent request may have inserted the pair first.
            if changed == 0 {
                Ok(ConnectOutcome::AlreadyConnected)
            } else {
                Ok(ConnectOutcome::Created)
            }
        }
    }
}

/// Mark an active edge deleted.
pub fn disconnect(
    conn: &Connection,
    user_id: &str,
    target_id: &str,
) -> rusqlite::Result<DisconnectOutcome> {
    let changed = conn.execute(
        "UPDATE connections SET state = ?1 \
         WHERE user_id = ?2 AND connected_user_id = ?3 AND state = ?4",
        params![Lifecycle::Deleted, user_id, target_id, Lifecycle::Active],
    )?;
    Ok(if changed > 0 {
        DisconnectOutcome::Removed
    } else {
        DisconnectOutcome::NotConnected
    })
}

/// Whether `user_id` has an active edge to `target_id`. Directional.
pub fn is_connected(conn: &Connection, user_id: &str, target_id: &str) -> rusqlite::Result<bool> {
    Ok(edge_state(conn, user_id, target_id)? == Some(Lifecycle::Active))
}

/// Active outgoing edges of `user_id`, oldest first.
pub fn active_edges(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<ConnectionEdge>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, connected_user_id, state, created_at FROM connections \
         WHERE user_id = ?1 AND state = ?2 ORDER BY created_at, rowid",
    )?;
    let edges = stmt
        .query_map(params![user_id, Lifecycle::Active], |row| {
            Ok(ConnectionEdge {
                id: row.get(0)?,
                user_id: row.get(1)?,
                connected_user_id: row.get(2)?,
                state: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// Usernames `user_id` is actively connected to.
pub fn connected_usernames(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT u.username FROM connections c JOIN users u ON u.id = c.connected_user_id \
         WHERE c.user_id = ?1 AND c.state = ?2 ORDER BY c.created_at, c.rowid",
    )?;
    let names = stmt
        .query_map(params![user_id, Lifecycle::Active], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
