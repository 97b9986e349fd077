// Append-only record of user actions. Writes are best-effort.
use rusqlite::{params, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    UpdateProfile,
    Post,
    Connect,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::UpdateProfile => "update_profile",
            Self::Post => "post",
            Self::Connect => "connect",
        }
    }
}

/// Append an entry. A failed write is logged and swallowed.
pub fn record(
    conn: &Connection,
    user_id: &str,
    action: AuditAction,
    metadata: Option<serde_json::Value>,
) {
    let metadata = metadata.map(|m| m.to_string());
    if let Err(e) = conn.execute(
        "INSERT INTO audit_log (user_id, action, metadata) VALUES (?1, ?2, ?3)",
        params![user_id, action.as_str(), metadata],
    ) {
        tracing::warn!(user_id, action = action.as_str(), "audit write failed: {}", e);
    }
}
