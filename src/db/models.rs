use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::content::ContentType;
use crate::oauth::Platform;

/// Lifecycle of rows that are retired instead of purged (connections, posts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Deleted,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl ToSql for Lifecycle {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Lifecycle {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(FromSqlError::Other(
                format!("unknown lifecycle state: {}", other).into(),
            )),
        }
    }
}

/// An identity joined with its profile fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub picture_path: Option<String>,
    pub qr_code_path: Option<String>,
    pub user_code: Option<String>,
    pub verified: bool,
    pub profile_score: i64,
    pub created_at: String,
}

/// Directed edge `user_id -> connected_user_id` in the social graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub id: String,
    pub user_id: String,
    pub connected_user_id: String,
    pub state: Lifecycle,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub author: String,
    pub content_type: ContentType,
    pub content: Option<String>,
    pub media_path: Option<String>,
    pub state: Lifecycle,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-platform account record created by the OAuth callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    pub token_type: Option<String>,
    pub expires_at: Option<String>,
    pub data: Option<serde_json::Value>,
    pub last_sync: Option<String>,
    pub is_linked: bool,
}
