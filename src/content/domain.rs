use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::Post;
use crate::error::AppError;

/// Post payload kind. Fixed when the post is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Image and video posts carry a media file; their text is a caption.
    pub fn has_media(&self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Capitalized tag for user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(AppError::BadRequest(format!("unknown content type: {}", other))),
        }
    }
}

impl ToSql for ContentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ContentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(FromSqlError::Other(
                format!("unknown content type: {}", other).into(),
            )),
        }
    }
}

/// Submission problems. These are reported to the user, never persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Text content cannot be empty.")]
    EmptyText,

    #[error("{} upload failed. No {} provided.", .0.label(), .0.as_str())]
    MissingMedia(ContentType),

    #[error("{} caption cannot be empty.", .0.label())]
    EmptyCaption(ContentType),
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Check a new post. Returns the trimmed text payload, if any.
pub fn validate_new(
    content_type: ContentType,
    text: Option<&str>,
    has_file: bool,
) -> Result<Option<String>, ContentError> {
    match content_type {
        ContentType::Text => non_blank(text)
            .map(|t| Some(t.to_string()))
            .ok_or(ContentError::EmptyText),
        _ if !has_file => Err(ContentError::MissingMedia(content_type)),
        _ => Ok(non_blank(text).map(str::to_string)),
    }
}

/// Check an edit. Text posts need a body, media posts need a caption.
pub fn validate_update(content_type: ContentType, text: Option<&str>) -> Result<String, ContentError> {
    match non_blank(text) {
        Some(t) => Ok(t.to_string()),
        None if content_type.has_media() => Err(ContentError::EmptyCaption(content_type)),
        None => Err(ContentError::EmptyText),
    }
}

/// Refuse mutation unless `user_id` owns the post.
pub fn ensure_owner(post: &Post, user_id: &str) -> Result<(), AppError> {
    if post.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} does not own post {}",
            user_id, post.id
        )))
    }
}
