//! File-backed media store for uploads and generated QR badges.
//!
//! Rows reference media by a path relative to the store root, e.g.
//! `posts/media/0190...e1.jpg`.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    ProfilePicture,
    PostMedia,
    QrCode,
}

impl MediaKind {
    fn dir(&self) -> &'static str {
        match self {
            Self::ProfilePicture => "profile_pictures",
            Self::PostMedia => "posts/media",
            Self::QrCode => "qrcodes",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an uploaded file under a fresh name, keeping a sanitized extension.
    /// Returns the relative path.
    pub async fn save_upload(
        &self,
        kind: MediaKind,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let mut name = uuid::Uuid::now_v7().to_string();
        if let Some(ext) = original_name.and_then(sanitized_extension) {
            name.push('.');
            name.push_str(&ext);
        }
        self.write(kind, &name, bytes).await
    }

    /// Write the QR badge for `username`, replacing any previous one.
    pub async fn save_qr_badge(&self, username: &str, svg: &str) -> std::io::Result<String> {
        let name = format!("{}_qr.svg", username);
        self.write(MediaKind::QrCode, &name, svg.as_bytes()).await
    }

    async fn write(&self, kind: MediaKind, name: &str, bytes: &[u8]) -> std::io::Result<String> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(name), bytes).await?;
        Ok(format!("{}/{}", kind.dir(), name))
    }

    /// Remove a stored file whose row was never written. Failures are logged.
    pub async fn discard(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %relative, "failed to remove orphaned upload: {}", e);
        }
    }

    /// Absolute path for a stored relative path. `None` for anything that
    /// would escape the root.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        if relative.is_empty()
            || !path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(path))
    }
}

/// Lowercased extension of `name`, only if it is short and alphanumeric.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}
