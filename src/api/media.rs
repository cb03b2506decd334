//! Uploaded media
//!
//! `GET /media/{*path}` serves files stored below `upload.path`. Stored
//! names are random, so responses are cacheable forever.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::path::{Component, PathBuf};
use tokio::fs;

use crate::api::middleware::AppState;
use crate::api::responses::PageError;

/// GET /media/{*path}
pub async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, PageError> {
    let relative = safe_relative_path(&path)
        .ok_or_else(|| PageError::NotFound(format!("media '{}'", path)))?;
    let file_path = state.upload_config.path.join(relative);

    match fs::read(&file_path).await {
        Ok(contents) => Ok((
            [
                (header::CONTENT_TYPE, content_type(&path)),
                (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
            ],
            contents,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PageError::NotFound(format!("media '{}'", path)))
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("Failed to read media file: {:?}", file_path))
            .into()),
    }
}

/// Only plain relative paths may reach the filesystem.
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let path = std::path::Path::new(path);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Content type from file extension
fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("posts/a.png"), Some(PathBuf::from("posts/a.png")));
        assert_eq!(safe_relative_path("./posts/a.png"), Some(PathBuf::from("posts/a.png")));
        assert_eq!(safe_relative_path("../secret"), None);
        assert_eq!(safe_relative_path("posts/../../secret"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("posts/a.PNG"), "image/png");
        assert_eq!(content_type("posts/a.jpeg"), "image/jpeg");
        assert_eq!(content_type("posts/a"), "application/octet-stream");
    }
}
