use crate::{server::SharedState, upload::sanitize_filename};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::instrument;

fn content_type(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Serves back an image stored by a single-image upload.
#[instrument(skip(state))]
pub async fn uploaded_file(
    State(state): State<SharedState>,
    Path(file): Path<String>,
) -> Response {
    let Some(name) = sanitize_filename(&file).filter(|name| *name == file) else {
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    };

    let path = state.upload_handler.upload_dir().join(&name);
    match tokio::fs::read(&path).await {
        Ok(data) => ([(header::CONTENT_TYPE, content_type(&name))], data).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to read {:?}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("eye.PNG"), "image/png");
        assert_eq!(content_type("eye.jpeg"), "image/jpeg");
        assert_eq!(content_type("eye.bmp"), "application/octet-stream");
    }
}
