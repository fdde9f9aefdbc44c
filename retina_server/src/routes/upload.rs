use crate::{
    server::SharedState,
    upload::{UploadError, UploadResponse},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::instrument;

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match self {
            UploadError::MissingFile
            | UploadError::MissingFilename
            | UploadError::Multipart(_)
            | UploadError::Zip(_)
            | UploadError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            UploadError::EmptyBatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Io(_) | UploadError::Inference(_) | UploadError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("Upload failed: {}", self);
        } else {
            tracing::warn!("Upload rejected: {}", self);
        }

        (status, self.to_string()).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    state.metrics.record_request("/upload");

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or(UploadError::MissingFilename)?;
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?;
        upload = Some((filename, data));
        break;
    }
    let (filename, data) = upload.ok_or(UploadError::MissingFile)?;

    tracing::info!("Received {} ({} bytes)", filename, data.len());

    let handler = state.upload_handler.clone();
    let metrics = state.metrics.clone();
    let response = tokio::task::spawn_blocking(move || {
        handler.handle_observed(&filename, &data, |predictions| {
            for (model, prediction) in predictions {
                metrics.record_inference_duration(prediction.inference_time, model);
            }
        })
    })
    .await??;

    state
        .metrics
        .record_images(response.image_count() as u64, response.mode().as_str());

    Ok(Json(response))
}
