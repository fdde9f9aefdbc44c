use crate::config::UploadsConfig;
use indexmap::IndexMap;
use retina_models::{
    config::ModelInfo, BatchError, BatchTimings, InferenceService, ModelError, Predictions,
};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;
use zip::ZipArchive;

const BATCH_DIR_PREFIX: &str = "batch_upload_";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing multipart field `file`")]
    MissingFile,
    #[error("Uploaded file has no usable name")]
    MissingFilename,
    #[error("Failed to read multipart body: {0}")]
    Multipart(String),
    #[error("Failed to store upload: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{0}")]
    EmptyBatch(#[from] BatchError),
    #[error("Invalid image: {0}")]
    InvalidImage(ModelError),
    #[error("Inference failed: {0}")]
    Inference(ModelError),
    #[error("Inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ModelError> for UploadError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ImageOpen { .. } | ModelError::ImageDecode(_) => {
                UploadError::InvalidImage(err)
            }
            other => UploadError::Inference(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    SingleImage,
    BatchZip,
}

impl UploadMode {
    pub fn from_filename(filename: &str) -> Self {
        if filename.to_lowercase().ends_with(".zip") {
            UploadMode::BatchZip
        } else {
            UploadMode::SingleImage
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::SingleImage => "single",
            UploadMode::BatchZip => "folder",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode")]
pub enum UploadResponse {
    #[serde(rename = "single")]
    Single {
        image_file: String,
        results: Predictions,
    },
    #[serde(rename = "folder")]
    Folder {
        total_images: usize,
        avg_times: IndexMap<String, f64>,
        model_info: IndexMap<String, ModelInfo>,
    },
}

impl UploadResponse {
    pub fn mode(&self) -> UploadMode {
        match self {
            UploadResponse::Single { .. } => UploadMode::SingleImage,
            UploadResponse::Folder { .. } => UploadMode::BatchZip,
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            UploadResponse::Single { .. } => 1,
            UploadResponse::Folder { total_images, .. } => *total_images,
        }
    }
}

/// Persists uploads and runs them through every registered model.
#[derive(Debug, Clone)]
pub struct UploadHandler {
    inference: InferenceService,
    upload_dir: PathBuf,
    image_extensions: Vec<String>,
}

impl UploadHandler {
    pub fn new(inference: InferenceService, uploads: &UploadsConfig) -> io::Result<Self> {
        fs::create_dir_all(&uploads.upload_dir)?;
        Ok(Self {
            inference,
            upload_dir: uploads.upload_dir.clone(),
            image_extensions: uploads
                .image_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.inference.registry().names()
    }

    pub fn handle(&self, filename: &str, data: &[u8]) -> Result<UploadResponse, UploadError> {
        self.handle_observed(filename, data, |_| {})
    }

    /// Like [`UploadHandler::handle`], calling `observe` with the predictions of every image.
    pub fn handle_observed<F>(
        &self,
        filename: &str,
        data: &[u8],
        mut observe: F,
    ) -> Result<UploadResponse, UploadError>
    where
        F: FnMut(&Predictions),
    {
        let filename = sanitize_filename(filename).ok_or(UploadError::MissingFilename)?;

        match UploadMode::from_filename(&filename) {
            UploadMode::SingleImage => self.handle_single(filename, data, &mut observe),
            UploadMode::BatchZip => self.handle_batch(&filename, data, &mut observe),
        }
    }

    fn handle_single(
        &self,
        filename: String,
        data: &[u8],
        observe: &mut dyn FnMut(&Predictions),
    ) -> Result<UploadResponse, UploadError> {
        let path = self.upload_dir.join(&filename);
        fs::write(&path, data)?;
        tracing::debug!("Stored {} bytes at {:?}", data.len(), path);

        // Same-named uploads overwrite each other on disk, so score the bytes we received.
        let results = self.inference.predict_bytes(data)?;
        observe(&results);

        Ok(UploadResponse::Single {
            image_file: filename,
            results,
        })
    }

    fn handle_batch(
        &self,
        filename: &str,
        data: &[u8],
        observe: &mut dyn FnMut(&Predictions),
    ) -> Result<UploadResponse, UploadError> {
        let workdir = tempfile::Builder::new()
            .prefix(BATCH_DIR_PREFIX)
            .tempdir_in(&self.upload_dir)?;

        let zip_path = workdir.path().join(filename);
        fs::write(&zip_path, data)?;

        let images = self.extract_images(&zip_path, &workdir.path().join("images"))?;
        tracing::info!("Extracted {} images from {}", images.len(), filename);

        let mut timings = BatchTimings::new(self.inference.registry().names());
        for image in &images {
            let predictions = self.inference.predict_path(image)?;
            observe(&predictions);
            timings.record(&predictions);
        }

        let avg_times = timings.averages()?;

        Ok(UploadResponse::Folder {
            total_images: timings.images(),
            avg_times,
            model_info: self.inference.model_info(),
        })
    }

    /// Extracts image entries from the archive, flattening sub-folders.
    pub fn extract_images(&self, zip_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, UploadError> {
        fs::create_dir_all(dest)?;

        let file = File::open(zip_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let mut images = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }

            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!("Skipping archive entry with unsafe path: {}", entry.name());
                continue;
            };
            if is_resource_fork(&relative) || !self.is_image(&relative) {
                continue;
            }
            let Some(file_name) = relative.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            // index prefix keeps same-named files from different folders apart
            let target = dest.join(format!("{:05}_{}", index, file_name));
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            images.push(target);
        }

        Ok(images)
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.image_extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

fn is_resource_fork(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == "__MACOSX")
        || path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("._"))
            .unwrap_or(false)
}

/// Keeps only the final path component of a client-supplied file name.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
