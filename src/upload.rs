//! Upload collaborator: turns a file into a public URL that image rows store.

use crate::collection::CollectionMutator;
use crate::core::{CasebookError, ParentId, Result};
use crate::model::{CaseStudyImage, ImagePayload};
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex");
    static ref FOLDER_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_-]+(/[A-Za-z0-9_-]+)*$").expect("static regex");
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Invalid folder '{0}'")]
    InvalidFolder(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Upload service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Stores a file under a folder and returns a publicly addressable URL.
///
/// The bytes are never inspected by this crate.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, file: UploadFile, folder: &str) -> std::result::Result<String, UploadError>;
}

/// Replaces runs of characters outside `[A-Za-z0-9._-]` with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(name.trim(), "-");
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Process-local uploader keeping objects in memory.
///
/// URLs look like `memory://<bucket>/<folder>/<uuid>-<file name>`.
#[derive(Clone)]
pub struct InMemoryUploader {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, UploadFile>>>,
    pending_failure: Arc<Mutex<Option<UploadError>>>,
}

impl InMemoryUploader {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            pending_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes the next upload fail with `error`.
    pub fn fail_next(&self, error: UploadError) {
        if let Ok(mut pending) = self.pending_failure.lock() {
            *pending = Some(error);
        }
    }

    pub async fn object(&self, url: &str) -> Option<UploadFile> {
        self.objects.read().await.get(url).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl AssetUploader for InMemoryUploader {
    async fn upload(&self, file: UploadFile, folder: &str) -> std::result::Result<String, UploadError> {
        let pending = self
            .pending_failure
            .lock()
            .map_err(|e| UploadError::Unavailable(e.to_string()))?
            .take();
        if let Some(error) = pending {
            return Err(error);
        }
        if !FOLDER_PATTERN.is_match(folder) {
            return Err(UploadError::InvalidFolder(folder.to_string()));
        }

        let url = format!(
            "memory://{}/{}/{}-{}",
            self.bucket,
            folder,
            uuid::Uuid::new_v4(),
            sanitize_file_name(&file.file_name)
        );
        self.objects.write().await.insert(url.clone(), file);
        Ok(url)
    }
}

/// Uploads `file` and adds it as the last image of `parent_id`.
///
/// Nothing is written to the image table when the upload fails.
pub async fn add_uploaded_image(
    images: &CollectionMutator<CaseStudyImage>,
    uploader: &dyn AssetUploader,
    folder: &str,
    parent_id: &ParentId,
    file: UploadFile,
    caption: Option<String>,
    alt_text: Option<String>,
) -> Result<CaseStudyImage> {
    let url = uploader
        .upload(file, folder)
        .await
        .map_err(|e| CasebookError::UploadFailed(e.to_string()))?;
    debug!("uploaded image for {} to {}", parent_id, url);

    let payload = ImagePayload {
        url,
        caption,
        alt_text,
    };
    images.add(parent_id, payload, None).await
}
