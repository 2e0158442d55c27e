use crate::cache::CollectionCache;
use crate::collection::{CollectionMutator, ReorderCoordinator, ScopedCollectionReader};
use crate::config::CasebookConfig;
use crate::core::{CasebookError, ParentId, Result};
use crate::model::CaseStudyImage;
use crate::parent::CaseStudyRecords;
use crate::store::SharedStore;
use crate::upload::{AssetUploader, UploadFile, add_uploaded_image};
use log::info;
use std::sync::Arc;

/// Entry point for one admin session
///
/// Owns the session's cache: every component handed out shares it, so a
/// mutation made through one is observed by readers obtained from another.
/// Build one per login and [`close`](CasebookSession::close) it on logout.
///
/// # Examples
///
/// ```
/// use casebook::{CasebookConfig, CasebookSession, ImagePayload, InMemoryStore, ParentId};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> casebook::Result<()> {
/// let config = CasebookConfig::default();
/// let store = InMemoryStore::with_tables([
///     config.case_study_table.clone(),
///     config.image_table.clone(),
/// ]);
/// let session = CasebookSession::open(Arc::new(store), config)?;
///
/// let cs1 = ParentId::new("cs1");
/// let mut gallery = session.images(Some(cs1.clone()));
/// session
///     .image_mutator()
///     .add(&cs1, ImagePayload::new("https://cdn.example/hero.png"), None)
///     .await?;
///
/// assert_eq!(gallery.fetch().await?.len(), 1);
/// session.close();
/// # Ok(())
/// # }
/// ```
pub struct CasebookSession {
    store: SharedStore,
    cache: CollectionCache,
    config: CasebookConfig,
    uploader: Option<Arc<dyn AssetUploader>>,
}

impl CasebookSession {
    /// Opens a session against `store` with a fresh cache.
    pub fn open(store: SharedStore, config: CasebookConfig) -> Result<Self> {
        config.validate()?;
        let cache = CollectionCache::with_capacity(config.cache_capacity);
        info!(
            "casebook session opened: images='{}' case_studies='{}' reorder={:?}",
            config.image_table, config.case_study_table, config.reorder_strategy
        );
        Ok(Self {
            store,
            cache,
            config,
            uploader: None,
        })
    }

    /// Attaches the uploader used by [`upload_image`](Self::upload_image).
    pub fn with_uploader(mut self, uploader: Arc<dyn AssetUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn config(&self) -> &CasebookConfig {
        &self.config
    }

    pub fn cache(&self) -> &CollectionCache {
        &self.cache
    }

    /// Reader over the images of `parent_id`; `None` reads as empty.
    pub fn images(&self, parent_id: Option<ParentId>) -> ScopedCollectionReader<CaseStudyImage> {
        ScopedCollectionReader::new(
            self.store.clone(),
            self.cache.clone(),
            self.config.image_table.clone(),
            parent_id,
        )
    }

    pub fn image_mutator(&self) -> CollectionMutator<CaseStudyImage> {
        CollectionMutator::new(
            self.store.clone(),
            self.cache.clone(),
            self.config.image_table.clone(),
        )
    }

    pub fn image_reorder(&self) -> ReorderCoordinator<CaseStudyImage> {
        ReorderCoordinator::new(
            self.store.clone(),
            self.cache.clone(),
            self.config.image_table.clone(),
        )
        .strategy(self.config.reorder_strategy)
        .max_in_flight(self.config.max_in_flight)
    }

    pub fn records(&self) -> CaseStudyRecords {
        CaseStudyRecords::new(self.store.clone(), self.cache.clone(), &self.config)
    }

    /// Uploads `file` into the configured image folder and appends it to the
    /// images of `parent_id`.
    pub async fn upload_image(
        &self,
        parent_id: &ParentId,
        file: UploadFile,
        caption: Option<String>,
        alt_text: Option<String>,
    ) -> Result<CaseStudyImage> {
        let uploader = self
            .uploader
            .as_deref()
            .ok_or_else(|| CasebookError::UploadFailed("no uploader configured".to_string()))?;
        add_uploaded_image(
            &self.image_mutator(),
            uploader,
            &self.config.image_folder,
            parent_id,
            file,
            caption,
            alt_text,
        )
        .await
    }

    /// Ends the session. Readers still alive re-fetch instead of serving
    /// this session's cached rows.
    pub fn close(self) {
        let stats = self.cache.stats();
        self.cache.clear();
        info!(
            "casebook session closed after {} invalidations across {} scopes",
            stats.invalidations, stats.tracked_scopes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::upload::{InMemoryUploader, UploadError};

    fn session() -> CasebookSession {
        let config = CasebookConfig::default();
        let store = InMemoryStore::with_tables([
            config.case_study_table.clone(),
            config.image_table.clone(),
        ]);
        CasebookSession::open(Arc::new(store), config).unwrap()
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = CasebookConfig::default().results_capacity(0);
        let result = CasebookSession::open(Arc::new(InMemoryStore::new()), config);
        assert!(matches!(result, Err(CasebookError::Config(_))));
    }

    #[tokio::test]
    async fn upload_without_uploader_fails() {
        let err = session()
            .upload_image(&ParentId::new("cs1"), UploadFile::new("a.png", vec![0]), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CasebookError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn uploaded_image_is_appended() {
        let uploader = Arc::new(InMemoryUploader::new("assets"));
        let session = session().with_uploader(uploader.clone());
        let cs1 = ParentId::new("cs1");
        let mut gallery = session.images(Some(cs1.clone()));

        let image = session
            .upload_image(
                &cs1,
                UploadFile::new("hero shot.png", vec![7]).content_type("image/png"),
                Some("Hero".to_string()),
                None,
            )
            .await
            .unwrap();

        assert!(image.url.starts_with("memory://assets/case-studies/"));
        assert_eq!(uploader.object(&image.url).await.map(|f| f.bytes), Some(vec![7]));
        assert_eq!(gallery.fetch().await.unwrap(), vec![image]);
    }

    #[tokio::test]
    async fn failed_upload_creates_no_row() {
        let uploader = Arc::new(InMemoryUploader::new("assets"));
        uploader.fail_next(UploadError::Rejected("too large".to_string()));
        let session = session().with_uploader(uploader);
        let cs1 = ParentId::new("cs1");

        let err = session
            .upload_image(&cs1, UploadFile::new("a.png", vec![0]), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CasebookError::UploadFailed(_)));
        assert!(session.images(Some(cs1)).fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_invalidates_live_readers() {
        let session = session();
        let cs1 = ParentId::new("cs1");
        let mut gallery = session.images(Some(cs1));
        gallery.fetch().await.unwrap();
        assert!(!gallery.is_stale());

        session.close();
        assert!(gallery.is_stale());
    }
}
