// ============================================================================
// Casebook Library
// ============================================================================

pub mod cache;
pub mod collection;
pub mod config;
pub mod core;
pub mod facade;
pub mod model;
pub mod parent;
pub mod store;
pub mod upload;

// Re-export main types for convenience
pub use self::core::{
    CasebookError, ChildId, CollectionKind, Filter, OrderBy, ParentId, ReorderFailure, Result,
    Row, ScopeKey, StoreError,
};
pub use facade::CasebookSession;

pub use cache::{CacheStats, CollectionCache};
pub use config::CasebookConfig;

// Re-export collection API
pub use collection::{
    CollectionMutator, InlineEntry, InlineList, ReadState, ReorderCoordinator, ReorderOutcome,
    ReorderRequest, ReorderStrategy, ScopedCollectionReader,
};

pub use model::{
    CaseStudy, CaseStudyImage, Faq, FaqField, ImagePatch, ImagePayload, PersistedChild,
    ResultField, ResultMetric,
};
pub use parent::{CaseStudyRecords, case_study_row};
pub use store::{FaultInjectingStore, InMemoryStore, RemoteStore, SharedStore, StoreOp};
pub use upload::{AssetUploader, InMemoryUploader, UploadError, UploadFile};
