use super::types::{ChildId, ParentId, ScopeKey};
use thiserror::Error;

/// Failure reported by a `RemoteStore` implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Row '{id}' not found in table '{table}'")]
    NotFound { table: String, id: String },

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// One order update that did not land during a per-item reorder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderFailure {
    pub id: ChildId,
    pub order: i64,
    pub error: StoreError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CasebookError {
    #[error("Failed to fetch {scope}: {source}")]
    FetchFailed {
        scope: ScopeKey,
        #[source]
        source: StoreError,
    },

    #[error("Failed to insert into '{table}' for parent '{parent_id}': {source}")]
    InsertFailed {
        table: String,
        parent_id: ParentId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to update '{id}' in '{table}': {source}")]
    UpdateFailed {
        table: String,
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to delete '{id}' from '{table}': {source}")]
    DeleteFailed {
        table: String,
        id: String,
        #[source]
        source: StoreError,
    },

    /// The all-or-nothing batch for a reorder was refused; nothing changed.
    #[error("Reorder of '{parent_id}' in '{table}' failed: {source}")]
    ReorderFailed {
        table: String,
        parent_id: ParentId,
        #[source]
        source: StoreError,
    },

    /// Some order updates landed and some did not; siblings are in a mixed state.
    /// Re-sending the same full move list converges.
    #[error(
        "Reorder of '{parent_id}' partially applied: {} applied, {} failed",
        .applied.len(),
        .failed.len()
    )]
    PartialReorderFailure {
        parent_id: ParentId,
        applied: Vec<ChildId>,
        failed: Vec<ReorderFailure>,
    },

    #[error("Invalid reorder request: {0}")]
    InvalidReorder(String),

    #[error("Index {index} out of range for inline list of length {len}")]
    InvalidIndex { index: usize, len: usize },

    #[error("Inline list holds at most {capacity} entries, got {len}")]
    CapacityExceeded { capacity: usize, len: usize },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CasebookError {
    /// Underlying store failure, when there is exactly one.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::FetchFailed { source, .. }
            | Self::InsertFailed { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::ReorderFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_partial_reorder(&self) -> bool {
        matches!(self, Self::PartialReorderFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, CasebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_reorder_message_counts_both_sides() {
        let err = CasebookError::PartialReorderFailure {
            parent_id: ParentId::new("cs1"),
            applied: vec![ChildId::new("a"), ChildId::new("c")],
            failed: vec![ReorderFailure {
                id: ChildId::new("b"),
                order: 2,
                error: StoreError::Unavailable("timeout".to_string()),
            }],
        };

        assert_eq!(
            err.to_string(),
            "Reorder of 'cs1' partially applied: 2 applied, 1 failed"
        );
        assert!(err.is_partial_reorder());
        assert!(err.store_error().is_none());
    }

    #[test]
    fn store_error_is_exposed_for_single_row_failures() {
        let err = CasebookError::DeleteFailed {
            table: "case_study_images".to_string(),
            id: "x".to_string(),
            source: StoreError::NotFound {
                table: "case_study_images".to_string(),
                id: "x".to_string(),
            },
        };

        assert!(matches!(
            err.store_error(),
            Some(StoreError::NotFound { .. })
        ));
    }
}
