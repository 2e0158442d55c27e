//! Backing store contract and the in-process implementations used by
//! sessions and tests.

pub mod faults;
pub mod memory;

pub use faults::{FaultInjectingStore, StoreOp};
pub use memory::InMemoryStore;

use crate::core::{Filter, OrderBy, Row, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Row-oriented persistent store addressed by table name.
///
/// Implementations must provide read-after-write consistency: a `select`
/// issued after a write has returned observes that write.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows matching `filter`, sorted by `order_by` when given. Rows that
    /// compare equal keep insertion order.
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> StoreResult<Vec<Row>>;

    /// Inserts a row and returns it as stored, including the assigned `id`.
    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row>;

    /// Merges `patch` into the row with the given id and returns the result.
    async fn update(&self, table: &str, id: &str, patch: Row) -> StoreResult<Row>;

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()>;

    /// Applies several patches as one all-or-nothing write.
    ///
    /// Stores without multi-row atomicity keep the default, which reports
    /// `StoreError::Unsupported`.
    async fn update_many(
        &self,
        table: &str,
        _patches: Vec<(String, Row)>,
    ) -> StoreResult<Vec<Row>> {
        Err(StoreError::Unsupported(format!(
            "atomic multi-row update on '{}'",
            table
        )))
    }
}

/// Shared handle to a store, as held by every collection component.
pub type SharedStore = Arc<dyn RemoteStore>;
