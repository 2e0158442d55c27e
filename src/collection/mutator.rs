use crate::cache::CollectionCache;
use crate::core::{
    CasebookError, ChildId, Filter, ID_COLUMN, OrderBy, ParentId, Result, Row, ScopeKey,
    StoreError, row_from, row_into,
};
use crate::model::{ChildPatch, PersistedChild};
use crate::store::SharedStore;
use log::{debug, warn};
use serde_json::Value;
use std::marker::PhantomData;

/// Adds, edits and deletes single children of a parent.
///
/// Every successful call invalidates the parent's scope before it returns,
/// so a read issued afterwards never sees the previous state.
pub struct CollectionMutator<C: PersistedChild> {
    store: SharedStore,
    cache: CollectionCache,
    table: String,
    _child: PhantomData<fn() -> C>,
}

impl<C: PersistedChild> Clone for CollectionMutator<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            table: self.table.clone(),
            _child: PhantomData,
        }
    }
}

impl<C: PersistedChild> CollectionMutator<C> {
    pub fn new(store: SharedStore, cache: CollectionCache, table: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            table: table.into(),
            _child: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates a child of `parent_id`.
    ///
    /// Without an explicit order the child is appended: it gets one past the
    /// highest sibling order, or 0 for the first child.
    pub async fn add(
        &self,
        parent_id: &ParentId,
        payload: C::Payload,
        order: Option<i64>,
    ) -> Result<C> {
        let insert_failed = |source: StoreError| CasebookError::InsertFailed {
            table: self.table.clone(),
            parent_id: parent_id.clone(),
            source,
        };

        let order = match order {
            Some(order) => order,
            None => self.next_order(parent_id).await.map_err(insert_failed)?,
        };

        let mut row = row_from(&payload).map_err(insert_failed)?;
        if row.contains_key(ID_COLUMN) || row.contains_key(C::PARENT_COLUMN) {
            return Err(insert_failed(StoreError::Rejected(
                "payload must not carry the id or parent reference".to_string(),
            )));
        }
        row.insert(
            C::PARENT_COLUMN.to_string(),
            Value::String(parent_id.as_str().to_string()),
        );
        row.insert(C::ORDER_COLUMN.to_string(), Value::from(order));

        let stored = self
            .store
            .insert(&self.table, row)
            .await
            .map_err(insert_failed)?;
        self.cache
            .invalidate(&ScopeKey::new(parent_id.clone(), C::KIND));

        let created: C = row_into(stored).map_err(insert_failed)?;
        debug!(
            "added {} to '{}' under {} at order {}",
            created.id(),
            self.table,
            parent_id,
            order
        );
        Ok(created)
    }

    /// Merges the fields present in `patch` into child `id`.
    pub async fn update(&self, id: &ChildId, patch: C::Patch) -> Result<C> {
        if patch.is_empty() {
            return Err(self.update_failed(id, StoreError::Rejected("empty patch".to_string())));
        }
        let row = row_from(&patch).map_err(|source| self.update_failed(id, source))?;
        if row.contains_key(ID_COLUMN) || row.contains_key(C::PARENT_COLUMN) {
            return Err(self.update_failed(
                id,
                StoreError::Rejected("id and parent reference are immutable".to_string()),
            ));
        }
        self.write_patch(id, row).await
    }

    /// Moves child `id` to `order` without touching its payload.
    pub async fn set_order(&self, id: &ChildId, order: i64) -> Result<C> {
        self.write_patch(id, order_patch::<C>(order)).await
    }

    /// Deletes child `id` of `parent_id`. Sibling orders are left as they
    /// are, gaps included.
    ///
    /// A child stored under a different parent is not deleted.
    pub async fn remove(&self, id: &ChildId, parent_id: &ParentId) -> Result<()> {
        let delete_failed = |source: StoreError| CasebookError::DeleteFailed {
            table: self.table.clone(),
            id: id.to_string(),
            source,
        };

        let owner = self.owner_of(id).await.map_err(delete_failed)?;
        if owner != *parent_id {
            warn!(
                "refusing to remove {} from '{}': it belongs to {}, not {}",
                id, self.table, owner, parent_id
            );
            return Err(delete_failed(StoreError::Rejected(format!(
                "child '{}' belongs to '{}', not '{}'",
                id, owner, parent_id
            ))));
        }

        self.store
            .delete(&self.table, id.as_str())
            .await
            .map_err(delete_failed)?;
        self.cache.invalidate(&ScopeKey::new(owner, C::KIND));
        debug!("removed {} from '{}' under {}", id, self.table, parent_id);
        Ok(())
    }

    async fn write_patch(&self, id: &ChildId, patch: Row) -> Result<C> {
        let stored = self
            .store
            .update(&self.table, id.as_str(), patch)
            .await
            .map_err(|source| self.update_failed(id, source))?;

        // The write landed; invalidate before anything else can fail.
        if let Some(Value::String(parent_id)) = stored.get(C::PARENT_COLUMN) {
            self.cache
                .invalidate(&ScopeKey::new(ParentId::new(parent_id.as_str()), C::KIND));
        }

        row_into(stored).map_err(|source| self.update_failed(id, source))
    }

    async fn next_order(&self, parent_id: &ParentId) -> std::result::Result<i64, StoreError> {
        let siblings = self
            .store
            .select(
                &self.table,
                &Filter::eq(C::PARENT_COLUMN, parent_id.as_str()),
                Some(&OrderBy::desc(C::ORDER_COLUMN)),
            )
            .await?;
        let Some(max) = siblings
            .first()
            .and_then(|row| row.get(C::ORDER_COLUMN))
            .and_then(Value::as_i64)
        else {
            return Ok(0);
        };
        max.checked_add(1).ok_or_else(|| {
            StoreError::Rejected(format!(
                "no order left after {} under '{}'; pass an explicit order",
                max, parent_id
            ))
        })
    }

    async fn owner_of(&self, id: &ChildId) -> std::result::Result<ParentId, StoreError> {
        let rows = self
            .store
            .select(&self.table, &Filter::eq(ID_COLUMN, id.as_str()), None)
            .await?;
        match rows.first().and_then(|row| row.get(C::PARENT_COLUMN)) {
            Some(Value::String(owner)) => Ok(ParentId::new(owner.as_str())),
            Some(_) => Err(StoreError::Serialization(format!(
                "child '{}' has a malformed '{}' column",
                id,
                C::PARENT_COLUMN
            ))),
            None => Err(StoreError::NotFound {
                table: self.table.clone(),
                id: id.to_string(),
            }),
        }
    }

    fn update_failed(&self, id: &ChildId, source: StoreError) -> CasebookError {
        CasebookError::UpdateFailed {
            table: self.table.clone(),
            id: id.to_string(),
            source,
        }
    }
}

pub(crate) fn order_patch<C: PersistedChild>(order: i64) -> Row {
    let mut row = Row::new();
    row.insert(C::ORDER_COLUMN.to_string(), Value::from(order));
    row
}
