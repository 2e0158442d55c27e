use crate::cache::CollectionCache;
use crate::core::{
    CasebookError, Filter, OrderBy, ParentId, Result, Row, ScopeKey, StoreError, row_into,
};
use crate::model::PersistedChild;
use crate::store::SharedStore;
use log::debug;
use tokio::sync::watch;

/// What a reader currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadState<C> {
    Loading,
    Ready(Vec<C>),
    Failed(CasebookError),
}

impl<C> ReadState<C> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Reads the children of one parent, sorted ascending by their order column.
///
/// A reader without a parent is valid and always yields an empty sequence;
/// callers may build one before any parent is selected.
pub struct ScopedCollectionReader<C: PersistedChild> {
    store: SharedStore,
    cache: CollectionCache,
    table: String,
    parent_id: Option<ParentId>,
    state: ReadState<C>,
    seen_generation: Option<u64>,
    invalidations: Option<watch::Receiver<u64>>,
}

impl<C: PersistedChild> ScopedCollectionReader<C> {
    pub fn new(
        store: SharedStore,
        cache: CollectionCache,
        table: impl Into<String>,
        parent_id: Option<ParentId>,
    ) -> Self {
        let mut reader = Self {
            store,
            cache,
            table: table.into(),
            parent_id: None,
            state: ReadState::Loading,
            seen_generation: None,
            invalidations: None,
        };
        reader.set_parent(parent_id);
        reader
    }

    pub fn parent_id(&self) -> Option<&ParentId> {
        self.parent_id.as_ref()
    }

    pub fn scope(&self) -> Option<ScopeKey> {
        self.parent_id
            .as_ref()
            .map(|parent_id| ScopeKey::new(parent_id.clone(), C::KIND))
    }

    pub fn state(&self) -> &ReadState<C> {
        &self.state
    }

    /// Items of the last successful fetch; empty while loading or failed.
    pub fn items(&self) -> &[C] {
        match &self.state {
            ReadState::Ready(items) => items,
            _ => &[],
        }
    }

    /// Rebinds the reader to another parent. The next `fetch` loads it.
    pub fn set_parent(&mut self, parent_id: Option<ParentId>) {
        self.invalidations = parent_id
            .as_ref()
            .map(|id| self.cache.subscribe(&ScopeKey::new(id.clone(), C::KIND)));
        self.parent_id = parent_id;
        self.state = ReadState::Loading;
        self.seen_generation = None;
    }

    /// True when the scope was invalidated after the last fetch, or nothing
    /// was fetched yet.
    pub fn is_stale(&self) -> bool {
        match self.scope() {
            Some(scope) => self.seen_generation != Some(self.cache.generation(&scope)),
            None => false,
        }
    }

    /// Loads the full ordered sequence, from the cache when it is current.
    ///
    /// Either every row decodes or the call fails with `FetchFailed`; partial
    /// sequences are never returned.
    pub async fn fetch(&mut self) -> Result<Vec<C>> {
        let Some(scope) = self.scope() else {
            self.state = ReadState::Ready(Vec::new());
            return Ok(Vec::new());
        };

        self.state = ReadState::Loading;
        if let Some(rx) = self.invalidations.as_mut() {
            rx.borrow_and_update();
        }
        let generation = self.cache.generation(&scope);

        let result = self.load(&scope, generation).await;
        match &result {
            Ok(items) => {
                self.seen_generation = Some(generation);
                self.state = ReadState::Ready(items.clone());
            }
            Err(err) => {
                self.state = ReadState::Failed(err.clone());
            }
        }
        result
    }

    /// Re-fetches when stale. Returns whether a fetch happened.
    pub async fn refresh_if_stale(&mut self) -> Result<bool> {
        if !self.is_stale() {
            return Ok(false);
        }
        self.fetch().await?;
        Ok(true)
    }

    /// Waits until the scope is invalidated, then re-fetches.
    ///
    /// Resolves immediately when an invalidation landed since the last fetch.
    /// A reader without a parent returns the empty sequence at once.
    pub async fn next_invalidation(&mut self) -> Result<Vec<C>> {
        if let Some(rx) = self.invalidations.as_mut() {
            // The cache owns the sender for its whole lifetime; a closed
            // channel only means there is nothing left to wait for.
            let _ = rx.changed().await;
        }
        self.fetch().await
    }

    async fn load(&self, scope: &ScopeKey, generation: u64) -> Result<Vec<C>> {
        let fetch_failed = |source: StoreError| CasebookError::FetchFailed {
            scope: scope.clone(),
            source,
        };

        let rows: Vec<Row> = match self.cache.get(scope) {
            Some(cached) => cached.as_ref().clone(),
            None => {
                let rows = self
                    .store
                    .select(
                        &self.table,
                        &Filter::eq(C::PARENT_COLUMN, scope.parent_id.as_str()),
                        Some(&OrderBy::asc(C::ORDER_COLUMN)),
                    )
                    .await
                    .map_err(fetch_failed)?;
                debug!("fetched {} rows for {}", rows.len(), scope);
                self.cache.store_if_current(scope, generation, rows.clone());
                rows
            }
        };

        rows.into_iter()
            .map(row_into::<C>)
            .collect::<std::result::Result<Vec<C>, StoreError>>()
            .map_err(fetch_failed)
    }
}
