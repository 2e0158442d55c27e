use super::mutator::order_patch;
use crate::cache::CollectionCache;
use crate::core::{
    CasebookError, ChildId, Filter, ID_COLUMN, ParentId, ReorderFailure, Result, Row, ScopeKey,
    StoreError,
};
use crate::model::PersistedChild;
use crate::store::SharedStore;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::{Instrument, Level, event, info_span};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// How a reorder is written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderStrategy {
    /// One all-or-nothing `update_many`. Stores that cannot do that fall back
    /// to `PerItem`, with a warning.
    #[default]
    Atomic,
    /// One `update` per move, dispatched concurrently. A failure part way
    /// leaves siblings in a mixed state that a retry of the same request
    /// repairs.
    PerItem,
}

/// New positions for some or all children of one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest {
    pub parent_id: ParentId,
    pub moves: Vec<(ChildId, i64)>,
}

impl ReorderRequest {
    pub fn new(parent_id: ParentId, moves: Vec<(ChildId, i64)>) -> Self {
        Self { parent_id, moves }
    }

    /// Request placing `ids` at orders 0, 1, 2, ... in the given sequence.
    pub fn from_sequence<I>(parent_id: ParentId, ids: I) -> Self
    where
        I: IntoIterator<Item = ChildId>,
    {
        let moves = ids
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id, position as i64))
            .collect();
        Self { parent_id, moves }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.moves.len());
        for (id, _) in &self.moves {
            if !seen.insert(id) {
                return Err(CasebookError::InvalidReorder(format!(
                    "child '{}' appears more than once",
                    id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub applied: usize,
    pub strategy_used: ReorderStrategy,
}

/// Applies reorder requests and keeps the affected scopes coherent.
///
/// Each move touches only the order column of its own row, so sending the
/// same request again converges on the same final orders whatever happened
/// to the previous attempt.
pub struct ReorderCoordinator<C: PersistedChild> {
    store: SharedStore,
    cache: CollectionCache,
    table: String,
    strategy: ReorderStrategy,
    max_in_flight: usize,
    _child: PhantomData<fn() -> C>,
}

impl<C: PersistedChild> ReorderCoordinator<C> {
    pub fn new(store: SharedStore, cache: CollectionCache, table: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            table: table.into(),
            strategy: ReorderStrategy::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            _child: PhantomData,
        }
    }

    pub fn strategy(mut self, strategy: ReorderStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Upper bound on concurrent per-item updates (minimum 1).
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub async fn reorder(&self, request: ReorderRequest) -> Result<ReorderOutcome> {
        request.validate()?;
        if request.moves.is_empty() {
            return Ok(ReorderOutcome {
                applied: 0,
                strategy_used: self.strategy,
            });
        }

        let span = info_span!(
            "casebook.reorder",
            table = %self.table,
            parent_id = %request.parent_id,
            moves = request.moves.len()
        );

        async move {
            self.check_membership(&request).await?;
            match self.strategy {
                ReorderStrategy::PerItem => self.reorder_per_item(request).await,
                ReorderStrategy::Atomic => self.reorder_atomic(request).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Convenience for "these children, in this order".
    pub async fn reorder_sequence<I>(&self, parent_id: ParentId, ids: I) -> Result<ReorderOutcome>
    where
        I: IntoIterator<Item = ChildId>,
    {
        self.reorder(ReorderRequest::from_sequence(parent_id, ids))
            .await
    }

    async fn reorder_atomic(&self, request: ReorderRequest) -> Result<ReorderOutcome> {
        let patches = request
            .moves
            .iter()
            .map(|(id, order)| (id.to_string(), order_patch::<C>(*order)))
            .collect();

        match self.store.update_many(&self.table, patches).await {
            Ok(rows) => {
                self.invalidate(&request.parent_id, &rows);
                event!(Level::DEBUG, applied = rows.len(), "atomic reorder applied");
                Ok(ReorderOutcome {
                    applied: rows.len(),
                    strategy_used: ReorderStrategy::Atomic,
                })
            }
            Err(StoreError::Unsupported(reason)) => {
                event!(
                    Level::WARN,
                    reason = %reason,
                    "store has no atomic batch update, reordering per item"
                );
                self.reorder_per_item(request).await
            }
            Err(StoreError::NotFound { table, id }) => Err(CasebookError::UpdateFailed {
                table: self.table.clone(),
                id: id.clone(),
                source: StoreError::NotFound { table, id },
            }),
            Err(source) => Err(CasebookError::ReorderFailed {
                table: self.table.clone(),
                parent_id: request.parent_id,
                source,
            }),
        }
    }

    /// Rejects moves naming children that `request.parent_id` does not own.
    async fn check_membership(&self, request: &ReorderRequest) -> Result<()> {
        let rows = self
            .store
            .select(
                &self.table,
                &Filter::eq(C::PARENT_COLUMN, request.parent_id.as_str()),
                None,
            )
            .await
            .map_err(|source| CasebookError::FetchFailed {
                scope: ScopeKey::new(request.parent_id.clone(), C::KIND),
                source,
            })?;
        let owned: HashSet<&str> = rows
            .iter()
            .filter_map(|row| row.get(ID_COLUMN).and_then(Value::as_str))
            .collect();

        match request
            .moves
            .iter()
            .find(|(id, _)| !owned.contains(id.as_str()))
        {
            Some((id, _)) => Err(CasebookError::InvalidReorder(format!(
                "child '{}' is not a child of '{}'",
                id, request.parent_id
            ))),
            None => Ok(()),
        }
    }

    async fn reorder_per_item(&self, request: ReorderRequest) -> Result<ReorderOutcome> {
        let total = request.moves.len();
        let mut settled: Vec<(usize, ChildId, i64, std::result::Result<Row, StoreError>)> =
            futures::stream::iter(request.moves.into_iter().enumerate().map(
                |(position, (id, order))| {
                    let store = self.store.clone();
                    let table = self.table.clone();
                    async move {
                        let result = store
                            .update(&table, id.as_str(), order_patch::<C>(order))
                            .await;
                        (position, id, order, result)
                    }
                },
            ))
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;
        settled.sort_by_key(|(position, ..)| *position);

        let mut applied = Vec::new();
        let mut applied_rows = Vec::new();
        let mut failed = Vec::new();
        for (_, id, order, result) in settled {
            match result {
                Ok(row) => {
                    applied.push(id);
                    applied_rows.push(row);
                }
                Err(error) => failed.push(ReorderFailure { id, order, error }),
            }
        }

        if failed.is_empty() {
            self.invalidate(&request.parent_id, &applied_rows);
            event!(Level::DEBUG, applied = total, "per-item reorder applied");
            return Ok(ReorderOutcome {
                applied: total,
                strategy_used: ReorderStrategy::PerItem,
            });
        }

        if applied.is_empty() {
            event!(Level::WARN, failed = failed.len(), "reorder failed, nothing applied");
            let first = failed.swap_remove(0);
            return Err(CasebookError::UpdateFailed {
                table: self.table.clone(),
                id: first.id.to_string(),
                source: first.error,
            });
        }

        // Some rows moved: readers must see the mixed state rather than the old one.
        self.invalidate(&request.parent_id, &applied_rows);
        event!(
            Level::WARN,
            applied = applied.len(),
            failed = failed.len(),
            "reorder partially applied"
        );
        Err(CasebookError::PartialReorderFailure {
            parent_id: request.parent_id,
            applied,
            failed,
        })
    }

    /// Invalidates the requested parent and any other parent whose rows the
    /// request actually touched.
    fn invalidate(&self, parent_id: &ParentId, rows: &[Row]) {
        let mut parents: HashSet<&str> = HashSet::new();
        parents.insert(parent_id.as_str());
        for row in rows {
            if let Some(Value::String(owner)) = row.get(C::PARENT_COLUMN) {
                parents.insert(owner.as_str());
            }
        }
        for owner in parents {
            self.cache
                .invalidate(&ScopeKey::new(ParentId::new(owner), C::KIND));
        }
    }
}
