use super::{RemoteStore, SharedStore, StoreResult};
use crate::core::{Filter, OrderBy, Row, StoreError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Store operation a fault rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
    UpdateMany,
}

#[derive(Debug, Clone)]
struct FaultRule {
    op: StoreOp,
    /// Row id for update/delete, table name otherwise. `None` matches any.
    target: Option<String>,
    /// Remaining failures; `None` fails forever.
    remaining: Option<usize>,
    error: StoreError,
}

/// Wraps a store and fails selected calls, for exercising partial-failure paths.
///
/// Rules are checked in registration order; the first matching rule with
/// failures left wins and the call never reaches the inner store.
pub struct FaultInjectingStore {
    inner: SharedStore,
    rules: Mutex<Vec<FaultRule>>,
    batch_disabled: bool,
}

impl FaultInjectingStore {
    pub fn new(inner: SharedStore) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
            batch_disabled: false,
        }
    }

    /// Hides the inner store's atomic `update_many`, as a store without
    /// multi-row transactions would.
    pub fn without_batch_updates(mut self) -> Self {
        self.batch_disabled = true;
        self
    }

    /// Fails every `update` of the row `id`.
    pub fn fail_update_of(&self, id: &str, error: StoreError) {
        self.push(StoreOp::Update, Some(id.to_string()), None, error);
    }

    /// Fails the next `times` calls of `op`, whatever their target.
    pub fn fail_next(&self, op: StoreOp, times: usize, error: StoreError) {
        self.push(op, None, Some(times), error);
    }

    /// Fails the next `times` calls of `op` against `target`.
    pub fn fail_next_on(&self, op: StoreOp, target: &str, times: usize, error: StoreError) {
        self.push(op, Some(target.to_string()), Some(times), error);
    }

    /// Drops every rule.
    pub fn heal(&self) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.clear();
        }
    }

    fn push(&self, op: StoreOp, target: Option<String>, remaining: Option<usize>, error: StoreError) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(FaultRule {
                op,
                target,
                remaining,
                error,
            });
        }
    }

    fn check(&self, op: StoreOp, target: &str) -> StoreResult<()> {
        let mut rules = self
            .rules
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let hit = rules.iter_mut().find(|rule| {
            rule.op == op
                && rule.target.as_deref().is_none_or(|t| t == target)
                && rule.remaining != Some(0)
        });

        match hit {
            Some(rule) => {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(rule.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for FaultInjectingStore {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> StoreResult<Vec<Row>> {
        self.check(StoreOp::Select, table)?;
        self.inner.select(table, filter, order_by).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        self.check(StoreOp::Insert, table)?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> StoreResult<Row> {
        self.check(StoreOp::Update, id)?;
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        self.check(StoreOp::Delete, id)?;
        self.inner.delete(table, id).await
    }

    async fn update_many(&self, table: &str, patches: Vec<(String, Row)>) -> StoreResult<Vec<Row>> {
        if self.batch_disabled {
            return Err(StoreError::Unsupported(format!(
                "atomic multi-row update on '{}'",
                table
            )));
        }
        self.check(StoreOp::UpdateMany, table)?;
        self.inner.update_many(table, patches).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn counted_rules_expire() {
        let store = FaultInjectingStore::new(Arc::new(InMemoryStore::with_tables(["t"])));
        store.fail_next(
            StoreOp::Select,
            1,
            StoreError::Unavailable("down".to_string()),
        );

        assert!(store.select("t", &Filter::all(), None).await.is_err());
        assert!(store.select("t", &Filter::all(), None).await.is_ok());
    }

    #[tokio::test]
    async fn targeted_rules_only_hit_their_row() {
        let inner = InMemoryStore::with_tables(["t"]);
        let store = FaultInjectingStore::new(Arc::new(inner));
        for id in ["a", "b"] {
            let mut row = Row::new();
            row.insert("id".to_string(), id.into());
            store.insert("t", row).await.unwrap();
        }
        store.fail_update_of("b", StoreError::Rejected("nope".to_string()));

        assert!(store.update("t", "a", Row::new()).await.is_ok());
        assert!(store.update("t", "b", Row::new()).await.is_err());

        store.heal();
        assert!(store.update("t", "b", Row::new()).await.is_ok());
    }

    #[tokio::test]
    async fn disabled_batches_report_unsupported() {
        let store = FaultInjectingStore::new(Arc::new(InMemoryStore::with_tables(["t"])))
            .without_batch_updates();
        let err = store.update_many("t", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
