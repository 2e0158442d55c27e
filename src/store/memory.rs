use super::{RemoteStore, StoreResult};
use crate::core::{Filter, ID_COLUMN, OrderBy, Row, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Column stamped on insert when the row does not carry one.
pub const CREATED_AT_COLUMN: &str = "created_at";

/// One table: rows keyed by insertion sequence plus an id index.
///
/// Both maps are persistent (`im`), so cloning a table is cheap and a batch
/// can be applied to a copy and swapped in only when every patch succeeded.
#[derive(Debug, Clone, Default)]
struct MemoryTable {
    rows: im::OrdMap<u64, Row>,
    ids: im::HashMap<String, u64>,
    next_seq: u64,
}

impl MemoryTable {
    fn insert(&mut self, table: &str, mut row: Row) -> StoreResult<Row> {
        let id = match row.get(ID_COLUMN) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => {
                let id = uuid::Uuid::new_v4().to_string();
                row.insert(ID_COLUMN.to_string(), Value::String(id.clone()));
                id
            }
            Some(other) => {
                return Err(StoreError::Rejected(format!(
                    "'{}' ids must be strings, got {}",
                    table, other
                )));
            }
        };

        if self.ids.contains_key(&id) {
            return Err(StoreError::Rejected(format!(
                "duplicate key '{}' in '{}'",
                id, table
            )));
        }

        row.entry(CREATED_AT_COLUMN.to_string())
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

        let seq = self.next_seq;
        self.next_seq += 1;
        self.ids.insert(id, seq);
        self.rows.insert(seq, row.clone());
        Ok(row)
    }

    fn update(&mut self, table: &str, id: &str, patch: Row) -> StoreResult<Row> {
        let seq = *self.ids.get(id).ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        })?;

        if let Some(patched_id) = patch.get(ID_COLUMN)
            && patched_id != &Value::String(id.to_string())
        {
            return Err(StoreError::Rejected(format!(
                "'{}' primary key is immutable",
                table
            )));
        }

        let mut row = self.rows.get(&seq).cloned().unwrap_or_default();
        for (column, value) in patch {
            row.insert(column, value);
        }
        self.rows.insert(seq, row.clone());
        Ok(row)
    }

    fn delete(&mut self, table: &str, id: &str) -> StoreResult<()> {
        let seq = self.ids.remove(id).ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        })?;
        self.rows.remove(&seq);
        Ok(())
    }
}

/// Process-local `RemoteStore`.
///
/// Tables must be created before use, mirroring a hosted store where the
/// schema exists independently of the client. Ids are UUID v4 strings unless
/// the inserted row supplies one.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<im::HashMap<String, MemoryTable>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given empty tables.
    pub fn with_tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = names
            .into_iter()
            .map(|name| (name.into(), MemoryTable::default()))
            .collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Creates an empty table; existing tables are left untouched.
    pub async fn create_table(&self, name: &str) {
        let mut tables = self.tables.write().await;
        if !tables.contains_key(name) {
            tables.insert(name.to_string(), MemoryTable::default());
        }
    }

    pub async fn row_count(&self, table: &str) -> StoreResult<usize> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let data = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut rows: Vec<Row> = data
            .rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();

        // Stable: equal keys keep insertion order.
        if let Some(order_by) = order_by {
            rows.sort_by(|a, b| order_by.compare(a, b));
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        data.insert(table, row)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> StoreResult<Row> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        data.update(table, id, patch)
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        data.delete(table, id)
    }

    async fn update_many(&self, table: &str, patches: Vec<(String, Row)>) -> StoreResult<Vec<Row>> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut staged = data.clone();
        let mut updated = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            updated.push(staged.update(table, &id, patch)?);
        }
        *data = staged;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows are objects"),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let store = InMemoryStore::with_tables(["items"]);
        let stored = store
            .insert("items", row(json!({"name": "a"})))
            .await
            .unwrap();

        assert!(stored.get("id").and_then(Value::as_str).is_some());
        assert!(stored.contains_key(CREATED_AT_COLUMN));
        assert_eq!(store.row_count("items").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_table_is_reported() {
        let store = InMemoryStore::new();
        let err = store
            .select("missing", &Filter::all(), None)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::TableNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn select_sort_is_stable_for_ties() {
        let store = InMemoryStore::with_tables(["items"]);
        for (id, order) in [("a", 1), ("b", 0), ("c", 1), ("d", 0)] {
            store
                .insert("items", row(json!({"id": id, "order": order})))
                .await
                .unwrap();
        }

        let rows = store
            .select("items", &Filter::all(), Some(&OrderBy::asc("order")))
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn update_rejects_primary_key_change() {
        let store = InMemoryStore::with_tables(["items"]);
        store
            .insert("items", row(json!({"id": "a"})))
            .await
            .unwrap();

        let err = store
            .update("items", "a", row(json!({"id": "b"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn update_many_is_all_or_nothing() {
        let store = InMemoryStore::with_tables(["items"]);
        for id in ["a", "b"] {
            store
                .insert("items", row(json!({"id": id, "order": 0})))
                .await
                .unwrap();
        }

        let err = store
            .update_many(
                "items",
                vec![
                    ("a".to_string(), row(json!({"order": 5}))),
                    ("zzz".to_string(), row(json!({"order": 6}))),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let rows = store.select("items", &Filter::eq("id", "a"), None).await.unwrap();
        assert_eq!(rows[0]["order"], json!(0));
    }
}
