use super::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A store row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Primary key column shared by every table the crate touches.
pub const ID_COLUMN: &str = "id";

/// Identifier of a parent entity (a case study).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Store-assigned identifier of a persisted child row.
///
/// Stable for the row's lifetime, including across reorders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(String);

impl ChildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id, as assigned by stores that generate keys.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChildId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which collection of a parent a cache scope refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// The parent row itself, carrying the inline FAQ and result arrays.
    ParentRecord,
    /// Persisted image rows keyed by the parent id.
    Images,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentRecord => f.write_str("record"),
            Self::Images => f.write_str("images"),
        }
    }
}

/// Cache scope: one collection of one parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub parent_id: ParentId,
    pub kind: CollectionKind,
}

impl ScopeKey {
    pub fn new(parent_id: ParentId, kind: CollectionKind) -> Self {
        Self { parent_id, kind }
    }

    pub fn images(parent_id: ParentId) -> Self {
        Self::new(parent_id, CollectionKind::Images)
    }

    pub fn record(parent_id: ParentId) -> Self {
        Self::new(parent_id, CollectionKind::ParentRecord)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent_id, self.kind)
    }
}

/// Conjunction of column equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Compares two rows on the sort column. Missing and null values sort first.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(a.get(&self.column), b.get(&self.column));
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Mixed types only rank by kind; they never appear in a well-formed order column.
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Serializes a typed record into a row. Non-object values are rejected.
pub fn row_from<T: Serialize>(value: &T) -> std::result::Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn row_into<T: DeserializeOwned>(row: Row) -> std::result::Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
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

    #[test]
    fn filter_requires_every_condition() {
        let filter = Filter::eq("case_study_id", "cs1").and_eq("order", 2);

        assert!(filter.matches(&row(json!({"case_study_id": "cs1", "order": 2}))));
        assert!(!filter.matches(&row(json!({"case_study_id": "cs1", "order": 3}))));
        assert!(!filter.matches(&row(json!({"order": 2}))));
        assert!(Filter::all().matches(&row(json!({}))));
    }

    #[test]
    fn order_by_ranks_numbers_and_puts_missing_first() {
        let by_order = OrderBy::asc("order");
        let low = row(json!({"order": 1}));
        let high = row(json!({"order": 10}));
        let missing = row(json!({}));

        assert_eq!(by_order.compare(&low, &high), Ordering::Less);
        assert_eq!(by_order.compare(&missing, &low), Ordering::Less);
        assert_eq!(OrderBy::desc("order").compare(&low, &high), Ordering::Greater);
    }

    #[test]
    fn row_from_rejects_scalars() {
        assert!(matches!(row_from(&5), Err(StoreError::Serialization(_))));
        let parsed: ParentId = serde_json::from_value(json!("cs1")).unwrap();
        assert_eq!(parsed, ParentId::new("cs1"));
    }

    #[test]
    fn scope_key_display_names_parent_and_kind() {
        assert_eq!(ScopeKey::images(ParentId::new("cs1")).to_string(), "cs1:images");
        assert_eq!(ScopeKey::record(ParentId::new("cs1")).to_string(), "cs1:record");
    }
}
