pub mod error;
pub mod types;

pub use error::{CasebookError, ReorderFailure, Result, StoreError};
pub use types::{
    CollectionKind, Filter, ID_COLUMN, OrderBy, ParentId, ChildId, Row, ScopeKey, SortDirection,
    row_from, row_into,
};
