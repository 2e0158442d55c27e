//! Parent-scoped child collections.
//!
//! Persisted children (one row each, store-assigned ids) are read through
//! [`ScopedCollectionReader`], edited through [`CollectionMutator`] and
//! reordered through [`ReorderCoordinator`]. Inline children (an array on
//! the parent row, identified by position) are edited in memory through
//! [`InlineList`] and written with the parent.

pub mod inline;
pub mod mutator;
pub mod reader;
pub mod reorder;

pub use inline::{InlineEntry, InlineList};
pub use mutator::CollectionMutator;
pub use reader::{ReadState, ScopedCollectionReader};
pub use reorder::{ReorderCoordinator, ReorderOutcome, ReorderRequest, ReorderStrategy};
