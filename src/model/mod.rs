//! Records managed by the crate and the traits the collection layer needs
//! from them.

pub mod case_study;
pub mod image;

pub use case_study::{CaseStudy, Faq, FaqField, ResultField, ResultMetric};
pub use image::{CaseStudyImage, ImagePatch, ImagePayload};

use crate::core::{ChildId, CollectionKind, ParentId};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A child persisted as its own row, ranked among siblings by an order column.
pub trait PersistedChild: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Fields accepted on insert. Never carries the id or the parent reference.
    type Payload: Serialize + Send + Sync;

    /// Partial update. Fields left out are not written.
    type Patch: ChildPatch;

    /// Cache scope kind these rows are published under.
    const KIND: CollectionKind;

    /// Column holding the immutable parent reference.
    const PARENT_COLUMN: &'static str;

    const ORDER_COLUMN: &'static str = "order";

    fn id(&self) -> &ChildId;

    fn parent_id(&self) -> &ParentId;

    fn order(&self) -> i64;
}

pub trait ChildPatch: Serialize + Send + Sync {
    fn is_empty(&self) -> bool;
}
