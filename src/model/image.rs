use super::{ChildPatch, PersistedChild};
use crate::core::{ChildId, CollectionKind, ParentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image attached to a case study, stored one row per image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudyImage {
    pub id: ChildId,
    pub case_study_id: ParentId,
    pub order: i64,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PersistedChild for CaseStudyImage {
    type Payload = ImagePayload;
    type Patch = ImagePatch;

    const KIND: CollectionKind = CollectionKind::Images;
    const PARENT_COLUMN: &'static str = "case_study_id";

    fn id(&self) -> &ChildId {
        &self.id
    }

    fn parent_id(&self) -> &ParentId {
        &self.case_study_id
    }

    fn order(&self) -> i64 {
        self.order
    }
}

/// Insert payload for a new image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePayload {
    pub url: String,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
}

impl ImagePayload {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: None,
            alt_text: None,
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }
}

/// Partial update of an image's payload fields.
///
/// `Some(None)` on an optional field clears it; `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<Option<String>>,
}

impl ImagePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(Some(caption.into()));
        self
    }

    pub fn clear_caption(mut self) -> Self {
        self.caption = Some(None);
        self
    }

    pub fn alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(Some(alt_text.into()));
        self
    }

    pub fn clear_alt_text(mut self) -> Self {
        self.alt_text = Some(None);
        self
    }
}

impl ChildPatch for ImagePatch {
    fn is_empty(&self) -> bool {
        self.url.is_none() && self.caption.is_none() && self.alt_text.is_none()
    }
}
