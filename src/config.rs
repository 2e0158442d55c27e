use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::collection::ReorderStrategy;
use crate::collection::reorder::DEFAULT_MAX_IN_FLIGHT;
use crate::core::{CasebookError, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of result metrics shown on a case study.
pub const DEFAULT_RESULTS_CAPACITY: usize = 4;

/// Session configuration
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasebookConfig {
    /// Table holding case-study rows (with inline FAQs and results)
    pub case_study_table: String,

    /// Table holding one row per case-study image
    pub image_table: String,

    /// Upload folder for case-study images
    pub image_folder: String,

    /// Maximum number of results per case study
    pub results_capacity: usize,

    /// Maximum number of FAQs per case study, unbounded when `None`
    pub faq_capacity: Option<usize>,

    /// How reorders are written
    pub reorder_strategy: ReorderStrategy,

    /// Concurrent order updates when reordering per item
    pub max_in_flight: usize,

    /// Number of scopes whose rows the cache keeps
    pub cache_capacity: usize,
}

impl Default for CasebookConfig {
    fn default() -> Self {
        Self {
            case_study_table: "case_studies".to_string(),
            image_table: "case_study_images".to_string(),
            image_folder: "case-studies".to_string(),
            results_capacity: DEFAULT_RESULTS_CAPACITY,
            faq_capacity: None,
            reorder_strategy: ReorderStrategy::Atomic,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CasebookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the case-study table
    pub fn case_study_table(mut self, table: &str) -> Self {
        self.case_study_table = table.to_string();
        self
    }

    /// Set the image table
    pub fn image_table(mut self, table: &str) -> Self {
        self.image_table = table.to_string();
        self
    }

    /// Set the upload folder for images
    pub fn image_folder(mut self, folder: &str) -> Self {
        self.image_folder = folder.to_string();
        self
    }

    /// Set the results capacity
    pub fn results_capacity(mut self, capacity: usize) -> Self {
        self.results_capacity = capacity;
        self
    }

    /// Bound the number of FAQs
    pub fn faq_capacity(mut self, capacity: usize) -> Self {
        self.faq_capacity = Some(capacity);
        self
    }

    /// Set the reorder strategy
    pub fn reorder_strategy(mut self, strategy: ReorderStrategy) -> Self {
        self.reorder_strategy = strategy;
        self
    }

    /// Set the per-item reorder concurrency
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Set the cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Parse from JSON
    ///
    /// # Examples
    ///
    /// ```
    /// # use casebook::{CasebookConfig, ReorderStrategy};
    /// let config = CasebookConfig::from_json(r#"{"reorder_strategy": "per_item"}"#).unwrap();
    /// assert_eq!(config.reorder_strategy, ReorderStrategy::PerItem);
    /// assert_eq!(config.results_capacity, 4);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CasebookError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("case_study_table", &self.case_study_table),
            ("image_table", &self.image_table),
            ("image_folder", &self.image_folder),
        ] {
            if value.trim().is_empty() {
                return Err(CasebookError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.case_study_table == self.image_table {
            return Err(CasebookError::Config(
                "case_study_table and image_table must differ".to_string(),
            ));
        }
        if self.results_capacity == 0 {
            return Err(CasebookError::Config(
                "results_capacity must be at least 1".to_string(),
            ));
        }
        if self.faq_capacity == Some(0) {
            return Err(CasebookError::Config(
                "faq_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight == 0 || self.cache_capacity == 0 {
            return Err(CasebookError::Config(
                "max_in_flight and cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
