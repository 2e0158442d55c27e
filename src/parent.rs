//! Case-study records and the single-write save of their inline arrays.

use crate::cache::CollectionCache;
use crate::collection::InlineList;
use crate::config::CasebookConfig;
use crate::core::{
    CasebookError, Filter, ID_COLUMN, ParentId, Result, Row, ScopeKey, StoreError, row_from,
    row_into,
};
use crate::model::{CaseStudy, Faq, ResultMetric};
use crate::store::SharedStore;
use log::debug;
use serde_json::Value;

pub struct CaseStudyRecords {
    store: SharedStore,
    cache: CollectionCache,
    table: String,
    results_capacity: usize,
    faq_capacity: Option<usize>,
}

impl CaseStudyRecords {
    pub fn new(store: SharedStore, cache: CollectionCache, config: &CasebookConfig) -> Self {
        Self {
            store,
            cache,
            table: config.case_study_table.clone(),
            results_capacity: config.results_capacity,
            faq_capacity: config.faq_capacity,
        }
    }

    /// Loads a case study, `None` when no row has that id.
    pub async fn load(&self, id: &ParentId) -> Result<Option<CaseStudy>> {
        let scope = ScopeKey::record(id.clone());
        let fetch_failed = |source: StoreError| CasebookError::FetchFailed {
            scope: scope.clone(),
            source,
        };

        let generation = self.cache.generation(&scope);
        let rows: Vec<Row> = match self.cache.get(&scope) {
            Some(cached) => cached.as_ref().clone(),
            None => {
                let rows = self
                    .store
                    .select(&self.table, &Filter::eq(ID_COLUMN, id.as_str()), None)
                    .await
                    .map_err(fetch_failed)?;
                self.cache.store_if_current(&scope, generation, rows.clone());
                rows
            }
        };

        rows.into_iter()
            .next()
            .map(row_into::<CaseStudy>)
            .transpose()
            .map_err(fetch_failed)
    }

    /// FAQ editor seeded from `study`.
    pub fn faq_editor(&self, study: &CaseStudy) -> Result<InlineList<Faq>> {
        match self.faq_capacity {
            Some(capacity) => InlineList::bounded(study.faqs.clone(), capacity),
            None => Ok(InlineList::unbounded(study.faqs.clone())),
        }
    }

    /// Results editor seeded from `study`, bounded by the configured capacity.
    pub fn results_editor(&self, study: &CaseStudy) -> Result<InlineList<ResultMetric>> {
        InlineList::bounded(study.results.clone(), self.results_capacity)
    }

    /// Writes both inline arrays of `id` in one update.
    pub async fn save_inline(
        &self,
        id: &ParentId,
        faqs: &InlineList<Faq>,
        results: &InlineList<ResultMetric>,
    ) -> Result<CaseStudy> {
        self.check_capacity(faqs.len(), results.len())?;

        let mut patch = Row::new();
        patch.insert(
            "faqs".to_string(),
            serde_json::to_value(faqs).map_err(|e| self.update_failed(id, e.into()))?,
        );
        patch.insert(
            "results".to_string(),
            serde_json::to_value(results).map_err(|e| self.update_failed(id, e.into()))?,
        );
        self.write(id, patch).await
    }

    /// Writes every field of `study` except its id in one update.
    pub async fn save(&self, study: &CaseStudy) -> Result<CaseStudy> {
        self.check_capacity(study.faqs.len(), study.results.len())?;

        let mut patch = row_from(study).map_err(|source| self.update_failed(&study.id, source))?;
        patch.remove(ID_COLUMN);
        self.write(&study.id, patch).await
    }

    async fn write(&self, id: &ParentId, patch: Row) -> Result<CaseStudy> {
        let stored = self
            .store
            .update(&self.table, id.as_str(), patch)
            .await
            .map_err(|source| self.update_failed(id, source))?;
        self.cache.invalidate(&ScopeKey::record(id.clone()));
        debug!("saved case study {}", id);

        row_into(stored).map_err(|source| self.update_failed(id, source))
    }

    fn check_capacity(&self, faqs: usize, results: usize) -> Result<()> {
        if results > self.results_capacity {
            return Err(CasebookError::CapacityExceeded {
                capacity: self.results_capacity,
                len: results,
            });
        }
        match self.faq_capacity {
            Some(capacity) if faqs > capacity => Err(CasebookError::CapacityExceeded {
                capacity,
                len: faqs,
            }),
            _ => Ok(()),
        }
    }

    fn update_failed(&self, id: &ParentId, source: StoreError) -> CasebookError {
        CasebookError::UpdateFailed {
            table: self.table.clone(),
            id: id.to_string(),
            source,
        }
    }
}

/// Row for a new case study, for seeding stores.
pub fn case_study_row(study: &CaseStudy) -> std::result::Result<Row, StoreError> {
    let mut row = row_from(study)?;
    row.insert(
        ID_COLUMN.to_string(),
        Value::String(study.id.as_str().to_string()),
    );
    Ok(row)
}
