use casebook::{
    CasebookConfig, CasebookError, CasebookSession, CaseStudy, Faq, FaqField, InMemoryStore,
    InlineList, ParentId, ResultField, ResultMetric, case_study_row, RemoteStore,
};
use std::sync::Arc;

async fn session_with(study: &CaseStudy) -> CasebookSession {
    let config = CasebookConfig::default();
    let store = InMemoryStore::with_tables([
        config.case_study_table.clone(),
        config.image_table.clone(),
    ]);
    store
        .insert(&config.case_study_table, case_study_row(study).unwrap())
        .await
        .unwrap();
    CasebookSession::open(Arc::new(store), config).unwrap()
}

fn metrics(n: usize) -> Vec<ResultMetric> {
    (0..n)
        .map(|i| ResultMetric::new(format!("metric {}", i), format!("{}0%", i)))
        .collect()
}

#[test]
fn results_append_beyond_four_is_a_no_op() {
    let mut results = InlineList::bounded(Vec::new(), 4).unwrap();
    for metric in metrics(6) {
        results.append(metric);
    }

    assert_eq!(results.len(), 4);
    assert!(results.is_full());
    assert_eq!(results.as_slice(), metrics(4).as_slice());
}

#[test]
fn faqs_are_unbounded() {
    let mut faqs = InlineList::unbounded(Vec::new());
    for i in 0..50 {
        assert!(faqs.append(Faq::new(format!("q{}", i), "a")));
    }
    assert_eq!(faqs.len(), 50);
}

#[test]
fn removing_index_i_shifts_the_tail() {
    for n in 1..6 {
        for i in 0..n {
            let original = metrics(n);
            let mut list = InlineList::unbounded(original.clone());

            list.remove_at(i).unwrap();

            assert_eq!(list.len(), n - 1);
            assert_eq!(&list.as_slice()[..i], &original[..i]);
            if i + 1 < n {
                assert_eq!(list.get(i), Some(&original[i + 1]));
            }
        }
    }
}

#[test]
fn faq_scenario_remove_first() {
    let mut faqs = InlineList::unbounded(vec![Faq::new("q1", "a1"), Faq::new("q2", "a2")]);
    faqs.remove_at(0).unwrap();
    assert_eq!(faqs.into_vec(), vec![Faq::new("q2", "a2")]);
}

#[tokio::test]
async fn inline_edits_are_invisible_until_the_parent_is_saved() -> anyhow::Result<()> {
    let mut study = CaseStudy::new("cs1", "Acme");
    study.faqs = vec![Faq::new("q1", "a1"), Faq::new("q2", "a2")];
    study.results = metrics(2);
    let session = session_with(&study).await;
    let records = session.records();
    let id = ParentId::new("cs1");

    let loaded = records
        .load(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("case study cs1 missing"))?;
    let mut faqs = records.faq_editor(&loaded)?;
    let mut results = records.results_editor(&loaded)?;
    faqs.replace(0, FaqField::Question, "What changed?")?;
    results.replace(1, ResultField::Context, "year over year")?;
    results.append(ResultMetric::new("NPS", "+21"));

    assert_eq!(records.load(&id).await?, Some(loaded));

    let saved = records.save_inline(&id, &faqs, &results).await?;
    let reloaded = records.load(&id).await?;
    assert_eq!(reloaded.as_ref(), Some(&saved));
    assert_eq!(saved.faqs[0].question, "What changed?");
    assert_eq!(saved.results.len(), 3);
    assert_eq!(saved.results[1].context.as_deref(), Some("year over year"));
    Ok(())
}

#[tokio::test]
async fn reordering_inline_results_replaces_the_sequence() {
    let mut study = CaseStudy::new("cs1", "Acme");
    study.results = metrics(3);
    let session = session_with(&study).await;
    let records = session.records();
    let id = ParentId::new("cs1");
    let loaded = records.load(&id).await.unwrap().unwrap();

    let mut results = records.results_editor(&loaded).unwrap();
    let mut reversed = loaded.results.clone();
    reversed.reverse();
    results.replace_all(reversed.clone()).unwrap();
    records
        .save_inline(&id, &InlineList::unbounded(loaded.faqs.clone()), &results)
        .await
        .unwrap();

    assert_eq!(records.load(&id).await.unwrap().unwrap().results, reversed);
}

#[tokio::test]
async fn stored_results_over_capacity_cannot_be_edited() {
    let mut study = CaseStudy::new("cs1", "Legacy");
    study.results = metrics(5);
    let session = session_with(&study).await;
    let records = session.records();
    let loaded = records.load(&ParentId::new("cs1")).await.unwrap().unwrap();

    assert_eq!(
        records.results_editor(&loaded).unwrap_err(),
        CasebookError::CapacityExceeded { capacity: 4, len: 5 }
    );
}
