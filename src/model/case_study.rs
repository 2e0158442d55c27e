use crate::collection::inline::InlineEntry;
use crate::core::ParentId;
use serde::{Deserialize, Serialize};

/// Parent record. FAQs and results live inline on this row and are written
/// together with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: ParentId,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub results: Vec<ResultMetric>,
}

impl CaseStudy {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: ParentId::new(id),
            title: title.into(),
            slug: None,
            summary: None,
            faqs: Vec::new(),
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

impl Faq {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaqField {
    Question,
    Answer,
}

impl InlineEntry for Faq {
    type Field = FaqField;

    fn set_field(&mut self, field: FaqField, value: String) {
        match field {
            FaqField::Question => self.question = value,
            FaqField::Answer => self.answer = value,
        }
    }
}

/// A headline metric shown on a case study, e.g. "Conversion" / "+38%".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetric {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ResultMetric {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultField {
    Label,
    Value,
    Context,
}

impl InlineEntry for ResultMetric {
    type Field = ResultField;

    /// An empty context clears it.
    fn set_field(&mut self, field: ResultField, value: String) {
        match field {
            ResultField::Label => self.label = value,
            ResultField::Value => self.value = value,
            ResultField::Context if value.is_empty() => self.context = None,
            ResultField::Context => self.context = Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_inline_arrays_default_to_empty() {
        let study: CaseStudy =
            serde_json::from_value(json!({"id": "cs1", "title": "Acme"})).unwrap();
        assert!(study.faqs.is_empty());
        assert!(study.results.is_empty());
    }

    #[test]
    fn result_context_is_omitted_when_unset() {
        let value = serde_json::to_value(ResultMetric::new("Leads", "3x")).unwrap();
        assert_eq!(value, json!({"label": "Leads", "value": "3x"}));
    }

    #[test]
    fn empty_context_clears_it() {
        let mut metric = ResultMetric::new("Leads", "3x").with_context("in Q1");
        metric.set_field(ResultField::Context, String::new());
        assert!(metric.context.is_none());
    }
}
