use crate::core::{CasebookError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An entry of an inline list whose fields can be edited one at a time.
pub trait InlineEntry: Clone {
    type Field: Copy;

    fn set_field(&mut self, field: Self::Field, value: String);
}

/// Ordered list embedded in a parent record.
///
/// Identity is the index: removing an entry shifts everything after it down
/// by one, and there is no reorder operation beyond replacing the whole
/// sequence. Edits stay in memory until the parent is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineList<T> {
    entries: Vec<T>,
    capacity: Option<usize>,
}

impl<T> Default for InlineList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            capacity: None,
        }
    }
}

impl<T: InlineEntry> InlineList<T> {
    pub fn unbounded(entries: Vec<T>) -> Self {
        Self {
            entries,
            capacity: None,
        }
    }

    /// List holding at most `capacity` entries. Longer input is rejected.
    pub fn bounded(entries: Vec<T>, capacity: usize) -> Result<Self> {
        check_capacity(Some(capacity), entries.len())?;
        Ok(Self {
            entries,
            capacity: Some(capacity),
        })
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.entries.len() >= cap)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Appends `entry` unless the list is full. Returns whether it was added.
    pub fn append(&mut self, entry: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Sets one field of the entry at `index`.
    pub fn replace(&mut self, index: usize, field: T::Field, value: impl Into<String>) -> Result<()> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(CasebookError::InvalidIndex { index, len })?;
        entry.set_field(field, value.into());
        Ok(())
    }

    /// Removes the entry at `index`, closing the gap.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        let len = self.entries.len();
        if index >= len {
            return Err(CasebookError::InvalidIndex { index, len });
        }
        Ok(self.entries.remove(index))
    }

    /// Replaces the whole sequence, which is how an inline list is reordered.
    pub fn replace_all(&mut self, entries: Vec<T>) -> Result<()> {
        check_capacity(self.capacity, entries.len())?;
        self.entries = entries;
        Ok(())
    }

    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

fn check_capacity(capacity: Option<usize>, len: usize) -> Result<()> {
    match capacity {
        Some(capacity) if len > capacity => Err(CasebookError::CapacityExceeded { capacity, len }),
        _ => Ok(()),
    }
}

impl<'a, T> IntoIterator for &'a InlineList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// Stored as a bare array on the parent row; the bound is a property of the
// editor, not of the data.
impl<T: Serialize> Serialize for InlineList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for InlineList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            entries: Vec::deserialize(deserializer)?,
            capacity: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Faq, FaqField, ResultMetric};

    fn results(n: usize) -> Vec<ResultMetric> {
        (0..n)
            .map(|i| ResultMetric::new(format!("label {}", i), format!("{}%", i)))
            .collect()
    }

    #[test]
    fn append_past_capacity_is_a_no_op() {
        let mut list = InlineList::bounded(results(3), 4).unwrap();

        assert!(list.append(ResultMetric::new("fourth", "4")));
        assert!(!list.append(ResultMetric::new("fifth", "5")));
        assert_eq!(list.len(), 4);
        assert_eq!(list.get(3).map(|m| m.label.as_str()), Some("fourth"));
    }

    #[test]
    fn remove_at_shifts_later_entries_down() {
        let mut list = InlineList::unbounded(results(4));
        let before = list.clone();

        let removed = list.remove_at(1).unwrap();

        assert_eq!(removed, before.as_slice()[1]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0), before.get(0));
        assert_eq!(list.get(1), before.get(2));
        assert_eq!(list.get(2), before.get(3));
    }

    #[test]
    fn faq_remove_first() {
        let mut faqs = InlineList::unbounded(vec![Faq::new("q1", "a1"), Faq::new("q2", "a2")]);
        faqs.remove_at(0).unwrap();
        assert_eq!(faqs.into_vec(), vec![Faq::new("q2", "a2")]);
    }

    #[test]
    fn replace_touches_only_the_named_field() {
        let mut faqs = InlineList::unbounded(vec![Faq::new("q1", "a1"), Faq::new("q2", "a2")]);
        faqs.replace(1, FaqField::Answer, "updated").unwrap();

        assert_eq!(faqs.get(0), Some(&Faq::new("q1", "a1")));
        assert_eq!(faqs.get(1), Some(&Faq::new("q2", "updated")));
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut faqs = InlineList::unbounded(vec![Faq::new("q1", "a1")]);

        assert_eq!(
            faqs.replace(1, FaqField::Question, "x"),
            Err(CasebookError::InvalidIndex { index: 1, len: 1 })
        );
        assert!(faqs.remove_at(5).is_err());
        assert_eq!(faqs.len(), 1);
    }

    #[test]
    fn replace_all_reorders_within_capacity() {
        let mut list = InlineList::bounded(results(2), 4).unwrap();
        let mut reversed = list.clone().into_vec();
        reversed.reverse();

        list.replace_all(reversed.clone()).unwrap();
        assert_eq!(list.as_slice(), reversed.as_slice());

        assert_eq!(
            list.replace_all(results(5)),
            Err(CasebookError::CapacityExceeded { capacity: 4, len: 5 })
        );
        assert_eq!(list.as_slice(), reversed.as_slice());
    }

    #[test]
    fn serializes_as_a_plain_array() {
        let list = InlineList::unbounded(vec![Faq::new("q", "a")]);
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            serde_json::json!([{"question": "q", "answer": "a"}])
        );
    }
}
