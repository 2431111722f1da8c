//! Diff Engine
//!
//! Computes the labels to add, update and remove to move a repository from
//! its current label set to the desired one

use std::collections::HashMap;

use serde::Serialize;

use crate::label::{equals, Label};

/// Difference between a current and a desired label set
///
/// The three lists are disjoint by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelDiff {
    /// Desired labels with no counterpart in the current set
    pub add: Vec<Label>,

    /// Desired versions of labels whose fields differ from the current ones
    pub update: Vec<Label>,

    /// Current labels with no counterpart in the desired set
    pub remove: Vec<Label>,
}

impl LabelDiff {
    /// Whether the two label sets already match
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

/// Index labels by name; the first label with a given name wins
fn index_by_name(labels: &[Label]) -> HashMap<&str, &Label> {
    let mut index = HashMap::with_capacity(labels.len());
    for label in labels {
        index.entry(label.name.as_str()).or_insert(label);
    }
    index
}

/// Compute the diff between `current` and `desired`
///
/// Comparison is exact on every field; colors are not normalized.
pub fn diff(current: &[Label], desired: &[Label]) -> LabelDiff {
    let current_by_name = index_by_name(current);
    let desired_by_name = index_by_name(desired);

    let mut result = LabelDiff::default();

    for label in desired {
        match current_by_name.get(label.name.as_str()) {
            None => result.add.push(label.clone()),
            Some(existing) if equals(existing, label) => {}
            Some(_) => result.update.push(label.clone()),
        }
    }

    for label in current {
        if !desired_by_name.contains_key(label.name.as_str()) {
            result.remove.push(label.clone());
        }
    }

    result
}
