//! Sibling Propagation
//!
//! Mirrors labels onto linked issues in sibling repositories when an issue
//! carries a trigger label

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::label::{Label, OrderedMap};

/// Trigger label name -> sibling label names to add
pub type SiblingTriggers = OrderedMap<Vec<String>>;

/// Sibling repository (`owner/repo`) -> its triggers
pub type SiblingsConfig = OrderedMap<SiblingTriggers>;

/// Issue or pull request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub labels: Vec<Label>,
}

impl From<octocrab::models::issues::Issue> for Issue {
    fn from(issue: octocrab::models::issues::Issue) -> Self {
        Issue {
            number: issue.number,
            title: issue.title,
            labels: issue.labels.into_iter().map(Label::from).collect(),
        }
    }
}

/// Labels an issue should receive in one sibling repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiblingRepositoryReport {
    /// Sibling repository (`owner/repo`)
    pub repository: String,

    /// Issue in the primary repository that triggered propagation
    pub issue: Issue,

    /// Labels to add in the sibling repository
    pub siblings: Vec<Label>,

    /// Linked issue number in the sibling repository, when known
    pub linked_issue: Option<u64>,
}

/// Compute the sibling labels triggered by `issue`
///
/// Names are resolved against `catalogue`; unknown names yield a label with
/// an empty color. Each name appears at most once.
pub fn sibling_labels(issue: &Issue, triggers: &SiblingTriggers, catalogue: &[Label]) -> Vec<Label> {
    let mut result: Vec<Label> = Vec::new();

    let names = issue
        .labels
        .iter()
        .filter_map(|label| triggers.get(&label.name))
        .flatten();

    for name in names {
        if result.iter().any(|label| &label.name == name) {
            continue;
        }

        let label = catalogue
            .iter()
            .find(|label| &label.name == name)
            .cloned()
            .unwrap_or_else(|| Label::new(name.as_str(), ""));
        result.push(label);
    }

    result
}

/// Compute sibling labels for every configured sibling repository
///
/// `catalogues` maps repository names to their hydrated manifests.
pub fn propagate(
    issue: &Issue,
    siblings: &SiblingsConfig,
    catalogues: &HashMap<String, Vec<Label>>,
) -> Vec<SiblingRepositoryReport> {
    siblings
        .iter()
        .map(|(repository, triggers)| {
            let catalogue = catalogues
                .get(repository)
                .map(Vec::as_slice)
                .unwrap_or_default();

            SiblingRepositoryReport {
                repository: repository.to_string(),
                issue: issue.clone(),
                siblings: sibling_labels(issue, triggers, catalogue),
                linked_issue: None,
            }
        })
        .collect()
}
