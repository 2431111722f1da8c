//! Sync Policy
//!
//! Turns a label diff into the actions that are allowed to run against a repository

use serde::Serialize;

use crate::diff::LabelDiff;
use crate::label::Label;

/// Options controlling how a diff is planned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Permit removal of labels missing from the manifest
    pub strict: bool,

    /// Report the plan without applying it
    pub dry_run: bool,
}

impl PlanOptions {
    /// Whether the plan should be applied to the repository
    pub fn persist(&self) -> bool {
        !self.dry_run
    }
}

/// Actions authorized for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPlan {
    pub to_add: Vec<Label>,
    pub to_update: Vec<Label>,
    pub to_remove: Vec<Label>,
}

impl SyncPlan {
    /// Whether the plan contains no actions
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Authorize the actions of a diff
///
/// Additions and updates always pass. Removals only pass in strict mode.
/// `dry_run` never changes the plan; it only decides whether the plan is applied.
pub fn plan(diff: LabelDiff, options: PlanOptions) -> SyncPlan {
    let LabelDiff {
        add,
        update,
        remove,
    } = diff;

    SyncPlan {
        to_add: add,
        to_update: update,
        to_remove: if options.strict { remove } else { Vec::new() },
    }
}
