//! Report Model
//!
//! Structured results of a sync run, one entry per repository

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ConfigError, RepositoryConfig};
use crate::label::Label;
use crate::policy::SyncPlan;
use crate::siblings::SiblingRepositoryReport;

/// Outcome of syncing one repository
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum RepositorySyncReport {
    Success {
        owner: String,
        repo: String,
        additions: Vec<Label>,
        updates: Vec<Label>,
        removals: Vec<Label>,
        config: RepositoryConfig,
    },
    Failure {
        owner: String,
        repo: String,
        message: String,
        config: RepositoryConfig,
    },
}

impl RepositorySyncReport {
    /// Build a success report from an authorized plan
    pub fn success(config: &RepositoryConfig, plan: SyncPlan) -> Self {
        RepositorySyncReport::Success {
            owner: config.repository.owner.clone(),
            repo: config.repository.repo.clone(),
            additions: plan.to_add,
            updates: plan.to_update,
            removals: plan.to_remove,
            config: config.clone(),
        }
    }

    /// Build a failure report
    pub fn failure(config: &RepositoryConfig, message: impl Into<String>) -> Self {
        RepositorySyncReport::Failure {
            owner: config.repository.owner.clone(),
            repo: config.repository.repo.clone(),
            message: message.into(),
            config: config.clone(),
        }
    }

    /// `owner/repo` of the reported repository
    pub fn full_name(&self) -> String {
        match self {
            RepositorySyncReport::Success { owner, repo, .. }
            | RepositorySyncReport::Failure { owner, repo, .. } => format!("{owner}/{repo}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RepositorySyncReport::Success { .. })
    }

    /// Whether the report lists any label change
    pub fn has_changes(&self) -> bool {
        match self {
            RepositorySyncReport::Success {
                additions,
                updates,
                removals,
                ..
            } => !(additions.is_empty() && updates.is_empty() && removals.is_empty()),
            RepositorySyncReport::Failure { .. } => false,
        }
    }
}

/// Kind of mutating call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Create,
    Update,
    Delete,
    Attach,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            ApplyAction::Create => "create",
            ApplyAction::Update => "update",
            ApplyAction::Delete => "delete",
            ApplyAction::Attach => "attach",
        };
        f.write_str(action)
    }
}

/// A single mutating call that failed while applying a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyError {
    pub repository: String,
    pub label: String,
    pub action: ApplyAction,
    pub message: String,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: failed to {} label {:?}: {}",
            self.repository, self.action, self.label, self.message
        )
    }
}

/// Aggregate result of a sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub syncs: Vec<RepositorySyncReport>,
    pub config_errors: Vec<ConfigError>,
    pub apply_errors: Vec<ApplyError>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            dry_run,
            syncs: Vec::new(),
            config_errors: Vec::new(),
            apply_errors: Vec::new(),
        }
    }

    /// Whether any repository failed, was misconfigured or could not be fully applied
    pub fn has_failures(&self) -> bool {
        !self.config_errors.is_empty()
            || !self.apply_errors.is_empty()
            || self.syncs.iter().any(|sync| !sync.is_success())
    }

    /// Render a plain human-readable report, suitable for an issue or pull request comment
    pub fn to_markdown(&self) -> String {
        MarkdownReport(self).to_string()
    }
}

struct MarkdownReport<'a>(&'a SyncReport);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        writeln!(f, "## Label Sync Report")?;
        writeln!(f)?;
        writeln!(f, "This is an autogenerated report for your project.")?;
        writeln!(f, "(dry run: \"{}\")", report.dry_run)?;

        for sync in &report.syncs {
            writeln!(f)?;
            writeln!(f, "### {}", sync.full_name())?;
            match sync {
                RepositorySyncReport::Success {
                    additions,
                    updates,
                    removals,
                    config,
                    ..
                } => {
                    if !sync.has_changes() {
                        writeln!(f, "Nothing changed.")?;
                    }
                    write_label_list(f, "Added", additions)?;
                    write_label_list(f, "Updated", updates)?;
                    write_label_list(f, "Removed", removals)?;
                    if !config.manifest.strict {
                        writeln!(f, "(strict mode disabled, no labels were removed)")?;
                    }
                }
                RepositorySyncReport::Failure { message, .. } => writeln!(f, "{message}")?,
            }
        }

        writeln!(f)?;
        if report.config_errors.is_empty() {
            writeln!(f, "Synced all repositories with no problems!")?;
        } else {
            writeln!(f, "Check the configuration of these projects:")?;
            for error in &report.config_errors {
                writeln!(f, "- {}: {}", error.repository, error.message)?;
            }
        }

        if !report.apply_errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Some changes could not be applied:")?;
            for error in &report.apply_errors {
                writeln!(f, "- {error}")?;
            }
        }

        Ok(())
    }
}

fn write_label_list(f: &mut fmt::Formatter<'_>, heading: &str, labels: &[Label]) -> fmt::Result {
    if labels.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
    writeln!(f, "{heading}: {}", names.join(", "))
}

/// Result of propagating one issue's labels to its sibling repositories
#[derive(Debug, Clone, Serialize)]
pub struct SiblingSyncReport {
    /// Primary repository (`owner/repo`)
    pub repository: String,
    pub dry_run: bool,
    pub issues: Vec<SiblingRepositoryReport>,
}

impl SiblingSyncReport {
    /// Render the sibling labels added per issue
    pub fn to_markdown(&self) -> String {
        MarkdownSiblingReport(self).to_string()
    }
}

struct MarkdownSiblingReport<'a>(&'a SiblingSyncReport);

impl fmt::Display for MarkdownSiblingReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        writeln!(f, "This is an autogenerated report for your project.")?;
        writeln!(f, "(dry run: \"{}\")", report.dry_run)?;
        writeln!(f)?;

        for sibling in report.issues.iter().filter(|r| !r.siblings.is_empty()) {
            let names: Vec<&str> = sibling.siblings.iter().map(|l| l.name.as_str()).collect();
            match sibling.linked_issue {
                Some(number) => writeln!(
                    f,
                    "- {} ({}) -> {}#{}",
                    sibling.issue.title, sibling.issue.number, sibling.repository, number
                )?,
                None => writeln!(
                    f,
                    "- {} ({}) -> {} (not linked)",
                    sibling.issue.title, sibling.issue.number, sibling.repository
                )?,
            }
            writeln!(f, "  Added {}.", names.join(", "))?;
        }

        Ok(())
    }
}
