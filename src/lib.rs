//! # label-sync
//!
//! Declarative GitHub label synchronization across many repositories
//!
//! ## Features
//! - Minimal add/update/remove label diffs
//! - Strict mode (remove labels missing from the manifest)
//! - Dry-run mode
//! - Sibling label propagation across repositories

pub mod config;
pub mod diff;
pub mod error;
pub mod github;
pub mod label;
pub mod logging;
pub mod policy;
pub mod report;
pub mod siblings;
pub mod sync;

pub use config::{
    Config, ConfigError, IssueRef, ParsedConfig, RepositoryConfig, RepositoryRef, SyncOptions,
};
pub use diff::{diff, LabelDiff};
pub use error::{Error, Result};
pub use github::{GitHubClient, LabelService};
pub use label::{Label, LabelDefinition, LabelManifest};
pub use policy::{plan, PlanOptions, SyncPlan};
pub use report::{RepositorySyncReport, SiblingSyncReport, SyncReport};
pub use sync::LabelSyncer;

/// Synchronize every repository of a parsed configuration against GitHub
///
/// # Examples
///
/// ```rust,no_run
/// use label_sync::{config, SyncOptions};
///
/// #[tokio::main]
/// async fn main() -> label_sync::Result<()> {
///     let parsed = config::load_config_from_file(".github/labels.yml")?;
///     let options = SyncOptions::new("your_github_token", true);
///
///     let report = label_sync::sync_labels(&parsed, options).await?;
///     println!("{}", report.to_markdown());
///     Ok(())
/// }
/// ```
pub async fn sync_labels(parsed: &ParsedConfig, options: SyncOptions) -> Result<SyncReport> {
    options.validate()?;

    let client = GitHubClient::new(&options.access_token)?;
    let syncer = LabelSyncer::new(client, options);
    Ok(syncer.sync_all(parsed).await)
}
