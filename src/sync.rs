//! Label Synchronization Functionality
//!
//! Runs fetch, diff, plan and apply for every configured repository

use std::future::Future;

use futures::future::join_all;
use futures::stream::{self, StreamExt};

use crate::config::{Config, IssueRef, ParsedConfig, RepositoryConfig, RepositoryRef, SyncOptions};
use crate::diff::diff;
use crate::error::{Error, Result};
use crate::github::LabelService;
use crate::label::Label;
use crate::policy::{plan, PlanOptions, SyncPlan};
use crate::report::{ApplyAction, ApplyError, RepositorySyncReport, SiblingSyncReport, SyncReport};
use crate::siblings::propagate;

/// Label Synchronization Engine
///
/// Synchronizes repository labels with their manifests through a [`LabelService`]
pub struct LabelSyncer<S> {
    service: S,
    options: SyncOptions,
}

impl<S: LabelService> LabelSyncer<S> {
    /// Create a new label synchronization engine
    pub fn new(service: S, options: SyncOptions) -> Self {
        Self { service, options }
    }

    /// Synchronize every repository of a parsed configuration
    ///
    /// Repositories are processed concurrently up to `options.concurrency`.
    /// Configuration errors are carried into the report untouched.
    pub async fn sync_all(&self, parsed: &ParsedConfig) -> SyncReport {
        let mut report = SyncReport::new(self.options.dry_run);
        report.config_errors = parsed.errors.clone();

        let results: Vec<(RepositorySyncReport, Vec<ApplyError>)> =
            stream::iter(&parsed.config.repositories)
                .map(|config| self.sync_repository(config))
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;

        for (sync, apply_errors) in results {
            report.syncs.push(sync);
            report.apply_errors.extend(apply_errors);
        }

        tracing::info!(
            repositories = report.syncs.len(),
            config_errors = report.config_errors.len(),
            apply_errors = report.apply_errors.len(),
            dry_run = report.dry_run,
            "label sync finished"
        );

        report
    }

    /// Synchronize a single repository
    ///
    /// A fetch failure becomes a `Failure` report. Apply failures are
    /// returned separately and do not change the report.
    pub async fn sync_repository(
        &self,
        config: &RepositoryConfig,
    ) -> (RepositorySyncReport, Vec<ApplyError>) {
        let repository = &config.repository;

        let current = match self.service.get_labels(repository).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!(%repository, error = %e, "could not fetch labels");
                return (RepositorySyncReport::failure(config, e.to_string()), Vec::new());
            }
        };

        let options = PlanOptions {
            strict: config.manifest.strict,
            dry_run: self.options.dry_run,
        };
        let sync_plan = plan(diff(&current, &config.labels()), options);

        tracing::info!(
            %repository,
            add = sync_plan.to_add.len(),
            update = sync_plan.to_update.len(),
            remove = sync_plan.to_remove.len(),
            dry_run = options.dry_run,
            "planned label sync"
        );

        let apply_errors = if options.persist() {
            self.apply_plan(repository, &sync_plan).await
        } else {
            Vec::new()
        };

        (RepositorySyncReport::success(config, sync_plan), apply_errors)
    }

    /// Apply a plan: every creation, then every update, then every removal
    async fn apply_plan(&self, repository: &RepositoryRef, plan: &SyncPlan) -> Vec<ApplyError> {
        let mut errors = Vec::new();

        errors.extend(
            apply_each(repository, ApplyAction::Create, &plan.to_add, |label| {
                self.service.create_label(repository, label)
            })
            .await,
        );
        errors.extend(
            apply_each(repository, ApplyAction::Update, &plan.to_update, |label| {
                self.service.update_label(repository, label)
            })
            .await,
        );
        errors.extend(
            apply_each(repository, ApplyAction::Delete, &plan.to_remove, |label| {
                self.service.delete_label(repository, &label.name)
            })
            .await,
        );

        errors
    }

    /// Propagate an issue's trigger labels to its sibling repositories
    ///
    /// Sibling repositories without a link are reported but not applied.
    ///
    /// # Errors
    /// Returns an error if the repository is not configured or the issue cannot be fetched
    pub async fn sync_siblings(
        &self,
        config: &Config,
        repository: &RepositoryRef,
        issue_number: u64,
        links: &[IssueRef],
    ) -> Result<(SiblingSyncReport, Vec<ApplyError>)> {
        let repository_config = config
            .repository(&repository.full_name())
            .ok_or_else(|| Error::RepositoryNotFound(repository.full_name()))?;

        let issue = self.service.get_issue(repository, issue_number).await?;
        let mut reports = propagate(&issue, &repository_config.siblings, &config.catalogues());
        let mut apply_errors = Vec::new();

        for report in &mut reports {
            let link = links
                .iter()
                .find(|link| link.repository.full_name() == report.repository);
            report.linked_issue = link.map(|link| link.number);

            let Some(link) = link else {
                if !report.siblings.is_empty() {
                    tracing::warn!(sibling = %report.repository, "no linked issue, skipping");
                }
                continue;
            };

            if report.siblings.is_empty() || self.options.dry_run {
                continue;
            }

            if let Err(e) = self
                .service
                .add_labels_to_issue(&link.repository, link.number, &report.siblings)
                .await
            {
                let names: Vec<&str> = report.siblings.iter().map(|l| l.name.as_str()).collect();
                apply_errors.push(ApplyError {
                    repository: report.repository.clone(),
                    label: names.join(", "),
                    action: ApplyAction::Attach,
                    message: e.to_string(),
                });
            }
        }

        let report = SiblingSyncReport {
            repository: repository.full_name(),
            dry_run: self.options.dry_run,
            issues: reports,
        };
        Ok((report, apply_errors))
    }
}

/// Run one action per label concurrently and collect the failures
async fn apply_each<'a, F, Fut>(
    repository: &RepositoryRef,
    action: ApplyAction,
    labels: &'a [Label],
    call: F,
) -> Vec<ApplyError>
where
    F: Fn(&'a Label) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let results = join_all(labels.iter().map(|label| {
        let fut = call(label);
        async move { (label, fut.await) }
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(label, result)| {
            let e = result.err()?;
            tracing::warn!(%repository, label = %label.name, %action, error = %e, "apply failed");
            Some(ApplyError {
                repository: repository.full_name(),
                label: label.name.clone(),
                action,
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::parse_config_from_content;
    use crate::siblings::Issue;

    /// In-memory label service recording every mutating call
    #[derive(Default)]
    struct MemoryService {
        labels: HashMap<String, Vec<Label>>,
        issues: HashMap<(String, u64), Issue>,
        failing_creates: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MemoryService {
        fn with_labels(mut self, repository: &str, labels: Vec<Label>) -> Self {
            self.labels.insert(repository.to_string(), labels);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl LabelService for MemoryService {
        async fn get_labels(&self, repository: &RepositoryRef) -> Result<Vec<Label>> {
            self.labels
                .get(&repository.full_name())
                .cloned()
                .ok_or_else(|| Error::RepositoryNotFound(repository.full_name()))
        }

        async fn create_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()> {
            if self.failing_creates.contains(&label.name) {
                return Err(Error::label_validation("already_exists"));
            }
            self.record(format!("create {repository} {}", label.name));
            Ok(())
        }

        async fn update_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()> {
            self.record(format!("update {repository} {}", label.name));
            Ok(())
        }

        async fn delete_label(&self, repository: &RepositoryRef, name: &str) -> Result<()> {
            self.record(format!("delete {repository} {name}"));
            Ok(())
        }

        async fn get_issue(&self, repository: &RepositoryRef, number: u64) -> Result<Issue> {
            self.issues
                .get(&(repository.full_name(), number))
                .cloned()
                .ok_or_else(|| Error::RepositoryNotFound(format!("{repository}#{number}")))
        }

        async fn add_labels_to_issue(
            &self,
            repository: &RepositoryRef,
            number: u64,
            labels: &[Label],
        ) -> Result<()> {
            let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
            self.record(format!("attach {repository}#{number} {}", names.join(",")));
            Ok(())
        }

        async fn create_comment(
            &self,
            repository: &RepositoryRef,
            number: u64,
            _body: &str,
        ) -> Result<()> {
            self.record(format!("comment {repository}#{number}"));
            Ok(())
        }
    }

    const CONFIG: &str = r#"{
        "repositories": {
            "acme/web": {
                "strict": true,
                "labels": {
                    "bug": "0f0",
                    "feature": "0ff",
                    "needs-docs": { "color": "fbca04", "description": "Docs missing" }
                },
                "siblings": { "acme/docs": { "needs-docs": ["documentation"] } }
            },
            "acme/api": { "labels": { "bug": "0f0" } },
            "acme/docs": { "labels": { "documentation": "0075ca" } }
        }
    }"#;

    fn parsed() -> ParsedConfig {
        parse_config_from_content(CONFIG, "labels.json").unwrap()
    }

    fn service() -> MemoryService {
        MemoryService::default()
            .with_labels(
                "acme/web",
                vec![
                    Label::new("bug", "f00"),
                    Label::new("stale", "ccc"),
                    Label::new("needs-docs", "fbca04").with_description("Docs missing"),
                ],
            )
            .with_labels("acme/api", vec![Label::new("stale", "ccc")])
            .with_labels("acme/docs", vec![Label::new("documentation", "0075ca")])
    }

    fn find<'a>(report: &'a SyncReport, name: &str) -> &'a RepositorySyncReport {
        report
            .syncs
            .iter()
            .find(|sync| sync.full_name() == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_all_applies_in_order() {
        let syncer = LabelSyncer::new(service(), SyncOptions::new("token", false));
        let report = syncer.sync_all(&parsed()).await;

        assert!(!report.has_failures(), "{}", report.to_markdown());
        assert_eq!(report.syncs.len(), 3);

        match find(&report, "acme/web") {
            RepositorySyncReport::Success {
                additions,
                updates,
                removals,
                ..
            } => {
                assert_eq!(additions, &vec![Label::new("feature", "0ff")]);
                assert_eq!(updates, &vec![Label::new("bug", "0f0")]);
                assert_eq!(removals, &vec![Label::new("stale", "ccc")]);
            }
            other => panic!("unexpected report: {other:?}"),
        }

        let web_calls: Vec<String> = syncer
            .service
            .calls()
            .into_iter()
            .filter(|call| call.contains("acme/web"))
            .collect();
        assert_eq!(
            web_calls,
            vec![
                "create acme/web feature",
                "update acme/web bug",
                "delete acme/web stale"
            ]
        );
    }

    #[tokio::test]
    async fn test_non_strict_repository_keeps_extra_labels() {
        let syncer = LabelSyncer::new(service(), SyncOptions::new("token", false));
        let report = syncer.sync_all(&parsed()).await;

        match find(&report, "acme/api") {
            RepositorySyncReport::Success {
                additions,
                removals,
                ..
            } => {
                assert_eq!(additions, &vec![Label::new("bug", "0f0")]);
                assert!(removals.is_empty());
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert!(!syncer
            .service
            .calls()
            .iter()
            .any(|call| call.starts_with("delete acme/api")));
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_mutating() {
        let syncer = LabelSyncer::new(service(), SyncOptions::new("token", true));
        let report = syncer.sync_all(&parsed()).await;

        assert!(report.dry_run);
        assert!(find(&report, "acme/web").has_changes());
        assert!(syncer.service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let service = MemoryService::default()
            .with_labels("acme/web", Vec::new())
            .with_labels("acme/docs", Vec::new());
        let syncer = LabelSyncer::new(service, SyncOptions::new("token", false));
        let report = syncer.sync_all(&parsed()).await;

        match find(&report, "acme/api") {
            RepositorySyncReport::Failure { message, .. } => {
                assert!(message.contains("Repository not found: acme/api"));
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert!(find(&report, "acme/web").is_success());
        assert!(find(&report, "acme/docs").is_success());
    }

    #[tokio::test]
    async fn test_apply_errors_are_collected_separately() {
        let mut service = service();
        service.failing_creates.push("feature".to_string());

        let syncer = LabelSyncer::new(service, SyncOptions::new("token", false));
        let report = syncer.sync_all(&parsed()).await;

        assert_eq!(report.apply_errors.len(), 1);
        assert_eq!(report.apply_errors[0].label, "feature");
        assert_eq!(report.apply_errors[0].action, ApplyAction::Create);

        match find(&report, "acme/web") {
            RepositorySyncReport::Success { additions, .. } => {
                assert_eq!(additions, &vec![Label::new("feature", "0ff")]);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert!(syncer
            .service
            .calls()
            .contains(&"delete acme/web stale".to_string()));
    }

    #[tokio::test]
    async fn test_config_errors_are_carried_over() {
        let mut parsed = parsed();
        parsed.errors.push(crate::config::ConfigError {
            repository: "acme".to_string(),
            message: "Invalid repository format".to_string(),
        });

        let syncer = LabelSyncer::new(service(), SyncOptions::new("token", true));
        let report = syncer.sync_all(&parsed).await;
        assert_eq!(report.config_errors, parsed.errors);
        assert!(report.has_failures());
    }

    fn sibling_service() -> MemoryService {
        let mut service = service();
        service.issues.insert(
            ("acme/web".to_string(), 7),
            Issue {
                number: 7,
                title: "Add install guide".to_string(),
                labels: vec![Label::new("needs-docs", "fbca04")],
            },
        );
        service
    }

    #[tokio::test]
    async fn test_sync_siblings_attaches_to_linked_issue() {
        let parsed = parsed();
        let syncer = LabelSyncer::new(sibling_service(), SyncOptions::new("token", false));
        let links = vec![IssueRef::parse("acme/docs#3").unwrap()];

        let (report, errors) = syncer
            .sync_siblings(&parsed.config, &RepositoryRef::new("acme", "web"), 7, &links)
            .await
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].siblings, vec![Label::new("documentation", "0075ca")]);
        assert_eq!(report.issues[0].linked_issue, Some(3));
        assert_eq!(
            syncer.service.calls(),
            vec!["attach acme/docs#3 documentation".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sync_siblings_dry_run_and_unlinked() {
        let parsed = parsed();
        let web = RepositoryRef::new("acme", "web");

        let syncer = LabelSyncer::new(sibling_service(), SyncOptions::new("token", true));
        let links = vec![IssueRef::parse("acme/docs#3").unwrap()];
        let (report, _) = syncer
            .sync_siblings(&parsed.config, &web, 7, &links)
            .await
            .unwrap();
        assert_eq!(report.issues[0].siblings.len(), 1);
        assert!(syncer.service.calls().is_empty());

        let syncer = LabelSyncer::new(sibling_service(), SyncOptions::new("token", false));
        let (report, _) = syncer
            .sync_siblings(&parsed.config, &web, 7, &[])
            .await
            .unwrap();
        assert_eq!(report.issues[0].linked_issue, None);
        assert!(syncer.service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_siblings_unknown_repository() {
        let syncer = LabelSyncer::new(sibling_service(), SyncOptions::new("token", false));
        let result = syncer
            .sync_siblings(&parsed().config, &RepositoryRef::new("acme", "nope"), 7, &[])
            .await;
        assert!(result.is_err());
    }
}
