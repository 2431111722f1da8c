//! label-sync CLI
//!
//! Command line tool for synchronizing labels across GitHub repositories

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use label_sync::{
    config::{
        default_config, fetch_remote_convention_config, find_convention_config,
        load_config_from_file, load_config_from_stdin, resolve_dry_run, CONVENTION_CONFIG_FILES,
        DEFAULT_CONCURRENCY,
    },
    logging,
    report::ApplyError,
    Error, GitHubClient, IssueRef, LabelService, LabelSyncer, ParsedConfig, RepositoryRef,
    RepositorySyncReport, SiblingSyncReport, SyncOptions, SyncReport,
};

/// label-sync CLI
///
/// Declarative GitHub label synchronization across many repositories
#[derive(Parser)]
#[command(
    name = "label-sync",
    version,
    about = "Declarative GitHub label synchronization across many repositories",
    long_about = "Synchronizes the labels of every repository listed in a configuration file. \
    Missing labels are created, changed labels are updated, and in strict mode labels that are \
    not part of the configuration are removed."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// GitHub access token
    #[arg(short = 't', long, global = true)]
    access_token: Option<String>,

    /// Configuration file path (JSON/YAML, `-` for stdin)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Read the configuration from a repository (owner/repo format)
    #[arg(long, global = true, conflicts_with = "config")]
    remote: Option<String>,

    /// Current branch; runs outside the publish branch are dry runs
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Dry run mode (don't make actual changes)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Maximum number of repositories synchronized at the same time
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Report format
    #[arg(long, global = true, default_value = "terminal", value_parser = ["terminal", "markdown", "json"])]
    report: String,

    /// Post the markdown report as a comment (owner/repo#number)
    #[arg(long, global = true)]
    comment: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize labels
    Sync,

    /// Preview synchronization content
    Preview,

    /// Output a default configuration
    Init {
        /// Repository to configure (owner/repo format)
        #[arg(short = 'r', long, default_value = "owner/repo")]
        repository: String,

        /// Output format
        #[arg(long, default_value = "yaml", value_parser = ["json", "yaml"])]
        format: String,

        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Display current labels
    List {
        /// Target repository (owner/repo format)
        #[arg(short = 'r', long)]
        repository: Option<String>,

        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json", "yaml"])]
        format: String,
    },

    /// Propagate an issue's trigger labels to sibling repositories
    Siblings {
        /// Repository of the issue (owner/repo format)
        #[arg(short = 'r', long)]
        repository: Option<String>,

        /// Issue or pull request number
        #[arg(long)]
        issue: u64,

        /// Linked issue in a sibling repository (owner/repo#number)
        #[arg(long = "link")]
        links: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{} Failed to initialize logging: {}", "!".yellow(), e);
    }

    let success = match &cli.command {
        Some(Commands::Sync) | None => run_sync(&cli, false).await?,
        Some(Commands::Preview) => run_sync(&cli, true).await?,
        Some(Commands::Init {
            repository,
            format,
            output,
        }) => run_init(repository, format, output.as_ref())?,
        Some(Commands::List { repository, format }) => {
            let token = get_access_token(cli.access_token.clone())?;
            let repository = require_repository(repository.clone())?;
            run_list(&token, &repository, format).await?
        }
        Some(Commands::Siblings {
            repository,
            issue,
            links,
        }) => {
            let repository = require_repository(repository.clone())?;
            run_siblings(&cli, &repository, *issue, links).await?
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

/// Execute synchronization
async fn run_sync(cli: &Cli, force_dry_run: bool) -> anyhow::Result<bool> {
    let comment = comment_target(cli)?;
    let (parsed, options) = build_options(cli, force_dry_run).await?;
    let access_token = options.access_token.clone();

    if cli.verbose {
        println!(
            "{} Synchronizing {} repositories",
            "•".blue(),
            parsed.config.repositories.len().to_string().cyan()
        );
        if options.dry_run {
            println!(
                "{} Running in dry-run mode (no changes will be made)",
                "!".yellow()
            );
        }
    }

    let report = label_sync::sync_labels(&parsed, options)
        .await
        .context("label sync failed")?;

    match cli.report.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" => println!("{}", report.to_markdown()),
        _ => display_sync_report(&report, cli.verbose),
    }

    if let Some(target) = &comment {
        post_comment(&access_token, target, &report.to_markdown()).await?;
    }

    Ok(!report.has_failures())
}

/// Execute siblings command
async fn run_siblings(
    cli: &Cli,
    repository: &str,
    issue: u64,
    links: &[String],
) -> anyhow::Result<bool> {
    let repository = RepositoryRef::parse(repository)?;
    let links = links
        .iter()
        .map(|link| IssueRef::parse(link))
        .collect::<label_sync::Result<Vec<_>>>()?;
    let comment = comment_target(cli)?;

    let (parsed, options) = build_options(cli, false).await?;
    options.validate()?;

    let access_token = options.access_token.clone();
    let client = GitHubClient::new(&access_token)?;
    let syncer = LabelSyncer::new(client, options);
    let (report, errors) = syncer
        .sync_siblings(&parsed.config, &repository, issue, &links)
        .await
        .with_context(|| format!("sibling sync failed for {repository}#{issue}"))?;

    match cli.report.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" => println!("{}", report.to_markdown()),
        _ => display_sibling_report(&report),
    }
    display_apply_errors(&errors);

    if let Some(target) = &comment {
        post_comment(&access_token, target, &report.to_markdown()).await?;
    }

    Ok(errors.is_empty())
}

/// Load the configuration and build the sync options once
async fn build_options(cli: &Cli, force_dry_run: bool) -> anyhow::Result<(ParsedConfig, SyncOptions)> {
    let token = get_access_token(cli.access_token.clone())?;
    let branch = current_branch(cli.branch.clone());
    let parsed = load_config(cli, &token, branch.as_deref()).await?;

    let forced = cli.dry_run || force_dry_run;
    let dry_run = resolve_dry_run(forced, branch.as_deref(), &parsed.config.publish.branch);
    if branch.is_none() && !forced {
        tracing::warn!(
            publish_branch = %parsed.config.publish.branch,
            "current branch unknown, running as dry run (set --branch or GITHUB_BRANCH to apply)"
        );
    }

    let options = SyncOptions {
        access_token: token,
        dry_run,
        concurrency: cli.concurrency,
    };

    Ok((parsed, options))
}

/// Execute init command
fn run_init(repository: &str, format: &str, output: Option<&PathBuf>) -> anyhow::Result<bool> {
    let config = default_config(RepositoryRef::parse(repository)?);
    let value = config.to_value()?;

    let content = match format {
        "json" => serde_json::to_string_pretty(&value)?,
        "yaml" => serde_yaml::to_string(&value)?,
        _ => return Err(Error::config_validation("Unsupported format").into()),
    };

    if let Some(output_path) = output {
        std::fs::write(output_path, content)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        println!(
            "{} Default configuration written to: {}",
            "✓".green(),
            output_path.display().to_string().cyan()
        );
    } else {
        println!("{}", content);
    }

    Ok(true)
}

/// Execute list command
async fn run_list(access_token: &str, repository: &str, format: &str) -> anyhow::Result<bool> {
    let repository = RepositoryRef::parse(repository)?;
    let client = GitHubClient::new(access_token)?;
    let labels = client.get_labels(&repository).await?;

    match format {
        "table" => {
            println!(
                "{:<30} {:<8} {:<50}",
                "Name".cyan(),
                "Color".cyan(),
                "Description".cyan()
            );
            println!("{}", "─".repeat(90));

            for label in labels {
                let description = if label.description.is_empty() {
                    "(none)"
                } else {
                    label.description.as_str()
                };
                println!(
                    "{:<30} {:<8} {:<50}",
                    label.name,
                    format!("#{}", label.color),
                    description
                );
            }
        }
        "json" => println!("{}", serde_json::to_string_pretty(&labels)?),
        "yaml" => println!("{}", serde_yaml::to_string(&labels)?),
        _ => return Err(Error::config_validation("Unsupported format").into()),
    }

    Ok(true)
}

/// Display synchronization results
fn display_sync_report(report: &SyncReport, verbose: bool) {
    if report.dry_run {
        println!("\n{} Label sync preview (dry-run mode):", "•".blue());
    } else {
        println!("\n{} Label sync report:", "•".blue());
    }

    for sync in &report.syncs {
        match sync {
            RepositorySyncReport::Success {
                additions,
                updates,
                removals,
                config,
                ..
            } => {
                let status = if sync.has_changes() {
                    "changed".yellow()
                } else {
                    "up to date".green()
                };
                println!("\n{} {} ({})", "✓".green(), sync.full_name().cyan(), status);
                println!("  Created: {}", additions.len().to_string().green());
                println!("  Updated: {}", updates.len().to_string().yellow());
                println!("  Deleted: {}", removals.len().to_string().red());

                if verbose {
                    for label in additions {
                        println!("    {} {} (#{})", "+".green(), label.name.cyan(), label.color);
                    }
                    for label in updates {
                        println!("    {} {} (#{})", "~".yellow(), label.name.cyan(), label.color);
                    }
                    for label in removals {
                        println!("    {} {}", "-".red(), label.name.red());
                    }
                    if !config.manifest.strict {
                        println!("    {}", "strict mode disabled, labels are never removed".dimmed());
                    }
                }
            }
            RepositorySyncReport::Failure { message, .. } => {
                println!("\n{} {}", "✗".red(), sync.full_name().red());
                println!("  {}", message.red());
            }
        }
    }

    if !report.config_errors.is_empty() {
        eprintln!("\n{} Check the configuration of these repositories:", "✗".red());
        for error in &report.config_errors {
            eprintln!("  {}", error.to_string().red());
        }
    }

    display_apply_errors(&report.apply_errors);
}

/// Display sibling propagation results
fn display_sibling_report(report: &SiblingSyncReport) {
    let mode = if report.dry_run { " (dry-run mode)" } else { "" };
    println!("\n{} Sibling labels for {}{}:", "•".blue(), report.repository.cyan(), mode);

    for sibling in &report.issues {
        if sibling.siblings.is_empty() {
            continue;
        }
        let names: Vec<&str> = sibling.siblings.iter().map(|l| l.name.as_str()).collect();
        let target = match sibling.linked_issue {
            Some(number) => format!("{}#{}", sibling.repository, number),
            None => format!("{} (not linked)", sibling.repository),
        };
        println!("  {} -> {}: {}", sibling.issue.number, target.cyan(), names.join(", "));
    }
}

fn display_apply_errors(errors: &[ApplyError]) {
    if errors.is_empty() {
        return;
    }

    eprintln!("\n{} Errors occurred:", "✗".red());
    for error in errors {
        eprintln!("  {}", error.to_string().red());
    }
}

/// Parse the `--comment` target
fn comment_target(cli: &Cli) -> label_sync::Result<Option<IssueRef>> {
    cli.comment.as_deref().map(IssueRef::parse).transpose()
}

/// Post a report as a comment on an issue or pull request
async fn post_comment(access_token: &str, target: &IssueRef, body: &str) -> anyhow::Result<()> {
    let client = GitHubClient::new(access_token)?;
    client
        .create_comment(&target.repository, target.number, body)
        .await
        .with_context(|| format!("failed to comment on {target}"))?;

    println!("{} Report posted to {}", "✓".green(), target.to_string().cyan());
    Ok(())
}

/// Load configuration from `--remote`, `--config`, or a convention file
async fn load_config(cli: &Cli, token: &str, branch: Option<&str>) -> anyhow::Result<ParsedConfig> {
    if let Some(remote) = &cli.remote {
        let repository = RepositoryRef::parse(remote)?;
        let client = GitHubClient::new(token)?;
        let parsed = fetch_remote_convention_config(&client, &repository, branch)
            .await
            .with_context(|| format!("failed to load configuration from {repository}"))?;
        return Ok(parsed);
    }

    match &cli.config {
        Some(path) if path.as_os_str() == "-" => Ok(load_config_from_stdin()?),
        Some(path) => load_config_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let path = find_convention_config().ok_or_else(|| Error::ConfigNotFound {
                searched_files: CONVENTION_CONFIG_FILES.join(", "),
            })?;
            tracing::debug!(path = %path.display(), "using convention configuration file");
            load_config_from_file(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
    }
}

/// Require a repository argument
fn require_repository(repo: Option<String>) -> label_sync::Result<String> {
    repo.ok_or_else(|| {
        Error::config_validation("Repository is required. Use -r or --repository flag")
    })
}

/// Get access token
fn get_access_token(arg_token: Option<String>) -> label_sync::Result<String> {
    arg_token
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .ok_or_else(|| {
            Error::config_validation(
                "GitHub access token is required. Set via --access-token, -t or GITHUB_TOKEN",
            )
        })
}

/// Get the current branch
fn current_branch(arg_branch: Option<String>) -> Option<String> {
    arg_branch.or_else(|| std::env::var("GITHUB_BRANCH").ok())
}
