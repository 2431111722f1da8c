//! Configuration Management
//!
//! Multi-repository label configuration and sync options

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::github::GitHubClient;
use crate::label::{Label, LabelDefinition, LabelManifest, OrderedMap};
use crate::siblings::SiblingsConfig;

/// Convention-based configuration file names searched in order
pub const CONVENTION_CONFIG_FILES: &[&str] = &[
    ".label-sync.json",
    ".label-sync.yaml",
    ".label-sync.yml",
    ".github/labels.json",
    ".github/labels.yaml",
    ".github/labels.yml",
];

/// Branch whose configuration is applied when none is configured
pub const DEFAULT_PUBLISH_BRANCH: &str = "main";

/// Repositories processed at the same time when not configured
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Repository reference in `owner/repo` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse an `owner/repo` string
    ///
    /// # Errors
    /// Returns an error if the format is invalid
    pub fn parse(repository: &str) -> Result<Self> {
        let parts: Vec<&str> = repository.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidRepositoryFormat(repository.to_string()));
        }
        Ok(Self::new(parts[0], parts[1]))
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl Serialize for RepositoryRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Issue or pull request reference in `owner/repo#number` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub repository: RepositoryRef,
    pub number: u64,
}

impl IssueRef {
    /// Parse an `owner/repo#number` reference
    ///
    /// # Errors
    /// Returns an error if the reference is malformed
    pub fn parse(reference: &str) -> Result<Self> {
        let (repository, number) = reference.split_once('#').ok_or_else(|| {
            Error::config_validation(format!(
                "Invalid issue reference {reference:?} (expected owner/repo#number)"
            ))
        })?;

        let number = number.parse().map_err(|_| {
            Error::config_validation(format!("Invalid issue number in {reference:?}"))
        })?;

        Ok(Self {
            repository: RepositoryRef::parse(repository)?,
            number,
        })
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

/// Configuration of one repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryConfig {
    pub repository: RepositoryRef,

    #[serde(flatten)]
    pub manifest: LabelManifest,

    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub siblings: SiblingsConfig,
}

impl RepositoryConfig {
    /// Validate labels and sibling references
    ///
    /// # Errors
    /// - If a label has an empty name or color
    /// - If a sibling repository is not in `owner/repo` form
    /// - If a sibling trigger is not a label of this repository
    pub fn validate(&self) -> Result<()> {
        for label in self.manifest.hydrate() {
            label.validate()?;
        }

        for (sibling, triggers) in self.siblings.iter() {
            RepositoryRef::parse(sibling)?;
            for trigger in triggers.keys() {
                if !self.manifest.labels.contains_key(trigger) {
                    return Err(Error::config_validation(format!(
                        "sibling trigger {trigger:?} for {sibling} is not a label of {}",
                        self.repository
                    )));
                }
            }
        }

        Ok(())
    }

    /// Hydrated desired labels
    pub fn labels(&self) -> Vec<Label> {
        self.manifest.hydrate()
    }
}

/// Publishing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Branch whose runs are applied; runs on other branches are dry runs
    #[serde(default = "default_publish_branch")]
    pub branch: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            branch: default_publish_branch(),
        }
    }
}

fn default_publish_branch() -> String {
    DEFAULT_PUBLISH_BRANCH.to_string()
}

/// Validated configuration of every repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub publish: PublishConfig,
    pub repositories: Vec<RepositoryConfig>,
}

impl Config {
    /// Find a repository by `owner/repo`
    pub fn repository(&self, full_name: &str) -> Option<&RepositoryConfig> {
        self.repositories
            .iter()
            .find(|config| config.repository.full_name() == full_name)
    }

    /// Hydrated labels of every repository, keyed by `owner/repo`
    pub fn catalogues(&self) -> HashMap<String, Vec<Label>> {
        self.repositories
            .iter()
            .map(|config| (config.repository.full_name(), config.labels()))
            .collect()
    }

    /// Serialize in the configuration file layout
    pub fn to_value(&self) -> Result<Value> {
        #[derive(Serialize)]
        struct Entry<'a> {
            strict: bool,
            labels: &'a OrderedMap<LabelDefinition>,
            #[serde(skip_serializing_if = "no_siblings")]
            siblings: &'a SiblingsConfig,
        }

        fn no_siblings(siblings: &&SiblingsConfig) -> bool {
            siblings.is_empty()
        }

        #[derive(Serialize)]
        struct Document<'a> {
            publish: &'a PublishConfig,
            repositories: OrderedMap<Entry<'a>>,
        }

        let document = Document {
            publish: &self.publish,
            repositories: self
                .repositories
                .iter()
                .map(|config| {
                    (
                        config.repository.full_name(),
                        Entry {
                            strict: config.manifest.strict,
                            labels: &config.manifest.labels,
                            siblings: &config.siblings,
                        },
                    )
                })
                .collect(),
        };

        Ok(serde_json::to_value(document)?)
    }
}

/// A repository whose configuration could not be used
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigError {
    pub repository: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repository, self.message)
    }
}

/// Parsed configuration with per-repository errors kept apart
#[derive(Debug, Clone, Default)]
pub struct ParsedConfig {
    pub config: Config,
    pub errors: Vec<ConfigError>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    publish: PublishConfig,
    repositories: OrderedMap<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRepositoryConfig {
    #[serde(default)]
    strict: bool,
    labels: OrderedMap<LabelDefinition>,
    #[serde(default)]
    siblings: SiblingsConfig,
}

/// JSON schema of a single repository entry
pub fn repository_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "strict": { "type": "boolean" },
            "labels": {
                "type": "object",
                "additionalProperties": {
                    "oneOf": [
                        { "type": "string" },
                        {
                            "type": "object",
                            "properties": {
                                "color": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["color"],
                            "additionalProperties": false
                        }
                    ]
                }
            },
            "siblings": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }
            }
        },
        "required": ["labels"],
        "additionalProperties": false
    })
}

fn compile_repository_schema() -> Result<JSONSchema> {
    let schema = repository_schema();
    JSONSchema::compile(&schema)
        .map_err(|e| Error::config_validation(format!("Invalid repository schema: {e}")))
}

fn validate_against_schema(schema: &JSONSchema, value: &Value) -> Result<()> {
    if let Err(errors) = schema.validate(value) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        return Err(Error::config_validation(messages.join("; ")));
    }
    Ok(())
}

fn parse_repository_config(name: &str, value: Value, schema: &JSONSchema) -> Result<RepositoryConfig> {
    let repository = RepositoryRef::parse(name)?;
    validate_against_schema(schema, &value)?;

    let raw: RawRepositoryConfig = serde_json::from_value(value)?;
    let config = RepositoryConfig {
        repository,
        manifest: LabelManifest {
            strict: raw.strict,
            labels: raw.labels,
        },
        siblings: raw.siblings,
    };
    config.validate()?;

    Ok(config)
}

/// Validate a raw configuration document
///
/// Each repository is validated on its own; a broken entry becomes a
/// [`ConfigError`] and the remaining repositories are still returned.
///
/// # Errors
/// If the document has no `repositories` map
pub fn parse_config_value(value: Value) -> Result<ParsedConfig> {
    let raw: RawConfig = serde_json::from_value(value)?;
    let schema = compile_repository_schema()?;

    let mut parsed = ParsedConfig {
        config: Config {
            publish: raw.publish,
            repositories: Vec::new(),
        },
        errors: Vec::new(),
    };

    for (name, value) in raw.repositories {
        match parse_repository_config(&name, value, &schema) {
            Ok(config) => parsed.config.repositories.push(config),
            Err(e) => {
                tracing::warn!(repository = %name, error = %e, "skipping misconfigured repository");
                parsed.errors.push(ConfigError {
                    repository: name,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(parsed)
}

/// Key structure of a configuration document
///
/// Unlike [`Value`], every map entry is kept, so keys that appear more than
/// once can still be reported.
#[derive(Debug)]
enum KeyTree {
    Map(Vec<(String, KeyTree)>),
    Leaf,
}

impl KeyTree {
    fn get(&self, key: &str) -> Option<&KeyTree> {
        match self {
            KeyTree::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            KeyTree::Leaf => None,
        }
    }

    /// Keys of this map that were already seen earlier in the same map
    fn repeated_keys(&self) -> Vec<&str> {
        let KeyTree::Map(entries) = self else {
            return Vec::new();
        };

        let mut repeated: Vec<&str> = Vec::new();
        for (index, (key, _)) in entries.iter().enumerate() {
            if entries[..index].iter().any(|(k, _)| k == key) && !repeated.contains(&key.as_str()) {
                repeated.push(key);
            }
        }
        repeated
    }

    /// Collect every repeated key below this node as a `/`-separated path
    fn collect_duplicates(&self, path: &str, out: &mut Vec<String>) {
        let KeyTree::Map(entries) = self else {
            return;
        };

        for key in self.repeated_keys() {
            let message = format!("duplicate key {path}/{key}");
            if !out.contains(&message) {
                out.push(message);
            }
        }

        for (key, value) in entries {
            value.collect_duplicates(&format!("{path}/{key}"), out);
        }
    }
}

impl<'de> Deserialize<'de> for KeyTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyTreeVisitor;

        impl<'de> Visitor<'de> for KeyTreeVisitor {
            type Value = KeyTree;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a configuration document")
            }

            fn visit_bool<E: serde::de::Error>(self, _: bool) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_i64<E: serde::de::Error>(self, _: i64) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_u64<E: serde::de::Error>(self, _: u64) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_f64<E: serde::de::Error>(self, _: f64) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_str<E: serde::de::Error>(self, _: &str) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_none<E: serde::de::Error>(self) -> std::result::Result<KeyTree, E> {
                Ok(KeyTree::Leaf)
            }

            fn visit_some<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> std::result::Result<KeyTree, D::Error> {
                KeyTree::deserialize(deserializer)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<KeyTree, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(KeyTree::Leaf)
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<KeyTree, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, KeyTree>()? {
                    entries.push((key, value));
                }
                Ok(KeyTree::Map(entries))
            }
        }

        deserializer.deserialize_any(KeyTreeVisitor)
    }
}

/// Report keys that appear more than once
///
/// Repeated top-level keys make the whole document invalid. Anything repeated
/// inside `repositories` becomes a [`ConfigError`] for that repository.
fn duplicate_key_errors(keys: &KeyTree) -> Result<Vec<ConfigError>> {
    if let Some(key) = keys.repeated_keys().first() {
        return Err(Error::config_validation(format!("duplicate key /{key}")));
    }

    let Some(repositories) = keys.get("repositories") else {
        return Ok(Vec::new());
    };
    let KeyTree::Map(entries) = repositories else {
        return Ok(Vec::new());
    };
    let repeated = repositories.repeated_keys();

    let mut errors: Vec<ConfigError> = Vec::new();
    for (name, entry) in entries {
        let mut messages = Vec::new();
        if repeated.contains(&name.as_str()) {
            messages.push(format!("duplicate repository {name}"));
        }
        entry.collect_duplicates("", &mut messages);

        if messages.is_empty() {
            continue;
        }

        match errors.iter_mut().find(|error| &error.repository == name) {
            Some(error) => {
                for message in messages {
                    if !error.message.contains(&message) {
                        error.message.push_str("; ");
                        error.message.push_str(&message);
                    }
                }
            }
            None => errors.push(ConfigError {
                repository: name.clone(),
                message: messages.join("; "),
            }),
        }
    }

    Ok(errors)
}

/// Validate a parsed document, rejecting repositories with repeated keys
///
/// `keys` is `None` when the key structure could not be read; validation then
/// relies on `value` alone.
fn parse_config_document(value: Value, keys: Option<KeyTree>) -> Result<ParsedConfig> {
    let duplicates = match &keys {
        Some(keys) => duplicate_key_errors(keys)?,
        None => Vec::new(),
    };

    let mut parsed = parse_config_value(value)?;

    for duplicate in duplicates {
        tracing::warn!(repository = %duplicate.repository, error = %duplicate.message, "skipping misconfigured repository");
        parsed
            .config
            .repositories
            .retain(|config| config.repository.full_name() != duplicate.repository);

        match parsed
            .errors
            .iter_mut()
            .find(|error| error.repository == duplicate.repository)
        {
            Some(error) => error.message = format!("{}; {}", duplicate.message, error.message),
            None => parsed.errors.push(duplicate),
        }
    }

    Ok(parsed)
}

/// Parse configuration from a content string, detecting format by file path extension
///
/// # Errors
/// If parsing fails or the extension is unsupported
pub fn parse_config_from_content(content: &str, path: &str) -> Result<ParsedConfig> {
    let ext = path.rsplit('.').next().unwrap_or("");

    let (value, keys): (Value, Option<KeyTree>) = match ext {
        "json" => (
            serde_json::from_str(content)?,
            serde_json::from_str(content).ok(),
        ),
        "yaml" | "yml" => (
            serde_yaml::from_str(content)?,
            serde_yaml::from_str(content).ok(),
        ),
        _ => {
            return Err(Error::config_validation(format!(
                "Unsupported configuration file extension: {path}"
            )));
        }
    };

    parse_config_document(value, keys)
}

/// Parse configuration from a string, auto-detecting JSON or YAML format
///
/// Tries JSON first, then YAML.
///
/// # Errors
/// If neither JSON nor YAML parsing succeeds
pub fn parse_config_auto_detect(content: &str) -> Result<ParsedConfig> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return parse_config_document(value, serde_json::from_str(content).ok());
    }

    let value: Value = serde_yaml::from_str(content)?;
    parse_config_document(value, serde_yaml::from_str(content).ok())
}

/// Load configuration from a file, detecting format by extension
///
/// # Errors
/// If the file is missing, unreadable, malformed or has an unsupported extension
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<ParsedConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Configuration file not found: {}", path.display()),
        )
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    parse_config_from_content(&content, &path.to_string_lossy())
}

/// Load configuration from stdin, auto-detecting the format
///
/// # Errors
/// If stdin is empty or parsing fails
pub fn load_config_from_stdin() -> Result<ParsedConfig> {
    load_config_from_reader(std::io::stdin())
}

/// Load configuration from any reader, auto-detecting JSON or YAML format
///
/// # Errors
/// If the reader is empty or parsing fails
pub fn load_config_from_reader<R: std::io::Read>(mut reader: R) -> Result<ParsedConfig> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;

    if content.trim().is_empty() {
        return Err(Error::config_validation("Empty configuration input"));
    }

    parse_config_auto_detect(&content)
}

/// Search for a convention-based configuration file in the current directory
pub fn find_convention_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_convention_config_in(&cwd)
}

/// Search for a convention-based configuration file in the given directory
///
/// Files are tried in [`CONVENTION_CONFIG_FILES`] order.
pub fn find_convention_config_in(dir: &Path) -> Option<PathBuf> {
    CONVENTION_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// Fetch a convention-based configuration file from a GitHub repository
///
/// # Errors
/// Returns `ConfigNotFound` if none of the convention files exist
pub async fn fetch_remote_convention_config(
    client: &GitHubClient,
    repository: &RepositoryRef,
    reference: Option<&str>,
) -> Result<ParsedConfig> {
    for path in CONVENTION_CONFIG_FILES {
        if let Some(content) = client.get_file(repository, path, reference).await? {
            tracing::debug!(%repository, path, "using remote configuration");
            return parse_config_from_content(&content, path);
        }
    }

    Err(Error::ConfigNotFound {
        searched_files: format!("{repository}: {}", CONVENTION_CONFIG_FILES.join(", ")),
    })
}

/// Sync options, built once at startup
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// GitHub access token
    pub access_token: String,

    /// Compute and report changes without applying them
    pub dry_run: bool,

    /// Maximum number of repositories processed at the same time
    pub concurrency: usize,
}

impl SyncOptions {
    pub fn new(access_token: impl Into<String>, dry_run: bool) -> Self {
        Self {
            access_token: access_token.into(),
            dry_run,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Validate options
    ///
    /// # Errors
    /// If the access token is empty
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::config_validation("Access token is required"));
        }
        Ok(())
    }
}

/// Decide whether a run is a dry run
///
/// Changes are only applied on the publish branch. An unknown branch is
/// treated as a dry run.
pub fn resolve_dry_run(forced: bool, current_branch: Option<&str>, publish_branch: &str) -> bool {
    forced || current_branch != Some(publish_branch)
}

/// Generate a default configuration for one repository
///
/// Uses GitHub's standard label set.
pub fn default_config(repository: RepositoryRef) -> Config {
    let labels: OrderedMap<LabelDefinition> = [
        ("bug", "d73a4a", "Something isn't working"),
        ("documentation", "0075ca", "Improvements or additions to documentation"),
        ("duplicate", "cfd3d7", "This issue or pull request already exists"),
        ("enhancement", "a2eeef", "New feature or request"),
        ("good first issue", "7057ff", "Good for newcomers"),
        ("help wanted", "008672", "Extra attention is needed"),
        ("invalid", "e4e669", "This doesn't seem right"),
        ("question", "d876e3", "Further information is requested"),
        ("wontfix", "ffffff", "This will not be worked on"),
    ]
    .into_iter()
    .map(|(name, color, description)| {
        (
            name,
            LabelDefinition::Detailed {
                color: color.to_string(),
                description: Some(description.to_string()),
            },
        )
    })
    .collect();

    Config {
        publish: PublishConfig::default(),
        repositories: vec![RepositoryConfig {
            repository,
            manifest: LabelManifest {
                strict: false,
                labels,
            },
            siblings: SiblingsConfig::new(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
publish:
  branch: master
repositories:
  acme/web:
    strict: true
    labels:
      bug: "d73a4a"
      needs-docs:
        color: "fbca04"
        description: "Documentation is missing"
    siblings:
      acme/docs:
        needs-docs: [documentation]
  acme/docs:
    labels:
      documentation: "0075ca"
"#;

    #[test]
    fn test_parse_repository() {
        assert_eq!(
            RepositoryRef::parse("owner/repo").unwrap(),
            RepositoryRef::new("owner", "repo")
        );
        assert!(RepositoryRef::parse("org/project").is_ok());

        assert!(RepositoryRef::parse("repo").is_err()); // No slash
        assert!(RepositoryRef::parse("/repo").is_err()); // No owner
        assert!(RepositoryRef::parse("owner/").is_err()); // No repo name
        assert!(RepositoryRef::parse("owner/repo/sub").is_err()); // Too many parts
    }

    #[test]
    fn test_parse_issue_ref() {
        let issue = IssueRef::parse("acme/docs#12").unwrap();
        assert_eq!(
            issue,
            IssueRef {
                repository: RepositoryRef::new("acme", "docs"),
                number: 12,
            }
        );
        assert_eq!(issue.to_string(), "acme/docs#12");

        assert!(IssueRef::parse("acme/docs").is_err());
        assert!(IssueRef::parse("acme/docs#x").is_err());
        assert!(IssueRef::parse("acme#3").is_err());
    }

    #[test]
    fn test_parse_yaml_config() {
        let parsed = parse_config_from_content(SAMPLE_YAML, "labels.yaml").unwrap();
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.config.publish.branch, "master");

        let names: Vec<String> = parsed
            .config
            .repositories
            .iter()
            .map(|c| c.repository.full_name())
            .collect();
        assert_eq!(names, vec!["acme/web", "acme/docs"]);

        let web = parsed.config.repository("acme/web").unwrap();
        assert!(web.manifest.strict);
        assert_eq!(
            web.labels(),
            vec![
                Label::new("bug", "d73a4a"),
                Label::new("needs-docs", "fbca04").with_description("Documentation is missing"),
            ]
        );
        assert_eq!(
            web.siblings.get("acme/docs").unwrap().get("needs-docs"),
            Some(&vec!["documentation".to_string()])
        );

        let docs = parsed.config.repository("acme/docs").unwrap();
        assert!(!docs.manifest.strict);
        assert!(docs.siblings.is_empty());
    }

    #[test]
    fn test_parse_json_config_preserves_label_order() {
        let content = r#"{
            "repositories": {
                "acme/web": { "labels": { "zeta": "000", "alpha": "111", "mid": "222" } }
            }
        }"#;
        let parsed = parse_config_from_content(content, "labels.json").unwrap();
        assert_eq!(parsed.config.publish.branch, DEFAULT_PUBLISH_BRANCH);

        let names: Vec<String> = parsed.config.repositories[0]
            .labels()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_broken_repository_does_not_abort_others() {
        let content = r#"{
            "repositories": {
                "acme": { "labels": { "bug": "f00" } },
                "acme/web": { "labels": { "bug": "f00" } },
                "acme/api": { "labels": { "bug": 12 } },
                "acme/cli": { "labels": { "bug": "f00" }, "colour": true },
                "acme/ops": { "labels": { "bug": "" } }
            }
        }"#;
        let parsed = parse_config_from_content(content, "labels.json").unwrap();

        assert_eq!(parsed.config.repositories.len(), 1);
        assert_eq!(parsed.config.repositories[0].repository.full_name(), "acme/web");

        let failed: Vec<&str> = parsed.errors.iter().map(|e| e.repository.as_str()).collect();
        assert_eq!(failed, vec!["acme", "acme/api", "acme/cli", "acme/ops"]);
        assert!(parsed.errors[0].message.contains("Invalid repository format"));
        assert!(parsed.errors[1].message.contains("/labels/bug"));
        assert!(parsed.errors[3].message.contains("Invalid label color"));
    }

    #[test]
    fn test_unknown_sibling_trigger_is_a_config_error() {
        let content = r#"{
            "repositories": {
                "acme/web": {
                    "labels": { "bug": "f00" },
                    "siblings": { "acme/docs": { "needs-docs": ["documentation"] } }
                }
            }
        }"#;
        let parsed = parse_config_from_content(content, "labels.json").unwrap();
        assert!(parsed.config.repositories.is_empty());
        assert!(parsed.errors[0].message.contains("needs-docs"));
    }

    #[test]
    fn test_duplicate_label_in_json_is_a_config_error() {
        let content = r#"{
            "repositories": {
                "acme/web": { "labels": { "bug": "f00", "bug": "0f0" } },
                "acme/api": { "labels": { "bug": "f00" } }
            }
        }"#;
        let parsed = parse_config_from_content(content, "labels.json").unwrap();

        assert_eq!(parsed.config.repositories.len(), 1);
        assert_eq!(parsed.config.repositories[0].repository.full_name(), "acme/api");
        assert_eq!(
            parsed.errors,
            vec![ConfigError {
                repository: "acme/web".to_string(),
                message: "duplicate key /labels/bug".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_label_in_yaml_is_a_config_error() {
        let content = r#"
repositories:
  acme/web:
    labels:
      bug: "f00"
      bug: "0f0"
  acme/docs:
    labels:
      documentation: "0075ca"
"#;
        let parsed = parse_config_from_content(content, "labels.yml").unwrap();

        let names: Vec<String> = parsed
            .config
            .repositories
            .iter()
            .map(|c| c.repository.full_name())
            .collect();
        assert_eq!(names, vec!["acme/docs"]);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].repository, "acme/web");
        assert!(parsed.errors[0].message.contains("/labels/bug"));
    }

    #[test]
    fn test_duplicate_repository_and_sibling_trigger() {
        let content = r#"{
            "repositories": {
                "acme/web": { "labels": { "bug": "f00" } },
                "acme/web": { "labels": { "bug": "0f0" } },
                "acme/api": {
                    "labels": { "needs-docs": "fbca04" },
                    "siblings": {
                        "acme/docs": { "needs-docs": ["documentation"], "needs-docs": ["guide"] }
                    }
                }
            }
        }"#;
        let parsed = parse_config_from_content(content, "labels.json").unwrap();

        assert!(parsed.config.repositories.is_empty());
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].repository, "acme/web");
        assert!(parsed.errors[0].message.contains("duplicate repository acme/web"));
        assert_eq!(parsed.errors[1].repository, "acme/api");
        assert!(parsed.errors[1]
            .message
            .contains("duplicate key /siblings/acme/docs/needs-docs"));
    }

    #[test]
    fn test_duplicate_top_level_key_is_an_error() {
        let content = r#"{
            "repositories": { "acme/web": { "labels": { "bug": "f00" } } },
            "repositories": { "acme/api": { "labels": { "bug": "f00" } } }
        }"#;
        let err = parse_config_from_content(content, "labels.json").unwrap_err();
        assert!(err.to_string().contains("duplicate key /repositories"));

        let yaml = "repositories:\n  acme/web:\n    labels:\n      bug: f00\n      bug: 0f0\n";
        let parsed = parse_config_auto_detect(yaml).unwrap();
        assert!(parsed.config.repositories.is_empty());
        assert_eq!(parsed.errors[0].repository, "acme/web");
    }

    #[test]
    fn test_missing_repositories_is_an_error() {
        assert!(parse_config_from_content(r#"{"labels": {}}"#, "labels.json").is_err());
        assert!(parse_config_from_content("not json", "labels.json").is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_config_from_content("", "labels.toml");
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Unsupported configuration file extension"));
    }

    #[test]
    fn test_auto_detect() {
        let json = r#"{"repositories": {"acme/web": {"labels": {"bug": "f00"}}}}"#;
        assert_eq!(parse_config_auto_detect(json).unwrap().config.repositories.len(), 1);
        assert_eq!(
            parse_config_auto_detect(SAMPLE_YAML).unwrap().config.repositories.len(),
            2
        );
        assert!(parse_config_auto_detect("not valid json or yaml }{][").is_err());
    }

    #[test]
    fn test_load_config_from_reader_empty() {
        let result = load_config_from_reader("   \n  \t  ".as_bytes());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Empty configuration input"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.yml");
        std::fs::write(&path, SAMPLE_YAML).unwrap();

        let parsed = load_config_from_file(&path).unwrap();
        assert_eq!(parsed.config.repositories.len(), 2);
    }

    #[test]
    fn test_load_config_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/labels.json");
        assert!(load_config_from_file(&path).is_err());
    }

    #[test]
    fn test_find_convention_config_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".label-sync.yaml"), SAMPLE_YAML).unwrap();
        std::fs::write(dir.path().join(".label-sync.json"), "{}").unwrap();

        let found = find_convention_config_in(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), ".label-sync.json");
    }

    #[test]
    fn test_find_convention_config_github_dir() {
        let dir = tempfile::tempdir().unwrap();
        let github_dir = dir.path().join(".github");
        std::fs::create_dir(&github_dir).unwrap();
        std::fs::write(github_dir.join("labels.yml"), SAMPLE_YAML).unwrap();

        let found = find_convention_config_in(dir.path()).unwrap();
        assert!(found.ends_with(".github/labels.yml"));
    }

    #[test]
    fn test_find_convention_config_none_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_convention_config_in(dir.path()).is_none());
    }

    #[test]
    fn test_resolve_dry_run() {
        assert!(resolve_dry_run(true, None, "main"));
        assert!(resolve_dry_run(true, Some("main"), "main"));
        assert!(resolve_dry_run(false, Some("feature/x"), "main"));
        assert!(!resolve_dry_run(false, Some("main"), "main"));
        assert!(resolve_dry_run(false, None, "main"));
        assert!(resolve_dry_run(false, Some("main"), "master"));
    }

    #[test]
    fn test_sync_options_validation() {
        assert!(SyncOptions::new("", false).validate().is_err());
        assert!(SyncOptions::new("token", false).validate().is_ok());
        assert_eq!(SyncOptions::new("token", true).concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_default_config_round_trips_through_parser() {
        let config = default_config(RepositoryRef::new("acme", "web"));
        let parsed = parse_config_value(config.to_value().unwrap()).unwrap();

        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.config, config);
    }

    fn not_found() -> wiremock::ResponseTemplate {
        wiremock::ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        }))
    }

    #[tokio::test]
    async fn test_fetch_remote_convention_config_follows_search_order() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/config/contents/.label-sync.json"))
            .respond_with(not_found())
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/config/contents/.label-sync.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "file",
                "encoding": "base64",
                "size": 46,
                "name": ".label-sync.yaml",
                "path": ".label-sync.yaml",
                "content": "cmVwb3NpdG9yaWVzOgogIGFjbWUvd2ViOgogICAgbGFiZWxzOgogICAgICBidWc6IGQ3M2E0YQo=",
                "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
                "url": "https://api.github.com/repos/acme/config/contents/.label-sync.yaml",
                "git_url": "https://api.github.com/repos/acme/config/git/blobs/3d21ec53a331a6f037a91c368710b99387d012c1",
                "html_url": "https://github.com/acme/config/blob/main/.label-sync.yaml",
                "download_url": "https://raw.githubusercontent.com/acme/config/main/.label-sync.yaml",
                "_links": {
                    "git": "https://api.github.com/repos/acme/config/git/blobs/3d21ec53a331a6f037a91c368710b99387d012c1",
                    "self": "https://api.github.com/repos/acme/config/contents/.label-sync.yaml",
                    "html": "https://github.com/acme/config/blob/main/.label-sync.yaml"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GitHubClient::with_base_uri("test-token", &mock_server.uri()).unwrap();
        let parsed = fetch_remote_convention_config(&client, &RepositoryRef::new("acme", "config"), None)
            .await
            .unwrap();

        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.config.repositories[0].labels(),
            vec![Label::new("bug", "d73a4a")]
        );
    }

    #[tokio::test]
    async fn test_fetch_remote_convention_config_not_found() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer};

        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(not_found())
            .mount(&mock_server)
            .await;

        let client = GitHubClient::with_base_uri("test-token", &mock_server.uri()).unwrap();
        let err = fetch_remote_convention_config(&client, &RepositoryRef::new("acme", "config"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConfigNotFound { .. }));
        assert!(err.to_string().contains("acme/config"));
    }
}
