//! GitHub API Client
//!
//! Module for managing interactions with the GitHub API

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;

use crate::config::RepositoryRef;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::siblings::Issue;

/// Encode a string for use in URL path segments
///
/// Spaces become `%20` rather than `+` so that label names with spaces
/// address the right resource.
fn encode_path_segment(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Check if an octocrab error is a 404 Not Found
fn is_not_found_error(err: &octocrab::Error) -> bool {
    err.to_string().contains("Not Found")
}

/// Label fetch and apply operations
///
/// The sync engine only talks to GitHub through this trait.
#[async_trait]
pub trait LabelService: Send + Sync {
    /// Get all labels of a repository
    async fn get_labels(&self, repository: &RepositoryRef) -> Result<Vec<Label>>;

    /// Create a label
    async fn create_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()>;

    /// Update the label with the same name
    async fn update_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()>;

    /// Delete a label by name
    async fn delete_label(&self, repository: &RepositoryRef, name: &str) -> Result<()>;

    /// Get an issue or pull request
    async fn get_issue(&self, repository: &RepositoryRef, number: u64) -> Result<Issue>;

    /// Attach labels to an issue or pull request
    async fn add_labels_to_issue(
        &self,
        repository: &RepositoryRef,
        number: u64,
        labels: &[Label],
    ) -> Result<()>;

    /// Comment on an issue or pull request
    async fn create_comment(
        &self,
        repository: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct UpdateLabelBody<'a> {
    new_name: &'a str,
    color: &'a str,
    description: &'a str,
}

/// GitHub API Client
///
/// Client responsible for interactions with the GitHub API
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Errors
    /// Returns an error if client initialization fails
    pub fn new(access_token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .build()?;

        Ok(Self { octocrab })
    }

    /// Create a client against a different API root (GitHub Enterprise, tests)
    ///
    /// # Errors
    /// Returns an error if the URI is invalid or client initialization fails
    pub fn with_base_uri(access_token: &str, base_uri: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .base_uri(base_uri)?
            .build()?;

        Ok(Self { octocrab })
    }

    /// Fetch a text file from a repository
    ///
    /// # Returns
    /// The decoded content, or `None` if the file does not exist
    ///
    /// # Errors
    /// Returns an error for API failures other than 404
    pub async fn get_file(
        &self,
        repository: &RepositoryRef,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>> {
        let repos = self.octocrab.repos(&repository.owner, &repository.repo);
        let mut request = repos.get_content().path(path);
        if let Some(reference) = reference {
            request = request.r#ref(reference);
        }

        match request.send().await {
            Ok(content) => Ok(content
                .items
                .first()
                .and_then(|file| file.decoded_content())),
            Err(e) if is_not_found_error(&e) => Ok(None),
            Err(e) => Err(Error::GitHubApi(e)),
        }
    }
}

#[async_trait]
impl LabelService for GitHubClient {
    async fn get_labels(&self, repository: &RepositoryRef) -> Result<Vec<Label>> {
        let mut labels = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .octocrab
                .issues(&repository.owner, &repository.repo)
                .list_labels_for_repo()
                .per_page(100)
                .page(page)
                .send()
                .await
                .map_err(|e| {
                    if is_not_found_error(&e) {
                        Error::RepositoryNotFound(repository.full_name())
                    } else {
                        Error::GitHubApi(e)
                    }
                })?;

            if response.items.is_empty() {
                break;
            }

            labels.extend(response.items.into_iter().map(Label::from));
            page += 1;
        }

        tracing::debug!(%repository, count = labels.len(), "fetched labels");
        Ok(labels)
    }

    async fn create_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()> {
        self.octocrab
            .issues(&repository.owner, &repository.repo)
            .create_label(&label.name, &label.color, &label.description)
            .await?;

        Ok(())
    }

    async fn update_label(&self, repository: &RepositoryRef, label: &Label) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/labels/{}",
            repository.owner,
            repository.repo,
            encode_path_segment(&label.name)
        );
        let body = UpdateLabelBody {
            new_name: &label.name,
            color: &label.color,
            description: &label.description,
        };

        let _: octocrab::models::Label = self.octocrab.patch(route, Some(&body)).await?;
        Ok(())
    }

    async fn delete_label(&self, repository: &RepositoryRef, name: &str) -> Result<()> {
        // Label names with spaces, slashes or non-ASCII characters must be encoded
        self.octocrab
            .issues(&repository.owner, &repository.repo)
            .delete_label(encode_path_segment(name))
            .await?;

        Ok(())
    }

    async fn get_issue(&self, repository: &RepositoryRef, number: u64) -> Result<Issue> {
        let issue = self
            .octocrab
            .issues(&repository.owner, &repository.repo)
            .get(number)
            .await?;

        Ok(issue.into())
    }

    async fn add_labels_to_issue(
        &self,
        repository: &RepositoryRef,
        number: u64,
        labels: &[Label],
    ) -> Result<()> {
        let names: Vec<String> = labels.iter().map(|label| label.name.clone()).collect();
        self.octocrab
            .issues(&repository.owner, &repository.repo)
            .add_labels(number, &names)
            .await?;

        Ok(())
    }

    async fn create_comment(
        &self,
        repository: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<()> {
        self.octocrab
            .issues(&repository.owner, &repository.repo)
            .create_comment(number, body)
            .await?;

        tracing::debug!(%repository, number, "posted comment");
        Ok(())
    }
}
