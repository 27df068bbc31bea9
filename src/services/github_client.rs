//! GitHub API client.
//!
//! Provides an HTTP client for the GitHub REST API with bearer authentication
//! and `Link` header pagination.

use crate::error::AppError;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default public API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Page size used for every paginated request (GitHub maximum).
const PER_PAGE: u32 = 100;

/// Cap on how much of an error body is echoed back in messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// API root (e.g., `https://api.github.com` or a GHES `https://host/api/v3`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

/// GitHub user from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub id: i64,
}

/// Head commit reference of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitRef {
    pub sha: String,
}

/// GitHub pull request from API (list and single endpoints).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: i64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub html_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub user: GitHubUser,
    #[serde(default)]
    pub requested_reviewers: Vec<GitHubUser>,
    pub head: GitHubCommitRef,
}

/// Comment on the PR conversation (issue comments endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssueComment {
    pub id: i64,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user: Option<GitHubUser>,
}

/// Inline review comment on a PR diff.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubReviewComment {
    pub id: i64,
    #[serde(default)]
    pub body: Option<String>,
    pub path: String,
    pub created_at: String,
    pub updated_at: String,
    pub user: Option<GitHubUser>,
}

/// One context of the legacy commit status API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitStatus {
    pub context: String,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Combined status response (GET /repos/:repo/commits/:sha/status).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCombinedStatus {
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<GitHubCommitStatus>,
}

/// Check run from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCheckRun {
    pub id: i64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Page wrapper of the check runs endpoint.
#[derive(Debug, Deserialize)]
struct CheckRunsPage {
    check_runs: Vec<GitHubCheckRun>,
}

/// A pull request with all of its comments.
#[derive(Debug, Clone)]
pub struct PullRequestDetails {
    pub pull_request: GitHubPullRequest,
    pub issue_comments: Vec<GitHubIssueComment>,
    pub review_comments: Vec<GitHubReviewComment>,
}

/// Everything CI reported for a pull request's head commit.
#[derive(Debug, Clone)]
pub struct PullRequestCiStatuses {
    pub head_sha: String,
    pub combined_state: String,
    pub statuses: Vec<GitHubCommitStatus>,
    pub check_runs: Vec<GitHubCheckRun>,
}

/// Check that a repository name has the `owner/repo` form.
pub fn validate_repository(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input_field(
            "repository name is required",
            "repository",
        ));
    }

    match trimmed.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok(())
        }
        _ => Err(AppError::invalid_input_field(
            format!("repository must look like owner/repo, got '{}'", trimmed),
            "repository",
        )),
    }
}

fn validate_number(number: i64) -> Result<(), AppError> {
    if number <= 0 {
        return Err(AppError::invalid_input_field(
            "pull request number must be greater than zero",
            "number",
        ));
    }
    Ok(())
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn parse_next_link(link_header: &str) -> Option<String> {
    link_header
        .split(',')
        .map(str::trim)
        .filter(|segment| segment.contains(r#"rel="next""#))
        .find_map(|segment| {
            let start = segment.find('<')?;
            let end = segment.find('>')?;
            (end > start + 1).then(|| segment[start + 1..end].to_string())
        })
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AppError> {
        if config.token.trim().is_empty() {
            return Err(AppError::invalid_input_field("auth token is required", "token"));
        }

        let mut headers = header::HeaderMap::new();

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| AppError::authentication("Invalid token format"))?;
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("pr-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the absolute URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AppError::authentication_expired(
                "GitHub token expired or revoked. Please re-authenticate.",
            ))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));

            let message = match (status, &body_message) {
                (StatusCode::FORBIDDEN, _) => "Access denied or rate limited".to_string(),
                (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
                (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
                (_, Some(msg)) => msg.clone(),
                _ => {
                    let snippet: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
                    format!("Request failed ({}): {}", status_code, snippet)
                }
            };

            Err(AppError::github_api_full(message, status_code, endpoint))
        }
    }

    /// GET a single JSON document.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, AppError> {
        let url = self.api_url(endpoint);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response, endpoint).await
    }

    /// Fetch all pages of an endpoint whose pages are not bare arrays.
    async fn get_all_pages_mapped<P, T, F>(
        &self,
        endpoint: &str,
        extract: F,
    ) -> Result<Vec<T>, AppError>
    where
        P: DeserializeOwned,
        F: Fn(P) -> Vec<T>,
    {
        let mut all_data = Vec::new();
        let mut request = self
            .client
            .get(self.api_url(endpoint))
            .query(&[("per_page", PER_PAGE.to_string()), ("page", "1".to_string())]);

        loop {
            let response = request.send().await?;
            let next = response
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let page: P = self.handle_response(response, endpoint).await?;
            all_data.extend(extract(page));

            match next {
                Some(url) => {
                    log::debug!("following next page: {}", url);
                    request = self.client.get(url);
                }
                None => break,
            }
        }

        Ok(all_data)
    }

    /// Fetch all pages of an endpoint returning a JSON array.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, AppError> {
        self.get_all_pages_mapped::<Vec<T>, T, _>(endpoint, |page| page)
            .await
    }

    /// Validate the token by fetching the authenticated user.
    pub async fn get_authenticated_user(&self) -> Result<GitHubUser, AppError> {
        self.get_json("/user").await
    }

    /// List every open pull request of a repository.
    pub async fn list_open_pull_requests(
        &self,
        repository: &str,
    ) -> Result<Vec<GitHubPullRequest>, AppError> {
        validate_repository(repository)?;
        let endpoint = format!("/repos/{}/pulls?state=open", repository);
        self.get_all_pages(&endpoint).await
    }

    /// Get a single pull request.
    pub async fn get_pull_request(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<GitHubPullRequest, AppError> {
        validate_repository(repository)?;
        validate_number(number)?;
        self.get_json(&format!("/repos/{}/pulls/{}", repository, number))
            .await
    }

    /// List conversation comments on a pull request.
    pub async fn list_issue_comments(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<Vec<GitHubIssueComment>, AppError> {
        self.get_all_pages(&format!("/repos/{}/issues/{}/comments", repository, number))
            .await
    }

    /// List inline review comments on a pull request.
    pub async fn list_review_comments(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<Vec<GitHubReviewComment>, AppError> {
        self.get_all_pages(&format!("/repos/{}/pulls/{}/comments", repository, number))
            .await
    }

    /// Get the combined legacy status of a commit.
    pub async fn get_combined_status(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<GitHubCombinedStatus, AppError> {
        self.get_json(&format!("/repos/{}/commits/{}/status", repository, sha))
            .await
    }

    /// List every check run of a commit.
    pub async fn list_check_runs(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<Vec<GitHubCheckRun>, AppError> {
        let endpoint = format!("/repos/{}/commits/{}/check-runs", repository, sha);
        self.get_all_pages_mapped(&endpoint, |page: CheckRunsPage| page.check_runs)
            .await
    }

    /// Fetch a pull request together with its issue and review comments.
    pub async fn fetch_pull_request_details(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<PullRequestDetails, AppError> {
        let pull_request = self.get_pull_request(repository, number).await?;
        let issue_comments = self.list_issue_comments(repository, number).await?;
        let review_comments = self.list_review_comments(repository, number).await?;

        Ok(PullRequestDetails {
            pull_request,
            issue_comments,
            review_comments,
        })
    }

    /// Fetch the commit statuses and check runs of a pull request's head.
    pub async fn fetch_ci_statuses(
        &self,
        repository: &str,
        head_sha: &str,
    ) -> Result<PullRequestCiStatuses, AppError> {
        validate_repository(repository)?;
        if head_sha.trim().is_empty() {
            return Err(AppError::github_api("pull request head sha is missing"));
        }

        let combined = self.get_combined_status(repository, head_sha).await?;
        let check_runs = self.list_check_runs(repository, head_sha).await?;

        Ok(PullRequestCiStatuses {
            head_sha: head_sha.to_string(),
            combined_state: combined.state,
            statuses: combined.statuses,
            check_runs,
        })
    }
}
