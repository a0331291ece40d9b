//! forge::github
//!
//! GitHub adapter over the REST v3 API.
//!
//! # Design
//!
//! Projects are identified by `owner/name`, issues and pull requests by
//! their number. GitHub Enterprise instances are reached at
//! `<url>/api/v3`; github.com at `https://api.github.com`.
//!
//! Some filters have no server-side equivalent on GitHub's list endpoints
//! (merged state, labels and author on pull requests, free-text search).
//! Those are applied client-side while paginating, so `limit` still counts
//! matching items only.
//!
//! GitHub sets assignees, labels and milestones on pull requests through
//! the issues API. `create_merge_request` applies them with a follow-up
//! request; a failure there is logged and the pull request is still
//! returned.
//!
//! # Example
//!
//! ```ignore
//! use crossforge::forge::github::GitHubAdapter;
//! use crossforge::forge::{NewMergeRequest, PlatformAdapter};
//!
//! let github = GitHubAdapter::new("https://github.com", Some(token), None);
//! let pr = github
//!     .create_merge_request(
//!         "octo/hello",
//!         NewMergeRequest {
//!             source_branch: "forkuser:feature".into(),
//!             target_branch: "main".into(),
//!             title: "Add feature".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! ```

mod api;
pub(crate) mod query;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use self::api::{
    branch_from, file_change, is_pull_request, issue_from, project_from, pull_from,
    CommentBody, CreateIssueBody, CreatePullBody, CreateRepoBody, EditIssueBody, EditPullBody,
    ForkBody, GitHubBranch, GitHubComment, GitHubCommit, GitHubIssue, GitHubMilestone,
    GitHubPull, GitHubPullFile, GitHubRepo, GitHubSearchPage, GitHubTag, GitHubUser,
    MergePullBody, ReviewBody,
};
use self::query::{split_repo, ProjectListing};
use super::branch::{parse_branch_reference, require_branch, BranchCheck, BranchRole};
use super::filters::{
    BranchFilters, CommitFilters, IssueFilters, MergeRequestFilters, ProjectFilters, TagFilters,
    Visibility,
};
use super::http::{optional, ApiFailure, ApiResultExt, Raw, RestClient};
use super::traits::{
    ApproveOptions, DiffOptions, ForgeError, ForkOptions, IssueUpdate, MergeOptions,
    MergeRequestUpdate, NewIssue, NewMergeRequest, NewProject, PlatformAdapter, StateEvent,
};
use crate::core::types::{
    Branch, ChangeTotals, Comment, Commit, IssueResource, MergeRequestCommit,
    MergeRequestCommits, MergeRequestDiff, MergeRequestResource, ProjectResource, Tag, UserInfo,
};

pub(crate) const PLATFORM: &str = "github";

/// API base for github.com.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = concat!("crossforge/", env!("CARGO_PKG_VERSION"));

/// Authenticated state, created once per adapter.
struct Session {
    rest: RestClient,
    login: String,
}

/// GitHub implementation of [`PlatformAdapter`].
pub struct GitHubAdapter {
    url: String,
    api_base: String,
    token: Option<String>,
    username: Option<String>,
    timeout: Option<Duration>,
    session: OnceCell<Session>,
}

impl std::fmt::Debug for GitHubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAdapter")
            .field("url", &self.url)
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("authenticated", &self.session.initialized())
            .finish()
    }
}

impl GitHubAdapter {
    /// Create an adapter for the GitHub instance at `url`.
    ///
    /// `username` is the configured login; it decides when an assignee
    /// filter means "me". The authenticated login is used when it is unset.
    pub fn new(url: impl Into<String>, token: Option<String>, username: Option<String>) -> Self {
        let url = url.into();
        Self {
            api_base: api_base_for(&url),
            url,
            token,
            username,
            timeout: None,
            session: OnceCell::new(),
        }
    }

    /// Override the API base URL. Used for tests against a mock server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Apply a timeout to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn session(&self) -> Result<&Session, ForgeError> {
        self.session.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Session, ForgeError> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ForgeError::Authentication("GitHub token is required".into()))?;

        let rest = RestClient::new(&self.api_base, headers(token)?, self.timeout)
            .or_forge(PLATFORM, || "Failed to create GitHub client".into())?;
        let url = rest
            .url(&["user"])
            .or_forge(PLATFORM, || "Invalid API URL".into())?;

        let user: GitHubUser = rest.get(url, &[]).await.map_err(|e| match e {
            ApiFailure::Status { status: 403, message } => {
                ForgeError::Authentication(format!("GitHub authentication failed: {}", message))
            }
            other => other.into_forge(PLATFORM, "GitHub authentication failed"),
        })?;

        info!(login = %user.login, api_base = %self.api_base, "authenticated with GitHub");
        Ok(Session {
            rest,
            login: user.login,
        })
    }

    /// Login an assignee filter is compared against.
    fn me<'a>(&'a self, session: &'a Session) -> &'a str {
        self.username.as_deref().unwrap_or(&session.login)
    }

    /// Look up a milestone number by number or title.
    async fn resolve_milestone(&self, rest: &RestClient, repo: &str, milestone: &str) -> Option<u64> {
        if let Ok(number) = milestone.parse::<u64>() {
            return Some(number);
        }

        let lookup = async {
            let url = repo_url(rest, repo, &["milestones"])?;
            let params = [("state", "all".to_string())];
            let milestones: Vec<GitHubMilestone> = rest
                .paginate(url, &params, None)
                .await
                .or_forge(PLATFORM, || format!("Failed to list milestones of {}", repo))?;
            Ok::<_, ForgeError>(
                milestones
                    .into_iter()
                    .find(|m| m.title == milestone)
                    .map(|m| m.number),
            )
        };

        match lookup.await {
            Ok(Some(number)) => Some(number),
            Ok(None) => {
                warn!(repo, milestone, "milestone not found, skipping");
                None
            }
            Err(e) => {
                warn!(repo, milestone, error = %e, "milestone lookup failed, skipping");
                None
            }
        }
    }

    async fn probe_branch(&self, rest: &RestClient, repo: &str, branch: &str) -> BranchCheck {
        let mut path = vec!["branches"];
        path.extend(branch.split('/'));
        let url = match repo_url(rest, repo, &path) {
            Ok(url) => url,
            Err(e) => return BranchCheck::Unverified(e.to_string()),
        };

        match rest.get::<Value>(url, &[]).await {
            Ok(_) => BranchCheck::Present,
            Err(e) if e.is_not_found() => BranchCheck::Missing,
            Err(e) => BranchCheck::Unverified(e.to_string()),
        }
    }

    async fn fetch_repo(&self, rest: &RestClient, project_id: &str) -> Result<Raw<GitHubRepo>, ForgeError> {
        let url = repo_url(rest, project_id, &[])?;
        rest.get(url, &[])
            .await
            .or_not_found(PLATFORM, "repository", project_id, || {
                format!("Failed to get repository {}", project_id)
            })
    }
}

/// API base for a GitHub web URL.
pub fn api_base_for(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_BASE.to_string();
    }

    let host = Url::parse(trimmed)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();
    match host.as_str() {
        "github.com" | "www.github.com" | "api.github.com" => DEFAULT_API_BASE.to_string(),
        _ if trimmed.ends_with("/api/v3") => trimmed.to_string(),
        _ => format!("{}/api/v3", trimmed),
    }
}

fn headers(token: &str) -> Result<HeaderMap, ForgeError> {
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ForgeError::Authentication("GitHub token contains invalid characters".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
    Ok(headers)
}

/// URL of `/repos/:owner/:name/<path>`.
fn repo_url(rest: &RestClient, project_id: &str, path: &[&str]) -> Result<Url, ForgeError> {
    let (owner, name) = split_repo(project_id).ok_or_else(|| {
        ForgeError::platform(
            PLATFORM,
            format!("Invalid repository '{}', expected owner/name", project_id),
        )
    })?;
    let mut segments = vec!["repos", owner, name];
    segments.extend_from_slice(path);
    rest.url(&segments)
        .or_forge(PLATFORM, || "Invalid API URL".into())
}

fn pull_url(rest: &RestClient, project_id: &str, mr_id: &str) -> Result<Url, ForgeError> {
    repo_url(rest, project_id, &["pulls", mr_id])
}

fn api_url(rest: &RestClient, segments: &[&str]) -> Result<Url, ForgeError> {
    rest.url(segments)
        .or_forge(PLATFORM, || "Invalid API URL".into())
}

fn state_value(event: StateEvent) -> &'static str {
    match event {
        StateEvent::Close => "closed",
        StateEvent::Reopen => "open",
    }
}

#[async_trait]
impl PlatformAdapter for GitHubAdapter {
    fn platform_name(&self) -> &'static str {
        PLATFORM
    }

    async fn authenticate(&self) -> Result<(), ForgeError> {
        self.session().await.map(|_| ())
    }

    async fn test_connection(&self) -> bool {
        let Ok(session) = self.session().await else {
            return false;
        };
        let Ok(url) = session.rest.url(&["user"]) else {
            return false;
        };
        session.rest.get::<Value>(url, &[]).await.is_ok()
    }

    // ----------------------------------------------------------------------
    // Projects
    // ----------------------------------------------------------------------

    async fn list_projects(
        &self,
        filters: &ProjectFilters,
    ) -> Result<Vec<ProjectResource>, ForgeError> {
        let s = self.session().await?;
        let (listing, params) = query::project_listing(filters);
        let segments: &[&str] = match listing {
            ProjectListing::UserRepos => &["user", "repos"],
            ProjectListing::Starred => &["user", "starred"],
        };
        let url = api_url(&s.rest, segments)?;

        s.rest
            .paginate_where(
                url,
                &params,
                filters.limit,
                |page: Vec<Raw<GitHubRepo>>| page,
                |repo| {
                    query::project_matches(
                        filters,
                        &repo.wire.name,
                        repo.wire.description.as_deref(),
                        repo.wire.archived,
                    )
                },
            )
            .await
            .map(|repos| repos.into_iter().map(project_from).collect())
            .or_forge(PLATFORM, || "Failed to list repositories".into())
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectResource>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &[])?;
        let repo: Option<Raw<GitHubRepo>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get repository {}", project_id))?;
        Ok(repo.map(project_from))
    }

    async fn create_project(&self, request: NewProject) -> Result<ProjectResource, ForgeError> {
        let s = self.session().await?;
        let url = match &request.namespace {
            Some(org) => api_url(&s.rest, &["orgs", org, "repos"])?,
            None => api_url(&s.rest, &["user", "repos"])?,
        };
        let body = CreateRepoBody {
            name: &request.name,
            description: request.description.as_deref(),
            private: request.visibility != Some(Visibility::Public),
            auto_init: request.initialize_with_readme,
        };

        info!(name = %request.name, "creating repository");
        let repo: Raw<GitHubRepo> = s
            .rest
            .post(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to create repository {}", request.name))?;
        Ok(project_from(repo))
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &[])?;
        info!(project_id, "deleting repository");
        s.rest
            .delete(url)
            .await
            .or_not_found(PLATFORM, "repository", project_id, || {
                format!("Failed to delete repository {}", project_id)
            })
    }

    // ----------------------------------------------------------------------
    // Issues
    // ----------------------------------------------------------------------

    async fn list_issues(
        &self,
        project_id: &str,
        filters: &IssueFilters,
    ) -> Result<Vec<IssueResource>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["issues"])?;
        let params = query::issue_list_params(filters);

        s.rest
            .paginate_where(
                url,
                &params,
                filters.limit,
                |page: Vec<Raw<GitHubIssue>>| {
                    page.into_iter()
                        .map(|issue| issue_from(issue, project_id))
                        .collect()
                },
                |issue| !is_pull_request(issue) && query::issue_matches(filters, issue),
            )
            .await
            .or_forge(PLATFORM, || format!("Failed to list issues of {}", project_id))
    }

    async fn list_all_issues(
        &self,
        filters: &IssueFilters,
    ) -> Result<Vec<IssueResource>, ForgeError> {
        let s = self.session().await?;
        let url = api_url(&s.rest, &["search", "issues"])?;
        let params = query::search_params(filters, Some(self.me(s)));
        debug!(?params, "searching issues");

        s.rest
            .paginate_by(
                url,
                &params,
                filters.limit,
                |page: GitHubSearchPage<Raw<GitHubIssue>>| {
                    page.items
                        .into_iter()
                        .map(|issue| issue_from(issue, ""))
                        .collect()
                },
            )
            .await
            .or_forge(PLATFORM, || "Failed to search issues".into())
    }

    async fn get_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<Option<IssueResource>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["issues", issue_id])?;
        let issue: Option<Raw<GitHubIssue>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get issue {}", issue_id))?;
        let Some(issue) = issue else {
            return Ok(None);
        };
        let mut issue = issue_from(issue, project_id);

        let comments_url = repo_url(&s.rest, project_id, &["issues", issue_id, "comments"])?;
        match s
            .rest
            .paginate::<GitHubComment>(comments_url, &[], None)
            .await
        {
            Ok(comments) => {
                let comments: Vec<Comment> = comments.into_iter().map(Comment::from).collect();
                issue.set_comments(&comments);
            }
            Err(e) => {
                warn!(project_id, issue_id, error = %e, "failed to fetch issue comments");
            }
        }

        Ok(Some(issue))
    }

    async fn create_issue(
        &self,
        project_id: &str,
        request: NewIssue,
    ) -> Result<IssueResource, ForgeError> {
        let s = self.session().await?;
        let milestone = match &request.milestone {
            Some(m) => self.resolve_milestone(&s.rest, project_id, m).await,
            None => None,
        };
        if request.due_date.is_some() {
            debug!("GitHub issues have no due date, ignoring");
        }

        let url = repo_url(&s.rest, project_id, &["issues"])?;
        let body = CreateIssueBody {
            title: &request.title,
            body: request.description.as_deref(),
            labels: request.labels.into_vec(),
            assignees: request.assignee.into_iter().collect(),
            milestone,
        };
        let issue: Raw<GitHubIssue> = s
            .rest
            .post(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to create issue in {}", project_id))?;
        Ok(issue_from(issue, project_id))
    }

    async fn update_issue(
        &self,
        project_id: &str,
        issue_id: &str,
        update: IssueUpdate,
    ) -> Result<IssueResource, ForgeError> {
        let s = self.session().await?;
        let milestone = match &update.milestone {
            Some(m) => self.resolve_milestone(&s.rest, project_id, m).await,
            None => None,
        };

        let url = repo_url(&s.rest, project_id, &["issues", issue_id])?;
        let body = EditIssueBody {
            title: update.title.as_deref(),
            body: update.description.as_deref(),
            state: update.state_event.map(state_value),
            labels: update.labels.map(|l| l.into_vec()),
            assignees: update.assignee.map(|a| vec![a]),
            milestone,
        };
        let issue: Raw<GitHubIssue> = s
            .rest
            .patch(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to update issue {}", issue_id))?;
        Ok(issue_from(issue, project_id))
    }

    async fn create_issue_comment(
        &self,
        project_id: &str,
        issue_id: &str,
        body: &str,
    ) -> Result<Comment, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["issues", issue_id, "comments"])?;
        let comment: GitHubComment = s
            .rest
            .post(url, &CommentBody { body })
            .await
            .or_forge(PLATFORM, || format!("Failed to comment on issue {}", issue_id))?;
        Ok(comment.into())
    }

    // ----------------------------------------------------------------------
    // Pull requests
    // ----------------------------------------------------------------------

    async fn list_merge_requests(
        &self,
        project_id: &str,
        filters: &MergeRequestFilters,
    ) -> Result<Vec<MergeRequestResource>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["pulls"])?;
        let owner = split_repo(project_id).map_or("", |(owner, _)| owner);
        let params = query::pull_list_params(filters, owner);

        s.rest
            .paginate_where(
                url,
                &params,
                filters.limit,
                |page: Vec<Raw<GitHubPull>>| {
                    page.into_iter()
                        .map(|pull| pull_from(pull, project_id))
                        .collect()
                },
                |pull| query::pull_matches(filters, pull),
            )
            .await
            .or_forge(PLATFORM, || format!("Failed to list pull requests of {}", project_id))
    }

    async fn get_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<Option<MergeRequestResource>, ForgeError> {
        let s = self.session().await?;
        let url = pull_url(&s.rest, project_id, mr_id)?;
        let pull: Option<Raw<GitHubPull>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get pull request {}", mr_id))?;
        Ok(pull.map(|p| pull_from(p, project_id)))
    }

    async fn create_merge_request(
        &self,
        project_id: &str,
        request: NewMergeRequest,
    ) -> Result<MergeRequestResource, ForgeError> {
        let s = self.session().await?;

        let source = parse_branch_reference(&request.source_branch).map_err(|e| {
            ForgeError::platform(PLATFORM, format!("Invalid branch reference: {}", e))
        })?;
        let target = parse_branch_reference(&request.target_branch).map_err(|e| {
            ForgeError::platform(PLATFORM, format!("Invalid branch reference: {}", e))
        })?;
        let plan = query::plan_pull_request(
            project_id,
            &source,
            &target,
            request.target_project_id.as_deref(),
        )
        .map_err(|message| ForgeError::platform(PLATFORM, message))?;

        let check = self
            .probe_branch(&s.rest, &plan.head_repo, &plan.head_branch)
            .await;
        require_branch(
            check,
            BranchRole::Source,
            &plan.head_branch,
            &format!("repository {}", plan.head_repo),
            PLATFORM,
        )?;
        let check = self.probe_branch(&s.rest, &plan.repo, &plan.base).await;
        require_branch(
            check,
            BranchRole::Target,
            &plan.base,
            &format!("repository {}", plan.repo),
            PLATFORM,
        )?;

        let body = CreatePullBody {
            title: &request.title,
            head: &plan.head,
            base: &plan.base,
            body: request.description.as_deref(),
            draft: request.draft,
        };
        info!(repo = %plan.repo, head = %plan.head, base = %plan.base, "creating pull request");

        let url = repo_url(&s.rest, &plan.repo, &["pulls"])?;
        let created: Raw<GitHubPull> = s.rest.post(url, &body).await.or_forge(PLATFORM, || {
            format!(
                "Failed to create pull request {} -> {} in {}",
                plan.head, plan.base, plan.repo
            )
        })?;
        let number = created.wire.number.to_string();
        let mut pull = pull_from(created, &plan.repo);

        if request.assignee.is_none() && request.labels.is_empty() && request.milestone.is_none() {
            return Ok(pull);
        }

        let milestone = match &request.milestone {
            Some(m) => self.resolve_milestone(&s.rest, &plan.repo, m).await,
            None => None,
        };
        let edit = EditIssueBody {
            labels: (!request.labels.is_empty()).then(|| request.labels.clone().into_vec()),
            assignees: request.assignee.clone().map(|a| vec![a]),
            milestone,
            ..Default::default()
        };
        let edit_url = repo_url(&s.rest, &plan.repo, &["issues", &number])?;
        match s.rest.patch::<_, Value>(edit_url, &edit).await {
            Ok(_) => match s.rest.get(pull_url(&s.rest, &plan.repo, &number)?, &[]).await {
                Ok(refreshed) => pull = pull_from(refreshed, &plan.repo),
                Err(e) => warn!(number = %number, error = %e, "failed to refresh pull request"),
            },
            Err(e) => {
                warn!(
                    number = %number,
                    error = %e,
                    "failed to set assignee, labels or milestone on pull request"
                );
            }
        }

        Ok(pull)
    }

    async fn update_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        update: MergeRequestUpdate,
    ) -> Result<MergeRequestResource, ForgeError> {
        let s = self.session().await?;

        if update.labels.is_some() || update.assignee.is_some() {
            let edit = EditIssueBody {
                labels: update.labels.clone().map(|l| l.into_vec()),
                assignees: update.assignee.clone().map(|a| vec![a]),
                ..Default::default()
            };
            let url = repo_url(&s.rest, project_id, &["issues", mr_id])?;
            s.rest
                .patch::<_, Value>(url, &edit)
                .await
                .or_forge(PLATFORM, || format!("Failed to update pull request {}", mr_id))?;
        }

        let body = EditPullBody {
            title: update.title.as_deref(),
            body: update.description.as_deref(),
            base: update.target_branch.as_deref(),
            state: update.state_event.map(state_value),
        };
        let url = repo_url(&s.rest, project_id, &["pulls", mr_id])?;
        let pull: Raw<GitHubPull> = s
            .rest
            .patch(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to update pull request {}", mr_id))?;
        Ok(pull_from(pull, project_id))
    }

    async fn approve_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: ApproveOptions,
    ) -> Result<(), ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["pulls", mr_id, "reviews"])?;
        let body = ReviewBody {
            event: "APPROVE",
            body: options.body.as_deref(),
            commit_id: options.sha.as_deref(),
        };
        s.rest
            .post::<_, Value>(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to approve pull request {}", mr_id))?;
        Ok(())
    }

    async fn merge_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: MergeOptions,
    ) -> Result<MergeRequestResource, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["pulls", mr_id, "merge"])?;
        let body = MergePullBody {
            commit_title: options.commit_title.as_deref(),
            commit_message: options.commit_message.as_deref(),
            merge_method: options.method.as_str(),
            sha: options.sha.as_deref(),
        };
        if options.remove_source_branch.is_some() {
            debug!("GitHub merges do not delete the head branch, ignoring");
        }

        info!(project_id, mr_id, method = options.method.as_str(), "merging pull request");
        s.rest
            .put::<_, Value>(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to merge pull request {}", mr_id))?;

        let url = pull_url(&s.rest, project_id, mr_id)?;
        let pull: Raw<GitHubPull> = s
            .rest
            .get(url, &[])
            .await
            .or_forge(PLATFORM, || format!("Failed to get pull request {}", mr_id))?;
        Ok(pull_from(pull, project_id))
    }

    async fn get_merge_request_diff(
        &self,
        project_id: &str,
        mr_id: &str,
        options: DiffOptions,
    ) -> Result<MergeRequestDiff, ForgeError> {
        let s = self.session().await?;
        let resource_id = format!("{}#{}", project_id, mr_id);

        let url = pull_url(&s.rest, project_id, mr_id)?;
        let pull: GitHubPull = s
            .rest
            .get(url, &[])
            .await
            .or_not_found(PLATFORM, "pull request", &resource_id, || {
                format!("Failed to get pull request {}", mr_id)
            })?;

        let url = repo_url(&s.rest, project_id, &["pulls", mr_id, "files"])?;
        let files: Vec<GitHubPullFile> = s
            .rest
            .paginate(url, &[], None)
            .await
            .or_not_found(PLATFORM, "pull request", &resource_id, || {
                format!("Failed to get files of pull request {}", mr_id)
            })?;

        let listed = files.len() as u64;
        let additions = pull
            .additions
            .unwrap_or_else(|| files.iter().map(|f| f.additions).sum());
        let deletions = pull
            .deletions
            .unwrap_or_else(|| files.iter().map(|f| f.deletions).sum());
        let files_changed = pull.changed_files.unwrap_or(listed);

        Ok(MergeRequestDiff {
            mr_id: mr_id.to_string(),
            total_changes: ChangeTotals {
                additions,
                deletions,
                files_changed,
            },
            files: files
                .into_iter()
                .map(|f| file_change(f, options.include_diff))
                .collect(),
            diff_format: options.format,
            truncated: listed < files_changed,
        })
    }

    async fn get_merge_request_commits(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<MergeRequestCommits, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["pulls", mr_id, "commits"])?;
        let listed: Vec<GitHubCommit> = s
            .rest
            .paginate(url, &[], None)
            .await
            .or_not_found(PLATFORM, "pull request", &format!("{}#{}", project_id, mr_id), || {
                format!("Failed to get commits of pull request {}", mr_id)
            })?;

        let mut commits = Vec::with_capacity(listed.len());
        for commit in listed {
            // The list endpoint has no stats; the single-commit endpoint does
            let detailed = match repo_url(&s.rest, project_id, &["commits", &commit.sha]) {
                Ok(url) => match s.rest.get::<GitHubCommit>(url, &[]).await {
                    Ok(detailed) => Some(detailed),
                    Err(e) => {
                        debug!(sha = %commit.sha, error = %e, "commit stats unavailable");
                        None
                    }
                },
                Err(_) => None,
            };
            commits.push(MergeRequestCommit::from(detailed.unwrap_or(commit)));
        }

        Ok(MergeRequestCommits {
            mr_id: mr_id.to_string(),
            total_commits: commits.len(),
            commits,
        })
    }

    // ----------------------------------------------------------------------
    // Repository
    // ----------------------------------------------------------------------

    async fn list_branches(
        &self,
        project_id: &str,
        filters: &BranchFilters,
    ) -> Result<Vec<Branch>, ForgeError> {
        let s = self.session().await?;
        let default_branch = match self.fetch_repo(&s.rest, project_id).await {
            Ok(repo) => repo.wire.default_branch,
            Err(e @ ForgeError::ResourceNotFound { .. }) => return Err(e),
            Err(e) => {
                warn!(project_id, error = %e, "could not determine default branch");
                None
            }
        };

        let url = repo_url(&s.rest, project_id, &["branches"])?;
        let search = filters.search.as_deref().map(str::to_lowercase);
        s.rest
            .paginate_where(
                url,
                &[],
                filters.limit,
                |page: Vec<GitHubBranch>| {
                    page.into_iter()
                        .map(|b| branch_from(b, default_branch.as_deref()))
                        .collect()
                },
                |branch: &Branch| {
                    search
                        .as_deref()
                        .map_or(true, |needle| branch.name.to_lowercase().contains(needle))
                },
            )
            .await
            .or_forge(PLATFORM, || format!("Failed to list branches of {}", project_id))
    }

    async fn list_tags(
        &self,
        project_id: &str,
        filters: &TagFilters,
    ) -> Result<Vec<Tag>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["tags"])?;
        let search = filters.search.as_deref().map(str::to_lowercase);
        s.rest
            .paginate_where(
                url,
                &[],
                filters.limit,
                |page: Vec<GitHubTag>| page.into_iter().map(Tag::from).collect(),
                |tag: &Tag| {
                    search
                        .as_deref()
                        .map_or(true, |needle| tag.name.to_lowercase().contains(needle))
                },
            )
            .await
            .or_forge(PLATFORM, || format!("Failed to list tags of {}", project_id))
    }

    async fn list_commits(
        &self,
        project_id: &str,
        filters: &CommitFilters,
    ) -> Result<Vec<Commit>, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["commits"])?;

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(sha) = &filters.ref_name {
            params.push(("sha", sha.clone()));
        }
        if let Some(path) = &filters.path {
            params.push(("path", path.clone()));
        }
        if let Some(since) = filters.since {
            params.push(("since", since.to_rfc3339()));
        }
        if let Some(until) = filters.until {
            params.push(("until", until.to_rfc3339()));
        }

        let commits: Vec<GitHubCommit> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || format!("Failed to list commits of {}", project_id))?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    // ----------------------------------------------------------------------
    // Users and forks
    // ----------------------------------------------------------------------

    async fn get_current_user(&self) -> Result<UserInfo, ForgeError> {
        let s = self.session().await?;
        let url = api_url(&s.rest, &["user"])?;
        let user: Raw<GitHubUser> = s
            .rest
            .get(url, &[])
            .await
            .or_forge(PLATFORM, || "Failed to get current user".into())?;
        Ok(user.into())
    }

    async fn create_fork(
        &self,
        project_id: &str,
        options: ForkOptions,
    ) -> Result<ProjectResource, ForgeError> {
        let s = self.session().await?;
        let url = repo_url(&s.rest, project_id, &["forks"])?;
        let body = ForkBody {
            organization: options.namespace.as_deref(),
            name: options.name.as_deref(),
            default_branch_only: options.default_branch_only,
        };

        info!(project_id, "forking repository");
        let repo: Raw<GitHubRepo> = s
            .rest
            .post(url, &body)
            .await
            .or_not_found(PLATFORM, "repository", project_id, || {
                format!("Failed to fork repository {}", project_id)
            })?;
        Ok(project_from(repo))
    }

    async fn is_fork(&self, project_id: &str) -> Result<bool, ForgeError> {
        let s = self.session().await?;
        let repo = self.fetch_repo(&s.rest, project_id).await?;
        Ok(repo.wire.fork)
    }

    async fn get_fork_parent(&self, project_id: &str) -> Result<Option<String>, ForgeError> {
        let s = self.session().await?;
        let repo = self.fetch_repo(&s.rest, project_id).await?.wire;
        if !repo.fork {
            return Ok(None);
        }
        Ok(repo.parent.map(|p| p.full_name))
    }
}
