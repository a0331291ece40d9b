//! forge::gitlab
//!
//! GitLab adapter over the REST v4 API.
//!
//! # Design
//!
//! Projects are identified by numeric id or `group/project` path; both are
//! sent as a single percent-encoded path segment. Issues and merge requests
//! are identified by their project-scoped `iid`.
//!
//! Merge requests are created on the source project. For a cross-project
//! merge request the target is named with `target_project_id`, which GitLab
//! only accepts as a number, so a path is resolved first.
//!
//! Assignees and milestones are set by id. The username and title lookups
//! that produce those ids are best-effort: a failed lookup is logged and
//! the field is left out.

mod api;
pub(crate) mod query;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use self::api::{
    change_totals, draft_title, file_change, issue_from, merge_request_from, project_from,
    ApproveBody, CreateMergeRequestBody, CreateProjectBody, EditMergeRequestBody, ForkBody,
    GitLabBranch, GitLabChanges, GitLabCommit, GitLabIssue, GitLabMergeRequest, GitLabMilestone,
    GitLabNamespace, GitLabNote, GitLabProject, GitLabTag, GitLabUser, IssueBody, MergeBody,
    NoteBody,
};
use self::query::{numeric_id, AssigneeScope};
use super::branch::{parse_branch_reference, require_branch, BranchCheck, BranchRole};
use super::filters::{
    BranchFilters, CommitFilters, IssueFilters, MergeRequestFilters, ProjectFilters, TagFilters,
    Visibility,
};
use super::http::{optional, ApiFailure, ApiResultExt, Raw, RestClient};
use super::traits::{
    ApproveOptions, DiffOptions, ForgeError, ForkOptions, IssueUpdate, MergeMethod,
    MergeOptions, MergeRequestUpdate, NewIssue, NewMergeRequest, NewProject, PlatformAdapter,
    StateEvent,
};
use crate::core::types::{
    Branch, Comment, Commit, IssueResource, MergeRequestCommit, MergeRequestCommits,
    MergeRequestDiff, MergeRequestResource, ProjectResource, Tag, UserInfo,
};

pub(crate) const PLATFORM: &str = "gitlab";

/// gitlab.com, used when no URL is configured.
pub const DEFAULT_URL: &str = "https://gitlab.com";

const USER_AGENT_VALUE: &str = concat!("crossforge/", env!("CARGO_PKG_VERSION"));

struct Session {
    rest: RestClient,
    login: String,
}

/// GitLab implementation of [`PlatformAdapter`].
pub struct GitLabAdapter {
    url: String,
    api_base: String,
    token: Option<String>,
    username: Option<String>,
    timeout: Option<Duration>,
    session: OnceCell<Session>,
}

impl std::fmt::Debug for GitLabAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabAdapter")
            .field("url", &self.url)
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("authenticated", &self.session.initialized())
            .finish()
    }
}

impl GitLabAdapter {
    /// Create an adapter for the GitLab instance at `url`.
    ///
    /// `username` decides when a global assignee filter means "me"; the
    /// authenticated login is used when it is unset.
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
            .ok_or_else(|| ForgeError::Authentication("GitLab token is required".into()))?;

        let rest = RestClient::new(&self.api_base, headers(token)?, self.timeout)
            .or_forge(PLATFORM, || "Failed to create GitLab client".into())?;
        let url = api_url(&rest, &["user"])?;

        let user: GitLabUser = rest
            .get(url, &[])
            .await
            .or_forge(PLATFORM, || "GitLab authentication failed".into())?;

        info!(login = %user.username, api_base = %self.api_base, "authenticated with GitLab");
        Ok(Session {
            rest,
            login: user.username,
        })
    }

    fn me<'a>(&'a self, session: &'a Session) -> &'a str {
        self.username.as_deref().unwrap_or(&session.login)
    }

    /// Users API lookup; `Ok(None)` when nobody has that username.
    async fn find_user(&self, rest: &RestClient, username: &str) -> Result<Option<u64>, ApiFailure> {
        let url = rest.url(&["users"])?;
        let users: Vec<GitLabUser> = rest
            .get(url, &[("username", username.to_string())])
            .await?;
        Ok(users.into_iter().next().map(|u| u.id))
    }

    async fn resolve_assignee(&self, rest: &RestClient, username: &str) -> Option<u64> {
        match self.find_user(rest, username).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warn!(username, "assignee not found, skipping");
                None
            }
            Err(e) => {
                warn!(username, error = %e, "could not resolve assignee, skipping");
                None
            }
        }
    }

    async fn resolve_milestone(&self, rest: &RestClient, project: &str, title: &str) -> Option<u64> {
        let lookup = async {
            let url = rest.url(&["projects", project, "milestones"])?;
            let milestones: Vec<GitLabMilestone> = rest
                .get(url, &[("title", title.to_string())])
                .await?;
            Ok::<_, ApiFailure>(milestones.into_iter().find(|m| m.title == title).map(|m| m.id))
        };

        match lookup.await {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warn!(project, milestone = title, "milestone not found, skipping");
                None
            }
            Err(e) => {
                warn!(project, milestone = title, error = %e, "milestone lookup failed, skipping");
                None
            }
        }
    }

    async fn probe_branch(&self, rest: &RestClient, project: &str, branch: &str) -> BranchCheck {
        let lookup = async {
            let url = rest.url(&["projects", project, "repository", "branches"])?;
            let branches: Vec<GitLabBranch> = rest
                .get(url, &[("search", branch.to_string())])
                .await?;
            Ok::<_, ApiFailure>(branches.iter().any(|b| b.name == branch))
        };

        match lookup.await {
            Ok(true) => BranchCheck::Present,
            Ok(false) => BranchCheck::Missing,
            Err(e) => BranchCheck::Unverified(e.to_string()),
        }
    }

    async fn fetch_project(&self, rest: &RestClient, project_id: &str) -> Result<GitLabProject, ForgeError> {
        let url = project_url(rest, project_id, &[])?;
        rest.get(url, &[])
            .await
            .or_not_found(PLATFORM, "project", project_id, || {
                format!("Failed to get project {}", project_id)
            })
    }

    /// Numeric id of a project given by id or path.
    async fn resolve_project_id(&self, rest: &RestClient, project: &str) -> Result<u64, ForgeError> {
        match numeric_id(project) {
            Some(id) => Ok(id),
            None => Ok(self.fetch_project(rest, project).await?.id),
        }
    }

    /// Numeric id of a namespace given by id or path.
    async fn resolve_namespace_id(&self, rest: &RestClient, namespace: &str) -> Result<u64, ForgeError> {
        if let Some(id) = numeric_id(namespace) {
            return Ok(id);
        }
        let url = api_url(rest, &["namespaces", namespace])?;
        let found: GitLabNamespace = rest
            .get(url, &[])
            .await
            .or_not_found(PLATFORM, "namespace", namespace, || {
                format!("Failed to look up namespace {}", namespace)
            })?;
        Ok(found.id)
    }
}

/// API base for a GitLab web URL.
pub fn api_base_for(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let base = if trimmed.is_empty() { DEFAULT_URL } else { trimmed };
    if base.ends_with("/api/v4") {
        base.to_string()
    } else {
        format!("{}/api/v4", base)
    }
}

fn headers(token: &str) -> Result<HeaderMap, ForgeError> {
    let private_token = HeaderValue::from_str(token)
        .map_err(|_| ForgeError::Authentication("GitLab token contains invalid characters".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert("PRIVATE-TOKEN", private_token);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    Ok(headers)
}

fn api_url(rest: &RestClient, segments: &[&str]) -> Result<Url, ForgeError> {
    rest.url(segments)
        .or_forge(PLATFORM, || "Invalid API URL".into())
}

/// URL of `/projects/:id/<path>`.
fn project_url(rest: &RestClient, project_id: &str, path: &[&str]) -> Result<Url, ForgeError> {
    let mut segments = vec!["projects", project_id];
    segments.extend_from_slice(path);
    api_url(rest, &segments)
}

fn merge_request_key(project_id: &str, mr_id: &str) -> String {
    format!("{}!{}", project_id, mr_id)
}

fn state_event(event: StateEvent) -> &'static str {
    match event {
        StateEvent::Close => "close",
        StateEvent::Reopen => "reopen",
    }
}

fn visibility_value(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Private => "private",
        Visibility::Internal => "internal",
    }
}

/// Title and message joined the way `git commit` expects.
fn commit_message(title: Option<&str>, message: Option<&str>) -> Option<String> {
    match (title, message) {
        (Some(t), Some(m)) => Some(format!("{}\n\n{}", t, m)),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(m)) => Some(m.to_string()),
        (None, None) => None,
    }
}

#[async_trait]
impl PlatformAdapter for GitLabAdapter {
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
        let url = api_url(&s.rest, &["projects"])?;
        let params = query::project_list_params(filters);
        let projects: Vec<Raw<GitLabProject>> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || "Failed to list projects".into())?;
        Ok(projects.into_iter().map(project_from).collect())
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectResource>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &[])?;
        let project: Option<Raw<GitLabProject>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get project {}", project_id))?;
        Ok(project.map(project_from))
    }

    async fn create_project(&self, request: NewProject) -> Result<ProjectResource, ForgeError> {
        let s = self.session().await?;
        let namespace_id = match &request.namespace {
            Some(ns) => Some(self.resolve_namespace_id(&s.rest, ns).await?),
            None => None,
        };
        let body = CreateProjectBody {
            name: &request.name,
            description: request.description.as_deref(),
            visibility: request.visibility.map(visibility_value),
            namespace_id,
            initialize_with_readme: request.initialize_with_readme,
        };

        info!(name = %request.name, "creating project");
        let url = api_url(&s.rest, &["projects"])?;
        let project: Raw<GitLabProject> = s
            .rest
            .post(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to create project {}", request.name))?;
        Ok(project_from(project))
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &[])?;
        info!(project_id, "deleting project");
        s.rest
            .delete(url)
            .await
            .or_not_found(PLATFORM, "project", project_id, || {
                format!("Failed to delete project {}", project_id)
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
        let url = project_url(&s.rest, project_id, &["issues"])?;
        let params = query::issue_list_params(filters);
        let issues: Vec<Raw<GitLabIssue>> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || format!("Failed to list issues of project {}", project_id))?;
        Ok(issues
            .into_iter()
            .map(|issue| issue_from(issue, Some(project_id)))
            .collect())
    }

    async fn list_all_issues(
        &self,
        filters: &IssueFilters,
    ) -> Result<Vec<IssueResource>, ForgeError> {
        let s = self.session().await?;
        let scope = query::assignee_scope(filters, self.me(s));

        let mut assignee_id = None;
        let mut fallback_assignee = None;
        if let AssigneeScope::User(username) = &scope {
            match self.find_user(&s.rest, username).await {
                Ok(Some(id)) => assignee_id = Some(id),
                Ok(None) => {
                    debug!(username = %username, "assignee does not exist, no issues to list");
                    return Ok(Vec::new());
                }
                Err(e) => {
                    warn!(
                        username = %username,
                        error = %e,
                        "user lookup failed, filtering assignee client-side"
                    );
                    fallback_assignee = Some(username.as_str());
                }
            }
        }

        let url = api_url(&s.rest, &["issues"])?;
        let params = query::global_issue_params(filters, &scope, assignee_id);
        s.rest
            .paginate_where(
                url,
                &params,
                filters.limit,
                |page: Vec<Raw<GitLabIssue>>| {
                    page.into_iter().map(|issue| issue_from(issue, None)).collect()
                },
                |issue: &IssueResource| {
                    fallback_assignee.map_or(true, |want| issue.assignee.as_deref() == Some(want))
                },
            )
            .await
            .or_forge(PLATFORM, || "Failed to list issues".into())
    }

    async fn get_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<Option<IssueResource>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["issues", issue_id])?;
        let issue: Option<Raw<GitLabIssue>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get issue {}", issue_id))?;
        let Some(issue) = issue else {
            return Ok(None);
        };
        let mut issue = issue_from(issue, Some(project_id));

        let notes_url = project_url(&s.rest, project_id, &["issues", issue_id, "notes"])?;
        let params = [
            ("order_by", "created_at".to_string()),
            ("sort", "asc".to_string()),
        ];
        match s.rest.paginate::<GitLabNote>(notes_url, &params, None).await {
            Ok(notes) => {
                let comments: Vec<Comment> = notes
                    .into_iter()
                    .filter(|n| !n.system)
                    .map(Comment::from)
                    .collect();
                issue.set_comments(&comments);
            }
            Err(e) => {
                warn!(project_id, issue_id, error = %e, "failed to fetch issue notes");
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
        let assignee = match &request.assignee {
            Some(username) => self.resolve_assignee(&s.rest, username).await,
            None => None,
        };
        let milestone = match &request.milestone {
            Some(title) => self.resolve_milestone(&s.rest, project_id, title).await,
            None => None,
        };

        let body = IssueBody {
            title: Some(&request.title),
            description: request.description.as_deref(),
            labels: (!request.labels.is_empty()).then(|| request.labels.joined()),
            assignee_ids: assignee.map(|id| vec![id]),
            milestone_id: milestone,
            due_date: request.due_date.map(|d| d.to_string()),
            state_event: None,
        };
        let url = project_url(&s.rest, project_id, &["issues"])?;
        let issue: Raw<GitLabIssue> = s
            .rest
            .post(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to create issue in project {}", project_id))?;
        Ok(issue_from(issue, Some(project_id)))
    }

    async fn update_issue(
        &self,
        project_id: &str,
        issue_id: &str,
        update: IssueUpdate,
    ) -> Result<IssueResource, ForgeError> {
        let s = self.session().await?;
        let assignee = match &update.assignee {
            Some(username) => self.resolve_assignee(&s.rest, username).await,
            None => None,
        };
        let milestone = match &update.milestone {
            Some(title) => self.resolve_milestone(&s.rest, project_id, title).await,
            None => None,
        };

        let body = IssueBody {
            title: update.title.as_deref(),
            description: update.description.as_deref(),
            labels: update.labels.as_ref().map(|l| l.joined()),
            assignee_ids: assignee.map(|id| vec![id]),
            milestone_id: milestone,
            due_date: update.due_date.map(|d| d.to_string()),
            state_event: update.state_event.map(state_event),
        };
        let url = project_url(&s.rest, project_id, &["issues", issue_id])?;
        let issue: Raw<GitLabIssue> = s
            .rest
            .put(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to update issue {}", issue_id))?;
        Ok(issue_from(issue, Some(project_id)))
    }

    async fn create_issue_comment(
        &self,
        project_id: &str,
        issue_id: &str,
        body: &str,
    ) -> Result<Comment, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["issues", issue_id, "notes"])?;
        let note: GitLabNote = s
            .rest
            .post(url, &NoteBody { body })
            .await
            .or_forge(PLATFORM, || format!("Failed to comment on issue {}", issue_id))?;
        Ok(note.into())
    }

    // ----------------------------------------------------------------------
    // Merge requests
    // ----------------------------------------------------------------------

    async fn list_merge_requests(
        &self,
        project_id: &str,
        filters: &MergeRequestFilters,
    ) -> Result<Vec<MergeRequestResource>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["merge_requests"])?;
        let params = query::merge_request_list_params(filters);
        let mrs: Vec<Raw<GitLabMergeRequest>> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || {
                format!("Failed to list merge requests of project {}", project_id)
            })?;
        Ok(mrs
            .into_iter()
            .map(|mr| merge_request_from(mr, project_id))
            .collect())
    }

    async fn get_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<Option<MergeRequestResource>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id])?;
        let mr: Option<Raw<GitLabMergeRequest>> = optional(s.rest.get(url, &[]).await)
            .or_forge(PLATFORM, || format!("Failed to get merge request {}", mr_id))?;
        Ok(mr.map(|mr| merge_request_from(mr, project_id)))
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
        let plan = query::plan_merge_request(
            project_id,
            &source,
            &target,
            request.target_project_id.as_deref(),
        )
        .map_err(|message| ForgeError::platform(PLATFORM, message))?;

        let check = self
            .probe_branch(&s.rest, &plan.project, &plan.source_branch)
            .await;
        require_branch(
            check,
            BranchRole::Source,
            &plan.source_branch,
            &format!("project {}", plan.project),
            PLATFORM,
        )?;
        let check = self
            .probe_branch(&s.rest, plan.target_location(), &plan.target_branch)
            .await;
        require_branch(
            check,
            BranchRole::Target,
            &plan.target_branch,
            &format!("project {}", plan.target_location()),
            PLATFORM,
        )?;

        let target_project_id = match &plan.target_project {
            Some(target) => Some(self.resolve_project_id(&s.rest, target).await?),
            None => None,
        };
        let assignee_id = match &request.assignee {
            Some(username) => self.resolve_assignee(&s.rest, username).await,
            None => None,
        };
        let milestone_id = match &request.milestone {
            Some(title) => self.resolve_milestone(&s.rest, &plan.project, title).await,
            None => None,
        };

        let body = CreateMergeRequestBody {
            source_branch: plan.source_branch.clone(),
            target_branch: plan.target_branch.clone(),
            title: if request.draft {
                draft_title(&request.title)
            } else {
                request.title.clone()
            },
            description: request.description.clone(),
            target_project_id,
            assignee_id,
            labels: (!request.labels.is_empty()).then(|| request.labels.joined()),
            milestone_id,
            remove_source_branch: request.remove_source_branch,
            squash: request.squash,
        };

        info!(
            project = %plan.project,
            source = %plan.source_branch,
            target = %plan.target_branch,
            target_project = ?target_project_id,
            "creating merge request"
        );
        let url = project_url(&s.rest, &plan.project, &["merge_requests"])?;
        let mr: Raw<GitLabMergeRequest> = s.rest.post(url, &body).await.or_forge(PLATFORM, || {
            format!(
                "Failed to create merge request {} -> {} in project {}",
                plan.source_branch, plan.target_branch, plan.project
            )
        })?;

        // Cross-project merge requests belong to the target project
        let owner = match target_project_id {
            Some(id) => id.to_string(),
            None => plan.project.clone(),
        };
        Ok(merge_request_from(mr, &owner))
    }

    async fn update_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        update: MergeRequestUpdate,
    ) -> Result<MergeRequestResource, ForgeError> {
        let s = self.session().await?;
        let assignee_id = match &update.assignee {
            Some(username) => self.resolve_assignee(&s.rest, username).await,
            None => None,
        };

        let body = EditMergeRequestBody {
            title: update.title.as_deref(),
            description: update.description.as_deref(),
            target_branch: update.target_branch.as_deref(),
            labels: update.labels.as_ref().map(|l| l.joined()),
            assignee_id,
            state_event: update.state_event.map(state_event),
        };
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id])?;
        let mr: Raw<GitLabMergeRequest> = s
            .rest
            .put(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to update merge request {}", mr_id))?;
        Ok(merge_request_from(mr, project_id))
    }

    async fn approve_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: ApproveOptions,
    ) -> Result<(), ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id, "approve"])?;
        s.rest
            .post::<_, Value>(url, &ApproveBody { sha: options.sha.as_deref() })
            .await
            .or_forge(PLATFORM, || format!("Failed to approve merge request {}", mr_id))?;

        // Approvals carry no text on GitLab; a body becomes a note
        if let Some(body) = options.body.as_deref().filter(|b| !b.is_empty()) {
            let note_url = project_url(&s.rest, project_id, &["merge_requests", mr_id, "notes"])?;
            if let Err(e) = s.rest.post::<_, Value>(note_url, &NoteBody { body }).await {
                warn!(project_id, mr_id, error = %e, "failed to post approval comment");
            }
        }
        Ok(())
    }

    async fn merge_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: MergeOptions,
    ) -> Result<MergeRequestResource, ForgeError> {
        let s = self.session().await?;
        let message = commit_message(
            options.commit_title.as_deref(),
            options.commit_message.as_deref(),
        );

        let mut body = MergeBody {
            should_remove_source_branch: options.remove_source_branch,
            sha: options.sha.clone(),
            ..Default::default()
        };
        match options.method {
            MergeMethod::Merge => body.merge_commit_message = message,
            MergeMethod::Squash => {
                body.squash = Some(true);
                body.squash_commit_message = message;
            }
            MergeMethod::Rebase => {
                debug!("GitLab applies the project's merge method for rebase merges");
                body.merge_commit_message = message;
            }
        }

        info!(project_id, mr_id, method = options.method.as_str(), "merging merge request");
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id, "merge"])?;
        let mr: Raw<GitLabMergeRequest> = s
            .rest
            .put(url, &body)
            .await
            .or_forge(PLATFORM, || format!("Failed to merge merge request {}", mr_id))?;
        Ok(merge_request_from(mr, project_id))
    }

    async fn get_merge_request_diff(
        &self,
        project_id: &str,
        mr_id: &str,
        options: DiffOptions,
    ) -> Result<MergeRequestDiff, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id, "changes"])?;
        let changes: GitLabChanges = s
            .rest
            .get(url, &[])
            .await
            .or_not_found(PLATFORM, "merge request", &merge_request_key(project_id, mr_id), || {
                format!("Failed to get changes of merge request {}", mr_id)
            })?;

        let total_changes = change_totals(&changes);
        let truncated = changes.overflow;
        Ok(MergeRequestDiff {
            mr_id: mr_id.to_string(),
            total_changes,
            files: changes
                .changes
                .into_iter()
                .map(|c| file_change(c, options.include_diff))
                .collect(),
            diff_format: options.format,
            truncated,
        })
    }

    async fn get_merge_request_commits(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<MergeRequestCommits, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["merge_requests", mr_id, "commits"])?;
        let commits: Vec<GitLabCommit> = s
            .rest
            .paginate(url, &[], None)
            .await
            .or_not_found(PLATFORM, "merge request", &merge_request_key(project_id, mr_id), || {
                format!("Failed to get commits of merge request {}", mr_id)
            })?;

        let commits: Vec<MergeRequestCommit> = commits.into_iter().map(Into::into).collect();
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
        let url = project_url(&s.rest, project_id, &["repository", "branches"])?;
        let mut params = Vec::new();
        if let Some(search) = &filters.search {
            params.push(("search", search.clone()));
        }
        let branches: Vec<GitLabBranch> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || format!("Failed to list branches of project {}", project_id))?;
        Ok(branches.into_iter().map(Branch::from).collect())
    }

    async fn list_tags(
        &self,
        project_id: &str,
        filters: &TagFilters,
    ) -> Result<Vec<Tag>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["repository", "tags"])?;
        let mut params = Vec::new();
        if let Some(search) = &filters.search {
            params.push(("search", search.clone()));
        }
        let tags: Vec<GitLabTag> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || format!("Failed to list tags of project {}", project_id))?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }

    async fn list_commits(
        &self,
        project_id: &str,
        filters: &CommitFilters,
    ) -> Result<Vec<Commit>, ForgeError> {
        let s = self.session().await?;
        let url = project_url(&s.rest, project_id, &["repository", "commits"])?;

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(ref_name) = &filters.ref_name {
            params.push(("ref_name", ref_name.clone()));
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

        let commits: Vec<GitLabCommit> = s
            .rest
            .paginate(url, &params, filters.limit)
            .await
            .or_forge(PLATFORM, || format!("Failed to list commits of project {}", project_id))?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    // ----------------------------------------------------------------------
    // Users and forks
    // ----------------------------------------------------------------------

    async fn get_current_user(&self) -> Result<UserInfo, ForgeError> {
        let s = self.session().await?;
        let url = api_url(&s.rest, &["user"])?;
        let user: Raw<GitLabUser> = s
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
        let namespace = options.namespace.as_deref();
        let body = ForkBody {
            namespace_id: namespace.and_then(numeric_id),
            namespace_path: namespace.filter(|ns| numeric_id(ns).is_none()),
            name: options.name.as_deref(),
            path: options.path.as_deref(),
        };
        if options.default_branch_only.is_some() {
            debug!("GitLab forks copy every branch, ignoring default_branch_only");
        }

        info!(project_id, "forking project");
        let url = project_url(&s.rest, project_id, &["fork"])?;
        let project: Raw<GitLabProject> = s
            .rest
            .post(url, &body)
            .await
            .or_not_found(PLATFORM, "project", project_id, || {
                format!("Failed to fork project {}", project_id)
            })?;
        Ok(project_from(project))
    }

    async fn is_fork(&self, project_id: &str) -> Result<bool, ForgeError> {
        let s = self.session().await?;
        let project = self.fetch_project(&s.rest, project_id).await?;
        Ok(project.forked_from_project.is_some())
    }

    async fn get_fork_parent(&self, project_id: &str) -> Result<Option<String>, ForgeError> {
        let s = self.session().await?;
        let project = self.fetch_project(&s.rest, project_id).await?;
        Ok(project.forked_from_project.map(|parent| parent.id.to_string()))
    }
}
