//! forge::traits
//!
//! The platform adapter contract and the types that cross it.
//!
//! # Design
//!
//! `PlatformAdapter` is async because every operation is network I/O.
//! Each adapter instance authenticates at most once; every operation
//! authenticates lazily on first use, so calling
//! [`PlatformAdapter::authenticate`] up front is optional.
//!
//! Errors are reduced to the four kinds of [`ForgeError`]. Raw transport
//! or decode errors never cross this boundary.
//!
//! # Not-found policy
//!
//! - `get_project`, `get_issue`, `get_merge_request` return `Ok(None)`
//! - `delete_project`, `is_fork`, `get_fork_parent` and the diff/commit
//!   listings return [`ForgeError::ResourceNotFound`]
//!
//! # Example
//!
//! ```ignore
//! use crossforge::forge::{IssueFilters, PlatformAdapter, StateFilter};
//!
//! async fn open_bugs(adapter: &dyn PlatformAdapter) -> Result<(), ForgeError> {
//!     let filters = IssueFilters {
//!         state: Some(StateFilter::Opened),
//!         labels: "bug".into(),
//!         ..Default::default()
//!     };
//!     for issue in adapter.list_issues("octo/hello", &filters).await? {
//!         println!("#{} {}", issue.id, issue.title);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::branch::{parse_branch_reference, BranchRef, BranchRefError};
use super::filters::{
    BranchFilters, CommitFilters, IssueFilters, Labels, MergeRequestFilters, ProjectFilters,
    TagFilters, Visibility,
};
use crate::core::types::{
    Branch, Comment, Commit, IssueResource, MergeRequestCommits, MergeRequestDiff,
    MergeRequestResource, ProjectResource, Tag, UserInfo,
};

/// Errors from platform operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    /// Missing, invalid or expired credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Any other failure reported by, or while talking to, the platform.
    #[error("{platform} error: {message}")]
    Platform {
        message: String,
        /// Adapter name (`github`, `gitlab`)
        platform: String,
        /// HTTP status, when the platform answered
        status: Option<u16>,
    },

    /// A resource that must exist does not.
    #[error("{resource_type} '{resource_id}' not found on {platform}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
        platform: String,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),
}

impl ForgeError {
    /// A platform error without an HTTP status.
    pub fn platform(platform: impl Into<String>, message: impl Into<String>) -> Self {
        ForgeError::Platform {
            message: message.into(),
            platform: platform.into(),
            status: None,
        }
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        ForgeError::ResourceNotFound {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            platform: platform.into(),
        }
    }

    /// HTTP status carried by a platform error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::Platform { status, .. } => *status,
            _ => None,
        }
    }
}

/// Issue or merge request state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Close,
    Reopen,
}

impl StateEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "close" => Some(StateEvent::Close),
            "reopen" => Some(StateEvent::Reopen),
            _ => None,
        }
    }
}

/// Strategy used when merging a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

/// Request to create a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to private
    pub visibility: Option<Visibility>,
    /// Organization (GitHub) or namespace id/path (GitLab) to create under
    pub namespace: Option<String>,
    /// Create an initial commit with a README
    pub initialize_with_readme: bool,
}

/// Request to create an issue.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub labels: Labels,
    /// Assignee username
    pub assignee: Option<String>,
    /// Milestone title, or its number on GitHub. GitLab resolves the title
    /// to an id; a milestone that cannot be resolved is skipped.
    pub milestone: Option<String>,
    /// GitLab only
    pub due_date: Option<NaiveDate>,
}

/// Changes to apply to an issue. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Replaces the label set
    pub labels: Option<Labels>,
    pub assignee: Option<String>,
    pub milestone: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub state_event: Option<StateEvent>,
}

/// Request to create a merge request.
///
/// `source_branch` and `target_branch` accept `owner:branch` references;
/// see [`parse_branch_reference`].
#[derive(Debug, Clone, Default)]
pub struct NewMergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: Option<String>,
    /// Repository (`owner/repo`) or project id the request targets
    pub target_project_id: Option<String>,
    /// Assignee username
    pub assignee: Option<String>,
    pub labels: Labels,
    /// Milestone title, or its number on GitHub
    pub milestone: Option<String>,
    pub draft: bool,
    /// GitLab only
    pub remove_source_branch: Option<bool>,
    /// GitLab only
    pub squash: Option<bool>,
}

/// Changes to apply to a merge request. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MergeRequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_branch: Option<String>,
    pub labels: Option<Labels>,
    pub assignee: Option<String>,
    pub state_event: Option<StateEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct ApproveOptions {
    /// Review comment (GitHub)
    pub body: Option<String>,
    /// Head SHA the approval applies to
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
    pub method: MergeMethod,
    /// GitLab only
    pub remove_source_branch: Option<bool>,
    /// Refuse to merge unless the head is at this SHA
    pub sha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Format label echoed in the result
    pub format: String,
    /// Include per-file unified diff text
    pub include_diff: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            include_diff: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForkOptions {
    /// Organization (GitHub) or namespace path (GitLab) to fork into
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// GitLab only
    pub path: Option<String>,
    /// GitHub only
    pub default_branch_only: Option<bool>,
}

/// Operations every hosting platform adapter supports.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Adapter name, used as `Resource::platform`.
    fn platform_name(&self) -> &'static str;

    /// Authenticate with the platform.
    ///
    /// Idempotent: only the first successful call talks to the platform.
    ///
    /// # Errors
    ///
    /// - [`ForgeError::Authentication`] if no token is configured or the
    ///   platform rejects it
    /// - [`ForgeError::Network`] if the platform is unreachable
    async fn authenticate(&self) -> Result<(), ForgeError>;

    /// Whether an authenticated call succeeds. Never fails.
    async fn test_connection(&self) -> bool;

    // Projects

    async fn list_projects(
        &self,
        filters: &ProjectFilters,
    ) -> Result<Vec<ProjectResource>, ForgeError>;

    /// Get a project, or `None` if it does not exist.
    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectResource>, ForgeError>;

    async fn create_project(&self, request: NewProject) -> Result<ProjectResource, ForgeError>;

    /// Delete a project.
    ///
    /// # Errors
    ///
    /// [`ForgeError::ResourceNotFound`] if the project does not exist.
    async fn delete_project(&self, project_id: &str) -> Result<(), ForgeError>;

    // Issues

    async fn list_issues(
        &self,
        project_id: &str,
        filters: &IssueFilters,
    ) -> Result<Vec<IssueResource>, ForgeError>;

    /// List issues across every project visible to the user.
    async fn list_all_issues(&self, filters: &IssueFilters)
        -> Result<Vec<IssueResource>, ForgeError>;

    /// Get an issue with its comment thread attached, or `None`.
    ///
    /// A failed comment fetch is logged and the issue is returned without
    /// comments.
    async fn get_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<Option<IssueResource>, ForgeError>;

    async fn create_issue(
        &self,
        project_id: &str,
        request: NewIssue,
    ) -> Result<IssueResource, ForgeError>;

    async fn update_issue(
        &self,
        project_id: &str,
        issue_id: &str,
        update: IssueUpdate,
    ) -> Result<IssueResource, ForgeError>;

    async fn close_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<IssueResource, ForgeError> {
        let update = IssueUpdate {
            state_event: Some(StateEvent::Close),
            ..Default::default()
        };
        self.update_issue(project_id, issue_id, update).await
    }

    async fn create_issue_comment(
        &self,
        project_id: &str,
        issue_id: &str,
        body: &str,
    ) -> Result<Comment, ForgeError>;

    // Merge requests

    async fn list_merge_requests(
        &self,
        project_id: &str,
        filters: &MergeRequestFilters,
    ) -> Result<Vec<MergeRequestResource>, ForgeError>;

    async fn get_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<Option<MergeRequestResource>, ForgeError>;

    /// Create a merge request, possibly across repositories.
    ///
    /// # Errors
    ///
    /// - [`ForgeError::Platform`] if a branch reference is malformed, both
    ///   references are qualified, or a branch is known to be missing
    async fn create_merge_request(
        &self,
        project_id: &str,
        request: NewMergeRequest,
    ) -> Result<MergeRequestResource, ForgeError>;

    async fn update_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        update: MergeRequestUpdate,
    ) -> Result<MergeRequestResource, ForgeError>;

    async fn approve_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: ApproveOptions,
    ) -> Result<(), ForgeError>;

    async fn merge_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
        options: MergeOptions,
    ) -> Result<MergeRequestResource, ForgeError>;

    async fn close_merge_request(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<MergeRequestResource, ForgeError> {
        let update = MergeRequestUpdate {
            state_event: Some(StateEvent::Close),
            ..Default::default()
        };
        self.update_merge_request(project_id, mr_id, update).await
    }

    async fn get_merge_request_diff(
        &self,
        project_id: &str,
        mr_id: &str,
        options: DiffOptions,
    ) -> Result<MergeRequestDiff, ForgeError>;

    async fn get_merge_request_commits(
        &self,
        project_id: &str,
        mr_id: &str,
    ) -> Result<MergeRequestCommits, ForgeError>;

    // Repository

    async fn list_branches(
        &self,
        project_id: &str,
        filters: &BranchFilters,
    ) -> Result<Vec<Branch>, ForgeError>;

    async fn list_tags(&self, project_id: &str, filters: &TagFilters)
        -> Result<Vec<Tag>, ForgeError>;

    async fn list_commits(
        &self,
        project_id: &str,
        filters: &CommitFilters,
    ) -> Result<Vec<Commit>, ForgeError>;

    // Users

    async fn get_current_user(&self) -> Result<UserInfo, ForgeError>;

    // Forks

    async fn create_fork(
        &self,
        project_id: &str,
        options: ForkOptions,
    ) -> Result<ProjectResource, ForgeError>;

    /// # Errors
    ///
    /// [`ForgeError::ResourceNotFound`] if the project does not exist.
    async fn is_fork(&self, project_id: &str) -> Result<bool, ForgeError>;

    /// Identifier of the project this one was forked from, `None` for
    /// non-forks.
    ///
    /// # Errors
    ///
    /// [`ForgeError::ResourceNotFound`] if the project does not exist.
    async fn get_fork_parent(&self, project_id: &str) -> Result<Option<String>, ForgeError>;

    /// Parse `branch` or `owner:branch`.
    fn parse_branch_reference(&self, reference: &str) -> Result<BranchRef, BranchRefError> {
        parse_branch_reference(reference)
    }
}
