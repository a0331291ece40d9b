//! forge::gitlab::api
//!
//! GitLab v4 wire types and their conversion into the resource model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PLATFORM;
use crate::core::types::{
    metadata_from, parse_date, parse_timestamp, short_sha, Branch, ChangeTotals, Comment, Commit,
    CommitSummary, FileChange, FileStatus, IssueResource, MergeRequestCommit,
    MergeRequestResource, ProjectResource, ResourceState, Tag, UserInfo,
};
use crate::forge::http::Raw;

/// Title prefix GitLab uses to mark a merge request as draft.
pub(super) const DRAFT_PREFIX: &str = "Draft: ";

// --------------------------------------------------------------------------
// Request bodies
// --------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct CreateProjectBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    pub initialize_with_readme: bool,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct IssueBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    /// Comma-separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_event: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CreateMergeRequestBody {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_source_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct EditMergeRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_event: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct MergeBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash_commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_remove_source_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ApproveBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct ForkBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct NoteBody<'a> {
    pub body: &'a str,
}

// --------------------------------------------------------------------------
// Responses
// --------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabMilestone {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabNamespace {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabProjectRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabProject {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub web_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
    #[serde(default)]
    pub ssh_url_to_repo: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub forked_from_project: Option<GitLabProjectRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabIssue {
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub web_url: String,
    #[serde(default)]
    pub author: Option<GitLabUser>,
    #[serde(default)]
    pub assignee: Option<GitLabUser>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<GitLabMilestone>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabMergeRequest {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub web_url: String,
    #[serde(default)]
    pub author: Option<GitLabUser>,
    #[serde(default)]
    pub assignee: Option<GitLabUser>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub squash_commit_sha: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub work_in_progress: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabNote {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<GitLabUser>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabCommitSummary {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabBranch {
    pub name: String,
    pub commit: GitLabCommitSummary,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabTag {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    pub commit: GitLabCommitSummary,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabCommit {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub authored_date: Option<String>,
    #[serde(default)]
    pub committer_name: Option<String>,
    #[serde(default)]
    pub committer_email: Option<String>,
    #[serde(default)]
    pub committed_date: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabChange {
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_path: Option<String>,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub diff: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitLabChanges {
    #[serde(default)]
    pub changes: Vec<GitLabChange>,
    /// A string, and `"1000+"` once GitLab stops counting
    #[serde(default)]
    pub changes_count: Option<Value>,
    #[serde(default)]
    pub overflow: bool,
}

// --------------------------------------------------------------------------
// Conversions
// --------------------------------------------------------------------------

fn username(user: &Option<GitLabUser>) -> Option<String> {
    user.as_ref().map(|u| u.username.clone())
}

pub(super) fn project_from(payload: Raw<GitLabProject>) -> ProjectResource {
    let Raw { wire: p, raw } = payload;

    let mut project = ProjectResource::new(p.id.to_string(), &p.name, PLATFORM, &p.web_url);
    let base = project.base_mut();
    base.description = p.description;
    base.state = Some(if p.archived {
        ResourceState::Inactive
    } else {
        ResourceState::Active
    });
    base.created_at = parse_timestamp(p.created_at.as_deref());
    base.updated_at = parse_timestamp(p.last_activity_at.as_deref());
    base.metadata = metadata_from(raw);
    project.namespace = Some(p.path_with_namespace);
    project.visibility = p.visibility;
    project.default_branch = p.default_branch;
    project.clone_url_http = p.http_url_to_repo;
    project.clone_url_ssh = p.ssh_url_to_repo;
    project
}

/// Convert an issue. `project_id` overrides the numeric id in the payload
/// so project-scoped calls echo the caller's identifier.
pub(super) fn issue_from(payload: Raw<GitLabIssue>, project_id: Option<&str>) -> IssueResource {
    let Raw { wire: issue, raw } = payload;

    let project_id = project_id
        .map(str::to_string)
        .unwrap_or_else(|| issue.project_id.to_string());
    let mut resource = IssueResource::new(
        issue.iid.to_string(),
        &issue.title,
        PLATFORM,
        &issue.web_url,
        project_id,
    );
    let base = resource.base_mut();
    base.state = Some(if issue.state == "opened" {
        ResourceState::Opened
    } else {
        ResourceState::Closed
    });
    base.description = issue.description;
    base.author = username(&issue.author);
    base.assignee = username(&issue.assignee);
    base.labels = issue.labels;
    base.created_at = parse_timestamp(issue.created_at.as_deref());
    base.updated_at = parse_timestamp(issue.updated_at.as_deref());
    base.metadata = metadata_from(raw);
    resource.milestone = issue.milestone.map(|m| m.title);
    resource.due_date = parse_date(issue.due_date.as_deref());
    resource
}

pub(super) fn merge_request_state(state: &str) -> ResourceState {
    match state {
        "merged" => ResourceState::Merged,
        "closed" | "locked" => ResourceState::Closed,
        _ => ResourceState::Opened,
    }
}

pub(super) fn merge_request_from(
    payload: Raw<GitLabMergeRequest>,
    project_id: &str,
) -> MergeRequestResource {
    let Raw { wire: mr, raw } = payload;

    let mut resource = MergeRequestResource::new(
        mr.iid.to_string(),
        &mr.title,
        PLATFORM,
        &mr.web_url,
        project_id,
    );
    let base = resource.base_mut();
    base.state = Some(merge_request_state(&mr.state));
    base.description = mr.description;
    base.author = username(&mr.author);
    base.assignee = username(&mr.assignee);
    base.labels = mr.labels;
    base.created_at = parse_timestamp(mr.created_at.as_deref());
    base.updated_at = parse_timestamp(mr.updated_at.as_deref());
    base.metadata = metadata_from(raw);
    resource.source_branch = mr.source_branch;
    resource.target_branch = mr.target_branch;
    resource.merge_commit_sha = mr.merge_commit_sha.or(mr.squash_commit_sha);
    resource.draft = mr.draft || mr.work_in_progress;
    resource
}

/// Prefix `title` with the draft marker unless it already carries one.
pub(super) fn draft_title(title: &str) -> String {
    let lower = title.to_lowercase();
    if lower.starts_with("draft:") || lower.starts_with("[draft]") || lower.starts_with("wip:") {
        title.to_string()
    } else {
        format!("{}{}", DRAFT_PREFIX, title)
    }
}

impl From<GitLabNote> for Comment {
    fn from(n: GitLabNote) -> Self {
        Comment {
            id: n.id.to_string(),
            author: username(&n.author),
            created_at: parse_timestamp(n.created_at.as_deref()),
            updated_at: parse_timestamp(n.updated_at.as_deref()),
            body: n.body,
            system: n.system,
            url: None,
        }
    }
}

impl From<GitLabCommitSummary> for CommitSummary {
    fn from(c: GitLabCommitSummary) -> Self {
        CommitSummary {
            short_id: c.short_id.unwrap_or_else(|| short_sha(&c.id)),
            id: c.id,
            title: c.title,
            author_name: c.author_name,
            created_at: parse_timestamp(c.created_at.as_deref()),
        }
    }
}

impl From<GitLabBranch> for Branch {
    fn from(b: GitLabBranch) -> Self {
        Branch {
            name: b.name,
            commit: b.commit.into(),
            protected: b.protected,
            default: b.default,
        }
    }
}

impl From<GitLabTag> for Tag {
    fn from(t: GitLabTag) -> Self {
        Tag {
            name: t.name,
            commit: t.commit.into(),
            message: t.message.filter(|m| !m.is_empty()),
            tarball_url: None,
            zipball_url: None,
        }
    }
}

impl From<GitLabCommit> for Commit {
    fn from(c: GitLabCommit) -> Self {
        let message = c.message.unwrap_or_default();
        let title = c
            .title
            .unwrap_or_else(|| message.lines().next().unwrap_or_default().to_string());
        Commit {
            short_id: c.short_id.unwrap_or_else(|| short_sha(&c.id)),
            id: c.id,
            title,
            message,
            author_name: c.author_name,
            author_email: c.author_email,
            authored_date: parse_timestamp(c.authored_date.as_deref()),
            committer_name: c.committer_name,
            committer_email: c.committer_email,
            committed_date: parse_timestamp(c.committed_date.as_deref()),
            web_url: c.web_url,
        }
    }
}

impl From<GitLabCommit> for MergeRequestCommit {
    fn from(c: GitLabCommit) -> Self {
        MergeRequestCommit {
            sha: c.id,
            message: c.message.or(c.title).unwrap_or_default(),
            author: c.author_name,
            authored_date: parse_timestamp(c.authored_date.as_deref()),
            committer: c.committer_name,
            committed_date: parse_timestamp(c.committed_date.as_deref()),
            url: c.web_url,
            additions: None,
            deletions: None,
        }
    }
}

impl From<Raw<GitLabUser>> for UserInfo {
    fn from(payload: Raw<GitLabUser>) -> Self {
        let Raw { wire: user, raw } = payload;
        UserInfo {
            id: user.id.to_string(),
            username: user.username,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            web_url: user.web_url,
            extra: metadata_from(raw),
        }
    }
}

pub(super) fn file_status(change: &GitLabChange) -> FileStatus {
    if change.new_file {
        FileStatus::Added
    } else if change.deleted_file {
        FileStatus::Removed
    } else if change.renamed_file {
        FileStatus::Renamed
    } else {
        FileStatus::Modified
    }
}

pub(super) fn file_change(change: GitLabChange, include_diff: bool) -> FileChange {
    let status = file_status(&change);
    let binary = change.diff.starts_with("Binary files");
    let path = change
        .new_path
        .filter(|p| !p.is_empty())
        .or(change.old_path)
        .unwrap_or_default();

    FileChange {
        path,
        status,
        additions: 0,
        deletions: 0,
        binary,
        diff: (include_diff && !binary).then_some(change.diff),
    }
}

/// Count added and removed lines of a unified diff.
///
/// `---`/`+++` are file headers only before the first hunk; inside a hunk
/// they are ordinary removed or added lines.
pub(super) fn count_diff_lines(diff: &str) -> (u64, u64) {
    let mut in_hunk = false;
    let (mut add, mut del) = (0, 0);
    for line in diff.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
        } else if !in_hunk && (line.starts_with("+++") || line.starts_with("---")) {
            continue;
        } else if line.starts_with('+') {
            add += 1;
        } else if line.starts_with('-') {
            del += 1;
        }
    }
    (add, del)
}

/// `changes_count` when GitLab reports an exact number.
pub(super) fn changes_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Totals across the listed changes, preferring the reported file count.
pub(super) fn change_totals(changes: &GitLabChanges) -> ChangeTotals {
    let (additions, deletions) = changes
        .changes
        .iter()
        .map(|c| count_diff_lines(&c.diff))
        .fold((0, 0), |(a, d), (ca, cd)| (a + ca, d + cd));
    ChangeTotals {
        additions,
        deletions,
        files_changed: changes_count(changes.changes_count.as_ref())
            .unwrap_or(changes.changes.len() as u64),
    }
}
