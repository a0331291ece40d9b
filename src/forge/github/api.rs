//! forge::github::api
//!
//! GitHub REST wire types and their conversion into the resource model.

use serde::{Deserialize, Serialize};

use super::PLATFORM;
use crate::core::types::{
    metadata_from, parse_timestamp, short_sha, Branch, Comment, Commit, CommitSummary,
    FileChange, FileStatus, IssueResource, MergeRequestCommit, MergeRequestResource,
    ProjectResource, ResourceState, Tag, UserInfo,
};
use crate::forge::http::Raw;

/// Extensions treated as binary when GitHub omits a patch.
const BINARY_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".pdf", ".zip", ".exe"];

// --------------------------------------------------------------------------
// Request bodies
// --------------------------------------------------------------------------

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct CreatePullBody<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    pub draft: bool,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct EditIssueBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateIssueBody<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct EditPullBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRepoBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub private: bool,
    pub auto_init: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct MergePullBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<&'a str>,
    pub merge_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewBody<'a> {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct ForkBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct CommentBody<'a> {
    pub body: &'a str,
}

// --------------------------------------------------------------------------
// Response types
// --------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubMilestone {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubRepoName {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubRepo {
    pub full_name: String,
    pub name: String,
    pub owner: GitHubUser,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub visibility: Option<String>,
    pub default_branch: Option<String>,
    pub clone_url: Option<String>,
    pub ssh_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    pub parent: Option<GitHubRepoName>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub user: Option<GitHubUser>,
    pub assignee: Option<GitHubUser>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    pub milestone: Option<GitHubMilestone>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// API URL of the owning repository (search results)
    pub repository_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubPull {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub user: Option<GitHubUser>,
    pub assignee: Option<GitHubUser>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged: Option<bool>,
    pub merged_at: Option<String>,
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub draft: bool,
    pub head: GitHubRef,
    pub base: GitHubRef,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub changed_files: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubComment {
    pub id: u64,
    pub user: Option<GitHubUser>,
    pub body: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubCommitRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubBranch {
    pub name: String,
    pub commit: GitHubCommitRef,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubTag {
    pub name: String,
    pub commit: GitHubCommitRef,
    pub tarball_url: Option<String>,
    pub zipball_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubSignature {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubCommitDetail {
    pub message: String,
    pub author: Option<GitHubSignature>,
    pub committer: Option<GitHubSignature>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubCommit {
    pub sha: String,
    pub html_url: Option<String>,
    pub commit: GitHubCommitDetail,
    pub stats: Option<GitHubStats>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubPullFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    pub patch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GitHubSearchPage<T> {
    pub items: Vec<T>,
}

// --------------------------------------------------------------------------
// Conversions
// --------------------------------------------------------------------------

fn login(user: &Option<GitHubUser>) -> Option<String> {
    user.as_ref().map(|u| u.login.clone())
}

fn label_names(labels: &[GitHubLabel]) -> Vec<String> {
    labels.iter().map(|l| l.name.clone()).collect()
}

/// Repository `owner/name` from an API URL such as
/// `https://api.github.com/repos/owner/name`.
pub(super) fn repo_from_api_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/repos/")?;
    let mut parts = rest.trim_end_matches('/').splitn(3, '/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, name))
}

pub(super) fn project_from(payload: Raw<GitHubRepo>) -> ProjectResource {
    let Raw { wire: repo, raw } = payload;

    let mut project = ProjectResource::new(&repo.full_name, &repo.name, PLATFORM, &repo.html_url);
    let base = project.base_mut();
    base.description = repo.description;
    base.state = Some(if repo.archived {
        ResourceState::Inactive
    } else {
        ResourceState::Active
    });
    base.created_at = parse_timestamp(repo.created_at.as_deref());
    base.updated_at = parse_timestamp(repo.updated_at.as_deref());
    base.metadata = metadata_from(raw);
    project.namespace = Some(repo.owner.login);
    let fallback_visibility = if repo.private { "private" } else { "public" };
    project.visibility = Some(
        repo.visibility
            .unwrap_or_else(|| fallback_visibility.to_string()),
    );
    project.default_branch = repo.default_branch;
    project.clone_url_http = repo.clone_url;
    project.clone_url_ssh = repo.ssh_url;
    project
}

/// Convert an issue; `project_id` is used when the payload does not name
/// its repository.
pub(super) fn issue_from(payload: Raw<GitHubIssue>, project_id: &str) -> IssueResource {
    let Raw { wire: issue, raw } = payload;

    let project_id = issue
        .repository_url
        .as_deref()
        .and_then(repo_from_api_url)
        .unwrap_or_else(|| project_id.to_string());

    let mut resource = IssueResource::new(
        issue.number.to_string(),
        &issue.title,
        PLATFORM,
        &issue.html_url,
        project_id,
    );
    let base = resource.base_mut();
    base.state = Some(if issue.state == "open" {
        ResourceState::Opened
    } else {
        ResourceState::Closed
    });
    base.description = issue.body;
    base.author = login(&issue.user);
    base.assignee = login(&issue.assignee);
    base.labels = label_names(&issue.labels);
    base.created_at = parse_timestamp(issue.created_at.as_deref());
    base.updated_at = parse_timestamp(issue.updated_at.as_deref());
    base.metadata = metadata_from(raw);
    resource.milestone = issue.milestone.map(|m| m.title);
    resource
}

/// Whether an issue listing entry is really a pull request.
pub(super) fn is_pull_request(issue: &IssueResource) -> bool {
    issue
        .metadata
        .get("pull_request")
        .is_some_and(|v| !v.is_null())
}

pub(super) fn pull_state(pull: &GitHubPull) -> ResourceState {
    if pull.merged.unwrap_or(false) || pull.merged_at.is_some() {
        ResourceState::Merged
    } else if pull.state == "closed" {
        ResourceState::Closed
    } else {
        ResourceState::Opened
    }
}

pub(super) fn pull_from(payload: Raw<GitHubPull>, project_id: &str) -> MergeRequestResource {
    let Raw { wire: pull, raw } = payload;

    let mut resource = MergeRequestResource::new(
        pull.number.to_string(),
        &pull.title,
        PLATFORM,
        &pull.html_url,
        project_id,
    );
    let base = resource.base_mut();
    base.state = Some(pull_state(&pull));
    base.description = pull.body;
    base.author = login(&pull.user);
    base.assignee = login(&pull.assignee);
    base.labels = label_names(&pull.labels);
    base.created_at = parse_timestamp(pull.created_at.as_deref());
    base.updated_at = parse_timestamp(pull.updated_at.as_deref());
    base.metadata = metadata_from(raw);
    resource.source_branch = Some(pull.head.ref_name);
    resource.target_branch = Some(pull.base.ref_name);
    resource.merge_commit_sha = pull.merge_commit_sha;
    resource.draft = pull.draft;
    resource
}

impl From<GitHubComment> for Comment {
    fn from(c: GitHubComment) -> Self {
        Comment {
            id: c.id.to_string(),
            author: login(&c.user),
            created_at: parse_timestamp(c.created_at.as_deref()),
            updated_at: parse_timestamp(c.updated_at.as_deref()),
            body: c.body.unwrap_or_default(),
            system: false,
            url: c.html_url,
        }
    }
}

pub(super) fn branch_from(b: GitHubBranch, default_branch: Option<&str>) -> Branch {
    Branch {
        default: default_branch == Some(b.name.as_str()),
        commit: CommitSummary::from_sha(&b.commit.sha),
        name: b.name,
        protected: b.protected,
    }
}

impl From<GitHubTag> for Tag {
    fn from(t: GitHubTag) -> Self {
        Tag {
            name: t.name,
            commit: CommitSummary::from_sha(&t.commit.sha),
            message: None,
            tarball_url: t.tarball_url,
            zipball_url: t.zipball_url,
        }
    }
}

impl From<GitHubCommit> for Commit {
    fn from(c: GitHubCommit) -> Self {
        let author = c.commit.author.unwrap_or(GitHubSignature {
            name: None,
            email: None,
            date: None,
        });
        let committer = c.commit.committer.unwrap_or(GitHubSignature {
            name: None,
            email: None,
            date: None,
        });
        Commit {
            short_id: short_sha(&c.sha),
            title: c.commit.message.lines().next().unwrap_or_default().to_string(),
            message: c.commit.message,
            id: c.sha,
            author_name: author.name,
            author_email: author.email,
            authored_date: parse_timestamp(author.date.as_deref()),
            committer_name: committer.name,
            committer_email: committer.email,
            committed_date: parse_timestamp(committer.date.as_deref()),
            web_url: c.html_url,
        }
    }
}

impl From<GitHubCommit> for MergeRequestCommit {
    fn from(c: GitHubCommit) -> Self {
        let (additions, deletions) = match &c.stats {
            Some(stats) => (Some(stats.additions), Some(stats.deletions)),
            None => (None, None),
        };
        let author = c.commit.author.as_ref();
        let committer = c.commit.committer.as_ref();
        MergeRequestCommit {
            author: author.and_then(|a| a.name.clone()),
            authored_date: parse_timestamp(author.and_then(|a| a.date.as_deref())),
            committer: committer.and_then(|a| a.name.clone()),
            committed_date: parse_timestamp(committer.and_then(|a| a.date.as_deref())),
            message: c.commit.message,
            url: c.html_url,
            sha: c.sha,
            additions,
            deletions,
        }
    }
}

impl From<Raw<GitHubUser>> for UserInfo {
    fn from(payload: Raw<GitHubUser>) -> Self {
        let Raw { wire: user, raw } = payload;
        UserInfo {
            id: user.id.to_string(),
            username: user.login,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            web_url: user.html_url,
            extra: metadata_from(raw),
        }
    }
}

pub(super) fn file_status(status: &str) -> FileStatus {
    match status {
        "added" | "copied" => FileStatus::Added,
        "removed" => FileStatus::Removed,
        "renamed" => FileStatus::Renamed,
        _ => FileStatus::Modified,
    }
}

pub(super) fn is_binary_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    BINARY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub(super) fn file_change(file: GitHubPullFile, include_diff: bool) -> FileChange {
    let status = file_status(&file.status);
    // Binary blobs come back with no patch and 0/0 counts. Oversized text
    // diffs also lose their patch but keep their counts.
    let no_line_counts = file.additions == 0 && file.deletions == 0;
    let binary = is_binary_path(&file.filename)
        || (file.patch.is_none() && status != FileStatus::Renamed && no_line_counts);
    let diff = if include_diff && !binary { file.patch } else { None };

    FileChange {
        path: file.filename,
        status,
        additions: file.additions,
        deletions: file.deletions,
        binary,
        diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn raw<T: serde::de::DeserializeOwned>(value: Value) -> Raw<T> {
        serde_json::from_value(value).unwrap()
    }

    fn pull_json(state: &str, merged: bool) -> Value {
        json!({
            "number": 12,
            "title": "Add feature",
            "body": "Details",
            "state": state,
            "html_url": "https://github.com/octo/hello/pull/12",
            "user": {"login": "alice", "id": 1},
            "assignee": null,
            "labels": [{"name": "enhancement"}],
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-02T12:00:00Z",
            "merged": merged,
            "merge_commit_sha": "abc123",
            "draft": false,
            "head": {"ref": "feature", "sha": "111", "repo": {"full_name": "forkuser/hello"}},
            "base": {"ref": "main", "sha": "222", "repo": {"full_name": "octo/hello"}}
        })
    }

    mod pulls {
        use super::*;

        #[test]
        fn open_pull() {
            let mr = pull_from(raw(pull_json("open", false)), "octo/hello");
            assert_eq!(mr.id, "12");
            assert_eq!(mr.state, Some(ResourceState::Opened));
            assert_eq!(mr.source_branch.as_deref(), Some("feature"));
            assert_eq!(mr.target_branch.as_deref(), Some("main"));
            assert_eq!(mr.author.as_deref(), Some("alice"));
            assert_eq!(mr.labels, vec!["enhancement".to_string()]);
            assert_eq!(mr.metadata["number"], 12);
        }

        #[test]
        fn merged_wins_over_closed() {
            let mr = pull_from(raw(pull_json("closed", true)), "octo/hello");
            assert_eq!(mr.state, Some(ResourceState::Merged));
        }

        #[test]
        fn closed_unmerged() {
            let mr = pull_from(raw(pull_json("closed", false)), "octo/hello");
            assert_eq!(mr.state, Some(ResourceState::Closed));
        }
    }

    mod issues {
        use super::*;

        #[test]
        fn repository_url_overrides_project() {
            let issue = issue_from(
                raw(json!({
                    "number": 3,
                    "title": "Bug",
                    "body": null,
                    "state": "open",
                    "html_url": "https://github.com/other/repo/issues/3",
                    "user": {"login": "bob"},
                    "labels": [],
                    "milestone": {"number": 2, "title": "v1"},
                    "repository_url": "https://api.github.com/repos/other/repo"
                })),
                "",
            );
            assert_eq!(issue.project_id, "other/repo");
            assert_eq!(issue.milestone.as_deref(), Some("v1"));
            assert_eq!(issue.state, Some(ResourceState::Opened));
        }

        #[test]
        fn search_page_keeps_raw_items() {
            let page: GitHubSearchPage<Raw<GitHubIssue>> = serde_json::from_value(json!({
                "total_count": 1,
                "items": [{
                    "number": 8,
                    "title": "Crash",
                    "state": "closed",
                    "html_url": "https://github.com/octo/hello/issues/8",
                    "repository_url": "https://api.github.com/repos/octo/hello",
                    "score": 1.0
                }]
            }))
            .unwrap();
            let issues: Vec<IssueResource> =
                page.items.into_iter().map(|i| issue_from(i, "")).collect();

            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].project_id, "octo/hello");
            assert_eq!(issues[0].state, Some(ResourceState::Closed));
            assert_eq!(issues[0].metadata["score"], 1.0);
        }

        #[test]
        fn repo_from_api_url_parsing() {
            assert_eq!(
                repo_from_api_url("https://ghe.example.com/api/v3/repos/a/b"),
                Some("a/b".into())
            );
            assert_eq!(repo_from_api_url("https://api.github.com/users/a"), None);
        }
    }

    mod projects {
        use super::*;

        #[test]
        fn visibility_from_private_flag() {
            let project = project_from(raw(json!({
                "full_name": "octo/hello",
                "name": "hello",
                "owner": {"login": "octo"},
                "html_url": "https://github.com/octo/hello",
                "private": true,
                "archived": true,
                "fork": false
            })));
            assert_eq!(project.id, "octo/hello");
            assert_eq!(project.title, "hello");
            assert_eq!(project.namespace.as_deref(), Some("octo"));
            assert_eq!(project.visibility.as_deref(), Some("private"));
            assert_eq!(project.state, Some(ResourceState::Inactive));
        }
    }

    mod diffs {
        use super::*;

        fn file(name: &str, status: &str, patch: Option<&str>) -> GitHubPullFile {
            GitHubPullFile {
                filename: name.into(),
                status: status.into(),
                additions: 3,
                deletions: 1,
                patch: patch.map(String::from),
            }
        }

        #[test]
        fn binary_extension_has_no_diff() {
            let change = file_change(file("logo.PNG", "added", Some("junk")), true);
            assert!(change.binary);
            assert!(change.diff.is_none());
        }

        #[test]
        fn text_file_keeps_patch() {
            let change = file_change(file("src/lib.rs", "modified", Some("@@ -1 +1 @@")), true);
            assert!(!change.binary);
            assert_eq!(change.diff.as_deref(), Some("@@ -1 +1 @@"));
            assert_eq!(change.status, FileStatus::Modified);
        }

        #[test]
        fn include_diff_false_omits_patch() {
            let change = file_change(file("src/lib.rs", "modified", Some("@@")), false);
            assert!(change.diff.is_none());
            assert!(!change.binary);
        }

        #[test]
        fn missing_patch_without_counts_is_binary() {
            let mut font = file("assets/font.woff2", "added", None);
            font.additions = 0;
            font.deletions = 0;
            let change = file_change(font, true);
            assert!(change.binary);
            assert!(change.diff.is_none());
        }

        #[test]
        fn oversized_text_diff_is_not_binary() {
            let mut huge = file("data/fixtures.sql", "modified", None);
            huge.additions = 50_000;
            huge.deletions = 2;
            let change = file_change(huge, true);
            assert!(!change.binary);
            assert_eq!(change.additions, 50_000);
            assert!(change.diff.is_none());
        }

        #[test]
        fn pure_rename_is_not_binary() {
            let mut moved = file("src/new_name.rs", "renamed", None);
            moved.additions = 0;
            moved.deletions = 0;
            assert!(!file_change(moved, true).binary);
        }

        #[test]
        fn statuses() {
            assert_eq!(file_status("added"), FileStatus::Added);
            assert_eq!(file_status("removed"), FileStatus::Removed);
            assert_eq!(file_status("renamed"), FileStatus::Renamed);
            assert_eq!(file_status("copied"), FileStatus::Added);
            assert_eq!(file_status("changed"), FileStatus::Modified);
        }
    }

    #[test]
    fn comment_conversion() {
        let comment: Comment = serde_json::from_value::<GitHubComment>(json!({
            "id": 99,
            "user": {"login": "carol"},
            "body": "+1",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null,
            "html_url": "https://github.com/o/r/issues/1#issuecomment-99"
        }))
        .unwrap()
        .into();
        assert_eq!(comment.id, "99");
        assert_eq!(comment.author.as_deref(), Some("carol"));
        assert!(!comment.system);
    }
}
