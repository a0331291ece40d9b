//! core::types
//!
//! Platform-neutral resource model.
//!
//! # Types
//!
//! - [`Resource`] - Fields shared by every hosted resource
//! - [`ProjectResource`], [`IssueResource`], [`MergeRequestResource`] -
//!   Specializations produced by the adapters
//! - [`Comment`], [`Branch`], [`Tag`], [`Commit`], [`UserInfo`] - Auxiliary
//!   records returned by repository and discussion operations
//! - [`MergeRequestDiff`], [`MergeRequestCommits`] - Normalized change sets
//!
//! # Invariants
//!
//! The resource type of a specialization is fixed by its constructor and
//! has no setter. Specializations dereference to their [`Resource`] for
//! reading only; the shared fields are filled in by the adapters' converters
//! inside this crate. Identifiers are always strings, whatever the native
//! platform uses. `metadata` always carries the raw platform payload, so
//! nothing the platform reported is lost by normalization.
//!
//! # Example
//!
//! ```
//! use crossforge::core::types::{IssueResource, ResourceType};
//!
//! let mut issue = IssueResource::new("42", "Fix login", "gitlab", "https://gitlab.com/x/-/issues/42", "7");
//! issue.milestone = Some("v1.0".into());
//!
//! assert_eq!(issue.resource_type(), ResourceType::Issue);
//! assert_eq!(issue.project_id, "7");
//! assert!(issue.state.is_none());
//! ```
//!
//! Swapping in a base of another type does not compile:
//!
//! ```compile_fail
//! use crossforge::core::types::{IssueResource, Resource, ResourceType};
//!
//! let mut issue = IssueResource::new("42", "Fix login", "gitlab", "https://gitlab.com/x/-/issues/42", "7");
//! *issue = Resource::new(ResourceType::Project, "7", "x", "gitlab", "https://gitlab.com/x");
//! ```

use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extra platform fields attached to a resource.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key under which an issue's discussion thread is stored.
pub const COMMENTS_KEY: &str = "comments";

/// Kind of hosted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Project,
    Issue,
    MergeRequest,
    /// GitHub's name for a merge request.
    PullRequest,
    User,
    Group,
    Branch,
    Tag,
    Commit,
    Pipeline,
    Job,
}

impl ResourceType {
    /// Get the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Project => "project",
            ResourceType::Issue => "issue",
            ResourceType::MergeRequest => "merge_request",
            ResourceType::PullRequest => "pull_request",
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::Branch => "branch",
            ResourceType::Tag => "tag",
            ResourceType::Commit => "commit",
            ResourceType::Pipeline => "pipeline",
            ResourceType::Job => "job",
        }
    }

    /// Whether this is a merge request under either platform's name.
    pub fn is_merge_request(&self) -> bool {
        matches!(self, ResourceType::MergeRequest | ResourceType::PullRequest)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Opened,
    Closed,
    Merged,
    Draft,
    Active,
    Inactive,
    Success,
    Failed,
    Running,
    Pending,
    Canceled,
}

impl ResourceState {
    /// Get the wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Opened => "opened",
            ResourceState::Closed => "closed",
            ResourceState::Merged => "merged",
            ResourceState::Draft => "draft",
            ResourceState::Active => "active",
            ResourceState::Inactive => "inactive",
            ResourceState::Success => "success",
            ResourceState::Failed => "failed",
            ResourceState::Running => "running",
            ResourceState::Pending => "pending",
            ResourceState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every hosted resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Human-facing identifier (`owner/repo`, project id, issue number)
    pub id: String,
    /// Title, or name for projects
    pub title: String,
    /// Name of the adapter that produced this resource
    pub platform: String,
    resource_type: ResourceType,
    /// Web URL
    pub url: String,
    pub state: Option<ResourceState>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Author login
    pub author: Option<String>,
    /// First assignee login
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub description: Option<String>,
    /// Raw platform payload plus attachments such as comments
    pub metadata: Metadata,
}

impl Resource {
    /// Create a resource with the required fields set and everything else empty.
    pub fn new(
        resource_type: ResourceType,
        id: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            platform: platform.into(),
            resource_type,
            url: url.into(),
            state: None,
            created_at: None,
            updated_at: None,
            author: None,
            assignee: None,
            labels: Vec::new(),
            description: None,
            metadata: Metadata::new(),
        }
    }

    /// Get the resource type.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }
}

/// A repository (GitHub) or project (GitLab).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectResource {
    #[serde(flatten)]
    base: Resource,
    /// Owning user, organization or group path
    pub namespace: Option<String>,
    /// `public`, `private` or `internal`
    pub visibility: Option<String>,
    pub default_branch: Option<String>,
    pub clone_url_http: Option<String>,
    pub clone_url_ssh: Option<String>,
}

impl ProjectResource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        platform: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            base: Resource::new(ResourceType::Project, id, name, platform, url),
            namespace: None,
            visibility: None,
            default_branch: None,
            clone_url_http: None,
            clone_url_ssh: None,
        }
    }
}

/// An issue within a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueResource {
    #[serde(flatten)]
    base: Resource,
    /// Identifier of the owning project
    pub project_id: String,
    /// Milestone title
    pub milestone: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl IssueResource {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
        url: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            base: Resource::new(ResourceType::Issue, id, title, platform, url),
            project_id: project_id.into(),
            milestone: None,
            due_date: None,
        }
    }

    /// Decode the discussion thread attached by `get_issue`.
    ///
    /// Returns `None` when no thread was attached (list results, or a
    /// failed comment fetch).
    pub fn comments(&self) -> Option<Vec<Comment>> {
        let raw = self.base.metadata.get(COMMENTS_KEY)?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Attach a discussion thread.
    pub fn set_comments(&mut self, comments: &[Comment]) {
        if let Ok(value) = serde_json::to_value(comments) {
            self.base.metadata.insert(COMMENTS_KEY.to_string(), value);
        }
    }
}

/// A merge request (GitLab) or pull request (GitHub).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRequestResource {
    #[serde(flatten)]
    base: Resource,
    /// Identifier of the project the request lives in
    pub project_id: String,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub merge_commit_sha: Option<String>,
    pub draft: bool,
}

impl MergeRequestResource {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
        url: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            base: Resource::new(ResourceType::MergeRequest, id, title, platform, url),
            project_id: project_id.into(),
            source_branch: None,
            target_branch: None,
            merge_commit_sha: None,
            draft: false,
        }
    }
}

macro_rules! deref_to_resource {
    ($($ty:ty),*) => {$(
        impl Deref for $ty {
            type Target = Resource;

            fn deref(&self) -> &Resource {
                &self.base
            }
        }

        impl $ty {
            /// Shared fields, writable only by the converters.
            pub(crate) fn base_mut(&mut self) -> &mut Resource {
                &mut self.base
            }
        }
    )*};
}

deref_to_resource!(ProjectResource, IssueResource, MergeRequestResource);

// --------------------------------------------------------------------------
// Auxiliary records
// --------------------------------------------------------------------------

/// A comment on an issue or merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub body: String,
    /// Set for platform-generated notes (label changes, pushes)
    #[serde(default)]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Minimal commit reference attached to branches and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub id: String,
    pub short_id: String,
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CommitSummary {
    pub(crate) fn from_sha(sha: &str) -> Self {
        Self {
            id: sha.to_string(),
            short_id: short_sha(sha),
            title: None,
            author_name: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitSummary,
    pub protected: bool,
    /// Whether this is the project's default branch
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitSummary,
    /// Annotation message for annotated tags
    pub message: Option<String>,
    pub tarball_url: Option<String>,
    pub zipball_url: Option<String>,
}

/// A commit in a project's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: String,
    pub short_id: String,
    /// First line of the message
    pub title: String,
    pub message: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub authored_date: Option<DateTime<Utc>>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub committed_date: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub web_url: Option<String>,
    /// Raw platform payload
    pub extra: Metadata,
}

/// How a file changed within a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Renamed,
}

/// One file in a merge request diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub binary: bool,
    /// Unified diff text; absent for binary files or when not requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTotals {
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

/// Normalized change set of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRequestDiff {
    pub mr_id: String,
    pub total_changes: ChangeTotals,
    pub files: Vec<FileChange>,
    pub diff_format: String,
    /// Whether the platform returned fewer files than the request touches
    pub truncated: bool,
}

/// A commit belonging to a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRequestCommit {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub authored_date: Option<DateTime<Utc>>,
    pub committer: Option<String>,
    pub committed_date: Option<DateTime<Utc>>,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRequestCommits {
    pub mr_id: String,
    pub total_commits: usize,
    pub commits: Vec<MergeRequestCommit>,
}

// --------------------------------------------------------------------------
// Conversion helpers
// --------------------------------------------------------------------------

/// Parse a platform timestamp, tolerating absent or malformed values.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a `YYYY-MM-DD` date, tolerating a trailing time component.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub(crate) fn short_sha(sha: &str) -> String {
    sha.chars().take(8).collect()
}

/// Turn a raw JSON payload into a metadata map.
pub(crate) fn metadata_from(raw: Value) -> Metadata {
    match raw {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod resource {
        use super::*;

        #[test]
        fn subtypes_fix_resource_type() {
            let project = ProjectResource::new("o/r", "r", "github", "https://x");
            let issue = IssueResource::new("1", "t", "github", "https://x", "o/r");
            let mr = MergeRequestResource::new("2", "t", "gitlab", "https://x", "5");

            assert_eq!(project.resource_type(), ResourceType::Project);
            assert_eq!(issue.resource_type(), ResourceType::Issue);
            assert_eq!(mr.resource_type(), ResourceType::MergeRequest);
        }

        #[test]
        fn metadata_defaults_to_empty_map() {
            let issue = IssueResource::new("1", "t", "github", "https://x", "o/r");
            assert!(issue.metadata.is_empty());
            assert!(issue.labels.is_empty());
        }

        #[test]
        fn serializes_flat() {
            let mut mr = MergeRequestResource::new("2", "Add x", "gitlab", "https://x", "5");
            mr.base_mut().state = Some(ResourceState::Merged);
            mr.source_branch = Some("feature".into());

            let value = serde_json::to_value(&mr).unwrap();
            assert_eq!(value["id"], "2");
            assert_eq!(value["resource_type"], "merge_request");
            assert_eq!(value["state"], "merged");
            assert_eq!(value["source_branch"], "feature");
        }

        #[test]
        fn pull_request_alias_is_merge_request() {
            assert!(ResourceType::PullRequest.is_merge_request());
            assert!(ResourceType::MergeRequest.is_merge_request());
            assert!(!ResourceType::Issue.is_merge_request());
        }
    }

    mod comments {
        use super::*;

        #[test]
        fn absent_without_attachment() {
            let issue = IssueResource::new("1", "t", "github", "https://x", "o/r");
            assert!(issue.comments().is_none());
        }

        #[test]
        fn attach_and_read_back() {
            let mut issue = IssueResource::new("1", "t", "github", "https://x", "o/r");
            let comment = Comment {
                id: "10".into(),
                author: Some("alice".into()),
                created_at: parse_timestamp(Some("2024-01-02T03:04:05Z")),
                updated_at: None,
                body: "looks good".into(),
                system: false,
                url: None,
            };
            issue.set_comments(std::slice::from_ref(&comment));

            assert_eq!(issue.comments(), Some(vec![comment]));
            assert!(issue.metadata.contains_key(COMMENTS_KEY));
        }
    }

    mod helpers {
        use super::*;

        #[test]
        fn timestamp_parsing() {
            let ts = parse_timestamp(Some("2024-05-01T10:00:00.000+02:00")).unwrap();
            assert_eq!(ts.to_rfc3339(), "2024-05-01T08:00:00+00:00");
            assert!(parse_timestamp(Some("yesterday")).is_none());
            assert!(parse_timestamp(None).is_none());
        }

        #[test]
        fn date_parsing() {
            assert_eq!(
                parse_date(Some("2024-06-30")),
                NaiveDate::from_ymd_opt(2024, 6, 30)
            );
            assert_eq!(
                parse_date(Some("2024-06-30T00:00:00Z")),
                NaiveDate::from_ymd_opt(2024, 6, 30)
            );
            assert!(parse_date(Some("soon")).is_none());
        }

        #[test]
        fn metadata_from_non_object_is_empty() {
            assert!(metadata_from(json!([1, 2])).is_empty());
            assert_eq!(metadata_from(json!({"a": 1})).len(), 1);
        }

        #[test]
        fn short_sha_truncates() {
            assert_eq!(short_sha("abcdef1234567890"), "abcdef12");
            assert_eq!(short_sha("abc"), "abc");
        }
    }
}
