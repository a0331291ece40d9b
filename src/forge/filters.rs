//! forge::filters
//!
//! Platform-neutral filter vocabulary for list operations.
//!
//! Each list operation takes one options struct. The adapters translate
//! these into native query parameters with pure functions
//! (`github::query`, `gitlab::query`), so translation is testable without
//! any transport.

use std::fmt;

use chrono::{DateTime, Utc};

/// State filter for issue and merge request lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFilter {
    Opened,
    Closed,
    Merged,
    /// No state restriction; the state parameter is omitted entirely.
    All,
}

impl StateFilter {
    /// Parse a state name. Accepts GitHub's `open` as an alias for `opened`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "opened" | "open" => Some(StateFilter::Opened),
            "closed" => Some(StateFilter::Closed),
            "merged" => Some(StateFilter::Merged),
            "all" => Some(StateFilter::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::Opened => "opened",
            StateFilter::Closed => "closed",
            StateFilter::Merged => "merged",
            StateFilter::All => "all",
        }
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a list is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Created,
    Updated,
}

/// Sort order shared by both platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    CreatedAsc,
    CreatedDesc,
    UpdatedAsc,
    UpdatedDesc,
}

impl SortOrder {
    /// Parse `created_asc`, `created_desc`, `updated_asc` or `updated_desc`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_asc" => Some(SortOrder::CreatedAsc),
            "created_desc" => Some(SortOrder::CreatedDesc),
            "updated_asc" => Some(SortOrder::UpdatedAsc),
            "updated_desc" => Some(SortOrder::UpdatedDesc),
            _ => None,
        }
    }

    pub fn field(&self) -> SortField {
        match self {
            SortOrder::CreatedAsc | SortOrder::CreatedDesc => SortField::Created,
            SortOrder::UpdatedAsc | SortOrder::UpdatedDesc => SortField::Updated,
        }
    }

    /// `asc` or `desc`.
    pub fn direction(&self) -> &'static str {
        match self {
            SortOrder::CreatedAsc | SortOrder::UpdatedAsc => "asc",
            SortOrder::CreatedDesc | SortOrder::UpdatedDesc => "desc",
        }
    }
}

/// Project visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
    /// GitLab only; treated as private on GitHub.
    Internal,
}

impl Visibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "internal" => Some(Visibility::Internal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

/// An ordered list of label names.
///
/// A single string converts to a one-element list; it is never split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Comma-joined form accepted by both REST APIs.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Whether every label in this set is present in `labels`.
    pub(crate) fn all_present_in(&self, labels: &[String]) -> bool {
        self.iter().all(|want| labels.iter().any(|have| have == want))
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels(vec![label.to_string()])
    }
}

impl From<String> for Labels {
    fn from(label: String) -> Self {
        Labels(vec![label])
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Labels(labels)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(labels: Vec<&str>) -> Self {
        Labels(labels.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Labels {
    fn from(labels: [&str; N]) -> Self {
        Labels(labels.iter().map(|s| s.to_string()).collect())
    }
}

/// Filters for `list_issues` and `list_all_issues`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilters {
    pub state: Option<StateFilter>,
    /// Assignee username
    pub assignee: Option<String>,
    /// Author username
    pub author: Option<String>,
    pub labels: Labels,
    /// Milestone title (GitHub also accepts a number, `*` or `none`)
    pub milestone: Option<String>,
    /// Free text matched against title and body
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    /// Maximum number of results; `None` fetches every page
    pub limit: Option<usize>,
}

/// Filters for `list_merge_requests`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequestFilters {
    pub state: Option<StateFilter>,
    pub assignee: Option<String>,
    pub author: Option<String>,
    pub labels: Labels,
    pub milestone: Option<String>,
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    /// Source branch; GitHub accepts `owner:branch` here
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub limit: Option<usize>,
}

/// Filters for `list_projects`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilters {
    /// Only projects owned by the authenticated user
    pub owned: bool,
    /// Only projects starred by the authenticated user
    pub starred: bool,
    /// Only projects the user is a member of (GitLab)
    pub membership: bool,
    pub archived: Option<bool>,
    pub visibility: Option<Visibility>,
    /// Substring matched against name and description
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
}

/// Filters for `list_branches`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchFilters {
    /// Substring of the branch name
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Filters for `list_tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilters {
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Filters for `list_commits`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitFilters {
    /// Branch, tag or SHA to start listing from
    pub ref_name: Option<String>,
    /// Only commits touching this path
    pub path: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Case-insensitive substring match over a title and optional body.
pub(crate) fn text_matches(needle: &str, title: &str, body: Option<&str>) -> bool {
    let needle = needle.to_lowercase();
    title.to_lowercase().contains(&needle)
        || body.is_some_and(|b| b.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod state_filter {
        use super::*;

        #[test]
        fn parse_accepts_open_alias() {
            assert_eq!(StateFilter::parse("open"), Some(StateFilter::Opened));
            assert_eq!(StateFilter::parse("opened"), Some(StateFilter::Opened));
            assert_eq!(StateFilter::parse("ALL"), Some(StateFilter::All));
            assert_eq!(StateFilter::parse("locked"), None);
        }

        #[test]
        fn display() {
            assert_eq!(StateFilter::Merged.to_string(), "merged");
        }
    }

    mod sort_order {
        use super::*;

        #[test]
        fn parse_all_variants() {
            assert_eq!(SortOrder::parse("created_asc"), Some(SortOrder::CreatedAsc));
            assert_eq!(SortOrder::parse("created_desc"), Some(SortOrder::CreatedDesc));
            assert_eq!(SortOrder::parse("updated_asc"), Some(SortOrder::UpdatedAsc));
            assert_eq!(SortOrder::parse("updated_desc"), Some(SortOrder::UpdatedDesc));
            assert_eq!(SortOrder::parse("newest"), None);
        }

        #[test]
        fn field_and_direction() {
            assert_eq!(SortOrder::UpdatedAsc.field(), SortField::Updated);
            assert_eq!(SortOrder::UpdatedAsc.direction(), "asc");
            assert_eq!(SortOrder::CreatedDesc.field(), SortField::Created);
            assert_eq!(SortOrder::CreatedDesc.direction(), "desc");
        }
    }

    mod labels {
        use super::*;

        #[test]
        fn single_string_is_one_label() {
            let labels = Labels::from("bug,urgent");
            assert_eq!(labels.into_vec(), vec!["bug,urgent".to_string()]);
        }

        #[test]
        fn joined() {
            assert_eq!(Labels::from(["bug", "ui"]).joined(), "bug,ui");
            assert_eq!(Labels::new().joined(), "");
        }

        #[test]
        fn all_present_in() {
            let have = vec!["bug".to_string(), "ui".to_string()];
            assert!(Labels::from("bug").all_present_in(&have));
            assert!(!Labels::from(["bug", "docs"]).all_present_in(&have));
            assert!(Labels::new().all_present_in(&have));
        }
    }

    #[test]
    fn text_matching_is_case_insensitive() {
        assert!(text_matches("LOGIN", "Fix login page", None));
        assert!(text_matches("oauth", "Fix", Some("Uses OAuth flow")));
        assert!(!text_matches("oauth", "Fix", None));
    }
}
