//! forge::github::query
//!
//! Pure translation of the generic filter vocabulary into GitHub REST and
//! Search API parameters, plus merge request planning.
//!
//! [`StateFilter::All`] never reaches the wire: list endpoints get no
//! `state` parameter and search queries get no `state:` qualifier.

use crate::core::types::{IssueResource, MergeRequestResource, ResourceState};
use crate::forge::branch::BranchRef;
use crate::forge::filters::{
    text_matches, IssueFilters, MergeRequestFilters, ProjectFilters, SortField, SortOrder,
    StateFilter, Visibility,
};

pub(crate) type Params = Vec<(&'static str, String)>;

fn list_state(state: StateFilter) -> Option<&'static str> {
    match state {
        StateFilter::Opened => Some("open"),
        StateFilter::Closed | StateFilter::Merged => Some("closed"),
        StateFilter::All => None,
    }
}

fn sort_field(sort: SortOrder) -> &'static str {
    match sort.field() {
        SortField::Created => "created",
        SortField::Updated => "updated",
    }
}

fn push_sort(params: &mut Params, sort: Option<SortOrder>, direction_key: &'static str) {
    if let Some(sort) = sort {
        params.push(("sort", sort_field(sort).to_string()));
        params.push((direction_key, sort.direction().to_string()));
    }
}

/// Parameters for `GET /repos/:owner/:repo/issues`.
pub(crate) fn issue_list_params(filters: &IssueFilters) -> Params {
    let mut params = Params::new();
    if let Some(state) = filters.state.and_then(list_state) {
        params.push(("state", state.to_string()));
    }
    if let Some(assignee) = &filters.assignee {
        params.push(("assignee", assignee.clone()));
    }
    if let Some(author) = &filters.author {
        params.push(("creator", author.clone()));
    }
    if !filters.labels.is_empty() {
        params.push(("labels", filters.labels.joined()));
    }
    if let Some(milestone) = &filters.milestone {
        params.push(("milestone", milestone.clone()));
    }
    push_sort(&mut params, filters.sort, "direction");
    params
}

/// Qualify a bare branch with `owner` for the `head` filter.
fn qualified_head(branch: &str, owner: &str) -> String {
    if branch.contains(':') {
        branch.to_string()
    } else {
        format!("{}:{}", owner, branch)
    }
}

/// Parameters for `GET /repos/:owner/:repo/pulls`.
///
/// `owner` qualifies a bare `source_branch`, as GitHub's `head` filter
/// requires `user:ref`.
pub(crate) fn pull_list_params(filters: &MergeRequestFilters, owner: &str) -> Params {
    let mut params = Params::new();
    if let Some(state) = filters.state.and_then(list_state) {
        params.push(("state", state.to_string()));
    }
    if let Some(source) = &filters.source_branch {
        params.push(("head", qualified_head(source, owner)));
    }
    if let Some(target) = &filters.target_branch {
        params.push(("base", target.clone()));
    }
    push_sort(&mut params, filters.sort, "direction");
    params
}

/// Filters GitHub's pull list endpoint cannot express.
pub(crate) fn pull_matches(filters: &MergeRequestFilters, pull: &MergeRequestResource) -> bool {
    if filters.state == Some(StateFilter::Merged) && pull.state != Some(ResourceState::Merged) {
        return false;
    }
    if let Some(assignee) = &filters.assignee {
        if pull.assignee.as_deref() != Some(assignee.as_str()) {
            return false;
        }
    }
    if let Some(author) = &filters.author {
        if pull.author.as_deref() != Some(author.as_str()) {
            return false;
        }
    }
    if !filters.labels.all_present_in(&pull.labels) {
        return false;
    }
    if let Some(milestone) = &filters.milestone {
        let title = pull
            .metadata
            .get("milestone")
            .and_then(|m| m.get("title"))
            .and_then(|t| t.as_str());
        if title != Some(milestone.as_str()) {
            return false;
        }
    }
    if let Some(search) = &filters.search {
        if !text_matches(search, &pull.title, pull.description.as_deref()) {
            return false;
        }
    }
    true
}

/// Filters GitHub's issue list endpoint cannot express.
pub(crate) fn issue_matches(filters: &IssueFilters, issue: &IssueResource) -> bool {
    match &filters.search {
        Some(search) => text_matches(search, &issue.title, issue.description.as_deref()),
        None => true,
    }
}

/// Search API query for `list_all_issues`.
///
/// `login` is the authenticated user; an assignee equal to it becomes
/// `assignee:@me`.
pub(crate) fn search_query(filters: &IssueFilters, login: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();

    match filters.state.unwrap_or(StateFilter::Opened) {
        StateFilter::All => {}
        StateFilter::Opened => parts.push("state:open".into()),
        StateFilter::Closed | StateFilter::Merged => parts.push("state:closed".into()),
    }

    if let Some(assignee) = &filters.assignee {
        if login == Some(assignee.as_str()) {
            parts.push("assignee:@me".into());
        } else {
            parts.push(format!("assignee:{}", assignee));
        }
    }

    for label in filters.labels.iter() {
        parts.push(format!("label:\"{}\"", label));
    }

    if let Some(author) = &filters.author {
        parts.push(format!("author:{}", author));
    }

    if let Some(milestone) = &filters.milestone {
        parts.push(format!("milestone:\"{}\"", milestone));
    }

    if let Some(search) = &filters.search {
        parts.push(search.clone());
    }

    parts.push("type:issue".into());
    parts.join(" ")
}

/// Parameters for `GET /search/issues`.
pub(crate) fn search_params(filters: &IssueFilters, login: Option<&str>) -> Params {
    let mut params = vec![("q", search_query(filters, login))];
    push_sort(&mut params, filters.sort, "order");
    params
}

/// Which repository listing backs `list_projects`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProjectListing {
    /// `GET /user/repos`
    UserRepos,
    /// `GET /user/starred`
    Starred,
}

pub(crate) fn project_listing(filters: &ProjectFilters) -> (ProjectListing, Params) {
    let mut params = Params::new();

    let listing = if filters.starred && !filters.owned {
        ProjectListing::Starred
    } else {
        // `type` cannot be combined with `visibility`, `affiliation` can
        if filters.owned {
            params.push(("affiliation", "owner".to_string()));
        } else if filters.membership {
            params.push(("affiliation", "collaborator,organization_member".to_string()));
        }
        if let Some(visibility) = filters.visibility {
            let value = match visibility {
                Visibility::Public => "public",
                Visibility::Private | Visibility::Internal => "private",
            };
            params.push(("visibility", value.to_string()));
        }
        ProjectListing::UserRepos
    };

    push_sort(&mut params, filters.sort, "direction");
    (listing, params)
}

/// Filters applied client-side to repository listings.
pub(crate) fn project_matches(
    filters: &ProjectFilters,
    name: &str,
    description: Option<&str>,
    archived: bool,
) -> bool {
    if let Some(want) = filters.archived {
        if archived != want {
            return false;
        }
    }
    match &filters.search {
        Some(search) => text_matches(search, name, description),
        None => true,
    }
}

/// Where and how a pull request is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PullPlan {
    /// Repository the pull request is opened on (`owner/name`)
    pub repo: String,
    /// Repository holding the head branch
    pub head_repo: String,
    /// `head` value: bare branch, or `owner:branch` across repositories
    pub head: String,
    /// Bare head branch name
    pub head_branch: String,
    pub base: String,
}

/// Resolve source and target references against `project_id`.
///
/// A qualified target moves the pull request to the same-named repository
/// of that owner. A qualified source, or any pull request opened on a
/// repository other than `project_id`, gets an `owner:branch` head.
pub(crate) fn plan_pull_request(
    project_id: &str,
    source: &BranchRef,
    target: &BranchRef,
    target_project_id: Option<&str>,
) -> Result<PullPlan, String> {
    if source.is_cross_repo && target.is_cross_repo {
        return Err(format!(
            "Cannot open a pull request from '{}' into '{}': only one side may name another repository",
            source, target
        ));
    }

    let (project_owner, repo_name) = split_repo(project_id)
        .ok_or_else(|| format!("Invalid repository '{}', expected owner/name", project_id))?;

    let repo = match (target_project_id, &target.owner) {
        (Some(explicit), _) => explicit.to_string(),
        (None, Some(owner)) => format!("{}/{}", owner, repo_name),
        (None, None) => project_id.to_string(),
    };

    let (head, head_repo) = match &source.owner {
        Some(owner) => (
            format!("{}:{}", owner, source.branch),
            format!("{}/{}", owner, repo_name),
        ),
        None if repo != project_id => (
            format!("{}:{}", project_owner, source.branch),
            project_id.to_string(),
        ),
        None => (source.branch.clone(), project_id.to_string()),
    };

    Ok(PullPlan {
        repo,
        head_repo,
        head,
        head_branch: source.branch.clone(),
        base: target.branch.clone(),
    })
}

/// Split `owner/name`.
pub(crate) fn split_repo(project_id: &str) -> Option<(&str, &str)> {
    let (owner, name) = project_id.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::filters::Labels;

    fn get<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    mod issue_params {
        use super::*;

        #[test]
        fn opened_maps_to_open() {
            let params = issue_list_params(&IssueFilters {
                state: Some(StateFilter::Opened),
                ..Default::default()
            });
            assert_eq!(get(&params, "state"), Some("open"));
        }

        #[test]
        fn no_state_omits_param() {
            let params = issue_list_params(&IssueFilters::default());
            assert!(get(&params, "state").is_none());
        }

        #[test]
        fn all_omits_state() {
            let params = issue_list_params(&IssueFilters {
                state: Some(StateFilter::All),
                ..Default::default()
            });
            assert!(get(&params, "state").is_none());
        }

        #[test]
        fn author_labels_and_sort() {
            let params = issue_list_params(&IssueFilters {
                author: Some("alice".into()),
                labels: Labels::from(["bug", "ui"]),
                sort: Some(SortOrder::UpdatedAsc),
                ..Default::default()
            });
            assert_eq!(get(&params, "creator"), Some("alice"));
            assert_eq!(get(&params, "labels"), Some("bug,ui"));
            assert_eq!(get(&params, "sort"), Some("updated"));
            assert_eq!(get(&params, "direction"), Some("asc"));
        }
    }

    mod pull_params {
        use super::*;

        #[test]
        fn merged_queries_closed() {
            let params = pull_list_params(
                &MergeRequestFilters {
                    state: Some(StateFilter::Merged),
                    ..Default::default()
                },
                "octo",
            );
            assert_eq!(get(&params, "state"), Some("closed"));
        }

        #[test]
        fn all_omits_state() {
            let params = pull_list_params(
                &MergeRequestFilters {
                    state: Some(StateFilter::All),
                    ..Default::default()
                },
                "octo",
            );
            assert!(params.iter().all(|(key, value)| *key != "state" && value != "all"));
        }

        #[test]
        fn head_is_qualified() {
            let params = pull_list_params(
                &MergeRequestFilters {
                    source_branch: Some("feature".into()),
                    target_branch: Some("main".into()),
                    ..Default::default()
                },
                "octo",
            );
            assert_eq!(get(&params, "head"), Some("octo:feature"));
            assert_eq!(get(&params, "base"), Some("main"));
        }

        #[test]
        fn qualified_head_passes_through() {
            let params = pull_list_params(
                &MergeRequestFilters {
                    source_branch: Some("fork:feature".into()),
                    ..Default::default()
                },
                "octo",
            );
            assert_eq!(get(&params, "head"), Some("fork:feature"));
        }
    }

    mod search {
        use super::*;

        #[test]
        fn defaults_to_open_issues() {
            assert_eq!(
                search_query(&IssueFilters::default(), None),
                "state:open type:issue"
            );
        }

        #[test]
        fn all_omits_state() {
            let q = search_query(
                &IssueFilters {
                    state: Some(StateFilter::All),
                    ..Default::default()
                },
                None,
            );
            assert_eq!(q, "type:issue");
        }

        #[test]
        fn self_assignee_uses_me() {
            let q = search_query(
                &IssueFilters {
                    assignee: Some("alice".into()),
                    ..Default::default()
                },
                Some("alice"),
            );
            assert!(q.contains("assignee:@me"));
        }

        #[test]
        fn full_query_order() {
            let q = search_query(
                &IssueFilters {
                    state: Some(StateFilter::Closed),
                    assignee: Some("bob".into()),
                    author: Some("carol".into()),
                    labels: Labels::from(["bug", "good first issue"]),
                    ..Default::default()
                },
                Some("alice"),
            );
            assert_eq!(
                q,
                "state:closed assignee:bob label:\"bug\" label:\"good first issue\" author:carol type:issue"
            );
        }

        #[test]
        fn search_sort_uses_order() {
            let params = search_params(
                &IssueFilters {
                    sort: Some(SortOrder::CreatedDesc),
                    ..Default::default()
                },
                None,
            );
            assert_eq!(get(&params, "sort"), Some("created"));
            assert_eq!(get(&params, "order"), Some("desc"));
            assert!(get(&params, "direction").is_none());
        }
    }

    mod projects {
        use super::*;

        #[test]
        fn owned_uses_owner_affiliation() {
            let (listing, params) = project_listing(&ProjectFilters {
                owned: true,
                ..Default::default()
            });
            assert_eq!(listing, ProjectListing::UserRepos);
            assert_eq!(get(&params, "affiliation"), Some("owner"));
        }

        #[test]
        fn starred_listing() {
            let (listing, _) = project_listing(&ProjectFilters {
                starred: true,
                ..Default::default()
            });
            assert_eq!(listing, ProjectListing::Starred);
        }

        #[test]
        fn client_side_filters() {
            let filters = ProjectFilters {
                archived: Some(false),
                search: Some("cli".into()),
                ..Default::default()
            };
            assert!(project_matches(&filters, "my-cli", None, false));
            assert!(!project_matches(&filters, "my-cli", None, true));
            assert!(!project_matches(&filters, "server", Some("backend"), false));
        }
    }

    mod plan {
        use super::*;

        #[test]
        fn same_repo() {
            let plan = plan_pull_request(
                "octo/hello",
                &BranchRef::local("feature"),
                &BranchRef::local("main"),
                None,
            )
            .unwrap();
            assert_eq!(plan.repo, "octo/hello");
            assert_eq!(plan.head, "feature");
            assert_eq!(plan.base, "main");
        }

        #[test]
        fn fork_source_into_upstream() {
            let plan = plan_pull_request(
                "octo/hello",
                &BranchRef::remote("forkuser", "feature"),
                &BranchRef::local("main"),
                None,
            )
            .unwrap();
            assert_eq!(plan.repo, "octo/hello");
            assert_eq!(plan.head, "forkuser:feature");
            assert_eq!(plan.head_repo, "forkuser/hello");
            assert_eq!(plan.base, "main");
        }

        #[test]
        fn qualified_target_moves_repo() {
            let plan = plan_pull_request(
                "forkuser/hello",
                &BranchRef::local("feature"),
                &BranchRef::remote("octo", "main"),
                None,
            )
            .unwrap();
            assert_eq!(plan.repo, "octo/hello");
            assert_eq!(plan.head, "forkuser:feature");
            assert_eq!(plan.head_repo, "forkuser/hello");
        }

        #[test]
        fn explicit_target_project() {
            let plan = plan_pull_request(
                "forkuser/hello",
                &BranchRef::local("feature"),
                &BranchRef::local("main"),
                Some("octo/hello-upstream"),
            )
            .unwrap();
            assert_eq!(plan.repo, "octo/hello-upstream");
            assert_eq!(plan.head, "forkuser:feature");
        }

        #[test]
        fn both_qualified_rejected() {
            let err = plan_pull_request(
                "octo/hello",
                &BranchRef::remote("a", "x"),
                &BranchRef::remote("b", "y"),
                None,
            )
            .unwrap_err();
            assert!(err.contains("only one side"));
        }

        #[test]
        fn invalid_project_id() {
            assert!(plan_pull_request(
                "hello",
                &BranchRef::local("a"),
                &BranchRef::local("b"),
                None
            )
            .is_err());
        }
    }

    #[test]
    fn split_repo_cases() {
        assert_eq!(split_repo("octo/hello"), Some(("octo", "hello")));
        assert_eq!(split_repo("octo"), None);
        assert_eq!(split_repo("/hello"), None);
        assert_eq!(split_repo("a/b/c"), None);
    }
}
