//! forge::gitlab::query
//!
//! Pure translation of the generic filter vocabulary into GitLab v4 query
//! parameters, plus merge request planning.
//!
//! GitLab list endpoints return every state when `state` is absent, so
//! [`StateFilter::All`] simply omits it. The global `/issues` listing is
//! the exception: it defaults to `opened` unless `All` is asked for.

use crate::forge::branch::BranchRef;
use crate::forge::filters::{
    IssueFilters, Labels, MergeRequestFilters, ProjectFilters, SortField, SortOrder, StateFilter,
    Visibility,
};

pub(crate) type Params = Vec<(&'static str, String)>;

fn state_param(state: StateFilter) -> Option<&'static str> {
    match state {
        StateFilter::Opened => Some("opened"),
        StateFilter::Closed => Some("closed"),
        StateFilter::Merged => Some("merged"),
        StateFilter::All => None,
    }
}

fn push_sort(params: &mut Params, sort: Option<SortOrder>) {
    if let Some(sort) = sort {
        let order_by = match sort.field() {
            SortField::Created => "created_at",
            SortField::Updated => "updated_at",
        };
        params.push(("order_by", order_by.to_string()));
        params.push(("sort", sort.direction().to_string()));
    }
}

fn push_state(params: &mut Params, state: Option<StateFilter>) {
    if let Some(value) = state.and_then(state_param) {
        params.push(("state", value.to_string()));
    }
}

/// Parameters shared by issue and merge request listings, minus state and
/// assignee.
fn push_common(
    params: &mut Params,
    author: &Option<String>,
    labels: &Labels,
    milestone: &Option<String>,
    search: &Option<String>,
    sort: Option<SortOrder>,
) {
    if let Some(author) = author {
        params.push(("author_username", author.clone()));
    }
    if !labels.is_empty() {
        params.push(("labels", labels.joined()));
    }
    if let Some(milestone) = milestone {
        params.push(("milestone", milestone.clone()));
    }
    if let Some(search) = search {
        params.push(("search", search.clone()));
    }
    push_sort(params, sort);
}

/// Parameters for `GET /projects/:id/issues`.
pub(crate) fn issue_list_params(filters: &IssueFilters) -> Params {
    let mut params = Params::new();
    push_state(&mut params, filters.state);
    if let Some(assignee) = &filters.assignee {
        params.push(("assignee_username", assignee.clone()));
    }
    push_common(
        &mut params,
        &filters.author,
        &filters.labels,
        &filters.milestone,
        &filters.search,
        filters.sort,
    );
    params
}

/// Parameters for `GET /projects/:id/merge_requests`.
pub(crate) fn merge_request_list_params(filters: &MergeRequestFilters) -> Params {
    let mut params = Params::new();
    push_state(&mut params, filters.state);
    if let Some(assignee) = &filters.assignee {
        params.push(("assignee_username", assignee.clone()));
    }
    if let Some(source) = &filters.source_branch {
        params.push(("source_branch", source.clone()));
    }
    if let Some(target) = &filters.target_branch {
        params.push(("target_branch", target.clone()));
    }
    push_common(
        &mut params,
        &filters.author,
        &filters.labels,
        &filters.milestone,
        &filters.search,
        filters.sort,
    );
    params
}

/// Parameters for `GET /projects`.
pub(crate) fn project_list_params(filters: &ProjectFilters) -> Params {
    let mut params = Params::new();
    if filters.owned {
        params.push(("owned", "true".to_string()));
    }
    if filters.starred {
        params.push(("starred", "true".to_string()));
    }
    if filters.membership {
        params.push(("membership", "true".to_string()));
    }
    if let Some(archived) = filters.archived {
        params.push(("archived", archived.to_string()));
    }
    if let Some(visibility) = filters.visibility {
        let value = match visibility {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        };
        params.push(("visibility", value.to_string()));
    }
    if let Some(search) = &filters.search {
        params.push(("search", search.clone()));
    }
    push_sort(&mut params, filters.sort);
    params
}

/// How the assignee filter of a global issue listing is expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AssigneeScope {
    /// No assignee filter
    Any,
    /// The current user: `scope=assigned_to_me`, no user lookup
    Me,
    /// Someone else: needs a Users API lookup for `assignee_id`
    User(String),
}

/// Decide how to filter on assignee; `me` is the configured username or
/// the authenticated login.
pub(crate) fn assignee_scope(filters: &IssueFilters, me: &str) -> AssigneeScope {
    match &filters.assignee {
        None => AssigneeScope::Any,
        Some(assignee) if assignee == me => AssigneeScope::Me,
        Some(assignee) => AssigneeScope::User(assignee.clone()),
    }
}

/// Parameters for `GET /issues`.
///
/// `assignee_id` is the resolved id for [`AssigneeScope::User`]; when the
/// lookup failed it is `None` and the caller filters by username instead.
pub(crate) fn global_issue_params(
    filters: &IssueFilters,
    scope: &AssigneeScope,
    assignee_id: Option<u64>,
) -> Params {
    let mut params = Params::new();
    let scope_value = match scope {
        AssigneeScope::Me => "assigned_to_me",
        AssigneeScope::Any | AssigneeScope::User(_) => "all",
    };
    params.push(("scope", scope_value.to_string()));

    match filters.state {
        None => params.push(("state", "opened".to_string())),
        Some(state) => push_state(&mut params, Some(state)),
    }
    if let Some(id) = assignee_id {
        params.push(("assignee_id", id.to_string()));
    }
    push_common(
        &mut params,
        &filters.author,
        &filters.labels,
        &filters.milestone,
        &filters.search,
        filters.sort,
    );
    params
}

/// Where and how a merge request is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergeRequestPlan {
    /// Project the merge request is created on (the source project)
    pub project: String,
    /// Project merged into, when it differs from `project`
    pub target_project: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
}

impl MergeRequestPlan {
    /// Project holding the target branch.
    pub fn target_location(&self) -> &str {
        self.target_project.as_deref().unwrap_or(&self.project)
    }
}

/// Resolve source and target references against `project_id`.
///
/// The merge request lives on the source project. A qualified source moves
/// it there; a qualified target or an explicit `target_project_id` makes it
/// cross-project.
pub(crate) fn plan_merge_request(
    project_id: &str,
    source: &BranchRef,
    target: &BranchRef,
    target_project_id: Option<&str>,
) -> Result<MergeRequestPlan, String> {
    if source.is_cross_repo && target.is_cross_repo {
        return Err(format!(
            "Cannot open a merge request from '{}' into '{}': only one side may name another project",
            source, target
        ));
    }

    let project = source
        .owner
        .clone()
        .unwrap_or_else(|| project_id.to_string());
    let target_project = target_project_id
        .map(str::to_string)
        .or_else(|| target.owner.clone())
        .or_else(|| source.is_cross_repo.then(|| project_id.to_string()))
        .filter(|t| *t != project);

    Ok(MergeRequestPlan {
        project,
        target_project,
        source_branch: source.branch.clone(),
        target_branch: target.branch.clone(),
    })
}

/// Numeric project, user or namespace id.
pub(crate) fn numeric_id(id: &str) -> Option<u64> {
    id.parse().ok()
}
