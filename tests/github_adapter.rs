//! Integration tests for the GitHub adapter.
//!
//! Each test drives a real `GitHubAdapter` against a `wiremock` server
//! standing in for `api.github.com`.

use crossforge::forge::github::GitHubAdapter;
use crossforge::forge::{
    DiffOptions, ForgeError, IssueFilters, Labels, NewIssue, NewMergeRequest, PlatformAdapter,
    StateFilter,
};
use crossforge::core::types::{FileStatus, ResourceState};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Fixtures
// =============================================================================

async fn server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "octo",
            "id": 1,
            "name": "Octo Cat"
        })))
        .mount(&server)
        .await;
    server
}

fn adapter(server: &MockServer) -> GitHubAdapter {
    GitHubAdapter::new("https://github.com", Some("ghp_test".to_string()), None)
        .with_api_base(server.uri())
}

fn issue_json(number: u64, title: &str) -> Value {
    json!({
        "number": number,
        "title": title,
        "body": "Steps to reproduce",
        "state": "open",
        "html_url": format!("https://github.com/octo/hello/issues/{}", number),
        "user": { "login": "octo", "id": 1 },
        "labels": [{ "name": "bug" }],
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-02T10:00:00Z"
    })
}

fn pull_json(number: u64, head: &str, base: &str) -> Value {
    json!({
        "number": number,
        "title": "Add feature",
        "body": null,
        "state": "open",
        "html_url": format!("https://github.com/octo/hello/pull/{}", number),
        "user": { "login": "forkuser", "id": 2 },
        "draft": false,
        "head": { "ref": head, "sha": "aaaaaaaaaaaa" },
        "base": { "ref": base, "sha": "bbbbbbbbbbbb" },
        "additions": 5,
        "deletions": 1,
        "changed_files": 2
    })
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" }))
}

// =============================================================================
// Authentication
// =============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octo" })))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server).authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let err = adapter(&server).authenticate().await.unwrap_err();
        assert!(matches!(err, ForgeError::Authentication(ref m) if m.contains("Bad credentials")));
        assert!(!adapter(&server).test_connection().await);
    }

    #[tokio::test]
    async fn authenticates_once_across_concurrent_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octo" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/missing"))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let (a, b, c) = tokio::join!(
            adapter.get_project("octo/missing"),
            adapter.get_project("octo/missing"),
            adapter.get_project("octo/missing"),
        );
        assert!(a.unwrap().is_none());
        assert!(b.unwrap().is_none());
        assert!(c.unwrap().is_none());
    }
}

// =============================================================================
// Projects
// =============================================================================

mod projects {
    use super::*;

    #[tokio::test]
    async fn get_missing_project_is_none() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/missing"))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let project = adapter(&server).get_project("octo/missing").await.unwrap();
        assert!(project.is_none());
    }

    #[tokio::test]
    async fn delete_missing_project_is_not_found() {
        let server = server().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/missing"))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let err = adapter(&server)
            .delete_project("octo/missing")
            .await
            .unwrap_err();
        match err {
            ForgeError::ResourceNotFound {
                resource_type,
                resource_id,
                ..
            } => {
                assert_eq!(resource_type, "repository");
                assert_eq!(resource_id, "octo/missing");
            }
            other => panic!("expected ResourceNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_error_is_platform_error() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
            .mount(&server)
            .await;

        let err = adapter(&server).get_project("octo/hello").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn fork_parent_reported() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/forkuser/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "forkuser/hello",
                "name": "hello",
                "owner": { "login": "forkuser" },
                "html_url": "https://github.com/forkuser/hello",
                "fork": true,
                "parent": { "full_name": "octo/hello" }
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        assert!(adapter.is_fork("forkuser/hello").await.unwrap());
        assert_eq!(
            adapter.get_fork_parent("forkuser/hello").await.unwrap(),
            Some("octo/hello".to_string())
        );
    }
}

// =============================================================================
// Issues
// =============================================================================

mod issues {
    use super::*;

    #[tokio::test]
    async fn list_skips_pull_requests() {
        let server = server().await;
        let mut pr = issue_json(2, "Actually a PR");
        pr["pull_request"] = json!({ "url": "https://api.github.com/repos/octo/hello/pulls/2" });
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues"))
            .and(query_param("state", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                issue_json(1, "Crash on start"),
                pr
            ])))
            .mount(&server)
            .await;

        let filters = IssueFilters {
            state: Some(StateFilter::Opened),
            ..Default::default()
        };
        let issues = adapter(&server)
            .list_issues("octo/hello", &filters)
            .await
            .unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "1");
        assert_eq!(issues[0].project_id, "octo/hello");
    }

    #[tokio::test]
    async fn global_search_uses_me_qualifier() {
        let server = server().await;
        let mut found = issue_json(9, "Crash on start");
        found["repository_url"] = json!("https://api.github.com/repos/octo/other");
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param(
                "q",
                "state:open assignee:@me label:\"bug\" type:issue",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "items": [found]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filters = IssueFilters {
            assignee: Some("octo".to_string()),
            labels: Labels::from("bug"),
            ..Default::default()
        };
        let issues = adapter(&server).list_all_issues(&filters).await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].project_id, "octo/other");
    }

    #[tokio::test]
    async fn get_attaches_comments() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(7, "Crash")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 100,
                    "user": { "login": "reviewer" },
                    "body": "Reproduced",
                    "created_at": "2024-03-03T10:00:00Z"
                }
            ])))
            .mount(&server)
            .await;

        let issue = adapter(&server)
            .get_issue("octo/hello", "7")
            .await
            .unwrap()
            .unwrap();
        let comments = issue.comments().unwrap();

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author.as_deref(), Some("reviewer"));
        assert_eq!(comments[0].body, "Reproduced");
    }

    #[tokio::test]
    async fn comment_failure_still_returns_issue() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(7, "Crash")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/7/comments"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let issue = adapter(&server)
            .get_issue("octo/hello", "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(issue.title, "Crash");
        assert!(issue.comments().is_none());
    }

    #[tokio::test]
    async fn created_issue_round_trips() {
        let server = server().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/issues"))
            .and(body_partial_json(json!({
                "title": "Crash on start",
                "labels": ["bug"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(12, "Crash on start")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(12, "Crash on start")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/issues/12/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let created = adapter
            .create_issue(
                "octo/hello",
                NewIssue {
                    title: "Crash on start".to_string(),
                    labels: Labels::from("bug"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let fetched = adapter
            .get_issue("octo/hello", &created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.state, Some(ResourceState::Opened));
        assert_eq!(fetched.platform, "github");
    }
}

// =============================================================================
// Pull requests
// =============================================================================

mod pull_requests {
    use super::*;

    fn branch_json(name: &str) -> Value {
        json!({ "name": name, "commit": { "sha": "cccccccccccc" }, "protected": false })
    }

    #[tokio::test]
    async fn cross_repo_pull_request_uses_qualified_head() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/forkuser/hello/branches/feature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(branch_json("feature")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(branch_json("main")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/pulls"))
            .and(body_partial_json(json!({
                "head": "forkuser:feature",
                "base": "main",
                "title": "Add feature"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(
                5, "feature", "main",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let mr = adapter(&server)
            .create_merge_request(
                "octo/hello",
                NewMergeRequest {
                    source_branch: "forkuser:feature".to_string(),
                    target_branch: "main".to_string(),
                    title: "Add feature".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(mr.id, "5");
        assert_eq!(mr.project_id, "octo/hello");
        assert_eq!(mr.source_branch.as_deref(), Some("feature"));
        assert_eq!(mr.target_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn missing_source_branch_fails_before_create() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/ghost"))
            .respond_with(not_found())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(1, "ghost", "main")))
            .expect(0)
            .mount(&server)
            .await;

        let err = adapter(&server)
            .create_merge_request(
                "octo/hello",
                NewMergeRequest {
                    source_branch: "ghost".to_string(),
                    target_branch: "main".to_string(),
                    title: "Nothing".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Platform { .. }));
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn both_sides_qualified_is_rejected() {
        let server = server().await;
        let err = adapter(&server)
            .create_merge_request(
                "octo/hello",
                NewMergeRequest {
                    source_branch: "a:feature".to_string(),
                    target_branch: "b:main".to_string(),
                    title: "Nope".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Platform { .. }));
    }

    #[tokio::test]
    async fn unverifiable_branches_do_not_block_creation() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/feature"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({ "message": "Resource not accessible by integration" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/main"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/pulls"))
            .and(body_partial_json(json!({ "head": "feature", "base": "main" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(
                8, "feature", "main",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let mr = adapter(&server)
            .create_merge_request(
                "octo/hello",
                NewMergeRequest {
                    source_branch: "feature".to_string(),
                    target_branch: "main".to_string(),
                    title: "Add feature".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(mr.id, "8");
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/feature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(branch_json("feature")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/branches/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(branch_json("main")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(
                9, "feature", "main",
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/pulls/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pull_json(
                9, "feature", "main",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let created = adapter
            .create_merge_request(
                "octo/hello",
                NewMergeRequest {
                    source_branch: "feature".to_string(),
                    target_branch: "main".to_string(),
                    title: "Add feature".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let fetched = adapter
            .get_merge_request("octo/hello", &created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.state, created.state);
        assert_eq!(fetched.state, Some(ResourceState::Opened));
        assert_eq!(fetched.project_id, "octo/hello");
    }

    #[tokio::test]
    async fn diff_excludes_binary_content() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/pulls/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pull_json(3, "feature", "main")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/pulls/3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "filename": "src/lib.rs",
                    "status": "modified",
                    "additions": 5,
                    "deletions": 1,
                    "patch": "@@ -1 +1,5 @@\n-old\n+new"
                },
                {
                    "filename": "assets/logo.png",
                    "status": "added",
                    "additions": 0,
                    "deletions": 0
                }
            ])))
            .mount(&server)
            .await;

        let diff = adapter(&server)
            .get_merge_request_diff("octo/hello", "3", DiffOptions::default())
            .await
            .unwrap();

        assert_eq!(diff.mr_id, "3");
        assert_eq!(diff.total_changes.additions, 5);
        assert_eq!(diff.total_changes.files_changed, 2);
        assert!(!diff.truncated);

        let text = &diff.files[0];
        assert!(!text.binary);
        assert!(text.diff.is_some());

        let image = &diff.files[1];
        assert_eq!(image.status, FileStatus::Added);
        assert!(image.binary);
        assert!(image.diff.is_none());
    }

    #[tokio::test]
    async fn diff_of_missing_pull_request_is_not_found() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/pulls/404"))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let err = adapter(&server)
            .get_merge_request_diff("octo/hello", "404", DiffOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::ResourceNotFound { .. }));
    }
}
