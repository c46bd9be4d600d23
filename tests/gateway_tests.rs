//! Gateway behaviour against a mocked GitHub API: retries, absent resources,
//! permission scopes and cancellation.

mod common;

use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{content_json, label_path, pr_json, repo_path, user_json, GitHubApiMock};
use smyklot::github::{ForgeError, MergeMethod, ReactionKind, ReactionTarget};
use smyklot::ErrorKind;

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls/7")))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"message": "Service Unavailable"})),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls/7")))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_json(7, "dev", Some(true), "clean", &[])))
        .expect(1)
        .mount(&mock.server)
        .await;

    let sha = mock
        .client()
        .get_pr_head_sha(7, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sha, "sha7");
}

#[tokio::test]
async fn retries_stop_after_three_attempts() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls/7")))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"message": "Bad Gateway"})))
        .expect(3)
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .get_pr_head_sha(7, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForgeTransient);
    assert_eq!(err.remote_message(), Some("Bad Gateway"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("POST"))
        .and(path(repo_path("/pulls/7/reviews")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "Can not approve your own pull request"})),
        )
        .expect(1)
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .approve_pr(7, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForgePermanent);
}

#[tokio::test]
async fn comments_are_posted_once_even_on_server_error() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("POST"))
        .and(path(repo_path("/issues/7/comments")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "Server Error"})))
        .expect(1)
        .mount(&mock.server)
        .await;

    let result = mock
        .client()
        .post_comment(7, "hello", &CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_comment_is_rejected_without_a_request() {
    let mock = GitHubApiMock::new().await;
    let err = mock
        .client()
        .post_comment(7, "   ", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::InvalidInput(_)));
    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn missing_codeowners_is_none() {
    let mock = GitHubApiMock::new().await;
    let content = mock
        .client()
        .get_codeowners(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(content, None);
}

#[tokio::test]
async fn codeowners_content_is_decoded() {
    let mock = GitHubApiMock::new().await;
    mock.mock_codeowners("* @admin1 @acme/maintainers\n").await;

    let content = mock
        .client()
        .get_codeowners(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(content.as_deref(), Some("* @admin1 @acme/maintainers\n"));
}

#[tokio::test]
async fn wrapped_base64_is_accepted() {
    let mock = GitHubApiMock::new().await;
    // "* @admin1\n" split across lines the way the contents API wraps it
    Mock::given(method("GET"))
        .and(path(repo_path("/contents/.github/CODEOWNERS")))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json("KiBAYWRt\naW4xCg==\n", 10)))
        .mount(&mock.server)
        .await;

    let content = mock
        .client()
        .get_codeowners(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(content.as_deref(), Some("* @admin1\n"));
}

#[tokio::test]
async fn oversized_codeowners_is_refused() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/contents/.github/CODEOWNERS")))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json("", 1024 * 1024)))
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .get_codeowners(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::PayloadTooLarge { size: 1048576, .. }));
}

#[tokio::test]
async fn team_membership_reflects_state() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/teams/maintainers/memberships/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "active", "role": "member"})))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/teams/maintainers/memberships/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "pending", "role": "member"})))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let cancel = CancellationToken::new();
    assert!(client.is_team_member("acme", "maintainers", "alice", &cancel).await.unwrap());
    assert!(!client.is_team_member("acme", "maintainers", "bob", &cancel).await.unwrap());
    // Unmocked: 404, not a member
    assert!(!client.is_team_member("acme", "maintainers", "carol", &cancel).await.unwrap());
}

#[tokio::test]
async fn team_lookup_without_scope_is_an_error() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/teams/maintainers/memberships/alice"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Resource not accessible by integration"})))
        .expect(1)
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .is_team_member("acme", "maintainers", "alice", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::InsufficientScope { .. }));
    assert!(err.to_string().contains("read:org"));
}

#[tokio::test]
async fn write_permission_comes_from_collaborator_role() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/collaborators/maint/permission")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"permission": "write"})))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(repo_path("/collaborators/reader/permission")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"permission": "read"})))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let cancel = CancellationToken::new();
    assert!(client.has_write_permission("maint", &cancel).await.unwrap());
    assert!(!client.has_write_permission("reader", &cancel).await.unwrap());
    assert!(!client.has_write_permission("stranger", &cancel).await.unwrap());
}

#[tokio::test]
async fn unprotected_branch_has_no_required_checks() {
    let mock = GitHubApiMock::new().await;
    let required = mock
        .client()
        .get_required_checks("main", &CancellationToken::new())
        .await
        .unwrap();
    assert!(required.is_empty());
}

#[tokio::test]
async fn required_checks_merge_contexts_and_checks() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/branches/main/protection/required_status_checks")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "strict": true,
            "contexts": ["ci/build"],
            "checks": [{"context": "ci/build", "app_id": 1}, {"context": "ci/lint", "app_id": 1}],
        })))
        .mount(&mock.server)
        .await;

    let required = mock
        .client()
        .get_required_checks("main", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(required, vec!["ci/build", "ci/lint"]);
}

#[tokio::test]
async fn removing_an_absent_label_succeeds() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("DELETE"))
        .and(label_path(7, "smyklot:pending-ci"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Label does not exist"})))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.client()
        .remove_label(7, "smyklot:pending-ci", &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn open_prs_are_read_across_pages() {
    let mock = GitHubApiMock::new().await;
    let next = format!("{}{}?state=open&per_page=100&page=2", mock.base_url, repo_path("/pulls"));
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pr_json(12, "dev", None, "unknown", &[])])))
        .with_priority(1)
        .expect(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\", <{next}>; rel=\"last\"").as_str())
                .set_body_json(json!([pr_json(11, "dev", None, "unknown", &[])])),
        )
        .expect(1)
        .mount(&mock.server)
        .await;

    let prs = mock
        .client()
        .list_open_prs(&CancellationToken::new())
        .await
        .unwrap();
    let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();
    assert_eq!(numbers, vec![11, 12]);
}

#[tokio::test]
async fn reactions_are_read_across_pages() {
    let mock = GitHubApiMock::new().await;
    let route = repo_path("/issues/comments/5/reactions");
    let next = format!("{}{route}?per_page=100&page=2", mock.base_url);
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "content": "rocket", "user": user_json("bob")}
        ])))
        .with_priority(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(json!([{"id": 1, "content": "+1", "user": user_json("alice")}])),
        )
        .mount(&mock.server)
        .await;

    let reactions = mock
        .client()
        .list_reactions(ReactionTarget::Comment(5), &CancellationToken::new())
        .await
        .unwrap();
    let kinds: Vec<(ReactionKind, &str)> = reactions.iter().map(|r| (r.kind, r.user.as_str())).collect();
    assert_eq!(kinds, vec![(ReactionKind::ThumbsUp, "alice"), (ReactionKind::Rocket, "bob")]);
}

#[tokio::test]
async fn rejected_merge_method_falls_back() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("PUT"))
        .and(path(repo_path("/pulls/7/merge")))
        .and(body_partial_json(json!({"merge_method": "merge"})))
        .respond_with(
            ResponseTemplate::new(405)
                .set_body_json(json!({"message": "Merge commits are not allowed on this repository."})),
        )
        .expect(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("PUT"))
        .and(path(repo_path("/pulls/7/merge")))
        .and(body_partial_json(json!({"merge_method": "squash"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"merged": true, "sha": "abc"})))
        .expect(1)
        .mount(&mock.server)
        .await;

    let used = mock
        .client()
        .merge_with_fallback(7, MergeMethod::Merge, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(used, MergeMethod::Squash);
}

#[tokio::test]
async fn graphql_errors_fail_auto_merge() {
    let mock = GitHubApiMock::new().await;
    mock.mock_pr(pr_json(7, "dev", Some(false), "blocked", &[])).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Auto merge is not allowed for this repository"}],
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .enable_auto_merge(7, MergeMethod::Squash, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::GraphQl { .. }));
    assert_eq!(
        err.remote_message(),
        Some("Auto merge is not allowed for this repository")
    );
}

#[tokio::test]
async fn cancellation_aborts_a_slow_request() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path(repo_path("/pulls/7")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(pr_json(7, "dev", Some(true), "clean", &[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client.get_pr_head_sha(7, &cancel).await.unwrap_err();
    assert!(matches!(err, ForgeError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}
