//! Shared wiremock fixtures for the GitHub API.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use wiremock::matchers::{any, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smyklot::github::{ClientOptions, GitHubClient, RetryPolicy};

pub const OWNER: &str = "test-owner";
pub const REPO: &str = "test-repo";
pub const TOKEN: &str = "mock-token";
pub const BOT: &str = "smyklot[bot]";

/// GitHub API mock server for deterministic testing
pub struct GitHubApiMock {
    pub server: MockServer,
    pub base_url: String,
}

impl GitHubApiMock {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        // Unmatched routes answer like GitHub does, with a JSON message.
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
            )
            .with_priority(u8::MAX)
            .mount(&server)
            .await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Client pointed at the mock, with millisecond backoff and no effective rate limit.
    pub fn client(&self) -> Arc<GitHubClient> {
        Arc::new(
            GitHubClient::with_options(TOKEN, OWNER, REPO, self.options())
                .expect("client builds"),
        )
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(5),
            requests_per_second: 1000,
            burst: 1000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
            },
        }
    }

    pub async fn mock_codeowners(&self, content: &str) {
        let body = content_json(&STANDARD.encode(content), content.len());
        Mock::given(method("GET"))
            .and(path(repo_path("/contents/.github/CODEOWNERS")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_pr(&self, pr: Value) {
        let number = pr["number"].as_u64().unwrap_or_default();
        Mock::given(method("GET"))
            .and(path(repo_path(&format!("/pulls/{number}"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(pr))
            .mount(&self.server)
            .await;
    }

    /// `(reviewer, state)` pairs.
    pub async fn mock_reviews(&self, number: u64, reviews: &[(&str, &str)]) {
        let body: Vec<Value> = reviews
            .iter()
            .enumerate()
            .map(|(i, (user, state))| review_json(100 + i as u64, user, state))
            .collect();
        Mock::given(method("GET"))
            .and(path(repo_path(&format!("/pulls/{number}/reviews"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `(name, status, conclusion)` triples.
    pub async fn mock_check_runs(&self, sha: &str, runs: &[(&str, &str, Option<&str>)]) {
        let check_runs: Vec<Value> = runs
            .iter()
            .map(|(name, status, conclusion)| {
                json!({"name": name, "status": status, "conclusion": conclusion})
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(repo_path(&format!("/commits/{sha}/check-runs"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": check_runs.len(),
                "check_runs": check_runs,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_open_prs(&self, prs: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(repo_path("/pulls")))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(prs)))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_empty_list(&self, verb: &str, suffix: &str) {
        Mock::given(method(verb))
            .and(path(repo_path(suffix)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    /// Accept the bot's replies: comments and reactions on the PR and on `comment_id`.
    /// Reaction listings are empty.
    pub async fn mock_replies(&self, number: u64, comment_id: u64) {
        Mock::given(method("POST"))
            .and(path(repo_path(&format!("/issues/{number}/comments"))))
            .respond_with(ResponseTemplate::new(201).set_body_json(comment_json(900, BOT, "reply")))
            .mount(&self.server)
            .await;
        for suffix in [
            format!("/issues/comments/{comment_id}/reactions"),
            format!("/issues/{number}/reactions"),
        ] {
            Mock::given(method("POST"))
                .and(path(repo_path(&suffix)))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "id": 1,
                    "content": "eyes",
                    "user": {"login": BOT},
                })))
                .mount(&self.server)
                .await;
            self.mock_empty_list("GET", &suffix).await;
        }
    }

    /// Review creation, expected `times` times.
    pub async fn mock_approve(&self, number: u64, times: u64) {
        Mock::given(method("POST"))
            .and(path(repo_path(&format!("/pulls/{number}/reviews"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 555,
                "state": "APPROVED",
                "user": {"login": BOT},
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// `(METHOD, path, body)` of every request received, in order.
    pub async fn detailed_requests(&self) -> Vec<(String, String, String)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                (
                    r.method.to_string(),
                    percent_decode(r.url.path()),
                    String::from_utf8_lossy(&r.body).into_owned(),
                )
            })
            .collect()
    }

    /// Bodies of the comments posted on `number`, in order.
    pub async fn posted_comments(&self, number: u64) -> Vec<String> {
        let wanted = repo_path(&format!("/issues/{number}/comments"));
        self.detailed_requests()
            .await
            .into_iter()
            .filter(|(m, p, _)| m == "POST" && *p == wanted)
            .filter_map(|(_, _, body)| {
                serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v["body"].as_str().map(str::to_string))
            })
            .collect()
    }

    /// Reaction contents added to `suffix` (a reactions route), in order.
    pub async fn added_reactions(&self, suffix: &str) -> Vec<String> {
        let wanted = repo_path(suffix);
        self.detailed_requests()
            .await
            .into_iter()
            .filter(|(m, p, _)| m == "POST" && *p == wanted)
            .filter_map(|(_, _, body)| {
                serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v["content"].as_str().map(str::to_string))
            })
            .collect()
    }

    /// Index of the first request matching `verb`, `suffix` and, when given, a body fragment.
    pub async fn index_of(&self, verb: &str, suffix: &str, body_fragment: Option<&str>) -> Option<usize> {
        let wanted = repo_path(suffix);
        self.detailed_requests()
            .await
            .iter()
            .position(|(m, p, body)| {
                m == verb && *p == wanted && body_fragment.map_or(true, |f| body.contains(f))
            })
    }

    /// `(METHOD, path)` of every request received, in order.
    pub async fn requests(&self) -> Vec<(String, String)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.method.to_string(), percent_decode(r.url.path())))
            .collect()
    }
}

pub fn repo_path(suffix: &str) -> String {
    format!("/repos/{OWNER}/{REPO}{suffix}")
}

/// Label route matcher that accepts the name raw or percent-encoded.
pub fn label_path(number: u64, label: &str) -> impl wiremock::Match {
    let name: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_string()
            } else {
                let hex = format!("{:02X}", c as u32);
                let hex_re: String = hex
                    .chars()
                    .map(|h| if h.is_ascii_alphabetic() { format!("[{}{}]", h, h.to_ascii_lowercase()) } else { h.to_string() })
                    .collect();
                format!("(?:{}|%{})", regex::escape(&c.to_string()), hex_re)
            }
        })
        .collect();
    path_regex(format!("^{}$", regex::escape(&repo_path(&format!("/issues/{number}/labels/"))) + &name))
}

fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&path[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `.github/CODEOWNERS` as the contents API returns it, `encoded` being the raw `content` field.
pub fn content_json(encoded: &str, size: usize) -> Value {
    let url = format!("https://api.github.com{}", repo_path("/contents/.github/CODEOWNERS"));
    json!({
        "type": "file",
        "name": "CODEOWNERS",
        "path": ".github/CODEOWNERS",
        "sha": "c0de",
        "encoding": "base64",
        "size": size,
        "content": encoded,
        "url": url,
        "_links": {"self": url},
    })
}

/// A user as the REST API embeds it.
pub fn user_json(login: &str) -> Value {
    let url = format!("https://api.github.com/users/{login}");
    json!({
        "login": login,
        "id": 1,
        "node_id": "U_1",
        "avatar_url": "https://avatars.githubusercontent.com/u/1",
        "gravatar_id": "",
        "url": url,
        "html_url": format!("https://github.com/{login}"),
        "followers_url": format!("{url}/followers"),
        "following_url": format!("{url}/following"),
        "gists_url": format!("{url}/gists"),
        "starred_url": format!("{url}/starred"),
        "subscriptions_url": format!("{url}/subscriptions"),
        "organizations_url": format!("{url}/orgs"),
        "repos_url": format!("{url}/repos"),
        "events_url": format!("{url}/events"),
        "received_events_url": format!("{url}/received_events"),
        "type": if login.ends_with("[bot]") { "Bot" } else { "User" },
        "site_admin": false,
    })
}

pub fn label_json(name: &str) -> Value {
    json!({
        "id": 1,
        "node_id": "LA_1",
        "url": format!("https://api.github.com{}", repo_path(&format!("/labels/{name}"))),
        "name": name,
        "color": "ededed",
        "default": false,
        "description": null,
    })
}

pub fn comment_json(id: u64, author: &str, body: &str) -> Value {
    json!({
        "id": id,
        "node_id": format!("IC_{id}"),
        "url": format!("https://api.github.com{}", repo_path(&format!("/issues/comments/{id}"))),
        "html_url": format!("https://github.com/{OWNER}/{REPO}/issues/1#issuecomment-{id}"),
        "body": body,
        "user": user_json(author),
        "author_association": "MEMBER",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
    })
}

pub fn review_json(id: u64, author: &str, state: &str) -> Value {
    json!({
        "id": id,
        "node_id": format!("PRR_{id}"),
        "html_url": format!("https://github.com/{OWNER}/{REPO}/pull/1#pullrequestreview-{id}"),
        "state": state,
        "user": user_json(author),
        "submitted_at": "2026-01-01T00:00:00Z",
    })
}

/// An open pull request as the REST API returns it.
pub fn pr_json(number: u64, author: &str, mergeable: Option<bool>, mergeable_state: &str, labels: &[&str]) -> Value {
    json!({
        "url": format!("https://api.github.com{}", repo_path(&format!("/pulls/{number}"))),
        "id": 1000 + number,
        "html_url": format!("https://github.com/{OWNER}/{REPO}/pull/{number}"),
        "number": number,
        "node_id": format!("PR_node{number}"),
        "state": "open",
        "locked": false,
        "maintainer_can_modify": false,
        "merged": false,
        "merged_at": null,
        "mergeable": mergeable,
        "mergeable_state": mergeable_state,
        "title": "Add widget",
        "body": "",
        "user": user_json(author),
        "base": {"ref": "main", "sha": "base000"},
        "head": {"ref": "feature", "sha": format!("sha{number}")},
        "labels": labels.iter().map(|l| label_json(l)).collect::<Vec<_>>(),
    })
}

pub fn merged_pr_json(number: u64, author: &str) -> Value {
    let mut pr = pr_json(number, author, None, "unknown", &[]);
    pr["state"] = json!("closed");
    pr["merged"] = json!(true);
    pr["merged_at"] = json!("2026-01-01T00:00:00Z");
    pr
}
