use octocrab::models::pulls::{PullRequest, ReviewState};
use octocrab::models::IssueState;
use octocrab::params;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::GitHubClient;
use super::errors::ForgeError;
use super::types::{MergeMethod, MergeableState, PrState, PrView, Review};

const AUTO_MERGE_MUTATION: &str = "mutation($pullRequestId: ID!, $mergeMethod: PullRequestMergeMethod!) { enablePullRequestAutoMerge(input: {pullRequestId: $pullRequestId, mergeMethod: $mergeMethod}) { clientMutationId } }";

fn into_view(pr: PullRequest, approvers: Vec<String>) -> PrView {
    let state = if pr.merged.unwrap_or(false) || pr.merged_at.is_some() {
        PrState::Merged
    } else if matches!(pr.state, Some(IssueState::Closed)) {
        PrState::Closed
    } else {
        PrState::Open
    };

    PrView {
        number: pr.number,
        state,
        mergeable: pr.mergeable.unwrap_or(false),
        mergeable_state: pr
            .mergeable_state
            .map(MergeableState::from)
            .unwrap_or(MergeableState::Unknown),
        author: pr.user.map(|u| u.login).unwrap_or_default(),
        approvers,
        base_branch: pr.base.ref_field,
        head_sha: pr.head.sha,
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| l.name)
            .collect(),
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
    }
}

impl GitHubClient {
    async fn get_pull(
        &self,
        operation: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, ForgeError> {
        let route = self.repo_path(&format!("/pulls/{number}"));
        self.with_retry(operation, "GET", &route, cancel, || async move {
            self.octocrab()
                .pulls(self.owner(), self.repo())
                .get(number)
                .await
        })
        .await
    }

    /// Full PR view, including the deduplicated list of approving reviewers.
    pub async fn get_pr_info(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<PrView, ForgeError> {
        let pr = self.get_pull("get PR", number, cancel).await?;

        let mut approvers: Vec<String> = Vec::new();
        for review in self.list_reviews(number, cancel).await? {
            if review.is_approval() && !approvers.contains(&review.author) {
                approvers.push(review.author);
            }
        }

        Ok(into_view(pr, approvers))
    }

    pub async fn get_pr_head_sha(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<String, ForgeError> {
        let pr = self.get_pull("get PR head", number, cancel).await?;
        let sha = pr.head.sha;
        if sha.is_empty() {
            return Err(ForgeError::Decode {
                operation: "get PR head".into(),
                path: self.repo_path(&format!("/pulls/{number}")),
                detail: "pull request has no head sha".into(),
            });
        }
        Ok(sha)
    }

    /// Every open PR, across all pages. Approvers are not populated.
    pub async fn list_open_prs(&self, cancel: &CancellationToken) -> Result<Vec<PrView>, ForgeError> {
        let route = self.repo_path("/pulls");
        let pulls = self
            .with_retry("list PRs", "GET", &route, cancel, || async move {
                let page = self
                    .octocrab()
                    .pulls(self.owner(), self.repo())
                    .list()
                    .state(params::State::Open)
                    .per_page(100)
                    .send()
                    .await?;
                self.octocrab().all_pages(page).await
            })
            .await?;

        Ok(pulls
            .into_iter()
            .map(|pr| into_view(pr, Vec::new()))
            .filter(|pr| pr.state == PrState::Open)
            .collect())
    }

    pub async fn list_reviews(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Review>, ForgeError> {
        let route = self.repo_path(&format!("/pulls/{number}/reviews"));
        let reviews = self
            .with_retry("list reviews", "GET", &route, cancel, || async move {
                let page = self
                    .octocrab()
                    .pulls(self.owner(), self.repo())
                    .list_reviews(number)
                    .per_page(100)
                    .send()
                    .await?;
                self.octocrab().all_pages(page).await
            })
            .await?;

        Ok(reviews
            .into_iter()
            .map(|r| Review {
                id: r.id.0,
                author: r.user.map(|u| u.login).unwrap_or_default(),
                approved: matches!(r.state, Some(ReviewState::Approved)),
            })
            .collect())
    }

    pub async fn approve_pr(&self, number: u64, cancel: &CancellationToken) -> Result<(), ForgeError> {
        let route = self.repo_path(&format!("/pulls/{number}/reviews"));
        let body = json!({ "event": "APPROVE" });
        let (route_ref, body_ref) = (&route, &body);
        let _: serde_json::Value = self
            .with_retry("approve PR", "POST", &route, cancel, || async move {
                self.octocrab().post(route_ref, Some(body_ref)).await
            })
            .await?;
        info!(pr = number, "Approved pull request");
        Ok(())
    }

    /// Dismiss every approving review left by `user`. Returns how many were dismissed.
    pub async fn dismiss_reviews_by(
        &self,
        number: u64,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, ForgeError> {
        let body = json!({ "message": "Review dismissed" });
        let body_ref = &body;
        let mut dismissed = 0;

        for review in self.list_reviews(number, cancel).await? {
            if !review.is_approval() || review.author != user {
                continue;
            }
            let route = self.repo_path(&format!("/pulls/{number}/reviews/{}/dismissals", review.id));
            let route_ref = &route;
            let _: serde_json::Value = self
                .with_retry("dismiss review", "PUT", &route, cancel, || async move {
                    self.octocrab().put(route_ref, Some(body_ref)).await
                })
                .await?;
            dismissed += 1;
        }

        info!(pr = number, user, dismissed, "Dismissed reviews");
        Ok(dismissed)
    }

    pub async fn merge_pr(
        &self,
        number: u64,
        method: MergeMethod,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let route = self.repo_path(&format!("/pulls/{number}/merge"));
        let merge = self
            .with_retry("merge PR", "PUT", &route, cancel, || async move {
                self.octocrab()
                    .pulls(self.owner(), self.repo())
                    .merge(number)
                    .method(method.to_octocrab())
                    .send()
                    .await
            })
            .await?;
        info!(pr = number, method = %method, sha = ?merge.sha, "Merged pull request");
        Ok(())
    }

    /// Merge, escalating merge → squash → rebase while the repository rejects the method.
    /// Returns the method that succeeded.
    pub async fn merge_with_fallback(
        &self,
        number: u64,
        method: MergeMethod,
        cancel: &CancellationToken,
    ) -> Result<MergeMethod, ForgeError> {
        let mut current = method;
        loop {
            match self.merge_pr(number, current, cancel).await {
                Ok(()) => return Ok(current),
                Err(err) if is_method_rejected(&err) => match current.fallback() {
                    Some(next) => {
                        warn!(pr = number, rejected = %current, next = %next, "Merge method not allowed, falling back");
                        current = next;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Hand the merge to the forge: it happens once requirements are met.
    pub async fn enable_auto_merge(
        &self,
        number: u64,
        method: MergeMethod,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let pr = self.get_pull("get PR node id", number, cancel).await?;

        let body = json!({
            "query": AUTO_MERGE_MUTATION,
            "variables": {
                "pullRequestId": pr.node_id.unwrap_or_default(),
                "mergeMethod": method.graphql_name(),
            },
        });
        let body_ref = &body;
        let response: serde_json::Value = self
            .once(
                "enable auto-merge",
                "POST",
                "/graphql",
                cancel,
                async move { self.octocrab().graphql(body_ref).await },
            )
            .await?;

        if let Some(message) = graphql_error(&response) {
            return Err(ForgeError::GraphQl {
                operation: "enable auto-merge".into(),
                message: message.to_string(),
            });
        }

        info!(pr = number, method = %method, "Enabled auto-merge");
        Ok(())
    }
}

/// First entry of a GraphQL `errors` array; the endpoint answers 200 even when the mutation fails.
fn graphql_error(response: &serde_json::Value) -> Option<&str> {
    response
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("message"))
        .and_then(|m| m.as_str())
}

/// The repository does not permit this merge method ("Merge commits are not allowed ...").
pub fn is_method_rejected(err: &ForgeError) -> bool {
    err.remote_message()
        .map(|m| m.contains("are not allowed"))
        .unwrap_or(false)
}
