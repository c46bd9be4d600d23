use octocrab::Page;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::GitHubClient;
use super::errors::ForgeError;
use super::types::{Reaction, ReactionKind, ReactionTarget, UserPayload};

#[derive(Debug, Deserialize)]
struct ReactionPayload {
    id: u64,
    content: ReactionKind,
    #[serde(default)]
    user: Option<UserPayload>,
}

impl GitHubClient {
    pub async fn add_label(
        &self,
        number: u64,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let route = self.repo_path(&format!("/issues/{number}/labels"));
        let labels = [label.to_string()];
        let labels = &labels;
        self.with_retry("add label", "POST", &route, cancel, || async move {
            self.octocrab()
                .issues(self.owner(), self.repo())
                .add_labels(number, labels)
                .await
        })
        .await?;
        info!(pr = number, label, "Added label");
        Ok(())
    }

    /// Removing a label that is already gone succeeds.
    pub async fn remove_label(
        &self,
        number: u64,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let route = self.repo_path(&format!("/issues/{number}/labels/{label}"));
        let removed = self
            .with_retry("remove label", "DELETE", &route, cancel, || async move {
                self.octocrab()
                    .issues(self.owner(), self.repo())
                    .remove_label(number, label)
                    .await
            })
            .await;

        match removed {
            Ok(_) => {
                info!(pr = number, label, "Removed label");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(pr = number, label, "Label already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn list_labels(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ForgeError> {
        let route = self.repo_path(&format!("/issues/{number}/labels"));
        let labels = self
            .with_retry("list labels", "GET", &route, cancel, || async move {
                let page = self
                    .octocrab()
                    .issues(self.owner(), self.repo())
                    .list_labels_for_issue(number)
                    .per_page(100)
                    .send()
                    .await?;
                self.octocrab().all_pages(page).await
            })
            .await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    /// Not retried, like comments: a second attempt could double-react.
    pub async fn add_reaction(
        &self,
        target: ReactionTarget,
        kind: ReactionKind,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let route = self.reactions_path(target);
        let body = json!({ "content": kind.as_str() });
        let _: serde_json::Value = self
            .once(
                "add reaction",
                "POST",
                &route,
                cancel,
                self.octocrab().post(&route, Some(&body)),
            )
            .await?;
        debug!(?target, reaction = kind.as_str(), "Added reaction");
        Ok(())
    }

    pub async fn list_reactions(
        &self,
        target: ReactionTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reaction>, ForgeError> {
        let route = self.reactions_path(target);
        let route_ref = &route;
        let payloads = self
            .with_retry("list reactions", "GET", &route, cancel, || async move {
                let page: Page<ReactionPayload> = self
                    .octocrab()
                    .get(route_ref, Some(&[("per_page", "100")]))
                    .await?;
                self.octocrab().all_pages(page).await
            })
            .await?;

        Ok(payloads
            .into_iter()
            .map(|r| Reaction {
                id: r.id,
                kind: r.content,
                user: r.user.map(|u| u.login).unwrap_or_default(),
            })
            .collect())
    }

    /// Delete reactions on `target`, optionally narrowed to one kind and to those left by `by`.
    /// Returns the number removed.
    pub async fn remove_reaction(
        &self,
        target: ReactionTarget,
        kind: Option<ReactionKind>,
        by: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<usize, ForgeError> {
        let base = self.reactions_path(target);
        let mut removed = 0;

        for reaction in self.list_reactions(target, cancel).await? {
            if kind.is_some_and(|k| k != reaction.kind) || by.is_some_and(|user| user != reaction.user) {
                continue;
            }
            let route = format!("{base}/{}", reaction.id);
            let url = format!("{}{route}", self.base_url());
            self.once("delete reaction", "DELETE", &route, cancel, async move {
                let response = self.octocrab()._delete(url, None::<&()>).await?;
                octocrab::map_github_error(response).await.map(drop)
            })
            .await?;
            removed += 1;
        }

        debug!(?target, reaction = ?kind, removed, "Removed reactions");
        Ok(removed)
    }

    fn reactions_path(&self, target: ReactionTarget) -> String {
        match target {
            ReactionTarget::Comment(id) => self.repo_path(&format!("/issues/comments/{id}/reactions")),
            ReactionTarget::PullRequest(number) => {
                self.repo_path(&format!("/issues/{number}/reactions"))
            }
        }
    }
}
