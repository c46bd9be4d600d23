use octocrab::models::issues::Comment;
use octocrab::models::CommentId;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::GitHubClient;
use super::errors::ForgeError;
use super::types::IssueComment;

pub const MAX_COMMENT_BYTES: usize = 10_000;
const TRUNCATION_NOTE: &str = "\n\n…(truncated)";

impl From<Comment> for IssueComment {
    fn from(comment: Comment) -> Self {
        IssueComment {
            id: comment.id.0,
            author: comment.user.login,
            body: comment.body.unwrap_or_default(),
        }
    }
}

impl GitHubClient {
    /// Post a comment on the PR conversation. Not retried: a duplicate would be visible.
    pub async fn post_comment(
        &self,
        number: u64,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<IssueComment, ForgeError> {
        if body.trim().is_empty() {
            return Err(ForgeError::InvalidInput("comment body must not be empty".into()));
        }

        let body = cap_body(body);
        let route = self.repo_path(&format!("/issues/{number}/comments"));
        let comment = self
            .once("post comment", "POST", &route, cancel, async {
                self.octocrab()
                    .issues(self.owner(), self.repo())
                    .create_comment(number, &body)
                    .await
            })
            .await?;

        info!(pr = number, comment_id = comment.id.0, "Posted comment");
        Ok(comment.into())
    }

    /// Every comment on the PR conversation, across all pages.
    pub async fn list_comments(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssueComment>, ForgeError> {
        let route = self.repo_path(&format!("/issues/{number}/comments"));
        let comments = self
            .with_retry("list comments", "GET", &route, cancel, || async move {
                let page = self
                    .octocrab()
                    .issues(self.owner(), self.repo())
                    .list_comments(number)
                    .per_page(100)
                    .send()
                    .await?;
                self.octocrab().all_pages(page).await
            })
            .await?;
        Ok(comments.into_iter().map(IssueComment::from).collect())
    }

    pub async fn delete_comment(
        &self,
        comment_id: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ForgeError> {
        let route = self.repo_path(&format!("/issues/comments/{comment_id}"));
        self.once("delete comment", "DELETE", &route, cancel, async {
            self.octocrab()
                .issues(self.owner(), self.repo())
                .delete_comment(CommentId(comment_id))
                .await
        })
        .await?;
        info!(comment_id, "Deleted comment");
        Ok(())
    }
}

/// Truncate on a char boundary so the body stays within the comment limit.
fn cap_body(body: &str) -> String {
    if body.len() <= MAX_COMMENT_BYTES {
        return body.to_string();
    }
    let mut end = MAX_COMMENT_BYTES - TRUNCATION_NOTE.len();
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &body[..end], TRUNCATION_NOTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_are_untouched() {
        assert_eq!(cap_body("✅ done"), "✅ done");
    }

    #[test]
    fn long_bodies_are_capped_on_char_boundary() {
        let body = "é".repeat(MAX_COMMENT_BYTES);
        let capped = cap_body(&body);
        assert!(capped.len() <= MAX_COMMENT_BYTES);
        assert!(capped.ends_with("(truncated)"));
    }
}
