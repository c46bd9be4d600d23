use tracing::{debug, info, warn};

use super::{reason, Executor};
use crate::feedback::Outcome;
use crate::github::{PrView, ReactionTarget};

impl Executor<'_> {
    pub(crate) async fn approve(&self, pr: u64, actor: &str) -> Outcome {
        let view = match self.client.get_pr_info(pr, self.cancel).await {
            Ok(view) => view,
            Err(err) => {
                return Outcome::ApprovalFailed {
                    reason: reason(&err),
                }
            }
        };

        if let Some(refusal) = self.self_approval(&view, actor) {
            return refusal;
        }

        let bot = &self.config.bot_username;
        if view.is_approved_by(bot) {
            return Outcome::AlreadyApproved { by: bot.clone() };
        }
        if view.is_approved_by(actor) {
            return Outcome::AlreadyApproved {
                by: actor.to_string(),
            };
        }

        match self.client.approve_pr(pr, self.cancel).await {
            Ok(()) => Outcome::ApprovalSucceeded {
                by: actor.to_string(),
            },
            Err(err) => Outcome::ApprovalFailed {
                reason: reason(&err),
            },
        }
    }

    /// Approve unless the bot or the actor already has. A merge needs an approval on record.
    ///
    /// The author may merge their own PR once someone else approved it, but the bot never
    /// supplies that approval on their behalf.
    pub(crate) async fn ensure_approved(&self, view: &PrView, actor: &str) -> Result<(), Outcome> {
        if view.is_approved_by(&self.config.bot_username) || view.is_approved_by(actor) {
            return Ok(());
        }
        if let Some(refusal) = self.self_approval(view, actor) {
            if view.approvers.is_empty() {
                return Err(refusal);
            }
            debug!(pr = view.number, actor, approvers = ?view.approvers, "Author merging an approved PR");
            return Ok(());
        }
        self.client
            .approve_pr(view.number, self.cancel)
            .await
            .map_err(|err| Outcome::ApprovalFailed {
                reason: reason(&err),
            })
    }

    pub(crate) async fn unapprove(&self, pr: u64, actor: &str) -> Outcome {
        match self
            .client
            .dismiss_reviews_by(pr, &self.config.bot_username, self.cancel)
            .await
        {
            Ok(_) => Outcome::UnapproveSucceeded {
                by: actor.to_string(),
            },
            Err(err) => Outcome::UnapproveFailed {
                reason: reason(&err),
            },
        }
    }

    /// Undo everything the bot left on the PR: approvals, comments, reactions.
    /// `trigger` is the comment that asked for it; it goes last.
    pub(crate) async fn cleanup(&self, pr: u64, trigger: Option<u64>) -> Result<(), String> {
        let bot = self.config.bot_username.as_str();

        self.client
            .dismiss_reviews_by(pr, bot, self.cancel)
            .await
            .map_err(|err| reason(&err))?;

        let comments = self
            .client
            .list_comments(pr, self.cancel)
            .await
            .map_err(|err| reason(&err))?;
        let mut deleted = 0;
        for comment in comments {
            if comment.author != bot || Some(comment.id) == trigger {
                continue;
            }
            self.client
                .delete_comment(comment.id, self.cancel)
                .await
                .map_err(|err| reason(&err))?;
            deleted += 1;
        }

        let mut targets = vec![ReactionTarget::PullRequest(pr)];
        targets.extend(trigger.map(ReactionTarget::Comment));
        for target in targets {
            if let Err(err) = self
                .client
                .remove_reaction(target, None, Some(bot), self.cancel)
                .await
            {
                warn!(?target, error = %err, "Failed to remove bot reactions");
            }
        }

        if let Some(id) = trigger {
            self.client
                .delete_comment(id, self.cancel)
                .await
                .map_err(|err| reason(&err))?;
        }

        info!(pr, deleted, "Cleanup complete");
        Ok(())
    }
}
