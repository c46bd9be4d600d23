//! Event-mode command execution: one comment in, one combined reply out.

mod handlers;
mod merge;
mod reactions;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{CommandKind, Grammar};
use crate::config::BotConfig;
use crate::error::SmyklotError;
use crate::feedback::{self, Feedback, FeedbackType, Outcome};
use crate::github::{ForgeError, GitHubClient, PrView, ReactionKind, ReactionTarget};
use crate::permissions::PermissionResolver;

pub use merge::{triggers_auto_merge, AUTO_MERGE_TRIGGERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
}

impl CommentAction {
    /// Webhook `action` value. Anything unrecognised is treated as a new comment.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "edited" => CommentAction::Edited,
            "deleted" => CommentAction::Deleted,
            _ => CommentAction::Created,
        }
    }
}

/// A PR comment event as delivered to the bot.
#[derive(Debug, Clone)]
pub struct CommentEvent {
    pub pr_number: u64,
    pub comment_id: u64,
    pub author: String,
    pub body: String,
    pub action: CommentAction,
}

/// Where the work was triggered from. Decides which wording the outcome uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Comment,
    Reaction,
}

pub struct Executor<'a> {
    client: &'a GitHubClient,
    config: &'a BotConfig,
    resolver: &'a PermissionResolver,
    grammar: Grammar,
    cancel: &'a CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        client: &'a GitHubClient,
        config: &'a BotConfig,
        resolver: &'a PermissionResolver,
        cancel: &'a CancellationToken,
    ) -> Result<Self, SmyklotError> {
        Ok(Self {
            client,
            config,
            resolver,
            grammar: Grammar::new(config)?,
            cancel,
        })
    }

    pub async fn handle_comment(&self, event: &CommentEvent) -> Result<(), SmyklotError> {
        let pr = event.pr_number;
        let target = ReactionTarget::Comment(event.comment_id);

        if event.action == CommentAction::Deleted {
            return self.handle_deleted(event).await;
        }

        let command = self.grammar.interpret(&event.body);
        if !command.is_valid() {
            if event.body.trim().is_empty() || self.config.disable_reactions {
                debug!(pr, comment = event.comment_id, "No command in comment");
                return Ok(());
            }
            return self.handle_reactions(pr, target).await;
        }

        info!(
            pr,
            comment = event.comment_id,
            actor = %event.author,
            kinds = ?command.kinds,
            wait_for_ci = command.modifiers.wait_for_ci,
            required_only = command.modifiers.required_checks_only,
            "Interpreted command"
        );

        // An edited comment may still carry the failure reaction of its previous run.
        if let Err(err) = self
            .client
            .remove_reaction(
                target,
                Some(ReactionKind::ThumbsDown),
                Some(&self.config.bot_username),
                self.cancel,
            )
            .await
        {
            warn!(pr, error = %err, "Failed to clear stale failure reaction");
        }

        if command.contains(CommandKind::Help) {
            self.acknowledge(target).await;
            let reply = feedback::compose(&Outcome::Help, self.config);
            return self.finish(pr, target, &reply).await;
        }

        match self.authorize(&event.author).await {
            Ok(true) => {}
            Ok(false) => {
                let outcome = Outcome::Unauthorized {
                    user: event.author.clone(),
                    approvers: self.resolver.approvers(),
                };
                self.respond(pr, target, &feedback::compose(&outcome, self.config))
                    .await?;
                return Err(SmyklotError::Denied {
                    user: event.author.clone(),
                });
            }
            Err(err) => {
                let outcome = Outcome::PermissionCheckFailed {
                    user: event.author.clone(),
                    reason: reason(&err),
                };
                self.respond(pr, target, &feedback::compose(&outcome, self.config))
                    .await?;
                return Err(err.into());
            }
        }

        self.acknowledge(target).await;

        let mut replies: Vec<Feedback> = Vec::new();
        let mut cleaned_up = false;
        for kind in &command.kinds {
            let outcome = match kind {
                CommandKind::Approve => self.approve(pr, &event.author).await,
                CommandKind::Merge | CommandKind::Squash | CommandKind::Rebase => {
                    let Some(method) = kind.merge_method() else {
                        continue;
                    };
                    self.merge(pr, method, command.modifiers, &event.author).await
                }
                CommandKind::Unapprove => self.unapprove(pr, &event.author).await,
                CommandKind::Cleanup => match self.cleanup(pr, Some(event.comment_id)).await {
                    Ok(()) => {
                        cleaned_up = true;
                        Outcome::CleanedUp
                    }
                    Err(reason) => Outcome::CleanupFailed { reason },
                },
                CommandKind::Help => continue,
            };

            if event.action == CommentAction::Created
                && matches!(outcome, Outcome::AlreadyApproved { .. })
            {
                debug!(pr, "Already approved, nothing to report on a new comment");
                continue;
            }
            replies.push(feedback::compose(&outcome, self.config));
        }

        if replies.is_empty() {
            self.swap_acknowledgement(target, ReactionKind::ThumbsUp).await;
            return Ok(());
        }

        let total = replies.len();
        let failed = replies.iter().filter(|r| r.is_error()).count();
        let combined = feedback::combine(replies);
        if cleaned_up {
            // The triggering comment was deleted; only the PR conversation is left to reply on.
            if let Some(body) = &combined.body {
                self.client.post_comment(pr, body, self.cancel).await?;
            }
        } else {
            self.finish(pr, target, &combined).await?;
        }

        if failed > 0 {
            return Err(SmyklotError::CommandFailed { failed, total });
        }
        Ok(())
    }

    async fn handle_deleted(&self, event: &CommentEvent) -> Result<(), SmyklotError> {
        if self.config.disable_deleted_comments {
            debug!(pr = event.pr_number, "Deleted-comment notices disabled");
            return Ok(());
        }
        if event.author == self.config.bot_username {
            return Ok(());
        }

        let outcome = Outcome::CommentDeleted {
            user: event.author.clone(),
            comment_id: event.comment_id,
        };
        if let Some(body) = feedback::compose(&outcome, self.config).body {
            self.client
                .post_comment(event.pr_number, &body, self.cancel)
                .await?;
        }
        info!(pr = event.pr_number, comment = event.comment_id, "Reported deleted comment");
        Ok(())
    }

    /// CODEOWNERS global owners decide; without any, write access does.
    pub async fn authorize(&self, user: &str) -> Result<bool, ForgeError> {
        let allowed = if self.resolver.has_owners() {
            self.resolver.can_approve(user, "/", self.cancel).await?
        } else {
            self.client.has_write_permission(user, self.cancel).await?
        };
        debug!(user, allowed, owners = self.resolver.has_owners(), "Authorization checked");
        Ok(allowed)
    }

    pub(crate) fn self_approval(&self, pr: &PrView, actor: &str) -> Option<Outcome> {
        (!self.config.allow_self_approval && pr.author == actor).then(|| Outcome::SelfApproval {
            user: actor.to_string(),
        })
    }

    /// The `eyes` reaction that says "working on it". Best effort.
    async fn acknowledge(&self, target: ReactionTarget) {
        if let Err(err) = self
            .client
            .add_reaction(target, ReactionKind::Eyes, self.cancel)
            .await
        {
            warn!(?target, error = %err, "Failed to acknowledge command");
        }
    }

    async fn swap_acknowledgement(&self, target: ReactionTarget, reaction: ReactionKind) {
        if reaction == ReactionKind::Eyes {
            return;
        }
        if let Err(err) = self
            .client
            .remove_reaction(
                target,
                Some(ReactionKind::Eyes),
                Some(&self.config.bot_username),
                self.cancel,
            )
            .await
        {
            warn!(?target, error = %err, "Failed to remove acknowledgement");
        }
        if let Err(err) = self.client.add_reaction(target, reaction, self.cancel).await {
            warn!(?target, error = %err, "Failed to add final reaction");
        }
    }

    /// Post the reply, then replace the acknowledgement with the final reaction.
    async fn finish(
        &self,
        pr: u64,
        target: ReactionTarget,
        reply: &Feedback,
    ) -> Result<(), SmyklotError> {
        if let Some(body) = &reply.body {
            self.client.post_comment(pr, body, self.cancel).await?;
        }
        self.swap_acknowledgement(target, reply.reaction()).await;
        if reply.kind == FeedbackType::Pending {
            debug!(pr, "Leaving acknowledgement in place while CI runs");
        }
        Ok(())
    }

    /// Reply without an acknowledgement to replace.
    async fn respond(
        &self,
        pr: u64,
        target: ReactionTarget,
        reply: &Feedback,
    ) -> Result<(), SmyklotError> {
        if let Some(body) = &reply.body {
            self.client.post_comment(pr, body, self.cancel).await?;
        }
        if let Err(err) = self
            .client
            .add_reaction(target, reply.reaction(), self.cancel)
            .await
        {
            warn!(?target, error = %err, "Failed to add reaction");
        }
        Ok(())
    }
}

/// The forge's own message when there is one, for user-facing replies.
pub(crate) fn reason(err: &ForgeError) -> String {
    err.remote_message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::ApiError;

    #[test]
    fn comment_actions_parse_leniently() {
        assert_eq!(CommentAction::parse("created"), CommentAction::Created);
        assert_eq!(CommentAction::parse("Edited"), CommentAction::Edited);
        assert_eq!(CommentAction::parse("deleted"), CommentAction::Deleted);
        assert_eq!(CommentAction::parse(""), CommentAction::Created);
    }

    #[test]
    fn reason_prefers_the_remote_message() {
        let err: ForgeError = ApiError::new(
            "merge PR",
            405,
            "PUT",
            "/repos/a/b/pulls/1/merge",
            "Pull Request is not mergeable",
        )
        .into();
        assert_eq!(reason(&err), "Pull Request is not mergeable");

        let cancelled = ForgeError::Cancelled {
            operation: "merge PR".into(),
        };
        assert_eq!(reason(&cancelled), "merge PR cancelled");
    }
}
