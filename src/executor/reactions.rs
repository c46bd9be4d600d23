use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{Executor, Trigger};
use crate::error::SmyklotError;
use crate::feedback::{self, Feedback, Outcome};
use crate::github::{MergeMethod, PrState, ReactionKind, ReactionTarget};
use crate::labels::{REACTION_APPROVE, REACTION_CLEANUP, REACTION_MERGE};

/// Reactions that act as commands, with the label recording that each one ran.
const REACTION_COMMANDS: [(ReactionKind, &str); 3] = [
    (ReactionKind::ThumbsUp, REACTION_APPROVE),
    (ReactionKind::Rocket, REACTION_MERGE),
    (ReactionKind::Heart, REACTION_CLEANUP),
];

impl Executor<'_> {
    /// Treat reactions from authorized users as commands.
    ///
    /// On the PR description each reaction kind runs at most once: its marker label is
    /// added on success, the reaction is skipped while the label is present, and a label
    /// whose reaction has been withdrawn is reconciled away. Reactions on comments leave
    /// no markers, since the sweep only ever sees the description.
    pub async fn handle_reactions(
        &self,
        pr: u64,
        target: ReactionTarget,
    ) -> Result<(), SmyklotError> {
        let on_description = is_description(target);
        let reactions = self.client.list_reactions(target, self.cancel).await?;
        let labels = if on_description {
            self.client.list_labels(pr, self.cancel).await?
        } else {
            Vec::new()
        };

        let mut verdicts: HashMap<String, bool> = HashMap::new();
        let mut actors: Vec<(ReactionKind, String)> = Vec::new();

        for reaction in reactions {
            if reaction.user.is_empty() || reaction.user == self.config.bot_username {
                continue;
            }
            if !REACTION_COMMANDS.iter().any(|(kind, _)| *kind == reaction.kind)
                || actors.iter().any(|(kind, _)| *kind == reaction.kind)
            {
                continue;
            }

            let allowed = match verdicts.get(&reaction.user) {
                Some(allowed) => *allowed,
                None => {
                    let allowed = match self.authorize(&reaction.user).await {
                        Ok(allowed) => allowed,
                        Err(err) => {
                            warn!(pr, user = %reaction.user, error = %err, "Permission check failed for reaction");
                            false
                        }
                    };
                    verdicts.insert(reaction.user.clone(), allowed);
                    allowed
                }
            };

            if allowed {
                actors.push((reaction.kind, reaction.user));
            } else {
                debug!(pr, user = %reaction.user, reaction = reaction.kind.as_str(), "Ignoring reaction from unauthorized user");
            }
        }

        if on_description {
            self.reconcile(pr, &labels, &actors).await;
        }

        for (kind, user) in actors {
            let Some((_, label)) = REACTION_COMMANDS.iter().find(|(k, _)| *k == kind) else {
                continue;
            };
            if labels.iter().any(|l| l == label) {
                debug!(pr, label, "Reaction already handled");
                continue;
            }

            match kind {
                ReactionKind::ThumbsUp => self.reaction_approve(pr, target, &user).await,
                ReactionKind::Rocket => self.reaction_merge(pr, target, &user).await,
                ReactionKind::Heart => self.reaction_cleanup(pr, target, &user).await,
                _ => {}
            }
        }
        Ok(())
    }

    /// Undo marker labels whose reaction is gone.
    async fn reconcile(&self, pr: u64, labels: &[String], actors: &[(ReactionKind, String)]) {
        let present = |kind: ReactionKind| actors.iter().any(|(k, _)| *k == kind);
        let has_label = |label: &str| labels.iter().any(|l| l == label);

        if has_label(REACTION_APPROVE) && !present(ReactionKind::ThumbsUp) {
            info!(pr, "Approval reaction withdrawn, dismissing bot approval");
            if let Err(err) = self
                .client
                .dismiss_reviews_by(pr, &self.config.bot_username, self.cancel)
                .await
            {
                warn!(pr, error = %err, "Failed to dismiss approval");
            } else {
                self.drop_label(pr, REACTION_APPROVE).await;
            }
        }

        if has_label(REACTION_MERGE) && !present(ReactionKind::Rocket) {
            match self.client.get_pr_info(pr, self.cancel).await {
                Ok(view) if view.state != PrState::Open => {
                    let notice = feedback::compose(&Outcome::MergeReactionRemoved, self.config);
                    self.reply(pr, None, &notice).await;
                }
                Ok(_) => {}
                Err(err) => warn!(pr, error = %err, "Could not read PR state"),
            }
            self.drop_label(pr, REACTION_MERGE).await;
        }

        if has_label(REACTION_CLEANUP) && !present(ReactionKind::Heart) {
            self.drop_label(pr, REACTION_CLEANUP).await;
        }
    }

    async fn reaction_approve(&self, pr: u64, target: ReactionTarget, user: &str) {
        let view = match self.client.get_pr_info(pr, self.cancel).await {
            Ok(view) => view,
            Err(err) => {
                warn!(pr, error = %err, "Could not read PR for approval reaction");
                return;
            }
        };
        if self.self_approval(&view, user).is_some() {
            info!(pr, user, "Ignoring self-approval reaction");
            return;
        }

        let approved = view.is_approved_by(&self.config.bot_username);
        if approved && !is_description(target) {
            debug!(pr, user, "Already approved, ignoring comment reaction");
            return;
        }
        if !approved {
            if let Err(err) = self.client.approve_pr(pr, self.cancel).await {
                warn!(pr, error = %err, "Approval via reaction failed");
                return;
            }
        }
        if is_description(target) {
            self.mark(pr, REACTION_APPROVE).await;
        }

        let outcome = Outcome::ReactionApproved {
            by: user.to_string(),
        };
        self.reply(pr, Some(target), &feedback::compose(&outcome, self.config))
            .await;
    }

    async fn reaction_merge(&self, pr: u64, target: ReactionTarget, user: &str) {
        let view = match self.client.get_pr_info(pr, self.cancel).await {
            Ok(view) => view,
            Err(err) => {
                warn!(pr, error = %err, "Could not read PR for merge reaction");
                return;
            }
        };
        if view.state != PrState::Open {
            return;
        }

        let outcome = self
            .merge_now(&view, MergeMethod::Merge, user, Trigger::Reaction)
            .await;
        match outcome {
            Outcome::ReactionMerged { .. } | Outcome::ReactionAutoMerge { .. } => {
                if is_description(target) {
                    self.mark(pr, REACTION_MERGE).await;
                }
                self.reply(pr, Some(target), &feedback::compose(&outcome, self.config))
                    .await;
            }
            // Left unmarked so a later pass can try again.
            other => warn!(pr, outcome = ?other, "Merge via reaction did not complete"),
        }
    }

    async fn reaction_cleanup(&self, pr: u64, target: ReactionTarget, user: &str) {
        let trigger = match target {
            ReactionTarget::Comment(id) => Some(id),
            ReactionTarget::PullRequest(_) => None,
        };
        if let Err(reason) = self.cleanup(pr, trigger).await {
            warn!(pr, reason = %reason, "Cleanup via reaction failed");
            return;
        }

        if trigger.is_none() {
            self.mark(pr, REACTION_CLEANUP).await;
            let outcome = Outcome::ReactionCleanedUp {
                by: user.to_string(),
            };
            self.reply(pr, None, &feedback::compose(&outcome, self.config))
                .await;
        }
    }

    async fn mark(&self, pr: u64, label: &str) {
        if let Err(err) = self.client.add_label(pr, label, self.cancel).await {
            warn!(pr, label, error = %err, "Failed to add reaction marker");
        }
    }

    async fn drop_label(&self, pr: u64, label: &str) {
        if let Err(err) = self.client.remove_label(pr, label, self.cancel).await {
            warn!(pr, label, error = %err, "Failed to remove reaction marker");
        }
    }

    /// Best-effort reply for reaction-driven work; nothing upstream waits on it.
    async fn reply(&self, pr: u64, target: Option<ReactionTarget>, reply: &Feedback) {
        if let Some(body) = &reply.body {
            if let Err(err) = self.client.post_comment(pr, body, self.cancel).await {
                warn!(pr, error = %err, "Failed to post reaction feedback");
            }
        }
        if let Some(target) = target {
            if let Err(err) = self
                .client
                .add_reaction(target, reply.reaction(), self.cancel)
                .await
            {
                warn!(?target, error = %err, "Failed to add reaction");
            }
        }
    }
}

fn is_description(target: ReactionTarget) -> bool {
    matches!(target, ReactionTarget::PullRequest(_))
}
