use tracing::{info, warn};

use super::{reason, Executor, Trigger};
use crate::commands::Modifiers;
use crate::feedback::Outcome;
use crate::github::{ForgeError, MergeMethod, MergeableState, PrState, PrView};
use crate::labels::PendingMarker;

/// Merge failures whose message means the forge wants to merge the PR itself.
pub const AUTO_MERGE_TRIGGERS: [&str; 5] = [
    "merge queue",
    "required status check",
    "status checks",
    "required review",
    "branch protection",
];

pub fn triggers_auto_merge(err: &ForgeError) -> bool {
    let message = err.remote_message().unwrap_or_default();
    AUTO_MERGE_TRIGGERS
        .iter()
        .any(|trigger| message.contains(trigger))
}

impl Executor<'_> {
    pub(crate) async fn merge(
        &self,
        pr: u64,
        method: MergeMethod,
        modifiers: Modifiers,
        actor: &str,
    ) -> Outcome {
        let view = match self.client.get_pr_info(pr, self.cancel).await {
            Ok(view) => view,
            Err(err) => {
                return Outcome::MergeFailed {
                    reason: reason(&err),
                }
            }
        };

        if view.state == PrState::Merged {
            return Outcome::AlreadyMerged;
        }

        if modifiers.wait_for_ci {
            return self
                .defer_merge(&view, method, modifiers.required_checks_only, actor)
                .await;
        }
        self.merge_now(&view, method, actor, Trigger::Comment).await
    }

    pub(crate) async fn merge_now(
        &self,
        view: &PrView,
        method: MergeMethod,
        actor: &str,
        trigger: Trigger,
    ) -> Outcome {
        if !view.mergeable {
            match view.mergeable_state {
                MergeableState::Blocked | MergeableState::Unstable => {
                    info!(pr = view.number, state = ?view.mergeable_state, "Not mergeable yet, enabling auto-merge");
                    return self.auto_merge(view.number, method, actor, trigger).await;
                }
                MergeableState::Unknown => {}
                MergeableState::Clean | MergeableState::Dirty => return Outcome::NotMergeable,
            }
        }

        if let Err(refusal) = self.ensure_approved(view, actor).await {
            return refusal;
        }

        if !view.base_branch.is_empty() {
            match self
                .client
                .is_merge_queue_enabled(&view.base_branch, self.cancel)
                .await
            {
                Ok(true) => {
                    info!(pr = view.number, branch = %view.base_branch, "Merge queue in use");
                    return self.auto_merge(view.number, method, actor, trigger).await;
                }
                Ok(false) => {}
                Err(err) => warn!(pr = view.number, error = %err, "Could not check for a merge queue"),
            }
        }

        match self
            .client
            .merge_with_fallback(view.number, method, self.cancel)
            .await
        {
            Ok(used) => match trigger {
                Trigger::Comment => Outcome::MergeSucceeded {
                    by: actor.to_string(),
                    method: used,
                },
                Trigger::Reaction => Outcome::ReactionMerged {
                    by: actor.to_string(),
                },
            },
            Err(err) if triggers_auto_merge(&err) => {
                info!(pr = view.number, error = %err, "Merge blocked by repository rules, enabling auto-merge");
                self.auto_merge(view.number, method, actor, trigger).await
            }
            Err(err) => Outcome::MergeFailed {
                reason: reason(&err),
            },
        }
    }

    async fn auto_merge(
        &self,
        pr: u64,
        method: MergeMethod,
        actor: &str,
        trigger: Trigger,
    ) -> Outcome {
        match self.client.enable_auto_merge(pr, method, self.cancel).await {
            Ok(()) => match trigger {
                Trigger::Comment => Outcome::AutoMergeEnabled {
                    by: actor.to_string(),
                },
                Trigger::Reaction => Outcome::ReactionAutoMerge {
                    by: actor.to_string(),
                },
            },
            Err(err) => Outcome::AutoMergeFailed {
                reason: reason(&err),
            },
        }
    }

    /// Merge now if checks are green, otherwise park the request in a pending-CI label
    /// for the poll run to pick up.
    async fn defer_merge(
        &self,
        view: &PrView,
        method: MergeMethod,
        required_only: bool,
        actor: &str,
    ) -> Outcome {
        let required = if required_only {
            match self
                .client
                .get_required_checks(&view.base_branch, self.cancel)
                .await
            {
                Ok(required) => required,
                Err(err) => {
                    return Outcome::MergeFailed {
                        reason: reason(&err),
                    }
                }
            }
        } else {
            Vec::new()
        };

        let aggregate = match self
            .client
            .check_aggregate(&view.head_sha, &required, self.cancel)
            .await
        {
            Ok(aggregate) => aggregate,
            Err(err) => {
                return Outcome::MergeFailed {
                    reason: reason(&err),
                }
            }
        };
        info!(pr = view.number, summary = %aggregate.summary, "Checked CI before deferring merge");

        if aggregate.all_passing() {
            return self.merge_now(view, method, actor, Trigger::Comment).await;
        }
        if aggregate.failing() {
            return Outcome::PendingCiFailed {
                reason: aggregate.summary,
            };
        }

        if let Err(refusal) = self.ensure_approved(view, actor).await {
            return refusal;
        }

        let marker = PendingMarker::new(method, required_only).label();
        for stale in view
            .labels
            .iter()
            .filter(|l| PendingMarker::is_pending_label(l) && **l != marker)
        {
            if let Err(err) = self
                .client
                .remove_label(view.number, stale, self.cancel)
                .await
            {
                warn!(pr = view.number, label = %stale, error = %err, "Failed to remove superseded marker");
            }
        }

        if !view.has_label(&marker) {
            if let Err(err) = self.client.add_label(view.number, &marker, self.cancel).await {
                return Outcome::MergeFailed {
                    reason: reason(&err),
                };
            }
        }

        Outcome::PendingCi {
            by: actor.to_string(),
            method,
        }
    }
}
