//! Poll-mode completion of deferred merges.
//!
//! A PR carrying a pending-CI label waits for its checks. Each pass moves it through
//! [`PendingMergeState`] until it is merged, cancelled, or still waiting; only the label
//! persists between passes.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::config::BotConfig;
use crate::error::SmyklotError;
use crate::executor::reason;
use crate::feedback::{self, Outcome};
use crate::github::pulls::is_method_rejected;
use crate::github::{CheckAggregate, GitHubClient, MergeMethod, PrState, PrView};
use crate::labels::PendingMarker;
use crate::telemetry::pr_span;

/// Actor named in the success comment of a merge completed by the controller.
pub const AUTOMATION_ACTOR: &str = "automation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    ChecksFailed,
    MergeRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMergeState {
    Waiting { marker: PendingMarker },
    Merging { method: MergeMethod },
    Merged { method: MergeMethod },
    AlreadyMerged,
    Cancelled { cause: CancelCause, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    ChecksPending,
    ChecksPassed,
    ChecksFailed { summary: String },
    MergeSucceeded,
    MethodRejected { message: String },
    MergeFailed { message: String },
    FoundMerged,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition from {state:?} on {event:?}")]
pub struct TransitionError {
    pub state: PendingMergeState,
    pub event: MergeEvent,
}

impl PendingMergeState {
    pub fn on(self, event: MergeEvent) -> Result<Self, TransitionError> {
        use MergeEvent as E;
        use PendingMergeState as S;

        match (self, event) {
            (S::Waiting { marker }, E::ChecksPending) => Ok(S::Waiting { marker }),
            (S::Waiting { marker }, E::ChecksPassed) => Ok(S::Merging {
                method: marker.method,
            }),
            (S::Waiting { .. }, E::ChecksFailed { summary }) => Ok(S::Cancelled {
                cause: CancelCause::ChecksFailed,
                reason: summary,
            }),
            (S::Waiting { .. } | S::Merging { .. }, E::FoundMerged) => Ok(S::AlreadyMerged),
            (S::Merging { method }, E::MergeSucceeded) => Ok(S::Merged { method }),
            (S::Merging { method }, E::MethodRejected { message }) => match method.fallback() {
                Some(next) => Ok(S::Merging { method: next }),
                None => Ok(S::Cancelled {
                    cause: CancelCause::MergeRejected,
                    reason: message,
                }),
            },
            (S::Merging { .. }, E::MergeFailed { message }) => Ok(S::Cancelled {
                cause: CancelCause::MergeRejected,
                reason: message,
            }),
            (state, event) => Err(TransitionError { state, event }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            PendingMergeState::Waiting { .. } | PendingMergeState::Merging { .. }
        )
    }
}

/// What the checks say about a waiting PR.
pub fn evaluate(aggregate: &CheckAggregate) -> MergeEvent {
    if aggregate.failing() {
        MergeEvent::ChecksFailed {
            summary: aggregate.summary.clone(),
        }
    } else if aggregate.all_passing() {
        MergeEvent::ChecksPassed
    } else {
        MergeEvent::ChecksPending
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub examined: usize,
    pub merged: usize,
    pub cancelled: usize,
    pub waiting: usize,
    pub errors: usize,
}

pub struct DeferredMergeController<'a> {
    client: &'a GitHubClient,
    config: &'a BotConfig,
    cancel: &'a CancellationToken,
}

impl<'a> DeferredMergeController<'a> {
    pub fn new(
        client: &'a GitHubClient,
        config: &'a BotConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            cancel,
        }
    }

    /// One pass over `prs`. A failure on one PR is logged and does not stop the others.
    pub async fn run(&self, prs: &[PrView]) -> PollReport {
        let mut report = PollReport::default();

        for pr in prs {
            if self.cancel.is_cancelled() {
                warn!("Poll cancelled, stopping early");
                break;
            }
            let Some(marker) = PendingMarker::select(&pr.labels) else {
                continue;
            };
            report.examined += 1;

            match self.process(pr, marker).instrument(pr_span(pr.number)).await {
                Ok(PendingMergeState::Waiting { .. }) => report.waiting += 1,
                Ok(PendingMergeState::Merged { .. } | PendingMergeState::AlreadyMerged) => {
                    report.merged += 1
                }
                Ok(PendingMergeState::Cancelled { .. }) => report.cancelled += 1,
                Ok(PendingMergeState::Merging { .. }) => {}
                Err(err) => {
                    report.errors += 1;
                    warn!(pr = pr.number, error = %err, "Failed to process pending merge");
                }
            }
        }

        info!(
            examined = report.examined,
            merged = report.merged,
            cancelled = report.cancelled,
            waiting = report.waiting,
            errors = report.errors,
            "Pending merges processed"
        );
        report
    }

    /// Drive one marked PR to its state for this pass and apply the side effects.
    pub async fn process(
        &self,
        pr: &PrView,
        marker: PendingMarker,
    ) -> Result<PendingMergeState, SmyklotError> {
        let label = marker.label();
        let mut state = PendingMergeState::Waiting { marker };

        if pr.state == PrState::Merged {
            state = state.on(MergeEvent::FoundMerged).map_err(unexpected)?;
        } else {
            let sha = self.client.get_pr_head_sha(pr.number, self.cancel).await?;
            let required = if marker.required_only {
                self.client
                    .get_required_checks(&pr.base_branch, self.cancel)
                    .await?
            } else {
                Vec::new()
            };
            let aggregate = self
                .client
                .check_aggregate(&sha, &required, self.cancel)
                .await?;
            info!(pr = pr.number, summary = %aggregate.summary, required = required.len(), "Checked CI");

            state = state.on(evaluate(&aggregate)).map_err(unexpected)?;
            while let PendingMergeState::Merging { method } = state {
                let event = self.attempt(pr.number, method).await;
                state = state.on(event).map_err(unexpected)?;
            }
        }

        match &state {
            PendingMergeState::Waiting { .. } => {
                info!(pr = pr.number, "Checks still running");
            }
            PendingMergeState::Merged { method } => {
                // The label goes first so a failed comment cannot cause a second merge attempt.
                self.client.remove_label(pr.number, &label, self.cancel).await?;
                info!(pr = pr.number, method = %method, "Deferred merge completed");
                let outcome = Outcome::PendingCiMerged {
                    by: AUTOMATION_ACTOR.to_string(),
                };
                if let Some(body) = feedback::compose(&outcome, self.config).body {
                    self.client.post_comment(pr.number, &body, self.cancel).await?;
                }
            }
            PendingMergeState::AlreadyMerged => {
                warn!(pr = pr.number, "PR was merged outside the bot, clearing marker");
                self.client.remove_label(pr.number, &label, self.cancel).await?;
            }
            PendingMergeState::Cancelled { cause, reason } => {
                self.client.remove_label(pr.number, &label, self.cancel).await?;
                warn!(pr = pr.number, ?cause, reason = %reason, "Deferred merge cancelled");
                let outcome = match cause {
                    CancelCause::ChecksFailed => Outcome::PendingCiFailed {
                        reason: reason.clone(),
                    },
                    CancelCause::MergeRejected => Outcome::MergeFailed {
                        reason: reason.clone(),
                    },
                };
                if let Some(body) = feedback::compose(&outcome, self.config).body {
                    self.client.post_comment(pr.number, &body, self.cancel).await?;
                }
            }
            PendingMergeState::Merging { .. } => {}
        }

        Ok(state)
    }

    /// One merge attempt, classified. A failure is double-checked against the PR state
    /// because the forge may have merged it anyway.
    async fn attempt(&self, number: u64, method: MergeMethod) -> MergeEvent {
        let err = match self.client.merge_pr(number, method, self.cancel).await {
            Ok(()) => return MergeEvent::MergeSucceeded,
            Err(err) => err,
        };

        if is_method_rejected(&err) {
            warn!(pr = number, method = %method, "Merge method not allowed");
            return MergeEvent::MethodRejected {
                message: reason(&err),
            };
        }

        match self.client.get_pr_info(number, self.cancel).await {
            Ok(view) if view.state == PrState::Merged => MergeEvent::FoundMerged,
            _ => MergeEvent::MergeFailed {
                message: reason(&err),
            },
        }
    }
}

fn unexpected(err: TransitionError) -> SmyklotError {
    SmyklotError::invalid("pending merge state", err.to_string())
}
