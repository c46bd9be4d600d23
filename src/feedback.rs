//! User-facing feedback. Pure: nothing here talks to the forge.

use crate::config::BotConfig;
use crate::github::{MergeMethod, ReactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    Success,
    Error,
    Warning,
    Pending,
}

impl FeedbackType {
    pub fn reaction(&self) -> ReactionKind {
        match self {
            FeedbackType::Success => ReactionKind::ThumbsUp,
            FeedbackType::Error => ReactionKind::ThumbsDown,
            FeedbackType::Warning => ReactionKind::Confused,
            FeedbackType::Pending => ReactionKind::Eyes,
        }
    }
}

/// A reaction plus an optional comment. No body means react only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub kind: FeedbackType,
    pub body: Option<String>,
}

impl Feedback {
    pub fn reaction(&self) -> ReactionKind {
        self.kind.reaction()
    }

    pub fn requires_comment(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.kind == FeedbackType::Error
    }
}

/// What happened, independent of how it is worded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unauthorized { user: String, approvers: Vec<String> },
    SelfApproval { user: String },
    PermissionCheckFailed { user: String, reason: String },
    AlreadyApproved { by: String },
    ApprovalSucceeded { by: String },
    ApprovalFailed { reason: String },
    MergeSucceeded { by: String, method: MergeMethod },
    MergeFailed { reason: String },
    AlreadyMerged,
    NotMergeable,
    AutoMergeEnabled { by: String },
    AutoMergeFailed { reason: String },
    UnapproveSucceeded { by: String },
    UnapproveFailed { reason: String },
    CleanedUp,
    CleanupFailed { reason: String },
    ReactionApproved { by: String },
    ReactionMerged { by: String },
    ReactionAutoMerge { by: String },
    ReactionCleanedUp { by: String },
    MergeReactionRemoved,
    CommentDeleted { user: String, comment_id: u64 },
    PendingCi { by: String, method: MergeMethod },
    PendingCiMerged { by: String },
    PendingCiFailed { reason: String },
    Help,
}

pub fn compose(outcome: &Outcome, config: &BotConfig) -> Feedback {
    use Outcome::*;

    match outcome {
        Unauthorized { user, approvers } => error(unauthorized_body(user, approvers)),
        SelfApproval { user } => error(format!(
            "❌ **Not Authorized**\n\n\
             User `{user}` is not authorized to perform this action (self-approval not allowed).\n\n\
             Ask another approver to approve this pull request."
        )),
        PermissionCheckFailed { user, reason } => error(format!(
            "❌ **Permission Check Failed**\n\n\
             Could not verify whether `{user}` may perform this action.\n\n\
             **Reason:** {reason}\n\n\
             Check that the bot token can read team membership (`read:org`), then retry."
        )),
        AlreadyApproved { by } => success(
            config.quiet_success,
            format!(
                "⚠️ **Already Approved**\n\n\
                 This pull request has already been approved by `{by}`.\n\n\
                 No action has been taken."
            ),
        ),
        ApprovalSucceeded { by } => success(
            config.quiet_success,
            format!("✅ **PR Approved**\n\nThis pull request has been approved by `{by}`."),
        ),
        ApprovalFailed { reason } => failure(
            "Approval Failed",
            "Failed to approve this pull request.",
            reason,
            "Check the bot's repository permissions and try again.",
        ),
        MergeSucceeded { by, method } => success(
            config.quiet_success,
            format!(
                "✅ **PR Merged**\n\n\
                 This pull request has been successfully merged by `{by}` (method: `{method}`)."
            ),
        ),
        MergeFailed { reason } => failure(
            "Merge Failed",
            "Failed to merge this pull request.",
            reason,
            "Resolve the issue above and run the merge command again.",
        ),
        AlreadyMerged => warning(
            "⚠️ **Already Merged**\n\n\
             This pull request has already been merged.\n\n\
             No action has been taken."
                .to_string(),
        ),
        NotMergeable => error(
            "❌ **PR Not Mergeable**\n\n\
             This pull request cannot be merged at this time.\n\n\
             Possible reasons:\n\
             - Merge conflicts exist\n\
             - Required checks have not passed\n\
             - Branch protection rules are not satisfied\n\n\
             Please resolve the issues before attempting to merge."
                .to_string(),
        ),
        AutoMergeEnabled { by } => success(
            config.quiet_success,
            format!(
                "✅ **Auto-Merge Enabled**\n\n\
                 Auto-merge has been enabled by `{by}`.\n\n\
                 The PR will automatically merge when all required checks pass."
            ),
        ),
        AutoMergeFailed { reason } => failure(
            "Auto-Merge Failed",
            "Failed to enable auto-merge for this pull request.",
            reason,
            "Make sure auto-merge is allowed in the repository settings.",
        ),
        UnapproveSucceeded { by } => success(
            config.quiet_success,
            format!("✅ **Review Dismissed**\n\nThe approval has been dismissed by `{by}`."),
        ),
        UnapproveFailed { reason } => failure(
            "Dismiss Failed",
            "Failed to dismiss the approval.",
            reason,
            "Dismiss the review manually or retry the command.",
        ),
        // The triggering comment is gone with the rest; there is nothing to react on.
        CleanedUp => Feedback {
            kind: FeedbackType::Success,
            body: None,
        },
        CleanupFailed { reason } => failure(
            "Cleanup Failed",
            "Failed to complete the cleanup operation.",
            reason,
            "Some bot comments or reactions may remain; retry the command.",
        ),
        ReactionApproved { by } => success(
            config.quiet_reactions,
            format!(
                "✅ **PR Approved (via 👍 reaction)**\n\n\
                 This pull request has been approved by `{by}` using a 👍 reaction."
            ),
        ),
        ReactionMerged { by } => success(
            config.quiet_reactions,
            format!(
                "✅ **PR Merged (via 🚀 reaction)**\n\n\
                 This pull request has been successfully merged by `{by}` using a 🚀 reaction."
            ),
        ),
        ReactionAutoMerge { by } => success(
            config.quiet_reactions,
            format!(
                "✅ **Auto-Merge Enabled (via 🚀 reaction)**\n\n\
                 Auto-merge has been enabled by `{by}` using a 🚀 reaction."
            ),
        ),
        ReactionCleanedUp { by } => success(
            config.quiet_reactions,
            format!(
                "✅ **Cleanup Complete**\n\n\
                 All bot reactions, approvals, and comments have been removed by `{by}`."
            ),
        ),
        MergeReactionRemoved => Feedback {
            kind: FeedbackType::Warning,
            body: (!config.quiet_reactions).then(|| {
                "⚠️ **Merge Reaction Removed**\n\n\
                 The 🚀 reaction that triggered the merge was removed.\n\n\
                 **Note:** The PR has already been merged and cannot be unmerged.\n\n\
                 This is just a notification for tracking purposes."
                    .to_string()
            }),
        },
        CommentDeleted { user, comment_id } => warning(format!(
            "⚠️ **Command Comment Deleted**\n\n\
             User `{user}` deleted comment #{comment_id} that triggered bot actions.\n\n\
             If this was unintentional, you can re-post the command."
        )),
        PendingCi { by, method } => Feedback {
            kind: FeedbackType::Pending,
            body: (!config.quiet_pending).then(|| {
                format!(
                    "⏳ **Waiting for CI**\n\n\
                     Merge requested by `{by}`. Will {method} when all checks pass.\n\n\
                     The PR will be merged automatically once CI succeeds."
                )
            }),
        },
        PendingCiMerged { by } => success(
            config.quiet_success,
            format!(
                "✅ **CI Passed - PR Merged**\n\n\
                 All checks passed! PR has been merged as requested by `{by}`."
            ),
        ),
        PendingCiFailed { reason } => error(format!(
            "❌ **CI Failed - Merge Cancelled**\n\n\
             The pending merge has been cancelled because CI checks failed.\n\n\
             **Reason:** {reason}\n\n\
             Please fix the failing checks and try again."
        )),
        Help => Feedback {
            kind: FeedbackType::Success,
            body: Some(help_body(config)),
        },
    }
}

/// Merge several outcomes of one invocation into a single reply.
pub fn combine(feedbacks: Vec<Feedback>) -> Feedback {
    if feedbacks.len() <= 1 {
        return feedbacks.into_iter().next().unwrap_or(Feedback {
            kind: FeedbackType::Success,
            body: None,
        });
    }

    let count = |kind| feedbacks.iter().filter(|f| f.kind == kind).count();
    let (errors, warnings, pending) = (
        count(FeedbackType::Error),
        count(FeedbackType::Warning),
        count(FeedbackType::Pending),
    );

    let kind = if errors == feedbacks.len() {
        FeedbackType::Error
    } else if errors == 0 && warnings == 0 && pending > 0 {
        FeedbackType::Pending
    } else if errors == 0 && warnings == 0 {
        FeedbackType::Success
    } else {
        FeedbackType::Warning
    };

    let bodies: Vec<String> = feedbacks.into_iter().filter_map(|f| f.body).collect();
    let body = if bodies.is_empty() {
        None
    } else if kind == FeedbackType::Warning {
        Some(format!("**Partial Success**\n\n{}", bodies.join("\n\n---\n\n")))
    } else {
        Some(bodies.join("\n\n---\n\n"))
    };

    Feedback { kind, body }
}

fn success(quiet: bool, body: String) -> Feedback {
    Feedback {
        kind: FeedbackType::Success,
        body: (!quiet).then_some(body),
    }
}

fn error(body: String) -> Feedback {
    Feedback {
        kind: FeedbackType::Error,
        body: Some(body),
    }
}

fn warning(body: String) -> Feedback {
    Feedback {
        kind: FeedbackType::Warning,
        body: Some(body),
    }
}

fn failure(title: &str, summary: &str, reason: &str, remedy: &str) -> Feedback {
    error(format!(
        "❌ **{title}**\n\n{summary}\n\n**Reason:** {reason}\n\n{remedy}"
    ))
}

fn unauthorized_body(user: &str, approvers: &[String]) -> String {
    if approvers.is_empty() {
        return format!(
            "❌ **Not Authorized**\n\n\
             User `{user}` is not authorized to perform this action.\n\n\
             No approvers are configured in the CODEOWNERS file. \
             Please add approvers to `.github/CODEOWNERS` in the repository root."
        );
    }

    let list = approvers
        .iter()
        .map(|a| format!("- `{a}`"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "❌ **Not Authorized**\n\n\
         User `{user}` is not authorized to perform this action.\n\n\
         **Authorized approvers:**\n{list}\n\n\
         Please contact one of the approvers listed above."
    )
}

fn help_body(config: &BotConfig) -> String {
    let p = &config.command_prefix;
    let name = config.mention_name();
    format!(
        "ℹ️ **Smyklot Bot - Help**\n\n\
         I can help you manage pull requests through simple commands.\n\n\
         **Approval Commands:**\n\
         - `{p}approve` or `@{name} approve` or `approve` - Approve the PR\n\
         - `accept` or `lgtm` - Alternative ways to approve\n\n\
         **Merge Commands:**\n\
         - `{p}merge` or `@{name} merge` or `merge` - Merge the PR\n\
         - `{p}squash` - Squash and merge the PR\n\
         - `{p}rebase` - Rebase and merge the PR\n\n\
         **Merge After CI:**\n\
         - `{p}merge after CI` - Merge after CI passes\n\
         - `{p}squash when green` - Squash after checks are green\n\
         - `{p}rebase once CI passes` - Rebase after CI passes\n\
         - `{p}merge required after CI` - Only wait for required checks\n\
         The bot reacts 👀 and merges automatically when CI succeeds.\n\n\
         **Review Management:**\n\
         - `{p}unapprove` or `disapprove` - Dismiss the bot's approval\n\
         - `{p}cleanup` - Remove the bot's approvals, comments and reactions\n\n\
         **Reactions:**\n\
         - 👍 on a PR approves it, 🚀 merges it, ❤️ cleans up\n\n\
         **Help:**\n\
         - `{p}help` or `@{name} help` or `help` - Show this help message\n\n\
         **Permissions:**\n\
         Only users listed in `.github/CODEOWNERS` can execute commands.\n\n\
         **Note:** All commands are case-insensitive."
    )
}
