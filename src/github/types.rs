use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }

    /// Value of the `PullRequestMergeMethod` GraphQL enum.
    pub fn graphql_name(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "MERGE",
            MergeMethod::Squash => "SQUASH",
            MergeMethod::Rebase => "REBASE",
        }
    }

    /// Next method to try when the repository rejects this one.
    pub fn fallback(&self) -> Option<MergeMethod> {
        match self {
            MergeMethod::Merge => Some(MergeMethod::Squash),
            MergeMethod::Squash => Some(MergeMethod::Rebase),
            MergeMethod::Rebase => None,
        }
    }

    pub(crate) fn to_octocrab(self) -> octocrab::params::pulls::MergeMethod {
        match self {
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        }
    }

    pub fn parse(value: &str) -> Option<MergeMethod> {
        match value {
            "merge" => Some(MergeMethod::Merge),
            "squash" => Some(MergeMethod::Squash),
            "rebase" => Some(MergeMethod::Rebase),
            _ => None,
        }
    }
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeableState {
    Clean,
    Dirty,
    Blocked,
    Unstable,
    Unknown,
}

impl From<octocrab::models::pulls::MergeableState> for MergeableState {
    fn from(state: octocrab::models::pulls::MergeableState) -> Self {
        use octocrab::models::pulls::MergeableState as Remote;
        match state {
            Remote::Clean => MergeableState::Clean,
            Remote::Dirty => MergeableState::Dirty,
            Remote::Blocked => MergeableState::Blocked,
            Remote::Unstable => MergeableState::Unstable,
            _ => MergeableState::Unknown,
        }
    }
}

/// Snapshot of a pull request as the bot needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrView {
    pub number: u64,
    pub state: PrState,
    pub mergeable: bool,
    pub mergeable_state: MergeableState,
    pub author: String,
    pub approvers: Vec<String>,
    pub base_branch: String,
    pub head_sha: String,
    pub labels: Vec<String>,
    pub title: String,
    pub body: String,
}

impl PrView {
    pub fn is_approved_by(&self, user: &str) -> bool {
        self.approvers.iter().any(|approver| approver == user)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ReactionKind {
    #[serde(rename = "+1")]
    ThumbsUp,
    #[serde(rename = "-1")]
    ThumbsDown,
    #[serde(rename = "confused")]
    Confused,
    #[serde(rename = "eyes")]
    Eyes,
    #[serde(rename = "rocket")]
    Rocket,
    #[serde(rename = "heart")]
    Heart,
    #[serde(other)]
    Other,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::ThumbsUp => "+1",
            ReactionKind::ThumbsDown => "-1",
            ReactionKind::Confused => "confused",
            ReactionKind::Eyes => "eyes",
            ReactionKind::Rocket => "rocket",
            ReactionKind::Heart => "heart",
            ReactionKind::Other => "other",
        }
    }
}

/// What a reaction is attached to. Comments and PR descriptions live on different routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Comment(u64),
    PullRequest(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub id: u64,
    pub kind: ReactionKind,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: u64,
    pub author: String,
    pub approved: bool,
}

impl Review {
    pub fn is_approval(&self) -> bool {
        self.approved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// Roll-up of the check runs on one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAggregate {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub summary: String,
}

impl CheckAggregate {
    /// Fold runs into an aggregate. A non-empty `required` set restricts every count,
    /// `total` included, to runs named in it.
    pub fn from_runs(total_count: usize, runs: &[CheckRun], required: &[String]) -> Self {
        let filtered = !required.is_empty();
        let mut total = if filtered { 0 } else { total_count };
        let (mut passed, mut failed, mut in_progress) = (0, 0, 0);

        for run in runs {
            if filtered {
                if !required.iter().any(|name| name == &run.name) {
                    continue;
                }
                total += 1;
            }

            if run.status == "completed" {
                match run.conclusion.as_deref() {
                    Some("success") | Some("skipped") | Some("neutral") => passed += 1,
                    Some("failure") | Some("cancelled") | Some("timed_out")
                    | Some("action_required") => failed += 1,
                    _ => {}
                }
            } else if matches!(
                run.status.as_str(),
                "queued" | "in_progress" | "pending" | "waiting"
            ) {
                in_progress += 1;
            }
        }

        let mut summary = format!("{passed}/{total} checks passing");
        if in_progress > 0 {
            summary.push_str(&format!(", {in_progress} in progress"));
        }
        if failed > 0 {
            summary.push_str(&format!(", {failed} failed"));
        }

        Self {
            total,
            passed,
            failed,
            in_progress,
            summary,
        }
    }

    pub fn all_passing(&self) -> bool {
        self.total > 0 && self.failed == 0 && self.in_progress == 0
    }

    pub fn failing(&self) -> bool {
        self.failed > 0
    }

    pub fn pending(&self) -> bool {
        self.in_progress > 0
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPayload {
    pub login: String,
}
