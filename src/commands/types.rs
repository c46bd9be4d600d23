use crate::github::MergeMethod;

/// Declaration order is the canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    Approve,
    Merge,
    Squash,
    Rebase,
    Unapprove,
    Cleanup,
    Help,
}

impl CommandKind {
    /// Map a vocabulary word to its kind.
    pub fn from_word(word: &str) -> Option<CommandKind> {
        match word {
            "approve" | "accept" | "lgtm" => Some(CommandKind::Approve),
            "merge" => Some(CommandKind::Merge),
            "squash" => Some(CommandKind::Squash),
            "rebase" => Some(CommandKind::Rebase),
            "unapprove" | "disapprove" => Some(CommandKind::Unapprove),
            "cleanup" => Some(CommandKind::Cleanup),
            "help" => Some(CommandKind::Help),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Approve => "approve",
            CommandKind::Merge => "merge",
            CommandKind::Squash => "squash",
            CommandKind::Rebase => "rebase",
            CommandKind::Unapprove => "unapprove",
            CommandKind::Cleanup => "cleanup",
            CommandKind::Help => "help",
        }
    }

    pub fn merge_method(&self) -> Option<MergeMethod> {
        match self {
            CommandKind::Merge => Some(MergeMethod::Merge),
            CommandKind::Squash => Some(MergeMethod::Squash),
            CommandKind::Rebase => Some(MergeMethod::Rebase),
            _ => None,
        }
    }

    pub fn is_merge_family(&self) -> bool {
        self.merge_method().is_some()
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub wait_for_ci: bool,
    pub required_checks_only: bool,
}

/// Everything one comment asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Deduplicated, canonical order.
    pub kinds: Vec<CommandKind>,
    /// Highest-priority kind found: prefix form, then mention, then bare.
    pub primary: Option<CommandKind>,
    pub modifiers: Modifiers,
    pub raw: String,
}

impl Command {
    pub fn empty(raw: &str) -> Self {
        Self {
            kinds: Vec::new(),
            primary: None,
            modifiers: Modifiers::default(),
            raw: raw.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.kinds.is_empty()
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.kinds.contains(&kind)
    }
}
