//! The bot's label alphabet. Labels are the only state kept between invocations.

use crate::github::MergeMethod;

pub const PENDING_CI_PREFIX: &str = "smyklot:pending-ci";
pub const REACTION_APPROVE: &str = "smyklot:reaction-approve";
pub const REACTION_MERGE: &str = "smyklot:reaction-merge";
pub const REACTION_CLEANUP: &str = "smyklot:reaction-cleanup";

const REQUIRED_SUFFIX: &str = "required";

/// A deferred merge request: which method to use and whether only required checks count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMarker {
    pub method: MergeMethod,
    pub required_only: bool,
}

impl PendingMarker {
    pub fn new(method: MergeMethod, required_only: bool) -> Self {
        Self {
            method,
            required_only,
        }
    }

    pub fn label(&self) -> String {
        let mut label = PENDING_CI_PREFIX.to_string();
        if self.method != MergeMethod::Merge {
            label.push(':');
            label.push_str(self.method.as_str());
        }
        if self.required_only {
            label.push(':');
            label.push_str(REQUIRED_SUFFIX);
        }
        label
    }

    /// Decode a label. Anything outside the closed alphabet yields `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let rest = label.strip_prefix(PENDING_CI_PREFIX)?;
        if rest.is_empty() {
            return Some(Self::new(MergeMethod::Merge, false));
        }

        let parts: Vec<&str> = rest.strip_prefix(':')?.split(':').collect();
        match parts.as_slice() {
            [REQUIRED_SUFFIX] => Some(Self::new(MergeMethod::Merge, true)),
            [method] => explicit_method(method).map(|m| Self::new(m, false)),
            [method, REQUIRED_SUFFIX] => explicit_method(method).map(|m| Self::new(m, true)),
            _ => None,
        }
    }

    /// First pending marker in label order. Later ones are left alone.
    pub fn select<S: AsRef<str>>(labels: &[S]) -> Option<Self> {
        labels.iter().find_map(|l| Self::parse(l.as_ref()))
    }

    pub fn is_pending_label(label: &str) -> bool {
        Self::parse(label).is_some()
    }
}

// "merge" is spelled by omission, so `smyklot:pending-ci:merge` is not part of the alphabet.
fn explicit_method(value: &str) -> Option<MergeMethod> {
    match MergeMethod::parse(value) {
        Some(MergeMethod::Merge) | None => None,
        Some(method) => Some(method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_matches_exactly() {
        let cases = [
            (MergeMethod::Merge, false, "smyklot:pending-ci"),
            (MergeMethod::Squash, false, "smyklot:pending-ci:squash"),
            (MergeMethod::Rebase, false, "smyklot:pending-ci:rebase"),
            (MergeMethod::Merge, true, "smyklot:pending-ci:required"),
            (MergeMethod::Squash, true, "smyklot:pending-ci:squash:required"),
            (MergeMethod::Rebase, true, "smyklot:pending-ci:rebase:required"),
        ];
        for (method, required, label) in cases {
            let marker = PendingMarker::new(method, required);
            assert_eq!(marker.label(), label);
            assert_eq!(PendingMarker::parse(label), Some(marker));
        }
    }

    #[test]
    fn foreign_labels_are_not_markers() {
        for label in [
            "bug",
            "smyklot:pending-ci:merge",
            "smyklot:pending-ci:fast",
            "smyklot:pending-ci:required:squash",
            "smyklot:pending-cix",
            REACTION_MERGE,
        ] {
            assert_eq!(PendingMarker::parse(label), None, "{label}");
        }
    }

    #[test]
    fn first_marker_wins() {
        let labels = vec![
            "bug".to_string(),
            "smyklot:pending-ci:rebase".to_string(),
            "smyklot:pending-ci:squash".to_string(),
        ];
        assert_eq!(
            PendingMarker::select(&labels),
            Some(PendingMarker::new(MergeMethod::Rebase, false))
        );
    }
}
