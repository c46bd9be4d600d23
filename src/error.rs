use thiserror::Error;

use crate::codeowners::CodeownersError;
use crate::github::errors::ForgeError;

/// Closed classification of everything that can go wrong in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingConfig,
    InvalidInput,
    Unauthorized,
    ForgeTransient,
    ForgePermanent,
    NotFound,
    Parse,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SmyklotError {
    #[error("{}", render_missing(.name, .hint))]
    MissingConfig { name: String, hint: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("{}", render_unauthorized(.0))]
    Unauthorized(String),

    #[error("user `{user}` is not authorized to run commands on this repository")]
    Denied { user: String },

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error("failed to load CODEOWNERS: {0}")]
    Codeowners(#[from] CodeownersError),

    #[error("invalid bot configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{failed} of {total} commands failed")]
    CommandFailed { failed: usize, total: usize },
}

impl SmyklotError {
    pub fn missing(name: &str, hint: &str) -> Self {
        SmyklotError::MissingConfig {
            name: name.to_string(),
            hint: hint.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SmyklotError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SmyklotError::MissingConfig { .. } => ErrorKind::MissingConfig,
            SmyklotError::InvalidInput { .. } => ErrorKind::InvalidInput,
            SmyklotError::Unauthorized(_) | SmyklotError::Denied { .. } => ErrorKind::Unauthorized,
            SmyklotError::Forge(err) => err.kind(),
            SmyklotError::Codeowners(_) | SmyklotError::Config(_) => ErrorKind::Parse,
            SmyklotError::CommandFailed { .. } => ErrorKind::ForgePermanent,
        }
    }
}

fn render_missing(name: &str, hint: &str) -> String {
    let mut out = String::new();
    out.push_str("Smyklot Configuration Error\n");
    out.push_str("───────────────────────────\n");
    out.push_str(&format!("📂 {name} is required but was not provided\n\n"));
    out.push_str("🔧 QUICK FIXES:\n");
    out.push_str(&format!("   → Set the environment variable: export {name}=...\n"));
    out.push_str(&format!("   → {hint}"));
    out
}

fn render_unauthorized(detail: &str) -> String {
    let mut out = String::new();
    out.push_str("GitHub Authentication Error\n");
    out.push_str("──────────────────────────\n");
    out.push_str(&format!("🔑 {detail}\n\n"));
    out.push_str("🔧 QUICK FIXES:\n");
    out.push_str("   → Check GITHUB_APP_PRIVATE_KEY is the PEM key of the app\n");
    out.push_str("   → Check GITHUB_INSTALLATION_ID belongs to this repository\n");
    out.push_str("   → Or pass a token directly: export GITHUB_TOKEN=...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_names_the_variable() {
        let err = SmyklotError::missing("GITHUB_TOKEN", "Pass --token on the command line");
        let text = err.to_string();
        assert!(text.contains("GITHUB_TOKEN is required"));
        assert!(text.contains("QUICK FIXES"));
        assert!(text.contains("Pass --token on the command line"));
        assert_eq!(err.kind(), ErrorKind::MissingConfig);
    }

    #[test]
    fn forge_errors_keep_their_kind() {
        let err: SmyklotError = ForgeError::Cancelled {
            operation: "merge PR".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
