//! Markdown summary for the Actions job page (`GITHUB_STEP_SUMMARY`).

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::BotConfig;

pub const STEP_SUMMARY_VAR: &str = "GITHUB_STEP_SUMMARY";
const BODY_PREVIEW_CHARS: usize = 100;

/// Runtime parameters of one event-mode run, as shown in the summary.
#[derive(Debug, Clone)]
pub struct RunParameters<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub pr_number: u64,
    pub comment_id: u64,
    pub author: &'a str,
    pub action: &'a str,
    pub body: &'a str,
}

static CREDENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(token|key|secret|password|bearer)[:=]\s*\S+")
        .expect("credential regex is valid")
});

/// Mask credential-looking `key: value` pairs and cap the length.
pub fn redact(body: &str) -> String {
    let masked = CREDENTIAL.replace_all(body, "$1: [REDACTED]");
    let single_line = masked.replace(['\r', '\n'], " ");
    if single_line.chars().count() > BODY_PREVIEW_CHARS {
        let cut: String = single_line.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        single_line
    }
}

pub fn render(params: &RunParameters<'_>, config: &BotConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Smyklot\n");
    let _ = writeln!(out, "| Parameter | Value |");
    let _ = writeln!(out, "|-----------|-------|");
    let _ = writeln!(out, "| Repository | `{}/{}` |", params.owner, params.repo);
    let _ = writeln!(out, "| Pull request | #{} |", params.pr_number);
    let _ = writeln!(out, "| Comment | {} ({}) |", params.comment_id, params.action);
    let _ = writeln!(out, "| Author | `{}` |", params.author);
    let _ = writeln!(out, "| Body | `{}` |", redact(params.body).replace('`', "'"));

    let _ = writeln!(out, "\n### Configuration\n");
    let _ = writeln!(out, "| Key | Value |");
    let _ = writeln!(out, "|-----|-------|");
    let flags = [
        ("quiet_success", config.quiet_success),
        ("quiet_reactions", config.quiet_reactions),
        ("quiet_pending", config.quiet_pending),
        ("disable_mentions", config.disable_mentions),
        ("disable_bare_commands", config.disable_bare_commands),
        ("disable_unapprove", config.disable_unapprove),
        ("disable_reactions", config.disable_reactions),
        ("disable_deleted_comments", config.disable_deleted_comments),
        ("allow_self_approval", config.allow_self_approval),
    ];
    for (key, value) in flags {
        let _ = writeln!(out, "| {key} | {value} |");
    }
    let _ = writeln!(out, "| command_prefix | `{}` |", config.command_prefix);
    let allowed = if config.allowed_commands.is_empty() {
        "all".to_string()
    } else {
        config.allowed_commands.join(", ")
    };
    let _ = writeln!(out, "| allowed_commands | {allowed} |");

    if !config.command_aliases.is_empty() {
        let mut aliases: Vec<_> = config.command_aliases.iter().collect();
        aliases.sort();
        let _ = writeln!(out, "\n### Aliases\n");
        for (alias, command) in aliases {
            let _ = writeln!(out, "- `{alias}` → `{command}`");
        }
    }
    out
}

/// Append to `path`. Never fails the run.
pub fn append(path: &Path, params: &RunParameters<'_>, config: &BotConfig) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(render(params, config).as_bytes()));

    match result {
        Ok(()) => debug!(path = %path.display(), "Wrote step summary"),
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to write step summary"),
    }
}

/// Append to the file named by `GITHUB_STEP_SUMMARY`, if any.
pub fn write_step_summary(params: &RunParameters<'_>, config: &BotConfig) {
    if let Ok(path) = std::env::var(STEP_SUMMARY_VAR) {
        if !path.trim().is_empty() {
            append(Path::new(&path), params, config);
        }
    }
}
