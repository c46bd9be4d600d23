use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::ConfigOverrides;
use crate::error::SmyklotError;
use crate::github::auth::{installation_token, AppCredentials};

pub mod event;
pub mod poll;

pub use event::{EventArgs, EventCommand};
pub use poll::{PollArgs, PollCommand};

#[derive(Parser, Debug)]
#[command(name = "smyklot")]
#[command(about = "Pull request bot driven by comment commands and reactions")]
#[command(long_about = "Smyklot reads a pull request comment and carries out the commands in it \
                       (approve, merge, squash, rebase, unapprove, cleanup, help) on behalf of the \
                       repository's code owners. Run without a subcommand for one comment event; \
                       run 'smyklot poll' on a schedule to finish merges waiting for CI.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub event: EventArgs,

    #[command(flatten)]
    pub config: ConfigFlags,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Complete deferred merges and act on PR reactions across all open pull requests
    Poll(PollArgs),
}

/// Bot configuration given on the command line. These win over `SMYKLOT_*` and `SMYKLOT_CONFIG`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigFlags {
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Only react on success, without a comment")]
    pub quiet_success: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "No comments for reaction-triggered actions")]
    pub quiet_reactions: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "No 'waiting for CI' comment")]
    pub quiet_pending: Option<bool>,

    #[arg(long, global = true, value_delimiter = ',', help = "Comma-separated list of commands that may be used")]
    pub allowed_commands: Option<Vec<String>>,

    #[arg(long = "command-alias", global = true, value_parser = parse_alias, help = "Alias as alias=command; repeat for more")]
    pub command_aliases: Vec<(String, String)>,

    #[arg(long, global = true, help = "Prefix of slash-style commands")]
    pub command_prefix: Option<String>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Ignore @mention commands")]
    pub disable_mentions: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Ignore bare command words")]
    pub disable_bare_commands: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Do not recognise unapprove")]
    pub disable_unapprove: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Do not treat reactions as commands")]
    pub disable_reactions: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Do not report deleted command comments")]
    pub disable_deleted_comments: Option<bool>,

    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", help = "Let PR authors approve their own pull requests")]
    pub allow_self_approval: Option<bool>,
}

impl ConfigFlags {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            quiet_success: self.quiet_success,
            quiet_reactions: self.quiet_reactions,
            quiet_pending: self.quiet_pending,
            allowed_commands: self.allowed_commands.clone(),
            command_aliases: (!self.command_aliases.is_empty())
                .then(|| self.command_aliases.iter().cloned().collect()),
            command_prefix: self.command_prefix.clone(),
            disable_mentions: self.disable_mentions,
            disable_bare_commands: self.disable_bare_commands,
            disable_unapprove: self.disable_unapprove,
            disable_reactions: self.disable_reactions,
            disable_deleted_comments: self.disable_deleted_comments,
            allow_self_approval: self.allow_self_approval,
        }
    }
}

fn parse_alias(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((alias, command)) if !alias.trim().is_empty() && !command.trim().is_empty() => {
            Ok((alias.trim().to_lowercase(), command.trim().to_lowercase()))
        }
        _ => Err(format!("expected alias=command, got '{value}'")),
    }
}

/// Token for the API: a minted installation token when app credentials are configured,
/// otherwise the explicit one.
pub async fn resolve_token(
    explicit: Option<&str>,
    api_base: &str,
) -> Result<String, SmyklotError> {
    if let Some(credentials) = AppCredentials::from_env()? {
        let token = installation_token(&credentials, api_base).await?;
        info!(installation = credentials.installation_id, "Using app installation token");
        return Ok(token);
    }

    explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            SmyklotError::missing(
                "GITHUB_TOKEN",
                "Or configure GITHUB_APP_PRIVATE_KEY, GITHUB_APP_CLIENT_ID and GITHUB_INSTALLATION_ID",
            )
        })
}

/// Owner or repository name as accepted by the API.
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
