use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use super::{is_valid_name, resolve_token};
use crate::config::BotConfig;
use crate::error::SmyklotError;
use crate::executor::{CommentAction, CommentEvent, Executor};
use crate::github::comments::MAX_COMMENT_BYTES;
use crate::github::{ClientOptions, GitHubClient};
use crate::permissions::PermissionResolver;
use crate::summary::{self, RunParameters};
use crate::telemetry::{generate_correlation_id, invocation_span};

/// The comment event, normally filled from the workflow's environment.
#[derive(Args, Debug, Clone, Default)]
pub struct EventArgs {
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, help = "API token")]
    pub token: Option<String>,

    #[arg(long, env = "COMMENT_BODY", hide_env_values = true, help = "Body of the comment")]
    pub comment_body: Option<String>,

    #[arg(long, env = "COMMENT_ID", help = "Id of the comment")]
    pub comment_id: Option<String>,

    #[arg(long, env = "PR_NUMBER", help = "Pull request number")]
    pub pr_number: Option<String>,

    #[arg(long, env = "REPO_OWNER", help = "Repository owner")]
    pub repo_owner: Option<String>,

    #[arg(long, env = "REPO_NAME", help = "Repository name")]
    pub repo_name: Option<String>,

    #[arg(long, env = "COMMENT_AUTHOR", help = "Login of the comment author")]
    pub comment_author: Option<String>,

    #[arg(long, env = "COMMENT_ACTION", help = "Webhook action: created, edited or deleted")]
    pub comment_action: Option<String>,
}

/// Event inputs after validation.
#[derive(Debug, Clone)]
pub struct EventInputs {
    pub owner: String,
    pub repo: String,
    pub event: CommentEvent,
    pub action: String,
}

impl EventArgs {
    pub fn validate(&self) -> Result<EventInputs, SmyklotError> {
        // A blank body is a real comment with nothing to do, not a missing input.
        let body = self
            .comment_body
            .as_deref()
            .ok_or_else(|| SmyklotError::missing("COMMENT_BODY", "Pass --comment-body"))?;
        let comment_id = required(&self.comment_id, "COMMENT_ID", "Pass --comment-id")?;
        let pr_number = required(&self.pr_number, "PR_NUMBER", "Pass --pr-number")?;
        let owner = required(&self.repo_owner, "REPO_OWNER", "Pass --repo-owner")?;
        let repo = required(&self.repo_name, "REPO_NAME", "Pass --repo-name")?;
        let author = required(&self.comment_author, "COMMENT_AUTHOR", "Pass --comment-author")?;

        if body.len() > MAX_COMMENT_BYTES {
            return Err(SmyklotError::invalid(
                "COMMENT_BODY",
                format!("{} bytes exceeds the {MAX_COMMENT_BYTES} byte limit", body.len()),
            ));
        }
        for (field, value) in [("REPO_OWNER", owner), ("REPO_NAME", repo)] {
            if !is_valid_name(value) {
                return Err(SmyklotError::invalid(
                    field,
                    format!("'{value}' may only contain letters, digits, '.', '_' and '-'"),
                ));
            }
        }

        let action = self.comment_action.clone().unwrap_or_default();
        Ok(EventInputs {
            owner: owner.to_string(),
            repo: repo.to_string(),
            event: CommentEvent {
                pr_number: positive(pr_number, "PR_NUMBER")?,
                comment_id: positive(comment_id, "COMMENT_ID")?,
                author: author.to_string(),
                body: body.to_string(),
                action: CommentAction::parse(&action),
            },
            action: if action.is_empty() {
                "created".to_string()
            } else {
                action
            },
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &str,
    hint: &str,
) -> Result<&'a str, SmyklotError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SmyklotError::missing(name, hint))
}

fn positive(value: &str, field: &str) -> Result<u64, SmyklotError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SmyklotError::invalid(
            field,
            format!("'{value}' is not a positive integer"),
        )),
    }
}

/// Handle one comment event.
pub struct EventCommand {
    args: EventArgs,
    config: BotConfig,
}

impl EventCommand {
    pub fn new(args: EventArgs, config: BotConfig) -> Self {
        Self { args, config }
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<(), SmyklotError> {
        let inputs = self.args.validate()?;

        let correlation_id = generate_correlation_id();
        let span = invocation_span("event", &inputs.owner, &inputs.repo, &correlation_id);

        async {
            info!(
                pr = inputs.event.pr_number,
                comment = inputs.event.comment_id,
                author = %inputs.event.author,
                action = %inputs.action,
                "Handling comment event"
            );
            summary::write_step_summary(
                &RunParameters {
                    owner: &inputs.owner,
                    repo: &inputs.repo,
                    pr_number: inputs.event.pr_number,
                    comment_id: inputs.event.comment_id,
                    author: &inputs.event.author,
                    action: &inputs.action,
                    body: &inputs.event.body,
                },
                &self.config,
            );

            let options = ClientOptions::from_env();
            let token = resolve_token(self.args.token.as_deref(), &options.base_url).await?;
            let client = Arc::new(GitHubClient::with_options(
                &token,
                &inputs.owner,
                &inputs.repo,
                options,
            )?);

            run_event(client, &self.config, &inputs.event, cancel).await
        }
        .instrument(span)
        .await
    }
}

/// Load CODEOWNERS and run the executor on one event.
pub async fn run_event(
    client: Arc<GitHubClient>,
    config: &BotConfig,
    event: &CommentEvent,
    cancel: &CancellationToken,
) -> Result<(), SmyklotError> {
    if event.action != CommentAction::Deleted && event.body.trim().is_empty() {
        debug!(pr = event.pr_number, comment = event.comment_id, "Blank comment, nothing to do");
        return Ok(());
    }
    let resolver = PermissionResolver::from_repository(client.clone(), cancel).await?;
    let executor = Executor::new(&client, config, &resolver, cancel)?;
    executor.handle_comment(event).await
}
