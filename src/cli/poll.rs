use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::{is_valid_name, resolve_token};
use crate::config::BotConfig;
use crate::controller::{DeferredMergeController, PollReport};
use crate::error::SmyklotError;
use crate::executor::Executor;
use crate::github::{ClientOptions, GitHubClient, ReactionTarget};
use crate::permissions::PermissionResolver;
use crate::telemetry::{generate_correlation_id, invocation_span, pr_span};

#[derive(Args, Debug, Clone, Default)]
pub struct PollArgs {
    /// Repository as owner/name. Falls back to REPO_OWNER and REPO_NAME.
    #[arg(short = 'r', long = "repo")]
    pub repo: Option<String>,

    #[arg(short = 't', long = "token", env = "GITHUB_TOKEN", hide_env_values = true, help = "API token")]
    pub token: Option<String>,
}

impl PollArgs {
    /// `(owner, name)` from `--repo`, or from `fallback` (the REPO_OWNER/REPO_NAME pair).
    pub fn repository(
        &self,
        fallback: (Option<String>, Option<String>),
    ) -> Result<(String, String), SmyklotError> {
        let (owner, name) = match self.repo.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(repo) => match repo.split_once('/') {
                Some((owner, name)) => (owner.to_string(), name.to_string()),
                None => {
                    return Err(SmyklotError::invalid(
                        "repo",
                        format!("'{repo}' is not in owner/name form"),
                    ))
                }
            },
            None => match fallback {
                (Some(owner), Some(name)) if !owner.trim().is_empty() && !name.trim().is_empty() => {
                    (owner.trim().to_string(), name.trim().to_string())
                }
                _ => {
                    return Err(SmyklotError::missing(
                        "REPO_OWNER",
                        "Pass --repo owner/name, or set REPO_OWNER and REPO_NAME",
                    ))
                }
            },
        };

        for value in [&owner, &name] {
            if !is_valid_name(value) {
                return Err(SmyklotError::invalid(
                    "repo",
                    format!("'{owner}/{name}' is not a valid repository"),
                ));
            }
        }
        Ok((owner, name))
    }
}

/// One scheduled sweep over a repository's open pull requests.
pub struct PollCommand {
    args: PollArgs,
    config: BotConfig,
}

impl PollCommand {
    pub fn new(args: PollArgs, config: BotConfig) -> Self {
        Self { args, config }
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<PollReport, SmyklotError> {
        let (owner, name) = self.args.repository((
            std::env::var("REPO_OWNER").ok(),
            std::env::var("REPO_NAME").ok(),
        ))?;

        let correlation_id = generate_correlation_id();
        let span = invocation_span("poll", &owner, &name, &correlation_id);

        async {
            let options = ClientOptions::from_env();
            let token = resolve_token(self.args.token.as_deref(), &options.base_url).await?;
            let client = Arc::new(GitHubClient::with_options(&token, &owner, &name, options)?);
            sweep(client, &self.config, cancel).await
        }
        .instrument(span)
        .await
    }
}

/// Reactions on every open PR first, then the pending merges.
///
/// Only failing to load CODEOWNERS or to list PRs is an error; per-PR failures are logged.
pub async fn sweep(
    client: Arc<GitHubClient>,
    config: &BotConfig,
    cancel: &CancellationToken,
) -> Result<PollReport, SmyklotError> {
    let resolver = PermissionResolver::from_repository(client.clone(), cancel).await?;
    let prs = client.list_open_prs(cancel).await?;
    info!(open = prs.len(), "Listed open pull requests");

    if config.disable_reactions {
        info!("Reaction commands disabled");
    } else {
        let executor = Executor::new(&client, config, &resolver, cancel)?;
        for pr in &prs {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(err) = executor
                .handle_reactions(pr.number, ReactionTarget::PullRequest(pr.number))
                .instrument(pr_span(pr.number))
                .await
            {
                warn!(pr = pr.number, error = %err, "Failed to process reactions");
            }
        }
    }

    let report = DeferredMergeController::new(&client, config, cancel)
        .run(&prs)
        .await;
    Ok(report)
}
