use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::errors::{ApiError, ForgeError};
use super::retry::{RetryHandler, RetryPolicy};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Transport settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
    pub burst: u32,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            // One invocation touches a single PR or sweeps a handful; bursts cover that,
            // the sustained rate keeps long sweeps under the hourly quota.
            requests_per_second: 5,
            burst: 20,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Defaults, with the API base taken from `GITHUB_API_URL` when set (GHES runners set it).
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(url) = std::env::var("GITHUB_API_URL") {
            if !url.trim().is_empty() {
                options.base_url = url;
            }
        }
        options
    }
}

/// Build an octocrab instance authenticated with `token` against `base_url`.
///
/// Retries are left to [`RetryHandler`] so every call gets the same policy and cancellation.
pub(crate) fn build_octocrab(
    token: &str,
    base_url: &str,
    timeout: Duration,
) -> Result<Octocrab, ForgeError> {
    let mut builder = Octocrab::builder()
        .personal_token(token.to_string())
        .add_retry_config(RetryConfig::None)
        .set_connect_timeout(Some(timeout))
        .set_read_timeout(Some(timeout));

    let base_url = base_url.trim_end_matches('/');
    if base_url != DEFAULT_API_URL {
        builder = builder
            .base_uri(base_url)
            .map_err(|e| ForgeError::InvalidInput(format!("invalid API base URL '{base_url}': {e}")))?;
    }

    builder
        .build()
        .map_err(|e| ForgeError::InvalidInput(format!("failed to build GitHub client: {e}")))
}

/// Rate-limited, cancellable client for one repository.
///
/// Operations are grouped by API area in sibling modules (`pulls`, `comments`, `issues`, ...).
pub struct GitHubClient {
    octocrab: Octocrab,
    limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
    owner: String,
    repo: String,
    retry: RetryHandler,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self, ForgeError> {
        Self::with_options(token, owner, repo, ClientOptions::from_env())
    }

    pub fn with_options(
        token: &str,
        owner: &str,
        repo: &str,
        options: ClientOptions,
    ) -> Result<Self, ForgeError> {
        if token.trim().is_empty() {
            return Err(ForgeError::InvalidInput("token must not be empty".into()));
        }
        let octocrab = build_octocrab(token, &options.base_url, options.timeout)?;

        let per_second = NonZeroU32::new(options.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(options.burst).unwrap_or(per_second);
        let limiter = Arc::new(RateLimiter::direct(
            Quota::per_second(per_second).allow_burst(burst),
        ));

        Ok(Self {
            octocrab,
            limiter,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            retry: RetryHandler::new(options.retry),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }

    /// `/repos/{owner}/{repo}{suffix}`
    pub(crate) fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{}", self.owner, self.repo, suffix)
    }

    /// One attempt of an octocrab call: rate limited, raced against cancellation.
    /// `method` and `route` only label errors and logs.
    pub(crate) async fn once<T, Fut>(
        &self,
        operation: &str,
        method: &str,
        route: &str,
        cancel: &CancellationToken,
        call: Fut,
    ) -> Result<T, ForgeError>
    where
        Fut: Future<Output = Result<T, octocrab::Error>>,
    {
        let attempt = async {
            self.limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
                .await;
            debug!(operation, method, route, "GitHub API request");
            call.await
                .map_err(|e| ApiError::from_octocrab(operation, method, route, e))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ForgeError::Cancelled { operation: operation.to_string() }),
            result = attempt => result,
        }
    }

    /// Like [`once`](Self::once), retried on transient failures. `call` builds a fresh
    /// request for every attempt.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        method: &str,
        route: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, octocrab::Error>>,
    {
        self.retry
            .execute(operation, cancel, || {
                self.once(operation, method, route, cancel, call())
            })
            .await
    }

    /// GET a route octocrab has no typed handler for, decoded into a narrow payload.
    pub(crate) async fn get_route<T: DeserializeOwned>(
        &self,
        operation: &str,
        route: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ForgeError> {
        self.with_retry(operation, "GET", route, cancel, || async move {
            self.octocrab.get(route, None::<&()>).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repo_path_is_scoped_to_repository() {
        let client = GitHubClient::with_options("t", "acme", "widgets", ClientOptions::default())
            .unwrap();
        assert_eq!(client.repo_path("/pulls/3"), "/repos/acme/widgets/pulls/3");
    }

    #[tokio::test]
    async fn trailing_slash_is_trimmed_from_base_url() {
        let options = ClientOptions {
            base_url: "http://localhost:9999/".into(),
            ..ClientOptions::default()
        };
        let client = GitHubClient::with_options("t", "a", "b", options).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999");
    }

    #[tokio::test]
    async fn debug_output_never_shows_the_token() {
        let client =
            GitHubClient::with_options("ghp_secret", "a", "b", ClientOptions::default()).unwrap();
        assert!(!format!("{client:?}").contains("ghp_secret"));
    }

    #[test]
    fn empty_token_is_refused() {
        let err = GitHubClient::with_options("  ", "a", "b", ClientOptions::default()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput(_)));
    }

    #[test]
    fn default_transport_limits() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.retry.max_attempts, 3);
    }
}
