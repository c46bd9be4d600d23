use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::GitHubClient;
use super::errors::ForgeError;
use super::types::{CheckAggregate, CheckRun};

#[derive(Debug, Deserialize)]
pub struct CheckRunList {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

impl GitHubClient {
    pub async fn get_check_runs(
        &self,
        sha: &str,
        cancel: &CancellationToken,
    ) -> Result<CheckRunList, ForgeError> {
        let path = self.repo_path(&format!("/commits/{sha}/check-runs?per_page=100"));
        self.get_route("get check runs", &path, cancel).await
    }

    /// Check runs on `sha` folded into an aggregate, restricted to `required` when non-empty.
    pub async fn check_aggregate(
        &self,
        sha: &str,
        required: &[String],
        cancel: &CancellationToken,
    ) -> Result<CheckAggregate, ForgeError> {
        let list = self.get_check_runs(sha, cancel).await?;
        Ok(CheckAggregate::from_runs(
            list.total_count,
            &list.check_runs,
            required,
        ))
    }
}
