use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::GitHubClient;
use super::errors::ForgeError;

#[derive(Debug, Default, Deserialize)]
struct RequiredStatusChecksPayload {
    #[serde(default)]
    contexts: Vec<String>,
    #[serde(default)]
    checks: Vec<CheckContextPayload>,
}

#[derive(Debug, Deserialize)]
struct CheckContextPayload {
    context: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProtectionPayload {
    #[serde(default)]
    merge_queue: Option<MergeQueuePayload>,
}

#[derive(Debug, Deserialize)]
struct MergeQueuePayload {
    #[serde(default)]
    enabled: bool,
}

impl GitHubClient {
    /// Names of the status checks branch protection requires. Unprotected branches have none.
    pub async fn get_required_checks(
        &self,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ForgeError> {
        let path = self.repo_path(&format!(
            "/branches/{branch}/protection/required_status_checks"
        ));
        let payload: RequiredStatusChecksPayload =
            match self.get_route("get required checks", &path, cancel).await {
                Ok(payload) => payload,
                Err(err) if err.is_not_found() => return Ok(Vec::new()),
                Err(err) => return Err(err),
            };

        let mut names = payload.contexts;
        for check in payload.checks {
            if !names.contains(&check.context) {
                names.push(check.context);
            }
        }
        Ok(names)
    }

    pub async fn is_merge_queue_enabled(
        &self,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        let path = self.repo_path(&format!("/branches/{branch}/protection"));
        match self
            .get_route::<ProtectionPayload>("get branch protection", &path, cancel)
            .await
        {
            Ok(payload) => Ok(payload.merge_queue.map(|q| q.enabled).unwrap_or(false)),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
