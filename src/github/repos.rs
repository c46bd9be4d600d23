use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::GitHubClient;
use super::errors::ForgeError;

pub const CODEOWNERS_PATH: &str = ".github/CODEOWNERS";
pub const MAX_CODEOWNERS_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct PermissionPayload {
    #[serde(default)]
    permission: String,
}

#[derive(Debug, Deserialize)]
struct MembershipPayload {
    #[serde(default)]
    state: String,
}

impl GitHubClient {
    /// Contents of `.github/CODEOWNERS`, or `None` when the repository has none.
    pub async fn get_codeowners(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ForgeError> {
        let path = self.repo_path(&format!("/contents/{CODEOWNERS_PATH}"));
        let fetched = self
            .with_retry("get CODEOWNERS", "GET", &path, cancel, || async move {
                self.octocrab()
                    .repos(self.owner(), self.repo())
                    .get_content()
                    .path(CODEOWNERS_PATH)
                    .send()
                    .await
            })
            .await;
        let items = match fetched {
            Ok(items) => items.items,
            Err(err) if err.is_not_found() => {
                debug!("Repository has no CODEOWNERS file");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let Some(file) = items.into_iter().next() else {
            return Ok(None);
        };

        let size = usize::try_from(file.size).unwrap_or(0);
        if size >= MAX_CODEOWNERS_BYTES {
            return Err(ForgeError::PayloadTooLarge {
                size,
                limit: MAX_CODEOWNERS_BYTES,
            });
        }

        let encoded: String = file
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD.decode(encoded).map_err(|e| ForgeError::Decode {
            operation: "get CODEOWNERS".into(),
            path: path.clone(),
            detail: format!("invalid base64 content: {e}"),
        })?;

        if bytes.len() >= MAX_CODEOWNERS_BYTES {
            return Err(ForgeError::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_CODEOWNERS_BYTES,
            });
        }

        String::from_utf8(bytes).map(Some).map_err(|e| ForgeError::Decode {
            operation: "get CODEOWNERS".into(),
            path,
            detail: format!("content is not UTF-8: {e}"),
        })
    }

    /// `admin` or `write` collaborator permission. Non-collaborators have none.
    pub async fn has_write_permission(
        &self,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        let path = self.repo_path(&format!("/collaborators/{user}/permission"));
        match self
            .get_route::<PermissionPayload>("get collaborator permission", &path, cancel)
            .await
        {
            Ok(payload) => Ok(matches!(payload.permission.as_str(), "admin" | "write")),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Active membership of `user` in `org/slug`.
    ///
    /// A 403 means the token cannot see team membership at all. That is reported as an
    /// error rather than `false` so missing scopes are noticed instead of silently denying.
    pub async fn is_team_member(
        &self,
        org: &str,
        slug: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        let path = format!("/orgs/{org}/teams/{slug}/memberships/{user}");
        match self
            .get_route::<MembershipPayload>("get team membership", &path, cancel)
            .await
        {
            Ok(payload) => Ok(payload.state == "active"),
            Err(err) if err.is_not_found() => Ok(false),
            Err(ForgeError::Api(api)) if api.status == 403 => {
                Err(ForgeError::InsufficientScope { source: api })
            }
            Err(err) => Err(err),
        }
    }
}
