use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codeowners::{Codeowners, CodeownersError, Owner};
use crate::github::{ForgeError, GitHubClient};

/// Team membership lookups. The gateway implements it; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamMembership: Send + Sync {
    async fn is_team_member(
        &self,
        org: &str,
        slug: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError>;
}

#[async_trait]
impl TeamMembership for GitHubClient {
    async fn is_team_member(
        &self,
        org: &str,
        slug: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        GitHubClient::is_team_member(self, org, slug, user, cancel).await
    }
}

/// Decides who may drive the bot, from the global (`*`) owners of CODEOWNERS.
pub struct PermissionResolver {
    global_owners: Vec<Owner>,
    teams: Option<Arc<dyn TeamMembership>>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("global_owners", &self.global_owners)
            .field("teams", &self.teams.is_some())
            .finish()
    }
}

impl PermissionResolver {
    pub fn new(codeowners: &Codeowners, teams: Option<Arc<dyn TeamMembership>>) -> Self {
        Self {
            global_owners: codeowners.global_owners().to_vec(),
            teams,
        }
    }

    pub fn from_content(content: &str, teams: Option<Arc<dyn TeamMembership>>) -> Self {
        Self::new(&Codeowners::parse(content), teams)
    }

    /// Local file, without team verification.
    pub fn from_path(path: &Path) -> Result<Self, CodeownersError> {
        Ok(Self::new(&Codeowners::from_path(path)?, None))
    }

    /// Fetch CODEOWNERS through the gateway. A missing file resolves to no owners.
    pub async fn from_repository(
        client: Arc<GitHubClient>,
        cancel: &CancellationToken,
    ) -> Result<Self, ForgeError> {
        let content = client.get_codeowners(cancel).await?;
        let codeowners = content.as_deref().map(Codeowners::parse).unwrap_or_default();
        info!(
            owners = codeowners.global_owners().len(),
            found = content.is_some(),
            "Loaded CODEOWNERS"
        );
        let teams: Arc<dyn TeamMembership> = client;
        Ok(Self::new(&codeowners, Some(teams)))
    }

    pub fn has_owners(&self) -> bool {
        !self.global_owners.is_empty()
    }

    /// `path` is accepted for path-scoped rules but not consulted yet.
    pub async fn can_approve(
        &self,
        user: &str,
        _path: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        if user.is_empty() {
            return Ok(false);
        }

        for owner in &self.global_owners {
            match owner {
                Owner::User(name) => {
                    if name == user {
                        return Ok(true);
                    }
                }
                Owner::Team { org, slug } => {
                    let Some(teams) = &self.teams else {
                        debug!(team = %owner, "No gateway for team lookup, skipping");
                        continue;
                    };
                    if teams.is_team_member(org, slug, user, cancel).await? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Global owners as displayed to users.
    pub fn approvers(&self) -> Vec<String> {
        self.global_owners.iter().map(ToString::to_string).collect()
    }
}
