//! GitHub App credentials: sign an app JWT and exchange it for an installation token.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::build_octocrab;
use crate::error::SmyklotError;

#[derive(Clone)]
pub struct AppCredentials {
    /// Client id when available, otherwise the numeric app id. Used as the JWT issuer.
    pub issuer: String,
    pub private_key: String,
    pub installation_id: u64,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("issuer", &self.issuer)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    /// Build from raw values. Returns `Ok(None)` unless the key, the installation and an
    /// issuer id are all present.
    pub fn from_parts(
        private_key: Option<String>,
        client_id: Option<String>,
        app_id: Option<String>,
        installation_id: Option<String>,
    ) -> Result<Option<Self>, SmyklotError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let (Some(private_key), Some(installation)) =
            (non_empty(private_key), non_empty(installation_id))
        else {
            return Ok(None);
        };
        let Some(issuer) = non_empty(client_id).or_else(|| non_empty(app_id)) else {
            return Ok(None);
        };

        let installation_id = installation.trim().parse::<u64>().map_err(|_| {
            SmyklotError::invalid(
                "GITHUB_INSTALLATION_ID",
                format!("'{installation}' is not a numeric installation id"),
            )
        })?;

        Ok(Some(Self {
            issuer,
            private_key,
            installation_id,
        }))
    }

    pub fn from_env() -> Result<Option<Self>, SmyklotError> {
        Self::from_parts(
            std::env::var("GITHUB_APP_PRIVATE_KEY").ok(),
            std::env::var("GITHUB_APP_CLIENT_ID").ok(),
            std::env::var("GITHUB_APP_ID").ok(),
            std::env::var("GITHUB_INSTALLATION_ID").ok(),
        )
    }

    /// RS256 app JWT, backdated a minute for clock drift and valid for nine.
    pub fn sign_jwt(&self) -> Result<String, SmyklotError> {
        #[derive(Debug, Serialize)]
        struct Claims {
            iat: i64,
            exp: i64,
            iss: String,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            iat: now - 60,
            exp: now + 9 * 60,
            iss: self.issuer.clone(),
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            SmyklotError::Unauthorized(format!("GITHUB_APP_PRIVATE_KEY is not a valid RSA key: {e}"))
        })?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SmyklotError::Unauthorized(format!("failed to sign app JWT: {e}")))
    }
}

const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

/// Mint an installation access token for `credentials`.
pub async fn installation_token(
    credentials: &AppCredentials,
    api_base: &str,
) -> Result<String, SmyklotError> {
    let jwt = credentials.sign_jwt()?;

    let crab = build_octocrab(&jwt, api_base, TOKEN_EXCHANGE_TIMEOUT)
        .map_err(|e| SmyklotError::invalid("GITHUB_API_URL", e.to_string()))?;

    let route = format!(
        "/app/installations/{}/access_tokens",
        credentials.installation_id
    );
    let response: InstallationTokenResponse = crab
        .post(route, None::<&()>)
        .await
        .map_err(|e| match e {
            octocrab::Error::GitHub { source, .. } => SmyklotError::Unauthorized(format!(
                "installation token exchange rejected: {}",
                source.message
            )),
            other => SmyklotError::Unauthorized(format!(
                "installation token exchange failed: {other}"
            )),
        })?;

    info!(
        installation_id = credentials.installation_id,
        "Minted installation token"
    );
    Ok(response.token)
}
