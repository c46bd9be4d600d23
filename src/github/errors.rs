use thiserror::Error;

use crate::error::ErrorKind;

/// A failed call against the forge REST or GraphQL API.
///
/// `status` is zero when no response was received (connect failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub operation: String,
    pub status: u16,
    pub method: String,
    pub path: String,
    pub message: String,
    no_response: bool,
}

impl ApiError {
    pub fn new(
        operation: &str,
        status: u16,
        method: &str,
        path: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            status,
            method: method.to_string(),
            path: path.to_string(),
            message: message.into(),
            no_response: false,
        }
    }

    /// Classify an octocrab failure. GitHub's own error body becomes an [`ApiError`] with
    /// its status; undecodable payloads are [`ForgeError::Decode`]; everything else means
    /// no usable response arrived.
    pub fn from_octocrab(
        operation: &str,
        method: &str,
        path: &str,
        err: octocrab::Error,
    ) -> ForgeError {
        match err {
            octocrab::Error::GitHub { source, .. } => Self::new(
                operation,
                source.status_code.as_u16(),
                method,
                path,
                source.message.clone(),
            )
            .into(),
            octocrab::Error::Serde { source, .. } => ForgeError::Decode {
                operation: operation.to_string(),
                path: path.to_string(),
                detail: source.to_string(),
            },
            octocrab::Error::Json { source, .. } => ForgeError::Decode {
                operation: operation.to_string(),
                path: path.to_string(),
                detail: source.to_string(),
            },
            other => Self::transport(operation, method, path, other.to_string()).into(),
        }
    }

    pub fn transport(operation: &str, method: &str, path: &str, detail: String) -> Self {
        let mut api = Self::new(operation, 0, method, path, detail);
        api.no_response = true;
        api
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Rate limiting, server-side failures and dropped connections.
    pub fn is_transient(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status) || self.no_response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (status: {}) [{} {}]: {}",
            self.operation, self.status, self.method, self.path, self.message
        )
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("{0}")]
    Api(ApiError),

    #[error("{operation}: failed to decode response from {path}: {detail}")]
    Decode {
        operation: String,
        path: String,
        detail: String,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("CODEOWNERS file is too large ({size} bytes, limit {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error(
        "insufficient permissions to check team membership (need read:org or members:read scope): {source}"
    )]
    InsufficientScope { source: ApiError },

    #[error("graphql {operation} failed: {message}")]
    GraphQl { operation: String, message: String },
}

impl From<ApiError> for ForgeError {
    fn from(err: ApiError) -> Self {
        ForgeError::Api(err)
    }
}

impl ForgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::Api(api) if api.is_not_found() => ErrorKind::NotFound,
            ForgeError::Api(api) if api.status == 401 || api.status == 403 => {
                ErrorKind::Unauthorized
            }
            ForgeError::Api(api) if api.is_transient() => ErrorKind::ForgeTransient,
            ForgeError::Api(_) | ForgeError::GraphQl { .. } => ErrorKind::ForgePermanent,
            ForgeError::Decode { .. } | ForgeError::PayloadTooLarge { .. } => ErrorKind::Parse,
            ForgeError::Cancelled { .. } => ErrorKind::Cancelled,
            ForgeError::InvalidInput(_) => ErrorKind::InvalidInput,
            ForgeError::InsufficientScope { .. } => ErrorKind::Unauthorized,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::Api(api) if api.is_transient())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::Api(api) if api.is_not_found())
    }

    /// The remote's own wording, when the forge returned one.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ForgeError::Api(api) => Some(api.message.as_str()),
            ForgeError::GraphQl { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_operation_status_and_route() {
        let err = ApiError::new(
            "merge PR",
            405,
            "PUT",
            "/repos/acme/widgets/pulls/7/merge",
            "Merge commits are not allowed on this repository.",
        );
        assert_eq!(
            err.to_string(),
            "merge PR (status: 405) [PUT /repos/acme/widgets/pulls/7/merge]: Merge commits are not allowed on this repository."
        );
    }

    #[test]
    fn missing_response_is_transient() {
        let err = ApiError::transport("get PR", "GET", "/x", "connection reset".into());
        assert_eq!(err.status, 0);
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn classification_follows_status() {
        let kind = |status| ForgeError::from(ApiError::new("op", status, "GET", "/", "m")).kind();
        assert_eq!(kind(404), ErrorKind::NotFound);
        assert_eq!(kind(403), ErrorKind::Unauthorized);
        assert_eq!(kind(429), ErrorKind::ForgeTransient);
        assert_eq!(kind(503), ErrorKind::ForgeTransient);
        assert_eq!(kind(422), ErrorKind::ForgePermanent);
        assert_eq!(
            ForgeError::Cancelled { operation: "op".into() }.kind(),
            ErrorKind::Cancelled
        );
    }
}
