use http::StatusCode;

/// Crate-wide error type.
///
/// Configuration errors are fatal and surface at the point of use; they are
/// reachable only through missing required settings, never through runtime
/// or network conditions. Everything else is an expected runtime failure
/// that callers may want to branch on.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required endpoint, redirect target, or storage capability is
    /// missing. Expected to be fixed before deploy, not handled.
    #[error("configuration error: {0}")]
    Config(String),

    /// `login()` was called while an identity is already held and
    /// `redirect_if_authenticated` is disabled.
    #[error("user is already authenticated")]
    AlreadyAuthenticated,

    /// `logout()` was called without a held identity.
    #[error("user is not authenticated")]
    NotAuthenticated,

    /// The API answered with a non-success status code.
    #[error("request to {url} failed with status {status}")]
    RequestFailed { url: String, status: StatusCode },

    /// The underlying transport failed before a status was produced.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Shorthand for building a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        AuthError::Config(message.into())
    }

    /// The HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::RequestFailed { status, .. } => Some(*status),
            AuthError::Http(err) => err.status(),
            _ => None,
        }
    }
}
