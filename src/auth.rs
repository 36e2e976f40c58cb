//! The authentication facade.
//!
//! Exposes the login/logout/identity state machine on top of the identity
//! state cells and the shared HTTP client. Two states exist: anonymous
//! (user is null) and authenticated (user is non-null), with a one-shot
//! `identity_loaded` flag gating initialization.

use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::client::HttpClient;
use crate::config::{Mode, RedirectTarget};
use crate::context::{AppContext, Navigation};
use crate::error::AuthError;
use crate::storage::TokenStorage;
use crate::utils::formatter::trim_trailing_slash;

/// Body shape the login endpoint answers with. Only token mode cares.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
}

/// Authentication methods for the host application.
pub struct Auth {
    ctx: Arc<AppContext>,
    client: Arc<HttpClient>,
}

impl Auth {
    pub fn new(ctx: Arc<AppContext>, client: Arc<HttpClient>) -> Self {
        Auth { ctx, client }
    }

    pub fn is_authenticated(&self) -> bool {
        self.ctx.user().is_some()
    }

    /// The current user deserialized as `T`, or `None` while anonymous.
    pub fn user<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.ctx
            .user()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// One-time identity fetch for hosts that disabled the eager request at
    /// bootstrap. A no-op once the identity has been loaded; the flag stays
    /// set even when the fetch fails, so the call never repeats.
    ///
    /// Two `init` calls overlapping before the first one's fetch resolves
    /// can both hit the user endpoint; the flag is set before the await so
    /// the window is a single suspension point. Known gap, not mitigated.
    pub async fn init(&self) -> Result<(), AuthError> {
        if self.ctx.identity_loaded() {
            return Ok(());
        }

        self.ctx.set_identity_loaded();
        self.refresh_identity().await
    }

    /// Fetches the current user from the API and overwrites the identity
    /// state unconditionally. Fetch errors propagate to the caller.
    pub async fn refresh_identity(&self) -> Result<(), AuthError> {
        let options = self.ctx.options();
        let Some(endpoint) = &options.endpoints.user else {
            return Err(AuthError::config("`endpoints.user` is not configured"));
        };

        let user: Value = self.client.get_json(&self.ctx, endpoint).await?;
        self.ctx.set_user(Some(user));
        Ok(())
    }

    /// Submits credentials to the login endpoint, persists the returned
    /// token in token mode, refreshes the identity, and runs the post-login
    /// redirect rules.
    pub async fn login(&self, credentials: Value) -> Result<(), AuthError> {
        let options = self.ctx.options();
        let route = self.ctx.route();
        let current_path = trim_trailing_slash(&route.path).to_string();

        if self.is_authenticated() {
            if !options.redirect_if_authenticated {
                return Err(AuthError::AlreadyAuthenticated);
            }

            return self
                .redirect_to(&options.redirect.on_login, "redirect.on_login", &current_path)
                .await;
        }

        let Some(endpoint) = &options.endpoints.login else {
            return Err(AuthError::config("`endpoints.login` is not configured"));
        };

        let response = self
            .client
            .request(&self.ctx, Method::POST, endpoint, Some(credentials))
            .await?;

        if options.mode == Mode::Token {
            let Some(storage) = self.ctx.token_storage() else {
                return Err(AuthError::config("token storage is not configured"));
            };

            let body: TokenResponse = response.json()?;
            let Some(token) = body.token else {
                return Err(AuthError::config("token was not returned from the API"));
            };

            storage.set(&self.ctx, Some(token)).await;
        }

        self.refresh_identity().await?;

        if options.redirect.keep_requested_route {
            if let Some(requested) = route.query.get("redirect") {
                if trim_trailing_slash(requested) != current_path {
                    debug!("navigating to originally requested route '{}'", requested);
                    self.ctx.navigate(Navigation::to(requested.clone())).await;
                    return Ok(());
                }
            }
        }

        self.redirect_to(&options.redirect.on_login, "redirect.on_login", &current_path)
            .await
    }

    /// Calls the logout endpoint, clears the identity (only after the call
    /// resolves), drops the stored token in token mode, and runs the
    /// post-logout redirect rules.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let options = self.ctx.options();
        let current_path = trim_trailing_slash(&self.ctx.route().path).to_string();

        let Some(endpoint) = &options.endpoints.logout else {
            return Err(AuthError::config("`endpoints.logout` is not configured"));
        };

        self.client
            .request(&self.ctx, Method::POST, endpoint, None)
            .await?;

        self.ctx.set_user(None);

        if options.mode == Mode::Token {
            let Some(storage) = self.ctx.token_storage() else {
                return Err(AuthError::config("token storage is not configured"));
            };

            storage.set(&self.ctx, None).await;
        }

        self.redirect_to(&options.redirect.on_logout, "redirect.on_logout", &current_path)
            .await
    }

    /// Applies the shared redirect-target rules: an unconfigured target is
    /// fatal, a disabled target or one equal to the current path is a no-op,
    /// anything else navigates.
    async fn redirect_to(
        &self,
        target: &Option<RedirectTarget>,
        option_name: &str,
        current_path: &str,
    ) -> Result<(), AuthError> {
        let Some(target) = target else {
            return Err(AuthError::config(format!("`{option_name}` is not configured")));
        };

        let Some(path) = target.as_path() else {
            return Ok(());
        };

        if trim_trailing_slash(path) == current_path {
            return Ok(());
        }

        self.ctx.navigate(Navigation::to(path)).await;
        Ok(())
    }
}
