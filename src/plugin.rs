//! Application bootstrap.
//!
//! Wires the client factory and the default token storage together once at
//! startup, and optionally performs the eager identity fetch.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::client::HttpClient;
use crate::config::Mode;
use crate::context::AppContext;
use crate::error::AuthError;
use crate::storage::CookieTokenStorage;

/// Builds the shared HTTP client for the given context, installing the
/// cookie-backed token storage when token mode has none, and eagerly
/// fetching the identity when `client.initial_request` is set.
pub async fn setup(ctx: &Arc<AppContext>) -> Result<Arc<HttpClient>, AuthError> {
    let options = ctx.options();

    if options.mode == Mode::Token && ctx.token_storage().is_none() {
        debug!("token storage is not defined, switching to default cookie storage");
        ctx.install_token_storage(Arc::new(CookieTokenStorage::new()));
    }

    let client = Arc::new(HttpClient::new(ctx)?);

    if options.client.initial_request {
        initial_identity_load(ctx, &client).await?;
    }

    let mode = match options.mode {
        Mode::Cookie => "cookie",
        Mode::Token => "token",
    };
    if options.global_middleware.enabled {
        info!("auth layer initialized in {} mode with global middleware", mode);
    } else {
        info!("auth layer initialized in {} mode w/o global middleware", mode);
    }

    Ok(client)
}

/// One-shot identity fetch at bootstrap. 401/419 only mean "not logged in
/// yet"; any other failure is logged and startup continues.
async fn initial_identity_load(ctx: &AppContext, client: &HttpClient) -> Result<(), AuthError> {
    if ctx.user().is_some() || ctx.identity_loaded() {
        return Ok(());
    }

    ctx.set_identity_loaded();
    debug!("fetching user identity on plugin initialization");

    let options = ctx.options();
    let Some(endpoint) = &options.endpoints.user else {
        return Err(AuthError::config("`endpoints.user` is not configured"));
    };

    match client.get_json::<Value>(ctx, endpoint).await {
        Ok(user) => ctx.set_user(Some(user)),
        Err(err) => handle_identity_load_error(&err),
    }

    Ok(())
}

fn handle_identity_load_error(err: &AuthError) {
    match err.status().map(|status| status.as_u16()) {
        Some(status @ (401 | 419)) => {
            debug!("user is not authenticated on plugin initialization, status: {}", status);
        }
        _ => error!("unable to load user identity from API: {}", err),
    }
}
