use async_trait::async_trait;
use tracing::debug;

use super::{FetchContext, Interceptor};
use crate::context::AppContext;
use crate::error::AuthError;
use crate::storage::TokenStorage;
use crate::utils::headers::append_headers;

/// Token-mode request interceptor: reads the active token storage and
/// attaches the bearer header. A missing storage is a configuration error
/// surfaced at request time; a missing token just means the visitor is
/// anonymous.
pub struct RequestTokenHeader;

#[async_trait]
impl Interceptor for RequestTokenHeader {
    fn get_name(&self) -> &str {
        "token:request-token-header"
    }

    async fn handle(&self, ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        let Some(storage) = ctx.token_storage() else {
            return Err(AuthError::config("token storage is not configured"));
        };

        let Some(token) = storage.get(ctx).await else {
            debug!(
                "[request] authentication token is not set in '{}' storage",
                storage.get_name()
            );
            return Ok(());
        };

        debug!("[request] add authentication token header");
        let bearer = format!("Bearer {token}");
        fetch.request.headers = append_headers(
            Some(&fetch.request.headers),
            &[("authorization", bearer.as_str())],
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, ModuleOptions};
    use crate::context::{AppConfig, Environment, NoopNavigator};
    use crate::storage::CookieTokenStorage;
    use http::Method;
    use std::sync::Arc;

    fn context(with_storage: bool) -> AppContext {
        let options = ModuleOptions {
            mode: Mode::Token,
            ..ModuleOptions::default()
        };
        let ctx = AppContext::new(options, Arc::new(NoopNavigator), Environment::Client);
        if with_storage {
            ctx.with_app_config(AppConfig {
                token_storage: Some(Arc::new(CookieTokenStorage::new())),
                ..AppConfig::default()
            })
        } else {
            ctx
        }
    }

    #[tokio::test]
    async fn missing_storage_is_a_configuration_error() {
        let ctx = context(false);
        let mut fetch = FetchContext::new(Method::GET, "http://api/user".to_string(), None);

        let result = RequestTokenHeader.handle(&ctx, &mut fetch).await;

        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[tokio::test]
    async fn missing_token_leaves_headers_untouched() {
        let ctx = context(true);
        let mut fetch = FetchContext::new(Method::GET, "http://api/user".to_string(), None);

        RequestTokenHeader.handle(&ctx, &mut fetch).await.unwrap();

        assert!(fetch.request.headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn stored_token_becomes_a_bearer_header() {
        let ctx = context(true);
        CookieTokenStorage::new()
            .set(&ctx, Some("abc123".to_string()))
            .await;
        let mut fetch = FetchContext::new(Method::GET, "http://api/user".to_string(), None);

        RequestTokenHeader.handle(&ctx, &mut fetch).await.unwrap();

        assert_eq!(
            fetch.request.headers.get("authorization").unwrap(),
            "Bearer abc123"
        );
    }
}
