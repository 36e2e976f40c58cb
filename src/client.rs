//! HTTP client factory.
//!
//! Builds the one fetch client the whole layer shares: base URL handling,
//! the interceptor chains for the active mode, the credentials guard, retry
//! normalization, and the global 401/419 response-error hook.

use http::Method;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::ModuleOptions;
use crate::context::{AppContext, Navigation};
use crate::error::AuthError;
use crate::interceptors::{build_chains, FetchContext, Interceptor, ResponseParts};
use std::sync::Arc;

/// Joins the configured base URL with an endpoint path.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Credential-inclusion mode for the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    Include,
}

/// Some fetch backends (e.g. worker runtimes) have no credential support at
/// all; the mode is then omitted entirely and cookies never ride along.
fn determine_credentials_mode(ctx: &AppContext) -> Option<CredentialsMode> {
    if !ctx.supports_credentials() {
        return None;
    }

    Some(CredentialsMode::Include)
}

/// The shared fetch client. Construct once at bootstrap via
/// [`crate::plugin::setup`] and pass around by `Arc`.
pub struct HttpClient {
    http: reqwest::Client,
    options: Arc<ModuleOptions>,
    request_chain: Vec<Arc<dyn Interceptor>>,
    response_chain: Vec<Arc<dyn Interceptor>>,
    credentials: Option<CredentialsMode>,
    retry: u32,
}

impl HttpClient {
    pub fn new(ctx: &AppContext) -> Result<Self, AuthError> {
        let options = ctx.options();
        let (request_chain, response_chain) = build_chains(ctx);

        // Upstream 3xx responses are handed back to the caller untouched.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(HttpClient {
            http,
            retry: options.client.retry.normalized(),
            credentials: determine_credentials_mode(ctx),
            options,
            request_chain,
            response_chain,
        })
    }

    /// Issues a request through the interceptor pipeline.
    ///
    /// Request interceptors run strictly in registration order, then the
    /// request is sent (with up to `retry` re-sends on transport errors and
    /// 5xx responses), then response interceptors run. Statuses >= 400
    /// surface as [`AuthError::RequestFailed`] after the global error hook
    /// has seen them; 3xx responses are returned for the caller to handle.
    pub async fn request(
        &self,
        ctx: &AppContext,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ResponseParts, AuthError> {
        let url = join_url(&self.options.base_url, path);
        let mut fetch = FetchContext::new(method, url.clone(), body);

        for interceptor in &self.request_chain {
            if let Err(err) = interceptor.handle(ctx, &mut fetch).await {
                warn!("request interceptor '{}' failed: {}", interceptor.get_name(), err);
                return Err(err);
            }
        }

        if self.credentials.is_none() {
            fetch.request.headers.remove("cookie");
        }

        trace!("request headers for '{}': {:?}", url, fetch.request.headers);

        let response = self.send_with_retry(&fetch).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        fetch.response = Some(ResponseParts {
            status,
            headers,
            body,
        });

        for interceptor in &self.response_chain {
            if let Err(err) = interceptor.handle(ctx, &mut fetch).await {
                warn!("response interceptor '{}' failed: {}", interceptor.get_name(), err);
                return Err(err);
            }
        }

        trace!("response headers for '{}': {:?}", url, fetch.response.as_ref().map(|r| &r.headers));

        // interceptors mutate the response context, they never remove it
        let parts = fetch
            .response
            .take()
            .expect("response parts present after response chain");

        if parts.status.is_client_error() || parts.status.is_server_error() {
            self.on_response_error(ctx, &parts).await;
            return Err(AuthError::RequestFailed {
                url,
                status: parts.status,
            });
        }

        Ok(parts)
    }

    /// GET an endpoint and decode its JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &AppContext,
        path: &str,
    ) -> Result<T, AuthError> {
        let parts = self.request(ctx, Method::GET, path, None).await?;
        parts.json()
    }

    async fn send_with_retry(&self, fetch: &FetchContext) -> Result<reqwest::Response, AuthError> {
        let request = &fetch.request;
        let mut attempt = 0u32;

        loop {
            let mut builder = self
                .http
                .request(request.method.clone(), &request.url)
                .headers(request.headers.clone());
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) if response.status().is_server_error() && attempt < self.retry => {
                    debug!(
                        "retrying '{}' after status {} (attempt {}/{})",
                        request.url,
                        response.status(),
                        attempt + 1,
                        self.retry
                    );
                    attempt += 1;
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.retry => {
                    warn!(
                        "retrying '{}' after transport error: {} (attempt {}/{})",
                        request.url,
                        err,
                        attempt + 1,
                        self.retry
                    );
                    attempt += 1;
                }
                Err(err) => return Err(AuthError::Http(err)),
            }
        }
    }

    /// Global response-error hook. 419 is a CSRF handshake issue, not an
    /// auth failure; 401 clears any held identity and, in a client context
    /// with the right options, navigates to the auth-only redirect target.
    /// Other statuses are not specially handled.
    async fn on_response_error(&self, ctx: &AppContext, parts: &ResponseParts) {
        if parts.status.as_u16() == 419 {
            warn!("CSRF token mismatch, check your API configuration");
            return;
        }

        if parts.status.as_u16() == 401 {
            if ctx.user().is_some() {
                warn!("user session is not set in API or expired, resetting identity");
                ctx.set_user(None);
            }

            if ctx.environment().is_client() && self.options.redirect_if_unauthenticated {
                let target = self
                    .options
                    .redirect
                    .on_auth_only
                    .as_ref()
                    .and_then(|target| target.as_path());

                if let Some(path) = target {
                    ctx.navigate(Navigation::to(path)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://api.test/", "/login"), "http://api.test/login");
        assert_eq!(join_url("http://api.test", "login"), "http://api.test/login");
    }
}
