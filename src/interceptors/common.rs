use async_trait::async_trait;
use http::HeaderMap;
use tracing::{debug, warn};

use super::{FetchContext, Interceptor};
use crate::config::{Mode, ModuleOptions};
use crate::context::AppContext;
use crate::error::AuthError;
use crate::utils::headers::append_headers;

/// Always the first request interceptor: sets the JSON API defaults every
/// call carries, regardless of mode.
pub struct RequestHeadersInterceptor;

#[async_trait]
impl Interceptor for RequestHeadersInterceptor {
    fn get_name(&self) -> &str {
        "common:request-headers"
    }

    async fn handle(&self, _ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        fetch.request.headers = append_headers(
            Some(&fetch.request.headers),
            &[
                ("accept", "application/json"),
                ("x-requested-with", "XMLHttpRequest"),
            ],
        );
        Ok(())
    }
}

type HeaderValidator = fn(&HeaderMap, &ModuleOptions);

fn validate_cookie_header(headers: &HeaderMap, options: &ModuleOptions) {
    if options.mode == Mode::Token {
        return;
    }

    if !headers.contains_key("set-cookie") {
        warn!("[response] `set-cookie` header is missing");
    }
}

fn validate_content_type_header(headers: &HeaderMap, _options: &ModuleOptions) {
    let content_type = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok());

    match content_type {
        Some(value) if value.contains("application/json") => {}
        _ => warn!("[response] `content-type` header is missing or invalid"),
    }
}

fn validate_credentials_header(headers: &HeaderMap, options: &ModuleOptions) {
    if options.mode == Mode::Token {
        return;
    }

    let allow_credentials = headers
        .get("access-control-allow-credentials")
        .and_then(|value| value.to_str().ok());

    if allow_credentials != Some("true") {
        warn!("[response] `access-control-allow-credentials` header is missing or invalid");
    }
}

fn validate_origin_header(headers: &HeaderMap, options: &ModuleOptions) {
    let allow_origin = headers
        .get("access-control-allow-origin")
        .and_then(|value| value.to_str().ok());

    let current_origin = options
        .origin
        .clone()
        .unwrap_or_else(|| origin_of(&options.base_url));

    match allow_origin {
        Some(value) if value.contains(&current_origin) => {}
        _ => warn!("[response] `access-control-allow-origin` header is missing or invalid"),
    }
}

const VALIDATORS: &[HeaderValidator] = &[
    validate_cookie_header,
    validate_content_type_header,
    validate_credentials_header,
    validate_origin_header,
];

/// Always the last built-in response interceptor: checks the headers a
/// cookie-based API must return for the browser to accept the session.
/// Warnings only, the response is never failed, and the checks only make
/// sense while server-rendering.
pub struct ValidateResponseHeaders;

#[async_trait]
impl Interceptor for ValidateResponseHeaders {
    fn get_name(&self) -> &str {
        "common:validate-response-headers"
    }

    async fn handle(&self, ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        if ctx.environment().is_client() {
            debug!("[response] skipping headers validation on client");
            return Ok(());
        }

        let Some(response) = &fetch.response else {
            warn!("[response] no headers returned from API");
            return Ok(());
        };

        let options = ctx.options();
        for validator in VALIDATORS {
            validator(&response.headers, &options);
        }

        Ok(())
    }
}

/// Extracts `scheme://authority` from a URL string.
fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => url[..scheme_end + 3 + path_start].to_string(),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleOptions;
    use crate::context::{Environment, NoopNavigator};
    use crate::interceptors::ResponseParts;
    use http::{Method, StatusCode};
    use std::sync::Arc;

    #[test]
    fn origin_of_strips_path() {
        assert_eq!(origin_of("http://api.acme.test/v1/users"), "http://api.acme.test");
        assert_eq!(origin_of("https://api.acme.test:8443"), "https://api.acme.test:8443");
        assert_eq!(origin_of("not-a-url"), "not-a-url");
    }

    #[tokio::test]
    async fn request_headers_are_added_without_clobbering_existing() {
        let ctx = AppContext::new(
            ModuleOptions::default(),
            Arc::new(NoopNavigator),
            Environment::Client,
        );
        let mut fetch = FetchContext::new(Method::GET, "http://api/x".to_string(), None);
        fetch.request.headers = append_headers(None, &[("authorization", "Bearer t")]);

        RequestHeadersInterceptor.handle(&ctx, &mut fetch).await.unwrap();

        assert_eq!(fetch.request.headers.get("accept").unwrap(), "application/json");
        assert_eq!(fetch.request.headers.get("authorization").unwrap(), "Bearer t");
    }

    #[tokio::test]
    async fn validation_never_fails_the_response() {
        let ctx = AppContext::new(
            ModuleOptions::default(),
            Arc::new(NoopNavigator),
            Environment::Server,
        );
        let mut fetch = FetchContext::new(Method::GET, "http://api/x".to_string(), None);
        // no set-cookie, wrong content type, no CORS headers: warnings only
        fetch.response = Some(ResponseParts {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        });

        let result = ValidateResponseHeaders.handle(&ctx, &mut fetch).await;

        assert!(result.is_ok());
        assert_eq!(fetch.response.as_ref().unwrap().status, StatusCode::OK);
    }
}
