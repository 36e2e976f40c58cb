use async_trait::async_trait;
use http::Method;
use tracing::{debug, warn};

use super::{FetchContext, Interceptor};
use crate::client::join_url;
use crate::context::AppContext;
use crate::error::AuthError;
use crate::utils::headers::append_headers;

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Percent-decodes a cookie value. Cookie-based APIs URL-encode the CSRF
/// token they issue, while the matching request header wants it raw.
fn decode_cookie_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// Cookie-mode request interceptor: forwards the jar's cookies to the API,
/// adds origin headers while server-rendering, and performs the CSRF
/// handshake before state-changing calls.
pub struct ForwardRequestCookies;

impl ForwardRequestCookies {
    /// Requests the CSRF endpoint once to let the API seed the CSRF cookie.
    async fn seed_csrf_cookie(&self, ctx: &AppContext, endpoint: &str) -> Result<(), AuthError> {
        let options = ctx.options();
        let url = join_url(&options.base_url, endpoint);

        debug!("[request] requesting CSRF cookie from {}", url);
        let client = reqwest::Client::new();
        let response = client.get(&url).send().await?;

        for value in response.headers().get_all("set-cookie") {
            if let Ok(raw) = value.to_str() {
                ctx.with_cookies(|jar| jar.absorb_set_cookie(raw));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Interceptor for ForwardRequestCookies {
    fn get_name(&self) -> &str {
        "cookie:forward-request-cookies"
    }

    async fn handle(&self, ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        let options = ctx.options();

        if ctx.environment().is_server() {
            if let Some(origin) = &options.origin {
                fetch.request.headers = append_headers(
                    Some(&fetch.request.headers),
                    &[("origin", origin), ("referer", origin)],
                );
            }
        }

        if is_state_changing(&fetch.request.method) {
            let has_csrf_cookie = ctx.with_cookies(|jar| jar.get(&options.csrf.cookie).is_some());

            if !has_csrf_cookie {
                match &options.endpoints.csrf {
                    Some(endpoint) => self.seed_csrf_cookie(ctx, endpoint).await?,
                    None => warn!("[request] `endpoints.csrf` is not configured, skipping CSRF handshake"),
                }
            }

            if let Some(token) = ctx.with_cookies(|jar| jar.get(&options.csrf.cookie).map(str::to_string)) {
                debug!("[request] add CSRF token header '{}'", options.csrf.header);
                fetch.request.headers = append_headers(
                    Some(&fetch.request.headers),
                    &[(options.csrf.header.as_str(), decode_cookie_value(&token).as_str())],
                );
            }
        }

        if let Some(cookie_header) = ctx.with_cookies(|jar| jar.cookie_header()) {
            fetch.request.headers = append_headers(
                Some(&fetch.request.headers),
                &[("cookie", cookie_header.as_str())],
            );
        }

        Ok(())
    }
}

/// Cookie-mode response interceptor: stores upstream `set-cookie` values in
/// the jar, and while server-rendering also records the raw header values so
/// the host can mirror them back to the browser.
pub struct CaptureResponseCookies;

#[async_trait]
impl Interceptor for CaptureResponseCookies {
    fn get_name(&self) -> &str {
        "cookie:capture-response-cookies"
    }

    async fn handle(&self, ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        let Some(response) = &fetch.response else {
            return Ok(());
        };

        let mut mirrored = 0usize;
        for value in response.headers.get_all("set-cookie") {
            let Ok(raw) = value.to_str() else { continue };

            ctx.with_cookies(|jar| jar.absorb_set_cookie(raw));

            if ctx.environment().is_server() {
                ctx.with_cookies(|jar| jar.capture(raw));
                mirrored += 1;
            }
        }

        if mirrored > 0 {
            debug!("[response] mirrored {} set-cookie header(s) to the caller", mirrored);
        }

        Ok(())
    }
}
