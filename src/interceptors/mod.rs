//! The request/response interceptor pipeline.
//!
//! Interceptors are assembled once at client construction into two ordered
//! chains and run strictly in sequence for every call. An interceptor never
//! short-circuits the chain; returning an error aborts the remaining chain
//! and the request itself.

pub mod common;
pub mod cookie;
pub mod token;

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

use crate::context::AppContext;
use crate::error::AuthError;

/// Outgoing request under construction. Interceptors mutate the headers;
/// method, URL, and body are fixed by the caller.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// A settled upstream response.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ResponseParts {
    /// Deserializes the response body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AuthError::config(format!("unable to decode response body: {e}")))
    }
}

/// Context handed to every interceptor: the outgoing request, and the
/// response once one exists (request-phase interceptors see `None`).
#[derive(Debug)]
pub struct FetchContext {
    pub request: RequestParts,
    pub response: Option<ResponseParts>,
}

impl FetchContext {
    pub fn new(method: Method, url: String, body: Option<Value>) -> Self {
        FetchContext {
            request: RequestParts {
                method,
                url,
                headers: HeaderMap::new(),
                body,
            },
            response: None,
        }
    }
}

/// A hook invoked for every outgoing request or incoming response.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// A descriptive name for the interceptor (for logs/debug).
    fn get_name(&self) -> &str;

    async fn handle(&self, ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError>;
}

/// Assembles the request and response chains for the active mode. The order
/// is fixed: common request headers always come first, mode-specific
/// interceptors next, the warn-only response validator always runs before
/// any app-supplied response interceptor, and app-supplied interceptors run
/// last in their respective chains.
pub fn build_chains(ctx: &AppContext) -> (Vec<Arc<dyn Interceptor>>, Vec<Arc<dyn Interceptor>>) {
    use crate::config::Mode;

    let options = ctx.options();
    let mut request: Vec<Arc<dyn Interceptor>> = Vec::new();
    let mut response: Vec<Arc<dyn Interceptor>> = Vec::new();

    request.push(Arc::new(common::RequestHeadersInterceptor));

    if options.mode == Mode::Cookie {
        request.push(Arc::new(cookie::ForwardRequestCookies));
        response.push(Arc::new(cookie::CaptureResponseCookies));
    }

    if options.mode == Mode::Token {
        request.push(Arc::new(token::RequestTokenHeader));
    }

    response.push(Arc::new(common::ValidateResponseHeaders));

    if let Some(on_request) = ctx.request_interceptor() {
        request.push(on_request);
    }

    if let Some(on_response) = ctx.response_interceptor() {
        response.push(on_response);
    }

    (request, response)
}
