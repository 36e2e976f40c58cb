//! Pluggable bearer-token storage.
//!
//! Exactly one implementation is active at a time: either one supplied by
//! the host application, or the cookie-backed default installed at bootstrap
//! when running in token mode.

use async_trait::async_trait;
use tracing::debug;

use crate::context::AppContext;

/// Cookie the default storage keeps the bearer token in.
pub const TOKEN_COOKIE_NAME: &str = "passway.storage.token";

/// Capability pair for loading and saving the bearer token.
///
/// `get` never fails for "not found"; it returns `None`. `set(None)` clears
/// the stored token. Both operations are idempotent. Implementations that
/// are only usable client-side (e.g. browser local storage) must resolve
/// `get` to `None` in server contexts to avoid inconsistent hydration.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// A descriptive name for the storage (for logs/debug).
    fn get_name(&self) -> &str;

    async fn get(&self, ctx: &AppContext) -> Option<String>;

    async fn set(&self, ctx: &AppContext, token: Option<String>);
}

/// Default storage: keeps the token in the context's cookie jar, so it
/// behaves the same on server and client.
pub struct CookieTokenStorage {
    cookie_name: String,
}

impl CookieTokenStorage {
    pub fn new() -> Self {
        CookieTokenStorage {
            cookie_name: TOKEN_COOKIE_NAME.to_string(),
        }
    }
}

impl Default for CookieTokenStorage {
    fn default() -> Self {
        CookieTokenStorage::new()
    }
}

#[async_trait]
impl TokenStorage for CookieTokenStorage {
    fn get_name(&self) -> &str {
        "cookie"
    }

    async fn get(&self, ctx: &AppContext) -> Option<String> {
        ctx.with_cookies(|jar| jar.get(&self.cookie_name).map(str::to_string))
    }

    async fn set(&self, ctx: &AppContext, token: Option<String>) {
        match token {
            Some(token) => {
                ctx.with_cookies(|jar| jar.set(&self.cookie_name, &token));
            }
            None => {
                debug!("clearing token cookie '{}'", self.cookie_name);
                ctx.with_cookies(|jar| jar.remove(&self.cookie_name));
            }
        }
    }
}
