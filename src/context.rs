//! The injected application handle.
//!
//! The host framework is modeled as a set of capabilities threaded through
//! every call: reactive state cells, the current route, a navigation
//! function, and a cookie jar. One context exists per application (or per
//! request in a server-rendering setup); nothing in this crate is a
//! process-wide singleton.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ModuleOptions;
use crate::interceptors::Interceptor;
use crate::storage::TokenStorage;

/// State key for the one-shot "identity fetched" flag.
pub const IDENTITY_LOADED_KEY: &str = "passway.identity.loaded";

/// Where the context is executing. Several interceptors behave differently
/// during server-side rendering than in the browser-like client context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Server,
    Client,
}

impl Environment {
    pub fn is_server(&self) -> bool {
        matches!(self, Environment::Server)
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Environment::Client)
    }
}

/// Per-route flags consulted by the global guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Route opted out of the global guard entirely.
    pub excluded: bool,
    /// Route is only for unauthenticated visitors.
    pub guest_only: bool,
}

/// The target (or current) route as seen by guards and the auth facade.
#[derive(Debug, Clone)]
pub struct RouteLocation {
    pub path: String,
    /// Path plus query string, used when preserving the requested route.
    pub full_path: String,
    pub query: HashMap<String, String>,
    /// Whether the router matched this route to a known page.
    pub matched: bool,
    pub meta: RouteMeta,
}

impl RouteLocation {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        RouteLocation {
            full_path: path.clone(),
            path,
            query: HashMap::new(),
            matched: true,
            meta: RouteMeta::default(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.full_path = format!("{}?{}={}", self.path, key, value);
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn unmatched(mut self) -> Self {
        self.matched = false;
        self
    }

    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// A single navigation request handed to the host's router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

impl Navigation {
    pub fn to(path: impl Into<String>) -> Self {
        Navigation {
            path: path.into(),
            query: Vec::new(),
            replace: false,
        }
    }

    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// The host framework's navigation capability: changes the current route to
/// the given path, optionally replacing history. No further contract.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, navigation: Navigation);
}

/// Navigator for contexts without a router (background jobs, schema tools).
pub struct NoopNavigator;

#[async_trait]
impl Navigator for NoopNavigator {
    async fn navigate(&self, navigation: Navigation) {
        debug!("navigation to '{}' ignored, no router attached", navigation.path);
    }
}

/// Cookie state owned by the context: the visible name/value pairs plus the
/// raw `set-cookie` values captured from upstream responses so a
/// server-rendering host can mirror them back to the browser.
#[derive(Debug, Default)]
pub struct CookieJar {
    values: BTreeMap<String, String>,
    captured: Vec<String>,
}

impl CookieJar {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Serializes the jar into a `Cookie` request header value, or `None`
    /// when the jar is empty.
    pub fn cookie_header(&self) -> Option<String> {
        if self.values.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }

    /// Stores the name/value pair of a raw `set-cookie` header value.
    /// Attributes after the first `;` are not interpreted.
    pub fn absorb_set_cookie(&mut self, raw: &str) {
        if let Some(pair) = raw.split(';').next() {
            if let Some((name, value)) = pair.split_once('=') {
                self.values
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    pub fn capture(&mut self, raw: &str) {
        self.captured.push(raw.to_string());
    }

    pub fn captured(&self) -> &[String] {
        &self.captured
    }
}

/// App-supplied configuration: a token storage implementation and extra
/// interceptors appended to the end of the request/response chains. Owned by
/// the host application; this crate only reads it, except for installing the
/// default cookie storage in token mode.
#[derive(Default)]
pub struct AppConfig {
    pub token_storage: Option<Arc<dyn TokenStorage>>,
    pub on_request: Option<Arc<dyn Interceptor>>,
    pub on_response: Option<Arc<dyn Interceptor>>,
}

/// The application context threaded through every interceptor, guard, and
/// facade call.
pub struct AppContext {
    options: Arc<ModuleOptions>,
    app_config: RwLock<AppConfig>,
    state: Mutex<HashMap<String, Value>>,
    route: Mutex<RouteLocation>,
    cookies: Mutex<CookieJar>,
    navigator: Arc<dyn Navigator>,
    environment: Environment,
    supports_credentials: bool,
}

impl AppContext {
    pub fn new(
        options: ModuleOptions,
        navigator: Arc<dyn Navigator>,
        environment: Environment,
    ) -> Self {
        AppContext {
            options: Arc::new(options),
            app_config: RwLock::new(AppConfig::default()),
            state: Mutex::new(HashMap::new()),
            route: Mutex::new(RouteLocation::new("/")),
            cookies: Mutex::new(CookieJar::default()),
            navigator,
            environment,
            supports_credentials: true,
        }
    }

    /// Marks the underlying fetch primitive as lacking credential support,
    /// e.g. on worker runtimes. The client then never ships cookies.
    pub fn without_credentials_support(mut self) -> Self {
        self.supports_credentials = false;
        self
    }

    pub fn with_app_config(self, app_config: AppConfig) -> Self {
        self.set_app_config(app_config);
        self
    }

    /// Replaces the app-supplied configuration, e.g. when the host updates
    /// its app config after bootstrap.
    pub fn set_app_config(&self, app_config: AppConfig) {
        *self.app_config.write().expect("app config lock poisoned") = app_config;
    }

    pub fn options(&self) -> Arc<ModuleOptions> {
        self.options.clone()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn supports_credentials(&self) -> bool {
        self.supports_credentials
    }

    // -- State cells

    /// Reads a state cell. Cells are created lazily; an absent cell reads as
    /// `None`, the "null" of the host's reactive state.
    pub fn state_value(&self, key: &str) -> Option<Value> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .get(key)
            .cloned()
    }

    pub fn set_state_value(&self, key: &str, value: Option<Value>) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        match value {
            Some(value) => {
                state.insert(key.to_string(), value);
            }
            None => {
                state.remove(key);
            }
        }
    }

    pub fn user(&self) -> Option<Value> {
        self.state_value(&self.options.user_state_key)
            .filter(|value| !value.is_null())
    }

    pub fn set_user(&self, user: Option<Value>) {
        self.set_state_value(&self.options.user_state_key, user);
    }

    pub fn identity_loaded(&self) -> bool {
        self.state_value(IDENTITY_LOADED_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Flips the one-shot flag. There is deliberately no way to reset it:
    /// the flag transitions false -> true exactly once per context.
    pub fn set_identity_loaded(&self) {
        self.set_state_value(IDENTITY_LOADED_KEY, Some(Value::Bool(true)));
    }

    // -- Route

    pub fn route(&self) -> RouteLocation {
        self.route.lock().expect("route mutex poisoned").clone()
    }

    pub fn set_route(&self, route: RouteLocation) {
        *self.route.lock().expect("route mutex poisoned") = route;
    }

    // -- Cookies

    pub fn with_cookies<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        let mut jar = self.cookies.lock().expect("cookie mutex poisoned");
        f(&mut jar)
    }

    pub fn captured_cookies(&self) -> Vec<String> {
        self.with_cookies(|jar| jar.captured().to_vec())
    }

    // -- App config

    pub fn token_storage(&self) -> Option<Arc<dyn TokenStorage>> {
        self.app_config
            .read()
            .expect("app config lock poisoned")
            .token_storage
            .clone()
    }

    pub fn install_token_storage(&self, storage: Arc<dyn TokenStorage>) {
        self.app_config
            .write()
            .expect("app config lock poisoned")
            .token_storage = Some(storage);
    }

    pub fn request_interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        self.app_config
            .read()
            .expect("app config lock poisoned")
            .on_request
            .clone()
    }

    pub fn response_interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        self.app_config
            .read()
            .expect("app config lock poisoned")
            .on_response
            .clone()
    }

    // -- Navigation

    /// Hands a navigation to the host router. All redirect decisions in this
    /// crate end up here.
    pub async fn navigate(&self, navigation: Navigation) {
        self.navigator.navigate(navigation).await;
    }
}
