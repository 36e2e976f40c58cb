use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::error::AuthError;

/// The authentication transport strategy: session cookie or bearer token.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum Mode {
    #[serde(rename = "cookie")]
    Cookie,
    #[serde(rename = "token")]
    Token,
}

/// A navigation target for one of the redirect hooks.
///
/// A path string means "navigate there", an explicit `false` means "do
/// nothing". An unconfigured target (`None` at the option site) is a fatal
/// configuration error at the point of use.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum RedirectTarget {
    Path(String),
    Disabled(bool),
}

impl RedirectTarget {
    /// The path to navigate to, or `None` when the redirect is disabled.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            RedirectTarget::Path(path) => Some(path),
            RedirectTarget::Disabled(_) => None,
        }
    }
}

/// Retry count for the HTTP client: a bare `true` normalizes to one retry,
/// `false` to zero, a number passes through.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum RetryPolicy {
    Flag(bool),
    Count(u32),
}

impl RetryPolicy {
    pub fn normalized(&self) -> u32 {
        match self {
            RetryPolicy::Flag(true) => 1,
            RetryPolicy::Flag(false) => 0,
            RetryPolicy::Count(count) => *count,
        }
    }
}

/// API endpoints the layer talks to. Each one is validated at its point of
/// use; a missing endpoint only fails the operations that need it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct EndpointsOptions {
    pub csrf: Option<String>,
    pub login: Option<String>,
    pub logout: Option<String>,
    pub user: Option<String>,
}

impl Default for EndpointsOptions {
    fn default() -> Self {
        EndpointsOptions {
            csrf: Some("/auth/csrf-cookie".to_string()),
            login: Some("/login".to_string()),
            logout: Some("/logout".to_string()),
            user: Some("/api/user".to_string()),
        }
    }
}

/// Cookie and header names used for the CSRF handshake in cookie mode.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct CsrfOptions {
    pub cookie: String,
    pub header: String,
}

impl Default for CsrfOptions {
    fn default() -> Self {
        CsrfOptions {
            cookie: "XSRF-TOKEN".to_string(),
            header: "X-XSRF-TOKEN".to_string(),
        }
    }
}

/// Navigation targets consulted by the facade and the route guards.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct RedirectOptions {
    /// Attach the originally requested route as a `redirect` query parameter
    /// and honor it after login.
    pub keep_requested_route: bool,
    pub on_auth_only: Option<RedirectTarget>,
    pub on_guest_only: Option<RedirectTarget>,
    pub on_login: Option<RedirectTarget>,
    pub on_logout: Option<RedirectTarget>,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        RedirectOptions {
            keep_requested_route: false,
            on_auth_only: Some(RedirectTarget::Path("/login".to_string())),
            on_guest_only: Some(RedirectTarget::Path("/".to_string())),
            on_login: Some(RedirectTarget::Path("/".to_string())),
            on_logout: Some(RedirectTarget::Path("/".to_string())),
        }
    }
}

/// Selects between the single global guard and the two named guards.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct GlobalMiddlewareOptions {
    pub enabled: bool,
    pub prepend: bool,
    /// Let unmatched routes render without authentication.
    pub allow_404_without_auth: bool,
}

impl Default for GlobalMiddlewareOptions {
    fn default() -> Self {
        GlobalMiddlewareOptions {
            enabled: false,
            prepend: false,
            allow_404_without_auth: true,
        }
    }
}

/// Settings for the HTTP client factory.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    /// Eagerly fetch the identity once at bootstrap.
    pub initial_request: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            retry: RetryPolicy::Flag(false),
            initial_request: true,
        }
    }
}

/// Process-wide module options, read-only after startup and shared by
/// reference across every consumer.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ModuleOptions {
    pub base_url: String,
    /// Origin the response validator checks `access-control-allow-origin`
    /// against. Falls back to the origin of `base_url` when unset.
    pub origin: Option<String>,
    pub mode: Mode,
    pub user_state_key: String,
    pub redirect_if_authenticated: bool,
    pub redirect_if_unauthenticated: bool,
    pub endpoints: EndpointsOptions,
    pub csrf: CsrfOptions,
    pub redirect: RedirectOptions,
    pub global_middleware: GlobalMiddlewareOptions,
    pub client: ClientOptions,
    pub logging: LoggingConfig,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        ModuleOptions {
            base_url: "http://localhost:80".to_string(),
            origin: None,
            mode: Mode::Cookie,
            user_state_key: "passway.user.identity".to_string(),
            redirect_if_authenticated: false,
            redirect_if_unauthenticated: false,
            endpoints: EndpointsOptions::default(),
            csrf: CsrfOptions::default(),
            redirect: RedirectOptions::default(),
            global_middleware: GlobalMiddlewareOptions::default(),
            client: ClientOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Loads options by merging the built-in defaults, an optional YAML file,
/// and `PASSWAY_`-prefixed environment variables (later sources win).
pub fn load_options(path: Option<&str>) -> Result<ModuleOptions, AuthError> {
    let mut figment = Figment::from(Serialized::defaults(ModuleOptions::default()));

    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }

    figment
        .merge(Env::prefixed("PASSWAY_").split("__"))
        .extract()
        .map_err(|e| AuthError::config(format!("unable to load options: {e}")))
}

/// Print the JSON schema for the options to stdout.
pub fn print_schema() {
    let schema = schema_for!(ModuleOptions);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
