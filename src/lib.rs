//! Client-side authentication integration layer.
//!
//! Manages a user-identity state, issues authenticated HTTP calls through
//! an ordered interceptor pipeline, and decides navigation redirects from
//! authentication status. The host framework is an external collaborator
//! modeled by [`context::AppContext`]: it supplies reactive state cells,
//! the current route, a navigation capability, and a cookie jar; this crate
//! supplies everything between "user submits credentials" and "the right
//! headers, state transitions, and redirects happen".
//!
//! Two transport strategies are supported: `cookie` (session cookie plus
//! CSRF handshake) and `token` (bearer token read from a pluggable
//! [`storage::TokenStorage`]).

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod interceptors;
pub mod middleware;
pub mod plugin;
pub mod storage;
pub mod utils;

pub use auth::Auth;
pub use client::HttpClient;
pub use config::{load_options, Mode, ModuleOptions};
pub use context::{
    AppConfig, AppContext, Environment, Navigation, Navigator, NoopNavigator, RouteLocation,
};
pub use error::AuthError;
pub use middleware::{auth_guard, global_guard, guest_guard, GuardOutcome};
pub use plugin::setup;
pub use storage::{CookieTokenStorage, TokenStorage};
