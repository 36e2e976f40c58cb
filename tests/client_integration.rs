mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{build_context, options_from_yaml, RecordingNavigator};
use http::Method;
use mockito::Server;
use passway::interceptors::{FetchContext, Interceptor};
use passway::utils::headers::append_headers;
use passway::{plugin, AppConfig, AppContext, AuthError, Environment};
use serde_json::json;

fn token_options(base_url: &str) -> passway::ModuleOptions {
    options_from_yaml(&format!(
        r#"
base_url: "{base_url}"
mode: "token"
redirect_if_unauthenticated: true
endpoints:
  login: "/api/login"
  logout: "/api/logout"
  user: "/api/user"
client:
  initial_request: false
"#
    ))
}

fn cookie_options(base_url: &str) -> passway::ModuleOptions {
    options_from_yaml(&format!(
        r#"
base_url: "{base_url}"
mode: "cookie"
endpoints:
  csrf: "/auth/csrf-cookie"
  login: "/api/login"
  logout: "/api/logout"
  user: "/api/user"
client:
  initial_request: false
"#
    ))
}

/// App-supplied request interceptor that overrides the default accept header.
struct XmlAccept;

#[async_trait]
impl Interceptor for XmlAccept {
    fn get_name(&self) -> &str {
        "app:xml-accept"
    }

    async fn handle(&self, _ctx: &AppContext, fetch: &mut FetchContext) -> Result<(), AuthError> {
        fetch.request.headers = append_headers(
            Some(&fetch.request.headers),
            &[("accept", "application/xml")],
        );
        Ok(())
    }
}

#[tokio::test]
async fn app_supplied_interceptor_runs_last_and_wins_conflicts() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/ping")
        .match_header("accept", "application/xml")
        .match_header("x-requested-with", "XMLHttpRequest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let (ctx, _) = build_context(token_options(&server.url()), Environment::Client);
    ctx.set_app_config(AppConfig {
        on_request: Some(Arc::new(XmlAccept)),
        ..AppConfig::default()
    });
    let client = plugin::setup(&ctx).await.unwrap();

    client
        .request(&ctx, Method::GET, "/api/ping", None)
        .await
        .expect("request should succeed");

    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_response_clears_identity_and_redirects_on_client() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/private")
        .with_status(401)
        .create_async()
        .await;

    let (ctx, navigator) = build_context(token_options(&server.url()), Environment::Client);
    ctx.set_user(Some(json!({"name": "maria"})));
    let client = plugin::setup(&ctx).await.unwrap();

    let result = client.request(&ctx, Method::GET, "/api/private", None).await;

    match result {
        Err(AuthError::RequestFailed { status, .. }) => assert_eq!(status.as_u16(), 401),
        other => panic!("expected a 401 failure, got {other:?}"),
    }
    assert!(ctx.user().is_none());
    assert_eq!(navigator.recorded_paths(), vec!["/login"]);
}

#[tokio::test]
async fn unauthorized_response_does_not_redirect_on_server() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/private")
        .with_status(401)
        .create_async()
        .await;

    let (ctx, navigator) = build_context(token_options(&server.url()), Environment::Server);
    ctx.set_user(Some(json!({"name": "maria"})));
    let client = plugin::setup(&ctx).await.unwrap();

    let result = client.request(&ctx, Method::GET, "/api/private", None).await;

    assert!(result.is_err());
    assert!(ctx.user().is_none());
    assert!(navigator.recorded().is_empty());
}

#[tokio::test]
async fn csrf_mismatch_is_not_an_auth_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/private")
        .with_status(419)
        .create_async()
        .await;

    let (ctx, navigator) = build_context(token_options(&server.url()), Environment::Client);
    ctx.set_user(Some(json!({"name": "maria"})));
    let client = plugin::setup(&ctx).await.unwrap();

    let result = client.request(&ctx, Method::GET, "/api/private", None).await;

    assert!(result.is_err());
    // identity survives a CSRF handshake problem
    assert!(ctx.user().is_some());
    assert!(navigator.recorded().is_empty());
}

#[tokio::test]
async fn cookie_login_performs_the_csrf_handshake() {
    let mut server = Server::new_async().await;
    let csrf_mock = server
        .mock("GET", "/auth/csrf-cookie")
        .with_status(204)
        .with_header("set-cookie", "XSRF-TOKEN=tok123; Path=/")
        .create_async()
        .await;
    let login_mock = server
        .mock("POST", "/api/login")
        .match_header("x-xsrf-token", "tok123")
        .match_header("cookie", "XSRF-TOKEN=tok123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", "session=s1; Path=/; HttpOnly")
        .with_body("{}")
        .create_async()
        .await;
    let user_mock = server
        .mock("GET", "/api/user")
        .match_header("cookie", "XSRF-TOKEN=tok123; session=s1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "maria"}"#)
        .create_async()
        .await;

    let (ctx, _) = build_context(cookie_options(&server.url()), Environment::Client);
    let client = plugin::setup(&ctx).await.unwrap();
    let auth = passway::Auth::new(ctx.clone(), client);

    auth.login(json!({"email": "maria@acme.test", "password": "secret"}))
        .await
        .expect("cookie login should succeed");

    csrf_mock.assert_async().await;
    login_mock.assert_async().await;
    user_mock.assert_async().await;
    assert!(auth.is_authenticated());
}

#[tokio::test]
async fn server_side_set_cookie_headers_are_mirrored() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/user")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", "session=abc; Path=/; HttpOnly")
        .with_body(r#"{"name": "maria"}"#)
        .create_async()
        .await;

    let (ctx, _) = build_context(cookie_options(&server.url()), Environment::Server);
    let client = plugin::setup(&ctx).await.unwrap();

    let parts = client
        .request(&ctx, Method::GET, "/api/user", None)
        .await
        .unwrap();

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(
        ctx.captured_cookies(),
        vec!["session=abc; Path=/; HttpOnly"]
    );
    assert_eq!(
        ctx.with_cookies(|jar| jar.get("session").map(str::to_string)),
        Some("abc".to_string())
    );
}

#[tokio::test]
async fn missing_validation_headers_never_fail_the_response() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/user")
        .with_status(200)
        // no set-cookie, no content-type, no CORS headers: warn-only territory
        .with_body(r#"{"name": "maria"}"#)
        .create_async()
        .await;

    let (ctx, _) = build_context(cookie_options(&server.url()), Environment::Server);
    let client = plugin::setup(&ctx).await.unwrap();

    let parts = client
        .request(&ctx, Method::GET, "/api/user", None)
        .await
        .expect("validation must not fail the request");

    assert_eq!(parts.json::<serde_json::Value>().unwrap()["name"], "maria");
}

#[tokio::test]
async fn cookies_are_stripped_without_credentials_support() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/user")
        .match_header("cookie", mockito::Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let navigator = Arc::new(RecordingNavigator::new());
    let ctx = Arc::new(
        AppContext::new(
            cookie_options(&server.url()),
            navigator,
            Environment::Client,
        )
        .without_credentials_support(),
    );
    ctx.with_cookies(|jar| jar.set("session", "abc"));
    let client = plugin::setup(&ctx).await.unwrap();

    client
        .request(&ctx, Method::GET, "/api/user", None)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn configured_retry_resends_on_server_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/flaky")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let mut options = token_options(&server.url());
    options.client.retry = passway::config::RetryPolicy::Flag(true);
    let (ctx, _) = build_context(options, Environment::Client);
    let client = plugin::setup(&ctx).await.unwrap();

    let result = client.request(&ctx, Method::GET, "/api/flaky", None).await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn eager_identity_load_tolerates_unauthenticated_startup() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/user")
        .with_status(401)
        .create_async()
        .await;

    let mut options = token_options(&server.url());
    options.client.initial_request = true;
    let (ctx, _) = build_context(options, Environment::Client);

    plugin::setup(&ctx).await.expect("startup must not abort");

    assert!(ctx.user().is_none());
    assert!(ctx.identity_loaded());
}

#[tokio::test]
async fn eager_identity_load_sets_the_user() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/user")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "maria"}"#)
        .create_async()
        .await;

    let mut options = token_options(&server.url());
    options.client.initial_request = true;
    let (ctx, _) = build_context(options, Environment::Client);

    plugin::setup(&ctx).await.unwrap();

    assert_eq!(ctx.user().unwrap()["name"], "maria");
}
