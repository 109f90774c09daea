//! A minimal OAuth relay for the CMS login flow. The relay is a stateless
//! request router: `/auth` redirects the browser to the identity provider's
//! authorization page, `/callback` exchanges the returned code for an access
//! token with a single server-to-server call, and `/success` is a static
//! acknowledgement. Requests are handled one at a time with no cross-request
//! state; a failing request affects nothing else.
//!
//! Routing is a pure function from (method, path, query) to an [`Action`],
//! so request validation is testable without a network.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use spdlog::{error, info};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use url::Url;

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Relay configuration: the OAuth app credentials and the origins allowed to
/// call the relay cross-origin.
pub struct RelayConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Cross-origin callers are matched by prefix against this list.
    pub allowed_origins: Vec<String>,

    pub port: u16,
}

impl RelayConfig {
    /// Builds the configuration from `GITHUB_CLIENT_ID` and
    /// `GITHUB_CLIENT_SECRET` environment variables.
    pub fn from_env() -> anyhow::Result<RelayConfig> {
        use anyhow::Context;
        Ok(RelayConfig {
            client_id: std::env::var("GITHUB_CLIENT_ID").context("GITHUB_CLIENT_ID is not set")?,
            client_secret: std::env::var("GITHUB_CLIENT_SECRET")
                .context("GITHUB_CLIENT_SECRET is not set")?,
            allowed_origins: vec![
                "http://localhost:8080".to_owned(),
                "http://127.0.0.1:8080".to_owned(),
            ],
            port: 8787,
        })
    }
}

/// What a request resolves to, decided before any I/O happens.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Redirect the browser to the provider's authorization URL.
    AuthRedirect(String),

    /// Exchange the authorization code for an access token.
    ExchangeCode(String),

    /// Static 200 acknowledgement.
    Success,

    /// CORS preflight.
    Preflight,

    /// Reject with a fixed client error.
    BadRequest(&'static str),

    NotFound,
}

/// Routes a request. `query` is the raw query string without the leading
/// `?`.
pub fn route(method: &Method, path: &str, query: &str) -> Action {
    if *method == Method::Options {
        return Action::Preflight;
    }
    match path {
        "/auth" => match query_param(query, "provider").as_deref() {
            Some("github") => Action::AuthRedirect(authorize_url()),
            _ => Action::BadRequest("Unsupported provider"),
        },
        "/callback" => match query_param(query, "code") {
            Some(code) => Action::ExchangeCode(code),
            None => Action::BadRequest("Missing authorization code"),
        },
        "/success" => Action::Success,
        _ => Action::NotFound,
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn authorize_url() -> String {
    // The constant is a valid URL, so parsing it never fails.
    let mut url = Url::parse(GITHUB_AUTHORIZE_URL).unwrap();
    url.query_pairs_mut()
        .append_pair("client_id", "")
        .append_pair("scope", "repo")
        .append_pair("state", &generate_state());
    url.into()
}

/// A random `state` string for the authorization URL. The state is not
/// stored anywhere; the callback never verifies it. This matches the
/// deployed relay's observed behavior and is a documented gap.
fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Runs the relay server. One request at a time; every token exchange is
/// attempted exactly once, with no retries.
pub fn run_relay(config: RelayConfig) -> Result<()> {
    let server =
        Server::http(SocketAddr::from((Ipv4Addr::LOCALHOST, config.port))).map_err(Error::Bind)?;
    info!("OAuth relay listening on http://127.0.0.1:{}", config.port);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &config) {
            error!("Relay request failed: {}", e);
        }
    }
    Ok(())
}

fn handle_request(request: Request, config: &RelayConfig) -> Result<()> {
    let origin = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Origin"))
        .map(|h| h.value.as_str().to_owned());
    let allowed = allowed_origin(origin.as_deref(), &config.allowed_origins).to_owned();

    let url = request.url().to_owned();
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url.as_str(), ""),
    };

    match route(request.method(), path, query) {
        Action::Preflight => {
            respond(request, Response::empty(StatusCode(204)), &allowed, None)
        }
        Action::AuthRedirect(url) => {
            let url = with_client_id(&url, &config.client_id);
            let response = Response::empty(StatusCode(302))
                .with_header(header("Location", &url));
            respond(request, response, &allowed, None)
        }
        Action::ExchangeCode(code) => match exchange_code(&code, config) {
            Ok(token) => respond(
                request,
                Response::from_string(success_html(&token)).with_status_code(StatusCode(200)),
                &allowed,
                Some("text/html"),
            ),
            // Provider error payloads are forwarded to the caller unchanged.
            Err(Error::Provider(body)) => respond(
                request,
                Response::from_string(body).with_status_code(StatusCode(400)),
                &allowed,
                Some("application/json"),
            ),
            Err(err) => respond(
                request,
                Response::from_string(
                    serde_json::json!({ "error": err.to_string() }).to_string(),
                )
                .with_status_code(StatusCode(500)),
                &allowed,
                Some("application/json"),
            ),
        },
        Action::Success => respond(
            request,
            Response::from_string("OK").with_status_code(StatusCode(200)),
            &allowed,
            None,
        ),
        Action::BadRequest(message) => respond(
            request,
            Response::from_string(message).with_status_code(StatusCode(400)),
            &allowed,
            None,
        ),
        Action::NotFound => respond(
            request,
            Response::from_string("Not Found").with_status_code(StatusCode(404)),
            &allowed,
            None,
        ),
    }
}

/// Picks the allow-list entry the caller's Origin starts with, `*` when none
/// matches.
fn allowed_origin<'a>(origin: Option<&str>, allow_list: &'a [String]) -> &'a str {
    allow_list
        .iter()
        .find(|allowed| origin.is_some_and(|o| o.starts_with(allowed.as_str())))
        .map(String::as_str)
        .unwrap_or("*")
}

fn respond<R: std::io::Read>(
    request: Request,
    mut response: Response<R>,
    allowed_origin: &str,
    content_type: Option<&str>,
) -> Result<()> {
    response.add_header(header("Access-Control-Allow-Origin", allowed_origin));
    response.add_header(header("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
    response.add_header(header(
        "Access-Control-Allow-Headers",
        "Content-Type, Authorization",
    ));
    response.add_header(header("Access-Control-Max-Age", "86400"));
    if let Some(content_type) = content_type {
        response.add_header(header("Content-Type", content_type));
    }
    request.respond(response)?;
    Ok(())
}

fn header(field: &str, value: &str) -> Header {
    // Field names and values are fixed ASCII; construction never fails.
    Header::from_bytes(field.as_bytes(), value.as_bytes()).unwrap()
}

fn with_client_id(url: &str, client_id: &str) -> String {
    url.replace("client_id=", &format!("client_id={}", client_id))
}

/// Exchanges an authorization code for an access token. Called exactly once
/// per callback; there are no retries.
fn exchange_code(code: &str, config: &RelayConfig) -> Result<String> {
    let response = reqwest::blocking::Client::new()
        .post(GITHUB_TOKEN_URL)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&serde_json::json!({
            "client_id": config.client_id,
            "client_secret": config.client_secret,
            "code": code,
        }))
        .send()?;

    let payload: serde_json::Value = response.json()?;
    if payload.get("error").is_some() {
        return Err(Error::Provider(payload.to_string()));
    }
    match payload.get("access_token").and_then(|token| token.as_str()) {
        Some(token) => Ok(token.to_owned()),
        None => Err(Error::Provider(payload.to_string())),
    }
}

/// The page returned after a successful token exchange: posts the token to
/// the window that opened the popup, or stores it and redirects back to the
/// admin UI.
fn success_html(token: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Authorization complete</title>
</head>
<body>
  <p>Authorization complete. Returning to the admin UI&hellip;</p>
  <script>
    if (window.opener) {{
      window.opener.postMessage({{
        type: 'authorization:github:success',
        token: '{token}'
      }}, '*');
      setTimeout(() => window.close(), 1000);
    }} else {{
      localStorage.setItem('decap-cms-token', '{token}');
      window.location.href = '/admin/';
    }}
  </script>
</body>
</html>"#,
        token = token,
    )
}

/// The result of a fallible relay operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error handling a relay request.
#[derive(Debug)]
pub enum Error {
    /// The identity provider returned an error payload; the raw body is
    /// forwarded to the caller unchanged.
    Provider(String),

    /// Returned when the token-exchange HTTP call itself fails.
    Http(reqwest::Error),

    /// Returned when the relay server can't bind its port.
    Bind(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Returned for I/O errors writing a response.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Provider(body) => write!(f, "Provider error: {}", body),
            Error::Http(err) => err.fmt(f),
            Error::Bind(err) => write!(f, "Binding relay server: {}", err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provider(_) => None,
            Error::Http(err) => Some(err),
            Error::Bind(err) => Some(err.as_ref()),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts [`reqwest::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator for the token-exchange call.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator when writing responses.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
