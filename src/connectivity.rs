//! Session establishment against the vLCM appliance.
//! -----------------------------------------------
//! One login is one `POST https://{server}/lcm/api/v1/login`. Nothing is cached
//! between calls and nothing is retried: each call builds its own client,
//! sends once, and either returns a `SessionContext` or the first error hit.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credential::{CredentialInput, CredentialPair};
use crate::error::{AuthError, AuthResult};
use crate::session::SessionContext;
use crate::transport::{build_client, classify_send_error, TransportOptions};

pub const LOGIN_PATH: &str = "/lcm/api/v1/login";

// Cap on how much of a rejection body is kept in the error message.
const MAX_ERROR_BODY: usize = 512;

/// `https://{server}` after checking `server` is a bare host or host:port.
pub fn server_base_url(server: &str) -> AuthResult<String> {
    let s = server.trim();
    if s.is_empty() {
        return Err(AuthError::config("server must not be empty"));
    }
    if s.contains("://") || s.contains('/') || s.chars().any(char::is_whitespace) {
        return Err(AuthError::config(format!("server '{}' must be a host name or address, optionally with :port", s)));
    }
    let base = format!("https://{}", s);
    let url = reqwest::Url::parse(&base).map_err(|e| AuthError::config(format!("invalid server '{}': {}", s, e)))?;
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(AuthError::config(format!("invalid server '{}': no host", s)));
    }
    Ok(base)
}

/// Log in and return the session. Credential and server checks run before any I/O.
pub async fn connect(server: &str, credential: &CredentialInput, transport: &TransportOptions) -> AuthResult<SessionContext> {
    let base = server_base_url(server)?;
    let body = credential.resolve()?;
    let client = build_client(transport)?;
    if transport.ignore_cert_requirements {
        warn!(target: "vlcm", server = %base, username = body.username, "sending password to a server whose certificate is not validated");
    }

    let login_url = format!("{}{}", base, LOGIN_PATH);
    debug!(target: "vlcm", url = %login_url, username = body.username, "posting login");
    let resp = client
        .post(&login_url)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(classify_send_error)?;

    let status = resp.status();
    if !status.is_success() {
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                debug!(target: "vlcm", status = status.as_u16(), error = %e, "cannot read rejection body");
                String::new()
            }
        };
        debug!(target: "vlcm", status = status.as_u16(), "login rejected");
        return Err(AuthError::Authentication { status: status.as_u16(), message: truncate(text.trim(), MAX_ERROR_BODY) });
    }
    let bytes = resp.bytes().await.map_err(classify_send_error)?;
    let token = extract_token(&bytes)?;

    info!(target: "vlcm", server = %base, username = body.username, "login succeeded");
    Ok(SessionContext::new(base, token, body.username.to_string(), transport))
}

/// Blocking form of `connect`. Runs the login on a private single-threaded runtime,
/// so it must not be called from inside an async context.
pub fn connect_blocking(server: &str, credential: &CredentialInput, transport: &TransportOptions) -> AuthResult<SessionContext> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(AuthError::config("connect_blocking called from within an async runtime; use connect"));
    }
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AuthError::config(format!("cannot start runtime: {}", e)))?;
    rt.block_on(connect(server, credential, transport))
}

/// Pull a non-empty string `token` out of a login response body.
pub fn extract_token(body: &[u8]) -> AuthResult<String> {
    let v: Value = serde_json::from_slice(body)
        .map_err(|e| AuthError::protocol(format!("login response is not JSON: {}", e)))?;
    let obj = v.as_object().ok_or_else(|| AuthError::protocol("login response is not a JSON object"))?;
    match obj.get("token") {
        Some(Value::String(t)) if !t.is_empty() => Ok(t.clone()),
        Some(Value::String(_)) => Err(AuthError::protocol("login response has an empty token")),
        Some(_) => Err(AuthError::protocol("login response token is not a string")),
        None => Err(AuthError::protocol("login response has no token field")),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max { return s.to_string(); }
    let mut end = max;
    while !s.is_char_boundary(end) { end -= 1; }
    format!("{}...", &s[..end])
}

/// Loose login parameters as a caller collects them (flags, env, prompts).
/// `connect` picks the credential form and refuses ambiguous input before any I/O.
#[derive(Debug, Default)]
pub struct ConnectArgs {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub secret: Option<SecretString>,
    pub credential: Option<CredentialPair>,
    pub transport: TransportOptions,
}

impl ConnectArgs {
    pub fn new(server: impl Into<String>) -> Self { Self { server: server.into(), ..Default::default() } }

    pub fn into_parts(self) -> AuthResult<(String, CredentialInput, TransportOptions)> {
        let credential = CredentialInput::from_parts(self.username, self.password, self.secret, self.credential)?;
        Ok((self.server, credential, self.transport))
    }

    pub async fn connect(self) -> AuthResult<SessionContext> {
        let (server, credential, transport) = self.into_parts()?;
        connect(&server, &credential, &transport).await
    }

    pub fn connect_blocking(self) -> AuthResult<SessionContext> {
        let (server, credential, transport) = self.into_parts()?;
        connect_blocking(&server, &credential, &transport)
    }
}
