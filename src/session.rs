//! Authenticated session handle returned by a successful login.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transport::{SslProtocol, TransportOptions, DEFAULT_TIMEOUT};

/// Everything later API calls need: where the appliance is, the bearer token,
/// who logged in and which transport policy the login used.
///
/// Immutable once built; only `connect` (or deserializing a saved context) creates one.
/// Deserializing goes through `SessionRecord`, so an empty token never yields a context.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct SessionContext {
    server_base_url: String,
    token: String,
    username: String,
    certificates_validated: bool,
    ssl_protocol: SslProtocol,
    timeout_ms: u64,
}

// On-disk shape; `timeout_ms` is absent from contexts saved before it was recorded.
#[derive(Deserialize)]
struct SessionRecord {
    server_base_url: String,
    token: String,
    username: String,
    certificates_validated: bool,
    ssl_protocol: SslProtocol,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

fn default_timeout_ms() -> u64 { DEFAULT_TIMEOUT.as_millis() as u64 }

impl TryFrom<SessionRecord> for SessionContext {
    type Error = String;

    fn try_from(r: SessionRecord) -> Result<Self, Self::Error> {
        if r.token.is_empty() {
            return Err("session has no token".to_string());
        }
        Ok(Self {
            server_base_url: r.server_base_url,
            token: r.token,
            username: r.username,
            certificates_validated: r.certificates_validated,
            ssl_protocol: r.ssl_protocol,
            timeout_ms: r.timeout_ms,
        })
    }
}

impl SessionContext {
    pub(crate) fn new(server_base_url: String, token: String, username: String, transport: &TransportOptions) -> Self {
        debug_assert!(!token.is_empty());
        Self {
            server_base_url,
            token,
            username,
            certificates_validated: !transport.ignore_cert_requirements,
            ssl_protocol: transport.ssl_protocol,
            timeout_ms: transport.timeout.as_millis() as u64,
        }
    }

    pub fn server_base_url(&self) -> &str { &self.server_base_url }
    pub fn token(&self) -> &str { &self.token }
    pub fn username(&self) -> &str { &self.username }
    pub fn certificates_validated(&self) -> bool { self.certificates_validated }
    pub fn ssl_protocol(&self) -> SslProtocol { self.ssl_protocol }

    pub fn bearer_header(&self) -> String { format!("Bearer {}", self.token) }

    /// `api_url("/lcm/api/v1/depots")` -> `https://host/lcm/api/v1/depots`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.server_base_url, path.trim_start_matches('/'))
    }

    /// Transport settings matching the login, for building clients for follow-up calls.
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            ignore_cert_requirements: !self.certificates_validated,
            ssl_protocol: self.ssl_protocol,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(self) }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
            }
        }
        std::fs::write(path, self.to_json()?).with_context(|| format!("cannot write {}", path.display()))
    }

    /// Read a context written by `save`. A file with an empty token is rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid session file {}", path.display()))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("server_base_url", &self.server_base_url)
            .field("token", &"[REDACTED]")
            .field("username", &self.username)
            .field("certificates_validated", &self.certificates_validated)
            .field("ssl_protocol", &self.ssl_protocol)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
