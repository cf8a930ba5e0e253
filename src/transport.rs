//! Transport security settings and the per-call HTTP client.
//! -------------------------------------------------------
//! Certificate policy and protocol pinning are applied to the one
//! `reqwest::Client` built for a login, never to process-wide state, so
//! concurrent logins against differently configured appliances do not
//! interfere with each other.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::tls::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Protocol pin for the login connection. `Default` lets the TLS library negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SslProtocol {
    #[default]
    Default,
    /// TLS 1.0
    Tls,
    Tls11,
    Tls12,
    Tls13,
    /// Legacy SSL 3.0
    Ssl3,
}

impl SslProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslProtocol::Default => "Default",
            SslProtocol::Tls => "Tls",
            SslProtocol::Tls11 => "Tls11",
            SslProtocol::Tls12 => "Tls12",
            SslProtocol::Tls13 => "Tls13",
            SslProtocol::Ssl3 => "Ssl3",
        }
    }

    /// The reqwest version to pin, or `None` for `Default`.
    /// Errors for protocols the rustls backend cannot negotiate.
    fn pinned_version(&self) -> AuthResult<Option<Version>> {
        match self {
            SslProtocol::Default => Ok(None),
            SslProtocol::Tls12 => Ok(Some(Version::TLS_1_2)),
            SslProtocol::Tls13 => Ok(Some(Version::TLS_1_3)),
            SslProtocol::Tls | SslProtocol::Tls11 | SslProtocol::Ssl3 => Err(AuthError::tls(format!(
                "protocol {} is not supported by the TLS transport (TLS 1.2 and 1.3 only)",
                self.as_str()
            ))),
        }
    }
}

impl fmt::Display for SslProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SslProtocol {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s.trim().chars().filter(|c| !matches!(c, '.' | '_' | '-' | ' ')).collect::<String>().to_ascii_lowercase();
        match norm.as_str() {
            "" | "default" => Ok(SslProtocol::Default),
            "tls" | "tls1" | "tls10" => Ok(SslProtocol::Tls),
            "tls11" => Ok(SslProtocol::Tls11),
            "tls12" => Ok(SslProtocol::Tls12),
            "tls13" => Ok(SslProtocol::Tls13),
            "ssl3" | "ssl30" | "ssl" => Ok(SslProtocol::Ssl3),
            _ => Err(AuthError::config(format!(
                "invalid ssl protocol '{}': expected one of Default, Tls, Tls11, Tls12, Tls13, Ssl3",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub ignore_cert_requirements: bool,
    pub ssl_protocol: SslProtocol,
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self { ignore_cert_requirements: false, ssl_protocol: SslProtocol::Default, timeout: DEFAULT_TIMEOUT }
    }
}

impl TransportOptions {
    pub fn ignore_cert_requirements(mut self, yes: bool) -> Self { self.ignore_cert_requirements = yes; self }
    pub fn ssl_protocol(mut self, p: SslProtocol) -> Self { self.ssl_protocol = p; self }
    pub fn timeout(mut self, t: Duration) -> Self { self.timeout = t; self }
}

/// Build the client used for one login. Nothing here outlives the returned value.
pub fn build_client(opts: &TransportOptions) -> AuthResult<reqwest::Client> {
    let pinned = opts.ssl_protocol.pinned_version()?;
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(opts.timeout)
        .redirect(Policy::none());
    if let Some(v) = pinned {
        builder = builder.min_tls_version(v).max_tls_version(v);
    }
    if opts.ignore_cert_requirements {
        // rustls skips chain and host name checks together under this flag
        builder = builder.danger_accept_invalid_certs(true);
    }
    debug!(target: "vlcm", ssl_protocol = %opts.ssl_protocol, validate_certs = !opts.ignore_cert_requirements, timeout_ms = opts.timeout.as_millis() as u64, "building login transport");
    builder.build().map_err(|e| {
        if pinned.is_some() {
            AuthError::Tls { message: format!("cannot configure protocol {}: {}", opts.ssl_protocol, e), source: Some(e) }
        } else {
            AuthError::config(format!("cannot build http client: {}", e))
        }
    })
}

/// Map a failed send onto `Tls` or `Network`.
pub fn classify_send_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        return AuthError::Network { message: format!("request timed out: {}", err), source: Some(err) };
    }
    // start below the reqwest error: its Display includes the URL, which may contain "tls"
    match tls_failure_in_chain(std::error::Error::source(&err)) {
        Some(detail) => AuthError::Tls { message: detail, source: Some(err) },
        None => {
            let message = describe_chain(&err);
            AuthError::Network { message, source: Some(err) }
        }
    }
}

fn tls_failure_in_chain(first: Option<&(dyn StdError + 'static)>) -> Option<String> {
    let mut cur = first;
    while let Some(e) = cur {
        if let Some(r) = e.downcast_ref::<rustls::Error>() {
            return Some(r.to_string());
        }
        if let Some(r) = e.downcast_ref::<io::Error>().and_then(rustls_in_io) {
            return Some(r.to_string());
        }
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return Some(e.to_string());
        }
        cur = e.source();
    }
    None
}

// hyper-rustls nests the rustls error in io::Errors that `source()` does not expose.
fn rustls_in_io(err: &io::Error) -> Option<&rustls::Error> {
    let mut cur = err.get_ref();
    while let Some(inner) = cur {
        if let Some(r) = inner.downcast_ref::<rustls::Error>() {
            return Some(r);
        }
        cur = inner.downcast_ref::<io::Error>().and_then(io::Error::get_ref);
    }
    None
}

fn describe_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut cur = std::error::Error::source(err);
    while let Some(e) = cur {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cur = std::error::Error::source(e);
    }
    out
}
