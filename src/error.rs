//! Error model for session establishment.
//! Every failure of a login attempt maps to exactly one `AuthError` variant,
//! each with a stable code string and a process exit code for the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid caller input: credential parameter sets, server, protocol name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection refused, DNS failure, timeout.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Certificate validation or protocol negotiation failed.
    #[error("tls error: {message}")]
    Tls {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The appliance rejected the login with a non-success status.
    #[error("authentication failed: HTTP {status}: {message}")]
    Authentication { status: u16, message: String },

    /// Success status but the body did not carry a usable token.
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn config<S: Into<String>>(msg: S) -> Self { AuthError::Configuration(msg.into()) }
    pub fn protocol<S: Into<String>>(msg: S) -> Self { AuthError::Protocol(msg.into()) }
    pub fn tls<S: Into<String>>(msg: S) -> Self { AuthError::Tls { message: msg.into(), source: None } }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Network { .. } => "network_error",
            AuthError::Tls { .. } => "tls_error",
            AuthError::Authentication { .. } => "authentication_error",
            AuthError::Protocol(_) => "protocol_error",
        }
    }

    /// Exit status used by `vlcm-connect`. 1 is left to anyhow failures outside the login.
    pub fn exit_code(&self) -> i32 {
        match self {
            AuthError::Configuration(_) => 2,
            AuthError::Network { .. } => 3,
            AuthError::Tls { .. } => 4,
            AuthError::Authentication { .. } => 5,
            AuthError::Protocol(_) => 6,
        }
    }

    pub fn is_configuration(&self) -> bool { matches!(self, AuthError::Configuration(_)) }
    pub fn is_network(&self) -> bool { matches!(self, AuthError::Network { .. }) }
    pub fn is_tls(&self) -> bool { matches!(self, AuthError::Tls { .. }) }
    pub fn is_authentication(&self) -> bool { matches!(self, AuthError::Authentication { .. }) }
    pub fn is_protocol(&self) -> bool { matches!(self, AuthError::Protocol(_)) }
}
