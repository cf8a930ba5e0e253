//! Credential inputs accepted by the login call.
//! -------------------------------------------
//! Exactly one of three forms is supplied per login. `CredentialInput::from_parts`
//! maps the loose caller parameters (flags, env) onto one variant and rejects
//! ambiguous or incomplete combinations before anything touches the network.

use std::fmt;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Identity and secret carried together as one value.
pub struct CredentialPair {
    username: String,
    secret: SecretString,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { username: username.into(), secret: SecretString::from(secret.into()) }
    }

    pub fn username(&self) -> &str { &self.username }

    /// Load a pair from a JSON file of the form `{"username": "...", "password": "..."}`.
    pub fn from_json_file(path: &Path) -> AuthResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthError::config(format!("cannot read credential file {}: {}", path.display(), e)))?;
        let file: CredentialFile = serde_json::from_str(&text)
            .map_err(|e| AuthError::config(format!("invalid credential file {}: {}", path.display(), e)))?;
        Ok(Self::new(file.username, file.password))
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair").field("username", &self.username).field("secret", &"[REDACTED]").finish()
    }
}

#[derive(Deserialize)]
struct CredentialFile {
    username: String,
    password: String,
}

pub enum CredentialInput {
    UsernamePassword { username: String, password: String },
    UsernameSecret { username: String, secret: SecretString },
    CredentialObject(CredentialPair),
}

impl fmt::Debug for CredentialInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialInput::UsernamePassword { username, .. } => {
                f.debug_struct("UsernamePassword").field("username", username).field("password", &"[REDACTED]").finish()
            }
            CredentialInput::UsernameSecret { username, secret } => {
                f.debug_struct("UsernameSecret").field("username", username).field("secret", secret).finish()
            }
            CredentialInput::CredentialObject(pair) => f.debug_tuple("CredentialObject").field(pair).finish(),
        }
    }
}

/// Body of `POST /lcm/api/v1/login`. Field order is part of the wire format.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).field("password", &"[REDACTED]").finish()
    }
}

impl CredentialInput {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        CredentialInput::UsernamePassword { username: username.into(), password: password.into() }
    }

    pub fn username_secret(username: impl Into<String>, secret: SecretString) -> Self {
        CredentialInput::UsernameSecret { username: username.into(), secret }
    }

    pub fn credential(pair: CredentialPair) -> Self { CredentialInput::CredentialObject(pair) }

    /// Pick the single credential form implied by the supplied parameters.
    ///
    /// Accepted combinations:
    /// - `username` + `password`
    /// - `username` + `secret`
    /// - `credential` alone
    ///
    /// Anything else (two forms at once, a secret with no username, nothing at all)
    /// is a configuration error.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        secret: Option<SecretString>,
        credential: Option<CredentialPair>,
    ) -> AuthResult<Self> {
        match (username, password, secret, credential) {
            (Some(u), Some(p), None, None) => Ok(Self::username_password(u, p)),
            (Some(u), None, Some(s), None) => Ok(Self::username_secret(u, s)),
            (None, None, None, Some(c)) => Ok(Self::credential(c)),
            (None, None, None, None) => Err(AuthError::config(
                "no credentials supplied: pass username and password, username and secret, or a credential object",
            )),
            (_, Some(_), Some(_), _) => Err(AuthError::config("password and secret are mutually exclusive")),
            (_, _, _, Some(_)) => Err(AuthError::config(
                "a credential object cannot be combined with username, password or secret",
            )),
            (Some(_), None, None, None) => Err(AuthError::config("username supplied without a password or secret")),
            (None, _, _, None) => Err(AuthError::config("password or secret supplied without a username")),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            CredentialInput::UsernamePassword { username, .. } | CredentialInput::UsernameSecret { username, .. } => username,
            CredentialInput::CredentialObject(pair) => pair.username(),
        }
    }

    fn password(&self) -> &str {
        match self {
            CredentialInput::UsernamePassword { password, .. } => password,
            CredentialInput::UsernameSecret { secret, .. } => secret.expose_secret(),
            CredentialInput::CredentialObject(pair) => pair.secret.expose_secret(),
        }
    }

    /// Normalize to the plaintext pair sent in the login body. Local only.
    pub fn resolve(&self) -> AuthResult<LoginRequest<'_>> {
        let username = self.username();
        if username.trim().is_empty() {
            return Err(AuthError::config("username must not be empty"));
        }
        Ok(LoginRequest { username, password: self.password() })
    }
}
