//! vLCM session establishment
//! --------------------------
//! Authenticates against the vLCM appliance login API and returns a
//! `SessionContext` that callers pass to every later API call. There is no
//! global session: whoever logs in owns the context.

pub mod connectivity;
pub mod credential;
pub mod error;
pub mod session;
pub mod transport;

pub use connectivity::{connect, connect_blocking, ConnectArgs, LOGIN_PATH};
pub use credential::{CredentialInput, CredentialPair};
pub use error::{AuthError, AuthResult};
pub use session::SessionContext;
pub use transport::{SslProtocol, TransportOptions};

pub use secrecy::SecretString;
