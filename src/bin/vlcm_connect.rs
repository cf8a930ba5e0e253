//!
//! vlcm-connect
//! ------------
//! Logs in to a vLCM appliance and prints the session context as JSON
//! (or writes it to `--output`). Every flag can also come from a `VLCM_*`
//! environment variable; flags win.
//!
//! Exit codes: 0 ok, 1 other failure, 2 configuration, 3 network, 4 TLS,
//! 5 authentication rejected, 6 malformed login response.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::zeroize::Zeroize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use vlcm_session::{AuthError, ConnectArgs, CredentialPair, SecretString, SslProtocol, TransportOptions};

#[derive(Debug, Parser)]
#[command(name = "vlcm-connect")]
#[command(version, about = "Authenticate against a vLCM appliance and emit the session context", long_about = None)]
struct Cli {
    /// Appliance host name or address, optionally with :port.
    #[arg(short, long, env = "VLCM_SERVER")]
    server: String,

    /// Username for the password or stdin-secret forms.
    #[arg(short, long, env = "VLCM_USERNAME")]
    username: Option<String>,

    /// Password in plain text.
    #[arg(short, long, env = "VLCM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read the secret from stdin instead of taking a password flag.
    #[arg(long)]
    password_stdin: bool,

    /// JSON file holding {"username": ..., "password": ...}.
    #[arg(long, env = "VLCM_CREDENTIAL_FILE")]
    credential_file: Option<PathBuf>,

    /// Skip certificate validation for this connection.
    #[arg(long, env = "VLCM_IGNORE_CERT")]
    ignore_cert_requirements: bool,

    /// Default, Tls, Tls11, Tls12, Tls13 or Ssl3.
    #[arg(long, env = "VLCM_SSL_PROTOCOL", default_value = "Default")]
    ssl_protocol: String,

    /// Request timeout in seconds.
    #[arg(long, env = "VLCM_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Write the session JSON here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the session JSON
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            let code = e.downcast_ref::<AuthError>().map(AuthError::exit_code).unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ssl_protocol: SslProtocol = cli.ssl_protocol.parse()?;
    let secret = if cli.password_stdin { Some(read_secret(std::io::stdin().lock())?) } else { None };
    let credential = cli.credential_file.as_deref().map(CredentialPair::from_json_file).transpose()?;
    let transport = TransportOptions::default()
        .ignore_cert_requirements(cli.ignore_cert_requirements)
        .ssl_protocol(ssl_protocol)
        .timeout(Duration::from_secs(cli.timeout_secs));

    let args = ConnectArgs {
        server: cli.server,
        username: cli.username,
        password: cli.password,
        secret,
        credential,
        transport,
    };
    let session = args.connect().await?;

    match cli.output {
        Some(path) => write_session(&session, &path)?,
        None => println!("{}", session.to_json()?),
    }
    Ok(())
}

fn write_session(session: &vlcm_session::SessionContext, path: &Path) -> Result<()> {
    session.save(path)?;
    info!(target: "vlcm", path = %path.display(), "session written");
    Ok(())
}

// One line, trailing newline stripped. The read buffer is wiped afterwards.
fn read_secret(mut input: impl Read) -> Result<SecretString> {
    let mut buf = String::new();
    input.read_to_string(&mut buf).context("cannot read secret from stdin")?;
    let secret = buf.lines().next().unwrap_or("").to_string();
    buf.zeroize();
    if secret.is_empty() {
        return Err(AuthError::config("empty secret on stdin").into());
    }
    Ok(SecretString::from(secret))
}
