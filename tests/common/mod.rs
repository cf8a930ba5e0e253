//! In-process HTTPS stand-in for the vLCM appliance login endpoint.
//! Serves axum over tokio-rustls with a fresh self-signed certificate and
//! records every login request it sees.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::serve::Listener;
use axum::Router;
use rcgen::CertifiedKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::version::{TLS12, TLS13};
use tokio_rustls::rustls::{self, SupportedProtocolVersion};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

pub static BOTH: &[&SupportedProtocolVersion] = &[&TLS12, &TLS13];
pub static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&TLS12];
pub static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&TLS13];

#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with `{"token": <value>}`
    Token(&'static str),
    /// 200 with a new token on every call: token-1, token-2, ...
    FreshToken,
    /// Given status with a small JSON error body
    Status(u16),
    /// 200 with this raw body
    Raw(&'static str),
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub headers: HeaderMap,
    pub body: String,
}

pub struct MockState {
    reply: Reply,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct MockAppliance {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockAppliance {
    /// Value to pass as `server`: host:port, no scheme.
    pub fn server(&self) -> String { format!("127.0.0.1:{}", self.addr.port()) }
    pub fn calls(&self) -> usize { self.state.calls.load(Ordering::SeqCst) }
    pub fn seen(&self) -> Vec<SeenRequest> { self.state.seen.lock().unwrap().clone() }
}

impl Drop for MockAppliance {
    fn drop(&mut self) { self.handle.abort(); }
}

struct TlsListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (tcp, addr) = match self.inner.accept().await {
                Ok(x) => x,
                Err(_) => continue,
            };
            // failed handshakes (untrusted cert, version mismatch) are expected in tests
            match self.acceptor.accept(tcp).await {
                Ok(tls) => return (tls, addr),
                Err(_) => continue,
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> { self.inner.local_addr() }
}

fn tls_acceptor(versions: &[&'static SupportedProtocolVersion]) -> TlsAcceptor {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()]).expect("self-signed cert");
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_protocol_versions(versions)
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .expect("server cert");
    TlsAcceptor::from(Arc::new(config))
}

async fn login(State(state): State<Arc<MockState>>, headers: HeaderMap, body: String) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let n = state.calls.fetch_add(1, Ordering::SeqCst) + 1;
    state.seen.lock().unwrap().push(SeenRequest { headers, body });
    let json = [(header::CONTENT_TYPE, "application/json")];
    match &state.reply {
        Reply::Token(t) => (StatusCode::OK, json, serde_json::json!({ "token": t }).to_string()),
        Reply::FreshToken => (StatusCode::OK, json, serde_json::json!({ "token": format!("token-{}", n) }).to_string()),
        Reply::Status(code) => (
            StatusCode::from_u16(*code).expect("status code"),
            json,
            r#"{"error":"invalid credentials"}"#.to_string(),
        ),
        Reply::Raw(body) => (StatusCode::OK, json, body.to_string()),
    }
}

/// Start a mock appliance on an ephemeral localhost port speaking only `versions`.
pub async fn start(reply: Reply, versions: &[&'static SupportedProtocolVersion]) -> MockAppliance {
    let tcp = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = tcp.local_addr().expect("local addr");
    let listener = TlsListener { inner: tcp, acceptor: tls_acceptor(versions) };
    let state = Arc::new(MockState { reply, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) });
    let app = Router::new().route("/lcm/api/v1/login", post(login)).with_state(state.clone());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock appliance error: {e:?}");
        }
    });
    MockAppliance { addr, state, handle }
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let l = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    l.local_addr().expect("local addr").port()
}

/// Accepts TCP connections and never answers, for timeout tests.
pub async fn silent_server() -> (JoinHandle<()>, u16) {
    let l = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let port = l.local_addr().expect("local addr").port();
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = l.accept().await {
            held.push(sock);
        }
    });
    (handle, port)
}

/// Answers every TLS connection with `status` and a Content-Length it never
/// honours, then hangs up mid-body.
pub async fn cut_off_rejection(status: u16) -> (JoinHandle<()>, u16) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let l = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let port = l.local_addr().expect("local addr").port();
    let acceptor = tls_acceptor(BOTH);
    let handle = tokio::spawn(async move {
        while let Ok((tcp, _)) = l.accept().await {
            let Ok(mut tls) = acceptor.accept(tcp).await else { continue };
            let mut buf = [0u8; 4096];
            let _ = tls.read(&mut buf).await;
            let head = format!("HTTP/1.1 {} Rejected\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{{\"err", status);
            let _ = tls.write_all(head.as_bytes()).await;
            let _ = tls.flush().await;
            let _ = tls.shutdown().await;
        }
    });
    (handle, port)
}
