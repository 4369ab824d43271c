//! Listening socket for the gRPC server.
//!
//! The server listens on TCP by default. A Unix domain socket can be used
//! instead when clients run on the same host.

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tower_http::classify::{GrpcErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn, Span};

/// Request header whose value is attached to every request span.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
}

/// Transport type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Tcp,
    Uds,
}

/// Transport configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Transport type discriminator.
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub tcp: TcpConfig,
    pub uds: UdsConfig,
}

/// TCP listen address.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

impl TcpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Unix socket location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdsConfig {
    pub path: PathBuf,
}

impl Default for UdsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/counters/counters.sock"),
        }
    }
}

/// A listener ready to be handed to the tonic router.
pub enum Listener {
    /// tonic binds the address itself.
    Tcp(SocketAddr),
    /// Connections accepted on a bound Unix socket. `socket` unlinks the
    /// file once the server is done with it.
    Uds {
        incoming: UnixListenerStream,
        socket: SocketFile,
    },
}

/// Resolve the configured transport into a listener.
///
/// Must be called from within the tokio runtime.
pub fn bind(config: &TransportConfig) -> Result<Listener, TransportError> {
    match config.transport_type {
        TransportType::Tcp => {
            let addr = config.tcp.socket_addr()?;
            info!(address = %addr, transport = "tcp", "Server listening");
            Ok(Listener::Tcp(addr))
        }
        TransportType::Uds => {
            let socket = SocketFile::claim(&config.uds.path)?;
            let incoming = UnixListenerStream::new(UnixListener::bind(socket.path())?);
            info!(path = %socket.path().display(), transport = "uds", "Server listening");
            Ok(Listener::Uds { incoming, socket })
        }
    }
}

/// Unix socket file owned by this process.
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
}

impl SocketFile {
    /// Take ownership of `path`: create its directory and unlink whatever a
    /// previous run left behind there.
    pub fn claim(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed leftover socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

type RequestSpan = fn(&http::Request<tonic::body::BoxBody>) -> Span;

/// Tower trace layer opening one span per RPC.
pub fn grpc_trace_layer() -> TraceLayer<SharedClassifier<GrpcErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_grpc().make_span_with(request_span::<tonic::body::BoxBody> as RequestSpan)
}

/// Span naming the called service and method, plus the caller's correlation
/// id when one was sent.
fn request_span<B>(request: &http::Request<B>) -> Span {
    let (service, method) = split_rpc_path(request.uri().path());
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    tracing::info_span!("rpc", rpc.service = %service, rpc.method = %method, %correlation_id)
}

/// `/counters.v1.CounterService/Get` -> (`counters.v1.CounterService`, `Get`).
fn split_rpc_path(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches('/');
    path.split_once('/').unwrap_or((path, ""))
}
