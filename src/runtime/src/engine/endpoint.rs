//! Image engine endpoint addressing.
//!
//! Understands the `DOCKER_HOST` URI forms: `unix:///path`,
//! `npipe:////./pipe/name`, `tcp://host:port` and `http://host:port`.
//! TCP connections are always plaintext HTTP.

use std::fmt;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};

use d2w_core::error::{ConvertError, Result};

/// Port engines conventionally serve TLS on.
const TLS_PORT: &str = "2376";

/// A bidirectional byte stream to the engine.
pub trait EngineIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> EngineIo for T {}

/// Where the image engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    /// Unix domain socket
    Unix(PathBuf),
    /// Windows named pipe (e.g. `\\.\pipe\docker_engine`)
    NamedPipe(String),
    /// Plain TCP (`host:port`)
    Tcp(String),
}

impl EngineEndpoint {
    /// Parse a `DOCKER_HOST`-style URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let invalid = |reason: &str| ConvertError::ConfigError(format!("invalid engine host '{uri}': {reason}"));

        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(EngineEndpoint::Unix(PathBuf::from(path)));
        }

        if let Some(path) = uri.strip_prefix("npipe://") {
            if path.is_empty() {
                return Err(invalid("missing pipe path"));
            }
            return Ok(EngineEndpoint::NamedPipe(path.replace('/', "\\")));
        }

        let addr = uri
            .strip_prefix("tcp://")
            .or_else(|| uri.strip_prefix("http://"))
            .ok_or_else(|| invalid("unsupported scheme"))?;
        let addr = addr.trim_end_matches('/');
        if addr.is_empty() {
            return Err(invalid("missing address"));
        }
        if addr.contains(':') {
            Ok(EngineEndpoint::Tcp(addr.to_string()))
        } else {
            Ok(EngineEndpoint::Tcp(format!("{addr}:2375")))
        }
    }

    /// Check the endpoint can honour the requested transport security.
    ///
    /// TLS is not supported, so a TCP endpoint with verification requested is
    /// rejected rather than silently contacted in plaintext. Local sockets and
    /// pipes are unaffected.
    pub fn check_transport(&self, tls_verify: bool) -> Result<()> {
        let EngineEndpoint::Tcp(addr) = self else {
            return Ok(());
        };
        if tls_verify {
            return Err(ConvertError::ConfigError(format!(
                "TLS engine connections are not supported (tcp://{addr} with DOCKER_TLS_VERIFY set)"
            )));
        }
        if addr.rsplit(':').next() == Some(TLS_PORT) {
            tracing::warn!(endpoint = %self, "Connecting to the TLS port without TLS; requests are sent in plaintext");
        }
        Ok(())
    }

    /// Value for the HTTP `Host` header.
    pub fn host_header(&self) -> &str {
        match self {
            EngineEndpoint::Tcp(addr) => addr,
            _ => "localhost",
        }
    }

    /// Open a new connection to the endpoint.
    pub async fn connect(&self) -> Result<Box<dyn EngineIo>> {
        let unavailable = |e: std::io::Error| ConvertError::EngineUnavailable {
            endpoint: self.to_string(),
            message: e.to_string(),
        };

        match self {
            EngineEndpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(unavailable)?;
                Ok(Box::new(stream))
            }

            #[cfg(unix)]
            EngineEndpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(unavailable)?;
                Ok(Box::new(stream))
            }

            #[cfg(windows)]
            EngineEndpoint::NamedPipe(path) => {
                let pipe = tokio::net::windows::named_pipe::ClientOptions::new()
                    .open(path)
                    .map_err(unavailable)?;
                Ok(Box::new(pipe))
            }

            #[allow(unreachable_patterns)]
            other => Err(ConvertError::EngineUnavailable {
                endpoint: other.to_string(),
                message: "transport not supported on this platform".to_string(),
            }),
        }
    }
}

impl fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            EngineEndpoint::NamedPipe(path) => write!(f, "npipe://{}", path.replace('\\', "/")),
            EngineEndpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}
