//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and feeds HTTP/1.1 requests either to a plain handler
//! function ([`Server::run`]) or to a [`Host`] route table ([`Server::serve`]).
//! Persistent connections (keep-alive) and pipelined requests are supported.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::host::Host;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) buffered before answering `413` (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// The waypath HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use waypath::{Context, Host, HostConfig, Response, Server, StatusCode, WildcardKind};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut host = Host::new(HostConfig::default());
///     host.get("hello/{param}", &[WildcardKind::String], |ctx: Context| async move {
///         Response::new(StatusCode::Ok).body(format!("Hello, {}!", ctx.args()[0]))
///     })?;
///
///     Server::bind("127.0.0.1:8080").await?.serve(host).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dispatches every request through `host`.
    ///
    /// Runs until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve(self, host: Host) -> Result<(), ServerError> {
        let host = Arc::new(host);
        self.run(move |request| {
            let host = Arc::clone(&host);
            async move { host.dispatch(request).await }
        })
        .await
    }

    /// Starts accepting connections and passing requests to `handler`.
    ///
    /// The handler is wrapped in an [`Arc`] and shared across all spawned Tokio tasks,
    /// so it must be `Send + Sync + 'static`. Runs until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "waypath listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves one connection, one request per loop iteration, until the peer closes it or
/// a request opts out of keep-alive.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered; only read when there is nothing
        // complete to parse.
        let parsed = if buf.is_empty() {
            Err(RequestError::Incomplete)
        } else {
            Request::parse(&buf)
        };

        let (mut request, body_offset) = match parsed {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                if buf.len() > MAX_REQUEST_SIZE {
                    reject(&mut stream, peer_addr, StatusCode::PayloadTooLarge).await?;
                    break;
                }
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(peer = %peer_addr, "connection closed by peer");
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "malformed request");
                reject(&mut stream, peer_addr, StatusCode::BadRequest).await?;
                break;
            }
        };

        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if total_needed > MAX_REQUEST_SIZE {
            reject(&mut stream, peer_addr, StatusCode::PayloadTooLarge).await?;
            break;
        }
        if buf.len() < total_needed {
            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed mid-body");
                break;
            }
            continue;
        }
        request.truncate_body(content_length);

        let keep_alive = request.is_keep_alive();
        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = request.path(),
            "dispatching request"
        );

        let mut response = handler(request).await;
        if !keep_alive {
            response = response.keep_alive(false);
        }
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

async fn reject(
    stream: &mut TcpStream,
    peer_addr: SocketAddr,
    status: StatusCode,
) -> Result<(), std::io::Error> {
    warn!(peer = %peer_addr, status = status.as_u16(), "rejecting request");
    let response = Response::reason(status).keep_alive(false);
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}
