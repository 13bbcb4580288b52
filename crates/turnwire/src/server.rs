//! `Server` builder and accept loop.
//!
//! A server is an ordinary value owned by its caller. There is no global
//! listener, so several servers can run side by side in one process.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use turnwire_protocol::FrameCodec;
use turnwire_transport::{TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{Channel, Evaluator, ServerConfig, TurnwireError};

/// Pause after a failed accept so a persistent failure (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder for configuring and starting a TCP server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:7400")
///     .max_payload(1 << 20)
///     .build(my_evaluator)
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Refuses commands with payloads longer than `limit` bytes.
    pub fn max_payload(mut self, limit: usize) -> Self {
        self.config.max_payload = Some(limit);
        self
    }

    /// Bounds every read and write on accepted connections.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Binds the listener and returns a server ready to [`run`](Server::run).
    pub async fn build<E: Evaluator>(
        self,
        evaluator: E,
    ) -> Result<Server<E, TcpTransport>, TurnwireError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        Ok(Server::with_transport(transport, evaluator, &self.config))
    }
}

/// Shared state passed to each connection task.
struct ServerState<E> {
    evaluator: Arc<E>,
    codec: FrameCodec,
    io_timeout: Option<Duration>,
}

/// A bound turnwire server.
///
/// Call [`run`](Self::run) or [`run_until`](Self::run_until) to start
/// accepting connections.
pub struct Server<E, T> {
    transport: T,
    state: ServerState<E>,
}

impl<E, T> Server<E, T>
where
    E: Evaluator,
    T: Transport,
{
    /// Creates a server over an already-bound transport.
    pub fn with_transport(transport: T, evaluator: E, config: &ServerConfig) -> Self {
        Self {
            transport,
            state: ServerState {
                evaluator: Arc::new(evaluator),
                codec: config.codec(),
                io_timeout: config.io_timeout(),
            },
        }
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, T::Error> {
        self.transport.local_addr()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), TurnwireError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Each connection is served on its own task. When `shutdown` fires the
    /// listener stops accepting and every open connection is dropped,
    /// which closes its socket.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), TurnwireError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "turnwire server running");

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "connection task panicked");
                        }
                    }
                }

                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let channel = Channel::new(conn)
                            .with_codec(self.state.codec)
                            .with_io_timeout(self.state.io_timeout);
                        let evaluator = Arc::clone(&self.state.evaluator);
                        tasks.spawn(async move {
                            let conn_id = channel.id();
                            if let Err(e) = handle_connection(channel, evaluator).await {
                                tracing::warn!(%conn_id, error = %e, "connection closed on error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        tracing::info!(open = tasks.len(), "turnwire server shutting down");
        tasks.shutdown().await;
        Ok(())
    }
}
