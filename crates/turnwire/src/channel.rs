//! Message channel over one connection: send, receive, request.
//!
//! A [`Channel`] pairs a [`Connection`] with a [`FrameCodec`] and enforces
//! the close-on-failure policy. Whenever a frame may have been half
//! written or half read, the peer's view of the stream is already out of
//! step with ours, so the connection is closed before the error is
//! returned. Nothing is ever left behind for a retry.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use turnwire_protocol::{FrameCodec, Message, ProtocolError, TypeCode};
use turnwire_transport::{Connection, ConnectionId, TransportError};

use crate::{ClientConfig, TurnwireError};

/// A channel to a turnwire server over TCP.
pub type Client = Channel<TcpStream>;

/// Sends and receives whole messages over a [`Connection`].
///
/// One request is in flight at a time: [`request`](Self::request) takes
/// `&mut self` and returns only after the single reply has been read.
#[derive(Debug)]
pub struct Channel<S> {
    conn: Connection<S>,
    codec: FrameCodec,
    io_timeout: Option<Duration>,
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an open connection with an unbounded codec and no timeout.
    pub fn new(conn: Connection<S>) -> Self {
        Self {
            conn,
            codec: FrameCodec::default(),
            io_timeout: None,
        }
    }

    /// Sets the codec used for both directions.
    pub fn with_codec(mut self, codec: FrameCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Bounds every read and write. `None` waits forever.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    pub fn peer(&self) -> Option<&str> {
        self.conn.peer()
    }

    /// Closes the underlying connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.conn.close().await;
    }

    /// Sends one message.
    ///
    /// # Errors
    /// - [`TransportError::Closed`] if the connection is already closed
    /// - [`TransportError::SendFailed`] or [`TransportError::TimedOut`]
    ///   if the write fails; the connection is closed first
    pub async fn send_message(
        &mut self,
        kind: TypeCode,
        payload: &[u8],
    ) -> Result<(), TurnwireError> {
        let codec = self.codec;
        let limit = self.io_timeout;
        let stream = self.conn.stream_mut()?;

        let err = match within(limit, codec.write(stream, kind, payload)).await {
            Ok(Ok(())) => {
                tracing::trace!(id = %self.conn.id(), %kind, len = payload.len(), "sent");
                return Ok(());
            }
            Ok(Err(e)) => TransportError::SendFailed(e),
            Err(elapsed) => TransportError::TimedOut(elapsed),
        };
        self.conn.close().await;
        Err(err.into())
    }

    /// Receives one message.
    ///
    /// # Errors
    /// - [`TransportError::Closed`] if the connection is already closed
    /// - any [`ProtocolError`] from decoding, or [`TransportError::TimedOut`];
    ///   the connection is closed first
    pub async fn receive_message(&mut self) -> Result<Message, TurnwireError> {
        let codec = self.codec;
        let limit = self.io_timeout;
        let stream = self.conn.stream_mut()?;

        let err: TurnwireError = match within(limit, codec.decode(stream)).await {
            Ok(Ok(message)) => {
                tracing::trace!(
                    id = %self.conn.id(),
                    kind = %message.kind(),
                    len = message.len(),
                    "received"
                );
                return Ok(message);
            }
            Ok(Err(e)) => e.into(),
            Err(elapsed) => TransportError::TimedOut(elapsed).into(),
        };
        self.conn.close().await;
        Err(err)
    }

    /// Sends `command` and waits for its single reply.
    ///
    /// A result reply yields its payload as text. An error reply becomes
    /// [`TurnwireError::Application`] carrying the peer's text verbatim,
    /// and the connection stays open. Any other reply type is a protocol
    /// violation: the connection is closed and
    /// [`ProtocolError::UnexpectedType`] is returned.
    pub async fn request(&mut self, command: &str) -> Result<String, TurnwireError> {
        self.send_message(TypeCode::COMMAND, command.as_bytes()).await?;
        let reply = self.receive_message().await?;

        match reply.kind() {
            TypeCode::RESULT => Ok(reply.text().into_owned()),
            TypeCode::ERROR => Err(TurnwireError::Application(reply.text().into_owned())),
            other => {
                tracing::debug!(id = %self.conn.id(), kind = %other, "unexpected reply type");
                self.conn.close().await;
                Err(ProtocolError::UnexpectedType(other).into())
            }
        }
    }
}

impl Channel<TcpStream> {
    /// Connects to `host:port` (loopback when `host` is `None`).
    pub async fn connect(host: Option<&str>, port: u16) -> Result<Self, TurnwireError> {
        Ok(Self::new(Connection::connect(host, port).await?))
    }

    /// Connects using the host, port, limit and timeout from `config`.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self, TurnwireError> {
        let conn = Connection::connect(config.host.as_deref(), config.port).await?;
        Ok(Self::new(conn)
            .with_codec(config.codec())
            .with_io_timeout(config.io_timeout()))
    }
}

/// Runs `fut`, giving up after `limit` if one is set.
async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
    use turnwire_protocol::{decode, write_frame};

    /// A channel plus the raw stream standing in for the server.
    fn pair() -> (Channel<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(1024);
        let conn = Connection::from_stream(client, Some("test".into()), 1);
        (Channel::new(conn), server)
    }

    /// Reads one command from `server` and answers it with `reply`.
    async fn answer(server: &mut DuplexStream, kind: TypeCode, reply: &[u8]) -> Message {
        let command = decode(server).await.unwrap();
        write_frame(server, kind, reply).await.unwrap();
        command
    }

    #[tokio::test]
    async fn test_request_returns_result_payload() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            answer(&mut server, TypeCode::RESULT, b"42").await
        });

        let value = channel.request("x").await.unwrap();
        assert_eq!(value, "42");
        assert_eq!(peer.await.unwrap(), Message::command("x"));
        assert!(channel.is_open());
    }

    #[tokio::test]
    async fn test_error_reply_keeps_connection_open() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            answer(&mut server, TypeCode::ERROR, b"undefined variable").await;
            answer(&mut server, TypeCode::RESULT, b"ok").await;
        });

        let err = channel.request("ls").await.unwrap_err();
        assert!(matches!(&err, TurnwireError::Application(text) if text == "undefined variable"));
        assert!(channel.is_open());

        assert_eq!(channel.request("again").await.unwrap(), "ok");
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_reply_type_closes() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            answer(&mut server, TypeCode::COMMAND, b"ping").await;
        });

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::UnexpectedType(kind)) if kind == TypeCode::COMMAND
        ));
        assert!(err.is_fatal());
        assert!(!channel.is_open());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_truncated_reply_closes() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            let _ = decode(&mut server).await.unwrap();
            server.write_all(b"R:10\nabc").await.unwrap();
            // Dropping the stream ends the reply early.
        });

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::TruncatedPayload { .. })
        ));
        assert!(!channel.is_open());
        assert_eq!(channel.peer(), None);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_reply_closes() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            let _ = decode(&mut server).await.unwrap();
            server.write_all(b"R;5\nhello\n").await.unwrap();
            server
        });

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::MalformedHeader { .. })
        ));
        assert!(!channel.is_open());
        drop(peer.await.unwrap());
    }

    /// Reads one command, writes `raw` as the reply and hangs up.
    async fn reply_raw_and_hang_up(mut server: DuplexStream, raw: &'static [u8]) {
        let _ = decode(&mut server).await.unwrap();
        server.write_all(raw).await.unwrap();
    }

    #[tokio::test]
    async fn test_short_header_closes() {
        let (mut channel, server) = pair();
        let peer = tokio::spawn(reply_raw_and_hang_up(server, b"R:"));

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::TruncatedHeader { received: 2 })
        ));
        assert!(!channel.is_open());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_terminator_closes() {
        let (mut channel, server) = pair();
        let peer = tokio::spawn(reply_raw_and_hang_up(server, b"R:1\nab"));

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::MissingTerminator { found: b'b' })
        ));
        assert!(!channel.is_open());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_overflowing_length_closes() {
        let (mut channel, server) = pair();
        let peer = tokio::spawn(reply_raw_and_hang_up(
            server,
            b"R:999999999999999999999999999999\n",
        ));

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::LengthOverflow)
        ));
        assert!(!channel.is_open());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_use_after_close_is_bad_descriptor() {
        let (mut channel, _server) = pair();
        channel.close().await;
        channel.close().await;

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(err, TurnwireError::Transport(TransportError::Closed)));

        let err = channel.receive_message().await.unwrap_err();
        assert!(matches!(err, TurnwireError::Transport(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_sequential_requests_are_independent() {
        let (mut channel, mut server) = pair();
        let peer = tokio::spawn(async move {
            for reply in ["one", "two\nlines", ""] {
                answer(&mut server, TypeCode::RESULT, reply.as_bytes()).await;
            }
        });

        assert_eq!(channel.request("a").await.unwrap(), "one");
        assert_eq!(channel.request("b").await.unwrap(), "two\nlines");
        assert_eq!(channel.request("c").await.unwrap(), "");
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_over_limit_closes() {
        let (mut channel, mut server) = pair();
        channel = channel.with_codec(FrameCodec::with_max_payload(3));
        let peer = tokio::spawn(async move {
            answer(&mut server, TypeCode::RESULT, b"too long").await;
            server
        });

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::PayloadTooLarge { length: 8, limit: 3 })
        ));
        assert!(!channel.is_open());
        drop(peer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out_and_closes() {
        let (channel, _server) = pair();
        let mut channel = channel.with_io_timeout(Some(Duration::from_secs(5)));

        let err = channel.request("x").await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Transport(TransportError::TimedOut(d)) if d == Duration::from_secs(5)
        ));
        assert!(!channel.is_open());
    }
}
