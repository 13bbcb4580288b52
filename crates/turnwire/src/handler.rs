//! Per-connection dispatch: decode, route by type, reply.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is a loop over [`dispatch_once`]:
//!   1. Receive one message (any decode failure closes the connection)
//!   2. Command → evaluate → reply with a result or an error
//!   3. Error → log, no reply
//!   4. Anything else → log, no reply
//!
//! The server never answers anything but a command. Clients initiate and
//! servers answer or log, which is what keeps the protocol half-duplex.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use turnwire_protocol::TypeCode;

use crate::{Channel, Evaluator, TurnwireError};

/// What one dispatch step did with the message it read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A command was evaluated and answered.
    Replied,
    /// A non-command message was logged and dropped.
    Ignored,
    /// The peer hung up cleanly between messages.
    Closed,
}

/// Reads one message from `channel` and handles it.
///
/// Reactor-style hosts can call this once per readiness notification;
/// [`handle_connection`] simply calls it in a loop.
///
/// # Errors
/// Any receive or reply failure. The connection is closed by the time an
/// error is returned. An evaluator failure is not an error here: it is
/// sent back to the client as an error message.
pub async fn dispatch_once<S, E>(
    channel: &mut Channel<S>,
    evaluator: &E,
) -> Result<Dispatch, TurnwireError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    E: Evaluator,
{
    let message = match channel.receive_message().await {
        Ok(message) => message,
        Err(TurnwireError::Protocol(e)) if e.is_clean_close() => {
            return Ok(Dispatch::Closed);
        }
        Err(e) => return Err(e),
    };
    let conn_id = channel.id();

    match message.kind() {
        TypeCode::COMMAND => {
            let command = message.text();
            tracing::debug!(
                %conn_id,
                len = message.len(),
                command = preview(&command),
                "evaluating command"
            );

            let (kind, reply) = match evaluator.evaluate(&command).await {
                Ok(value) => (TypeCode::RESULT, value),
                Err(error) => {
                    tracing::debug!(%conn_id, %error, "command failed");
                    (TypeCode::ERROR, error)
                }
            };
            channel.send_message(kind, reply.as_bytes()).await?;
            Ok(Dispatch::Replied)
        }

        TypeCode::ERROR => {
            tracing::warn!(%conn_id, error = %message.text(), "peer reported an error");
            Ok(Dispatch::Ignored)
        }

        other => {
            tracing::info!(
                %conn_id,
                kind = %other,
                len = message.len(),
                "ignoring non-command message"
            );
            Ok(Dispatch::Ignored)
        }
    }
}

/// Handles a single connection from accept to close.
pub async fn handle_connection<S, E>(
    mut channel: Channel<S>,
    evaluator: Arc<E>,
) -> Result<(), TurnwireError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    E: Evaluator,
{
    let conn_id = channel.id();
    tracing::debug!(%conn_id, peer = ?channel.peer(), "handling new connection");

    loop {
        match dispatch_once(&mut channel, evaluator.as_ref()).await? {
            Dispatch::Replied | Dispatch::Ignored => {}
            Dispatch::Closed => {
                tracing::debug!(%conn_id, "connection closed by peer");
                break;
            }
        }
    }

    channel.close().await;
    Ok(())
}

/// Longest command prefix written to the log, in bytes.
const LOG_PREVIEW_LEN: usize = 64;

/// Cuts `text` to at most [`LOG_PREVIEW_LEN`] bytes on a char boundary.
fn preview(text: &str) -> &str {
    if text.len() <= LOG_PREVIEW_LEN {
        return text;
    }
    let mut end = LOG_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use turnwire_protocol::{decode, write_frame, Message, ProtocolError};
    use turnwire_transport::Connection;

    /// Looks names up in a fixed table and records every command seen.
    struct TableEvaluator {
        values: HashMap<&'static str, &'static str>,
        seen: Mutex<Vec<String>>,
    }

    impl TableEvaluator {
        fn new() -> Self {
            Self {
                values: HashMap::from([("x", "42"), ("greeting", "hello\nworld")]),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Evaluator for TableEvaluator {
        async fn evaluate(&self, command: &str) -> Result<String, String> {
            self.seen.lock().unwrap().push(command.to_string());
            self.values
                .get(command)
                .map(|v| v.to_string())
                .ok_or_else(|| "undefined variable".to_string())
        }
    }

    fn server_side() -> (Channel<DuplexStream>, DuplexStream) {
        let (server, client) = duplex(1024);
        (Channel::new(Connection::from_stream(server, None, 1)), client)
    }

    #[tokio::test]
    async fn test_command_is_answered_with_result() {
        let (mut channel, mut client) = server_side();
        let eval = TableEvaluator::new();

        write_frame(&mut client, TypeCode::COMMAND, b"greeting").await.unwrap();
        let step = dispatch_once(&mut channel, &eval).await.unwrap();
        assert_eq!(step, Dispatch::Replied);

        let reply = decode(&mut client).await.unwrap();
        assert_eq!(reply, Message::result("hello\nworld"));
    }

    #[tokio::test]
    async fn test_evaluator_failure_is_answered_with_error() {
        let (mut channel, mut client) = server_side();
        let eval = TableEvaluator::new();

        write_frame(&mut client, TypeCode::COMMAND, b"ls").await.unwrap();
        dispatch_once(&mut channel, &eval).await.unwrap();

        let reply = decode(&mut client).await.unwrap();
        assert_eq!(reply, Message::error("undefined variable"));
        assert!(channel.is_open());
    }

    #[tokio::test]
    async fn test_error_and_unknown_types_get_no_reply() {
        let (mut channel, mut client) = server_side();
        let eval = TableEvaluator::new();

        write_frame(&mut client, TypeCode::ERROR, b"client-side trouble").await.unwrap();
        write_frame(&mut client, TypeCode::new(b'Z'), b"future type").await.unwrap();
        write_frame(&mut client, TypeCode::COMMAND, b"x").await.unwrap();

        assert_eq!(dispatch_once(&mut channel, &eval).await.unwrap(), Dispatch::Ignored);
        assert_eq!(dispatch_once(&mut channel, &eval).await.unwrap(), Dispatch::Ignored);
        assert_eq!(dispatch_once(&mut channel, &eval).await.unwrap(), Dispatch::Replied);

        // The only reply on the wire is the answer to the command.
        let reply = decode(&mut client).await.unwrap();
        assert_eq!(reply, Message::result("42"));
        assert_eq!(*eval.seen.lock().unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_preview_caps_logged_command() {
        assert_eq!(preview("x = 1"), "x = 1");

        let long = "a".repeat(10_000);
        assert_eq!(preview(&long).len(), LOG_PREVIEW_LEN);

        // A multi-byte char straddling the cut is dropped whole.
        let text = format!("{}é", "a".repeat(LOG_PREVIEW_LEN - 1));
        assert_eq!(preview(&text), "a".repeat(LOG_PREVIEW_LEN - 1));
    }

    #[tokio::test]
    async fn test_clean_hang_up_reports_closed() {
        let (mut channel, client) = server_side();
        drop(client);

        let step = dispatch_once(&mut channel, &TableEvaluator::new()).await.unwrap();
        assert_eq!(step, Dispatch::Closed);
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let (channel, mut client) = server_side();
        let eval = Arc::new(TableEvaluator::new());

        client.write_all(b"X;5\nhello\n").await.unwrap();
        let err = handle_connection(channel, Arc::clone(&eval)).await.unwrap_err();
        assert!(matches!(
            err,
            TurnwireError::Protocol(ProtocolError::MalformedHeader { .. })
        ));

        // The server hung up without answering.
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        assert!(eval.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_connection_serves_until_hang_up() {
        let (channel, mut client) = server_side();
        let eval = Arc::new(TableEvaluator::new());
        let server = tokio::spawn(handle_connection(channel, Arc::clone(&eval)));

        for (command, expected) in [
            ("x", Message::result("42")),
            ("nope", Message::error("undefined variable")),
            ("x", Message::result("42")),
        ] {
            write_frame(&mut client, TypeCode::COMMAND, command.as_bytes())
                .await
                .unwrap();
            assert_eq!(decode(&mut client).await.unwrap(), expected);
        }

        drop(client);
        server.await.unwrap().unwrap();
        assert_eq!(eval.seen.lock().unwrap().len(), 3);
    }
}
