//! Frame encoding and decoding.
//!
//! Encoding is a pure function of the type and payload. Decoding pulls
//! bytes from an `AsyncRead` in a fixed order:
//!
//! 1. four bytes, the smallest possible header (`X:0\n`)
//! 2. one byte at a time while the length still has digits
//! 3. exactly `length` payload bytes
//! 4. the `\n` terminator
//!
//! Most control messages have single-digit lengths, so their whole header
//! arrives in the first read. Per-byte reads are only ever spent on extra
//! length digits, never on the payload.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Message, ProtocolError, TypeCode};

/// Size of the shortest possible header: type, `:`, one digit, `\n`.
pub const MIN_HEADER_LEN: usize = 4;

/// Upper bound on the buffer reserved before payload bytes arrive.
///
/// The announced length comes from the peer; the buffer grows as data is
/// actually read instead of trusting it up front.
const PREALLOC_LIMIT: usize = 64 * 1024;

/// Encodes one frame: `type ":" length "\n" payload "\n"`.
///
/// Never fails; the length is written in minimal decimal form.
pub fn encode(kind: TypeCode, payload: &[u8]) -> Vec<u8> {
    let mut frame = header(kind, payload.len());
    frame.reserve(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(b'\n');
    frame
}

fn header(kind: TypeCode, length: usize) -> Vec<u8> {
    let digits = length.to_string();
    let mut header = Vec::with_capacity(digits.len() + 3);
    header.push(kind.as_u8());
    header.push(b':');
    header.extend_from_slice(digits.as_bytes());
    header.push(b'\n');
    header
}

/// Writes one frame to `writer` and flushes it.
///
/// Header, payload and terminator are written separately so a large
/// payload is never copied into a second buffer.
pub async fn write_frame<W>(
    writer: &mut W,
    kind: TypeCode,
    payload: &[u8],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&header(kind, payload.len())).await?;
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Reads one frame from `reader` with no payload limit.
///
/// See [`FrameCodec::decode`] for the error cases.
pub async fn decode<R>(reader: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    decode_with_limit(reader, None).await
}

/// Reads into `buf` until it is full or the stream ends.
///
/// Returns how many bytes were read; fewer than `buf.len()` means EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

async fn decode_with_limit<R>(
    reader: &mut R,
    max_payload: Option<usize>,
) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; MIN_HEADER_LEN];
    let received = read_full(reader, &mut head).await?;
    if received < MIN_HEADER_LEN {
        return Err(ProtocolError::TruncatedHeader { received });
    }

    let [kind, colon, first, mut next] = head;
    if colon != b':' {
        return Err(ProtocolError::MalformedHeader {
            position: 1,
            found: colon,
        });
    }
    if !first.is_ascii_digit() {
        return Err(ProtocolError::MalformedHeader {
            position: 2,
            found: first,
        });
    }

    let mut length = usize::from(first - b'0');
    let mut position = 3;
    while next != b'\n' {
        if !next.is_ascii_digit() {
            return Err(ProtocolError::MalformedHeader {
                position,
                found: next,
            });
        }
        length = length
            .checked_mul(10)
            .and_then(|l| l.checked_add(usize::from(next - b'0')))
            .ok_or(ProtocolError::LengthOverflow)?;

        let mut byte = [0u8; 1];
        if read_full(reader, &mut byte).await? == 0 {
            return Err(ProtocolError::TruncatedHeader {
                received: position + 1,
            });
        }
        next = byte[0];
        position += 1;
    }

    if let Some(limit) = max_payload {
        if length > limit {
            return Err(ProtocolError::PayloadTooLarge { length, limit });
        }
    }

    let mut payload = Vec::with_capacity(length.min(PREALLOC_LIMIT));
    let wanted = u64::try_from(length).map_err(|_| ProtocolError::LengthOverflow)?;
    let got = (&mut *reader).take(wanted).read_to_end(&mut payload).await?;
    if got < length {
        return Err(ProtocolError::TruncatedPayload {
            expected: length.saturating_add(1),
            received: got,
        });
    }

    let mut terminator = [0u8; 1];
    if read_full(reader, &mut terminator).await? == 0 {
        return Err(ProtocolError::TruncatedPayload {
            expected: length.saturating_add(1),
            received: length,
        });
    }
    if terminator[0] != b'\n' {
        return Err(ProtocolError::MissingTerminator {
            found: terminator[0],
        });
    }

    Ok(Message::new(TypeCode::new(kind), payload))
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Encoder/decoder with receive-side limits.
///
/// The default codec is unbounded, matching the bare wire format. A limit
/// only affects decoding: a peer announcing a payload larger than
/// `max_payload` is rejected before any payload byte is read.
///
/// ## Example
///
/// ```rust
/// use turnwire_protocol::{FrameCodec, Message};
///
/// # tokio_test_block(async {
/// let codec = FrameCodec::default();
/// let frame = codec.encode(&Message::command("x = 1"));
/// assert_eq!(frame, b"X:5\nx = 1\n");
///
/// let mut reader = &frame[..];
/// let decoded = codec.decode(&mut reader).await.unwrap();
/// assert_eq!(decoded, Message::command("x = 1"));
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
    max_payload: Option<usize>,
}

impl FrameCodec {
    /// Creates an unbounded codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec that refuses payloads longer than `limit` bytes.
    pub fn with_max_payload(limit: usize) -> Self {
        Self {
            max_payload: Some(limit),
        }
    }

    /// Creates a codec from an optional limit.
    pub fn from_limit(max_payload: Option<usize>) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> Option<usize> {
        self.max_payload
    }

    /// Encodes a message as one frame.
    pub fn encode(&self, message: &Message) -> Vec<u8> {
        encode(message.kind(), message.payload())
    }

    /// Reads exactly one frame.
    ///
    /// # Errors
    /// - [`ProtocolError::TruncatedHeader`] if the stream ends inside the header
    /// - [`ProtocolError::MalformedHeader`] for a bad separator or length byte
    /// - [`ProtocolError::LengthOverflow`] if the length does not fit a `usize`
    /// - [`ProtocolError::PayloadTooLarge`] if the length exceeds the limit
    /// - [`ProtocolError::TruncatedPayload`] if the stream ends before the terminator
    /// - [`ProtocolError::MissingTerminator`] if the payload is not followed by `\n`
    /// - [`ProtocolError::Io`] if the stream itself fails
    pub async fn decode<R>(&self, reader: &mut R) -> Result<Message, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        decode_with_limit(reader, self.max_payload).await
    }

    /// Writes one frame and flushes it.
    pub async fn write<W>(
        &self,
        writer: &mut W,
        kind: TypeCode,
        payload: &[u8],
    ) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_frame(writer, kind, payload).await
    }
}
