//! Length-prefixed message framing.
//!
//! Wire format: 4-byte big-endian message type, 4-byte big-endian payload
//! length, then exactly that many payload bytes.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result, RpcError};

/// Bytes in a frame header.
pub const HEADER_LEN: usize = 8;

/// Default maximum payload size (16 MB).
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Largest payload the 4-byte length field can describe.
pub const MAX_ENCODABLE_LEN: usize = u32::MAX as usize;

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(msg_type: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// The 8-byte header for this frame.
    ///
    /// Payloads longer than [`MAX_ENCODABLE_LEN`] cannot be framed;
    /// [`write_frame`] rejects them before a header is built.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let len = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&self.msg_type.to_be_bytes());
        header[4..].copy_from_slice(&len.to_be_bytes());
        header
    }

    /// Header and payload as one buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
///
/// Returns the number of bytes read. Short reads are retried. An
/// `UnexpectedEof` error ends the stream like a zero-length read; TLS
/// peers that drop the socket without close_notify surface that way.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first header
/// byte. A stream that ends anywhere inside a frame is
/// [`ProtocolError::Truncated`].
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_payload: usize,
) -> Result<Option<Frame>> {
    let mut header = [0u8; HEADER_LEN];
    let got = fill(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN,
            received: got,
        }
        .into());
    }

    let msg_type = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    if len > max_payload {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: max_payload,
        }
        .into());
    }

    let mut payload = BytesMut::zeroed(len);
    let got = fill(reader, &mut payload).await?;
    if got < len {
        return Err(ProtocolError::Truncated {
            expected: len,
            received: got,
        }
        .into());
    }

    Ok(Some(Frame {
        msg_type,
        payload: payload.freeze(),
    }))
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    max_payload: usize,
) -> Result<()> {
    let max_payload = max_payload.min(MAX_ENCODABLE_LEN);
    if frame.payload.len() > max_payload {
        return Err(RpcError::Encoding(format!(
            "frame too large: {} bytes (max {})",
            frame.payload.len(),
            max_payload
        )));
    }

    writer.write_all(&frame.header()).await?;
    writer.write_all(&frame.payload).await?;
    writer.flush().await?;

    Ok(())
}
